//! Bootstrap sequencing: the environment readiness gate and the event loop.
//!
//! The first resolution request boots the system and checks the readiness
//! predicate once. While the environment is not ready, passes are held. The
//! predicate is checked again when a [`ReadySignal`] fires and on every poll tick of
//! [`ModuleSystem::run`]. Once it holds, the latch flips for good and the held pass runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::source::LoaderEvent;
use crate::{ModuleError, ModuleSystem};

/// Whether the host environment can accept module initialization.
pub trait Readiness: Send {
    fn is_ready(&self) -> bool;
}

impl<F> Readiness for F
where
    F: Fn() -> bool + Send,
{
    fn is_ready(&self) -> bool {
        self()
    }
}

/// The environment is ready from the start.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl Readiness for AlwaysReady {
    fn is_ready(&self) -> bool {
        true
    }
}

/// Readiness controlled by a shared flag, settable from any thread.
#[derive(Debug, Clone, Default)]
pub struct ReadyFlag(Arc<AtomicBool>);

impl ReadyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Readiness for ReadyFlag {
    fn is_ready(&self) -> bool {
        self.get()
    }
}

/// Handle for announcing that the environment became ready.
#[derive(Clone)]
pub struct ReadySignal {
    events: Sender<LoaderEvent>,
}

impl ReadySignal {
    pub fn notify(&self) {
        if self.events.send(LoaderEvent::EnvironmentReady).is_err() {
            tracing::warn!("Ready signal sent after the module system was dropped");
        }
    }
}

pub(crate) struct Sequencer {
    readiness: Box<dyn Readiness>,
    booted: bool,
    signalled: bool,
    ready: bool,
}

impl Sequencer {
    pub(crate) fn new(readiness: Box<dyn Readiness>) -> Self {
        Self {
            readiness,
            booted: false,
            signalled: false,
            ready: false,
        }
    }

    pub(crate) fn is_booted(&self) -> bool {
        self.booted
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether a resolution pass may run now. The first call boots the sequencer.
    pub(crate) fn admit(&mut self) -> bool {
        if self.ready {
            return true;
        }
        if self.booted {
            return false;
        }
        self.booted = true;
        tracing::info!("Module bootstrap started");
        self.check()
    }

    /// Re-check the gate. Returns true only when this call flipped the latch.
    pub(crate) fn check(&mut self) -> bool {
        if self.ready {
            return false;
        }
        if self.signalled || self.readiness.is_ready() {
            self.ready = true;
            tracing::info!("Environment ready, resolving modules");
            return true;
        }
        false
    }

    /// Record a ready signal. Returns true when the held pass should now run.
    pub(crate) fn signal(&mut self) -> bool {
        self.signalled = true;
        self.booted && self.check()
    }
}

impl ModuleSystem {
    /// Handle for event-driven readiness. `notify` may be called from any thread.
    pub fn ready_signal(&self) -> ReadySignal {
        ReadySignal {
            events: self.events_tx.clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.sequencer.is_ready()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Process every event already queued without blocking. Returns how many were handled.
    pub fn pump(&mut self) -> Result<usize, ModuleError> {
        self.ensure_running()?;
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Block until the bootstrap is idle or fails.
    ///
    /// Returns once the pending queue is empty and no fetch is in flight. A fetch whose
    /// completion is never reported keeps this waiting.
    pub fn run(&mut self) -> Result<(), ModuleError> {
        self.ensure_running()?;
        let poll_interval = self.config.ready_poll_interval();

        loop {
            self.pump()?;

            if self.is_idle() {
                tracing::info!("Module load order: {:?}", self.load_order);
                tracing::info!("🎉 Module bootstrap complete");
                return Ok(());
            }

            if !self.sequencer.is_booted() {
                tracing::warn!(
                    "{} module(s) declared but none has a body yet; nothing to run",
                    self.queue.len()
                );
                return Ok(());
            }

            if self.sequencer.check() {
                self.resolve()?;
                continue;
            }

            if self.sequencer.is_ready() && self.in_flight == 0 {
                // Only a declaration still waiting for its body can be left here.
                self.resolve()?;
                if self.in_flight == 0 && !self.is_idle() {
                    tracing::warn!(
                        "Bootstrap idle with pending declarations: {:?}",
                        self.queue
                    );
                    return Ok(());
                }
                continue;
            }

            match self.events_rx.recv_timeout(poll_interval) {
                Ok(event) => self.handle_event(event)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequencer_checks_once_at_boot() {
        let flag = ReadyFlag::new();
        let mut sequencer = Sequencer::new(Box::new(flag.clone()));

        assert!(!sequencer.admit());
        flag.set();
        // Later requests do not poll the predicate again.
        assert!(!sequencer.admit());
        assert!(sequencer.check());
        assert!(sequencer.admit());
        assert!(!sequencer.check());
    }

    #[test]
    fn test_signal_before_boot_is_remembered() {
        let mut sequencer = Sequencer::new(Box::new(|| false));

        assert!(!sequencer.signal());
        assert!(sequencer.admit());
        assert!(sequencer.is_ready());
    }
}
