//! Dependency resolution.
//!
//! A pass walks the pending queue in order. For each module it checks every
//! dependency: an unknown name is requested from the [`ModuleSource`] (once; the name
//! becomes a fetch placeholder), a known but unloaded name just keeps the module
//! waiting. A module whose dependencies are all loaded and whose body is bound is
//! removed from the queue, marked loaded and run. Passes repeat until one makes no
//! progress.
//!
//! When a pass makes no progress, nothing is in flight and bodied modules are still
//! pending, those modules can never run: the dependency graph has a cycle or names a
//! module no fetch will ever declare. That is reported as
//! [`ModuleError::UnresolvedDependencies`], unless the loader is configured as
//! `baked`: then the stuck modules are logged and stay pending.
//!
//! Passes are never nested. A resolution request made while a pass is running (a body
//! declaring another module) only marks the pass for another round.
//!
//! [`ModuleSource`]: crate::ModuleSource

use std::time::Instant;

use crate::registry::{Body, Entry};
use crate::source::{FetchCompletion, FetchRequest, LoaderEvent};
use crate::{ModuleError, ModuleSystem, UnresolvedModule};

impl ModuleSystem {
    /// Run resolution now if the environment gate allows it, or defer it to the end of
    /// the running pass.
    pub(crate) fn request_resolution(&mut self) -> Result<(), ModuleError> {
        self.ensure_running()?;
        if self.in_pass {
            self.rerun = true;
            return Ok(());
        }
        if !self.sequencer.admit() {
            tracing::trace!("Resolution held until the environment is ready");
            return Ok(());
        }
        self.resolve()
    }

    /// Run passes to a fixed point, halting the system on error.
    pub(crate) fn resolve(&mut self) -> Result<(), ModuleError> {
        self.in_pass = true;
        let result = self.resolve_passes();
        self.in_pass = false;
        result.map_err(|err| self.halt(err))
    }

    fn resolve_passes(&mut self) -> Result<(), ModuleError> {
        loop {
            self.rerun = false;
            let progressed = self.pass()?;
            if !progressed && !self.rerun {
                break;
            }
        }

        if self.in_flight > 0 {
            tracing::trace!(
                "Waiting on {} fetch(es), {} module(s) pending",
                self.in_flight,
                self.queue.len()
            );
            return Ok(());
        }

        let stuck = self.stuck_modules();
        if stuck.is_empty() {
            return Ok(());
        }
        if self.config.baked {
            tracing::warn!(
                "Baked bundle left {} module(s) unresolved: {:?}",
                stuck.len(),
                stuck.iter().map(|module| &module.name).collect::<Vec<_>>()
            );
            return Ok(());
        }
        Err(ModuleError::UnresolvedDependencies { modules: stuck })
    }

    /// One scan of the queue. Modules appended during the scan are visited in it.
    fn pass(&mut self) -> Result<bool, ModuleError> {
        let mut progressed = false;
        let mut index = 0;

        while index < self.queue.len() {
            let name = self.queue[index].clone();
            let (dependencies, has_body) = match self.entries.get(&name) {
                Some(Entry::Declared(record)) => {
                    (record.dependencies.clone(), record.has_body())
                }
                _ => {
                    index += 1;
                    continue;
                }
            };

            let mut ready = true;
            for dependency in &dependencies {
                match self.entries.get(dependency) {
                    None => {
                        self.issue_fetch(dependency, &name);
                        ready = false;
                    }
                    Some(entry) if !entry.is_loaded() => ready = false,
                    Some(_) => {}
                }
            }

            if ready && has_body {
                self.queue.remove(index);
                self.execute(&name)?;
                progressed = true;
            } else {
                index += 1;
            }
        }

        Ok(progressed)
    }

    fn execute(&mut self, name: &str) -> Result<(), ModuleError> {
        let body = match self.entries.get_mut(name) {
            Some(Entry::Declared(record)) => {
                record.loaded = true;
                std::mem::replace(&mut record.body, Body::Consumed)
            }
            _ => return Ok(()),
        };
        self.load_order.push(name.to_string());

        let Body::Bound(body) = body else {
            return Ok(());
        };

        tracing::debug!("▶ Executing module: {}", name);
        let start = Instant::now();
        body(self).map_err(|err| ModuleError::BodyFailed {
            module: name.to_string(),
            reason: format!("{:#}", err),
        })?;
        tracing::debug!("✓ Completed module: {} ({:?})", name, start.elapsed());
        Ok(())
    }

    fn issue_fetch(&mut self, module: &str, requested_by: &str) {
        self.entries.insert(
            module.to_string(),
            Entry::Fetching {
                requested_by: requested_by.to_string(),
            },
        );
        self.in_flight += 1;

        let request = FetchRequest {
            module: module.to_string(),
            requested_by: requested_by.to_string(),
            path: self.config.resolve_path(module, self.cache_token),
        };
        tracing::debug!(
            "⇣ Fetching module: {} from {} (required by {})",
            request.module,
            request.path,
            request.requested_by
        );

        let completion = FetchCompletion::new(request.clone(), self.events_tx.clone());
        self.source.fetch(request, completion);
    }

    fn stuck_modules(&self) -> Vec<UnresolvedModule> {
        self.queue
            .iter()
            .filter_map(|name| match self.entries.get(name) {
                Some(Entry::Declared(record)) if record.has_body() => Some(UnresolvedModule {
                    name: name.clone(),
                    missing: record
                        .dependencies
                        .iter()
                        .filter(|dep| !self.is_loaded(dep))
                        .cloned()
                        .collect(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Process one queued event.
    pub(crate) fn handle_event(&mut self, event: LoaderEvent) -> Result<(), ModuleError> {
        self.ensure_running()?;
        match event {
            LoaderEvent::Fetched { request, outcome } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let installer = match outcome {
                    Ok(installer) => installer,
                    Err(reason) => return Err(self.halt(fetch_failed(request, reason))),
                };
                tracing::debug!("✓ Fetched module: {}", request.module);

                // The installer's declarations are resolved afterwards, not inside it.
                let in_pass = std::mem::replace(&mut self.in_pass, true);
                let installed = installer(self);
                self.in_pass = in_pass;
                if let Err(err) = installed {
                    return Err(self.halt(fetch_failed(request, format!("{:#}", err))));
                }

                if self.is_fetching(&request.module) {
                    tracing::warn!("Fetch of '{}' did not declare it", request.module);
                }
                self.request_resolution()
            }
            LoaderEvent::EnvironmentReady => {
                if self.sequencer.signal() {
                    self.resolve()
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Latch the system as halted and pass the error through.
    pub(crate) fn halt(&mut self, err: ModuleError) -> ModuleError {
        if self.halted.is_none() && !matches!(err, ModuleError::Halted { .. }) {
            tracing::error!("Bootstrap failed: {}", err);
            self.halted = Some(err.to_string());
        }
        err
    }
}

fn fetch_failed(request: FetchRequest, reason: String) -> ModuleError {
    ModuleError::FetchFailed {
        module: request.module,
        path: request.path,
        requested_by: request.requested_by,
        reason,
    }
}
