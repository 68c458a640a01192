//! Storage cell behind every instance field and every shared prototype field.
//!
//! Reads and writes go through a reentrant lock, so another thread waits until a
//! running update has committed. An update works on a copy of the value: code
//! called from inside the update closure still reads the last committed value. A
//! write to the same cell from inside its own update is refused with [`Busy`].

use std::cell::RefCell;

use parking_lot::ReentrantMutex;

use crate::Value;

/// The cell is in the middle of an update on the current call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Busy;

pub(crate) struct FieldCell {
    state: ReentrantMutex<RefCell<FieldState>>,
}

struct FieldState {
    value: Value,
    updating: bool,
}

/// Clears the `updating` mark when an update finishes, including by unwinding.
struct Updating<'a>(&'a RefCell<FieldState>);

impl Drop for Updating<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().updating = false;
    }
}

impl FieldCell {
    pub(crate) fn new(value: Value) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(FieldState {
                value,
                updating: false,
            })),
        }
    }

    pub(crate) fn get(&self) -> Value {
        let guard = self.state.lock();
        let value = guard.borrow().value.clone();
        value
    }

    pub(crate) fn set(&self, value: Value) -> Result<(), Busy> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.updating {
            return Err(Busy);
        }
        state.value = value;
        Ok(())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R, Busy> {
        let guard = self.state.lock();
        let mut working = {
            let mut state = guard.borrow_mut();
            if state.updating {
                return Err(Busy);
            }
            state.updating = true;
            state.value.clone()
        };

        let updating = Updating(&guard);
        let result = f(&mut working);
        guard.borrow_mut().value = working;
        drop(updating);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_update_commits_result() {
        let cell = FieldCell::new(Value::list([]));

        let len = cell
            .update(|v| {
                let list = v.as_list_mut().unwrap();
                list.push(Value::Int(7));
                list.len()
            })
            .unwrap();

        assert_eq!(len, 1);
        assert_eq!(cell.get(), Value::list([Value::Int(7)]));
    }

    #[test]
    fn test_nested_access_sees_committed_value_and_cannot_write() {
        let cell = FieldCell::new(Value::Int(1));

        cell.update(|v| {
            assert_eq!(cell.get(), Value::Int(1));
            assert_eq!(cell.set(Value::Int(5)), Err(Busy));
            assert_eq!(cell.update(|_| ()), Err(Busy));
            *v = Value::Int(2);
        })
        .unwrap();

        assert_eq!(cell.get(), Value::Int(2));
        cell.set(Value::Int(3)).unwrap();
        assert_eq!(cell.get(), Value::Int(3));
    }

    #[test]
    fn test_panicking_update_leaves_cell_usable() {
        let cell = Arc::new(FieldCell::new(Value::Int(1)));

        let inner = cell.clone();
        let outcome = std::thread::spawn(move || {
            let _ = inner.update(|v| {
                *v = Value::Int(9);
                panic!("update aborted");
            });
        })
        .join();

        assert!(outcome.is_err());
        assert_eq!(cell.get(), Value::Int(1));
        assert!(cell.update(|v| *v = Value::Int(4)).is_ok());
        assert_eq!(cell.get(), Value::Int(4));
    }
}
