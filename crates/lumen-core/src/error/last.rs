use std::cell::RefCell;

use super::{Error, Result};

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Message of the most recent failure on the calling thread.
///
/// Cleared by every successful public operation, so it describes the last call
/// only when that call failed.
pub fn last_error_message() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

fn set_last_error(err: &Error) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err.to_string()));
}

/// Records the outcome of a public operation in the thread-local slot.
pub(crate) trait Recorded: Sized {
    fn recorded(self) -> Self;
}

impl<T> Recorded for Result<T> {
    fn recorded(self) -> Self {
        match &self {
            Ok(_) => clear_last_error(),
            Err(err) => set_last_error(err),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_sets_and_success_clears() {
        clear_last_error();
        let failed: Result<()> = Err(Error::InvalidParameter("width must be non-zero".into()));
        let _ = failed.recorded();
        let msg = last_error_message().unwrap_or_default();
        assert!(msg.contains("width must be non-zero"));

        let _ = Ok::<u32, Error>(7).recorded();
        assert_eq!(last_error_message(), None);
    }

    #[test]
    fn slot_is_per_thread() {
        let _ = Err::<(), _>(Error::Unsupported("metal".into())).recorded();
        let other = std::thread::spawn(last_error_message).join().unwrap();
        assert_eq!(other, None);
        assert!(last_error_message().is_some());
    }
}
