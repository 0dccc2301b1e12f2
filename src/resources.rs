//! Ordered teardown of process-wide resources.
//!
//! [`Resources`] is owned by the top-level runner and passed down to
//! whatever acquires something that must be released on exit.  Releases run
//! in reverse acquisition order, and every release runs even when an earlier
//! one fails; failures are collected into a [`TeardownError`].

use log::{debug, warn};
use std::fmt;

/// Boxed error returned by a release step.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A deferred release step.
pub type Closer = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// One or more release steps failed.
///
/// Carries every failure, not only the first.
#[derive(Debug, Default, thiserror::Error)]
#[error("teardown failed: {}", .0.join("; "))]
pub struct TeardownError(Vec<String>);

impl TeardownError {
    /// Record a failure of the step called `what`.
    pub fn push(&mut self, what: &str, err: impl fmt::Display) {
        self.0.push(format!("{}: {}", what, err));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn failures(&self) -> &[String] {
        &self.0
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), TeardownError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Explicit teardown list.
#[derive(Default)]
pub struct Resources {
    closers: Vec<(String, Closer)>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release step.
    pub fn defer(
        &mut self,
        name: impl Into<String>,
        release: impl FnOnce() -> Result<(), BoxError> + Send + 'static,
    ) {
        self.closers.push((name.into(), Box::new(release)));
    }

    /// Run `acquire`; on success register the release step built from the
    /// acquired value.  Nothing is registered when acquisition fails.
    pub fn acquire<T, E>(
        &mut self,
        name: impl Into<String>,
        acquire: impl FnOnce() -> Result<T, E>,
        release: impl FnOnce(&T) -> Closer,
    ) -> Result<T, E> {
        let value = acquire()?;
        self.closers.push((name.into(), release(&value)));
        Ok(value)
    }

    /// Number of pending release steps.
    pub fn len(&self) -> usize {
        self.closers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closers.is_empty()
    }

    /// Release everything in reverse order.  Calling it again is a no-op.
    pub fn close(&mut self) -> Result<(), TeardownError> {
        let mut errors = TeardownError::default();
        while let Some((name, release)) = self.closers.pop() {
            debug!("releasing {}", name);
            if let Err(e) = release() {
                errors.push(&name, e);
            }
        }
        errors.into_result()
    }
}

impl Drop for Resources {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Closer) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        let make = move |name: &str| -> Closer {
            let log = log2.clone();
            let name = name.to_string();
            Box::new(move || {
                log.lock().unwrap().push(name);
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn releases_in_reverse_order() {
        let (log, make) = recorder();
        let mut res = Resources::new();
        res.defer("a", make("a"));
        res.defer("b", make("b"));
        res.defer("c", make("c"));
        res.close().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn failures_are_collected_and_do_not_stop_teardown() {
        let (log, make) = recorder();
        let mut res = Resources::new();
        res.defer("first", make("first"));
        res.defer("broken", || Err("socket busy".into()));
        res.defer("also broken", || Err("no such process".into()));
        let err = res.close().unwrap_err();
        assert_eq!(err.failures().len(), 2);
        assert!(err.to_string().contains("broken: socket busy"));
        assert!(err.to_string().contains("also broken: no such process"));
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn close_twice_is_noop() {
        let (log, make) = recorder();
        let mut res = Resources::new();
        res.defer("once", make("once"));
        res.close().unwrap();
        res.close().unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_acquire_registers_nothing() {
        let (_log, make) = recorder();
        let mut res = Resources::new();
        let out: Result<u32, &str> = res.acquire("x", || Err("nope"), |_| make("x"));
        assert!(out.is_err());
        assert!(res.is_empty());
        let ok: Result<u32, &str> = res.acquire("y", || Ok(3), |_| make("y"));
        assert_eq!(ok, Ok(3));
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn drop_releases_pending_steps() {
        let (log, make) = recorder();
        {
            let mut res = Resources::new();
            res.defer("dropped", make("dropped"));
        }
        assert_eq!(*log.lock().unwrap(), vec!["dropped"]);
    }
}
