use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::{StoreError, StoreResult};

/// Lifecycle state of a blob store instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreState {
    /// Constructed, never started.
    New,
    /// Started and serving blob operations.
    Started,
    /// Stopped; may be started again.
    Stopped,
    /// The last start attempt failed.
    Failed,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Start/stop bookkeeping shared by every store implementation.
///
/// Transitions are serialized by an internal mutex, so a backend's start
/// hook never runs twice concurrently.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<StoreState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::New),
        }
    }

    pub fn state(&self) -> StoreState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_started(&self) -> bool {
        self.state() == StoreState::Started
    }

    /// Run `hook` and move to `Started`. A no-op if already started.
    ///
    /// When the hook fails the state becomes `Failed` and the error is
    /// returned unchanged.
    pub fn start_with<F>(&self, hook: F) -> StoreResult<()>
    where
        F: FnOnce() -> StoreResult<()>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == StoreState::Started {
            return Ok(());
        }
        match hook() {
            Ok(()) => {
                *state = StoreState::Started;
                Ok(())
            }
            Err(e) => {
                *state = StoreState::Failed;
                Err(e)
            }
        }
    }

    /// Run `hook` and move to `Stopped`. A no-op unless started.
    ///
    /// When the hook fails the store stays `Started`.
    pub fn stop_with<F>(&self, hook: F) -> StoreResult<()>
    where
        F: FnOnce() -> StoreResult<()>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != StoreState::Started {
            return Ok(());
        }
        hook()?;
        *state = StoreState::Stopped;
        Ok(())
    }

    /// Fail with [`StoreError::NotStarted`] unless started.
    pub fn ensure_started(&self, name: &str) -> StoreResult<()> {
        let state = self.state();
        if state == StoreState::Started {
            Ok(())
        } else {
            Err(StoreError::NotStarted {
                name: name.to_string(),
                state: state.to_string(),
            })
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_and_stops() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), StoreState::New);
        lc.start_with(|| Ok(())).unwrap();
        assert!(lc.is_started());
        lc.stop_with(|| Ok(())).unwrap();
        assert_eq!(lc.state(), StoreState::Stopped);
        lc.start_with(|| Ok(())).unwrap();
        assert!(lc.is_started());
    }

    #[test]
    fn failed_start_is_recorded() {
        let lc = Lifecycle::new();
        let err = lc
            .start_with(|| Err(StoreError::Backend("no disk".into())))
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(lc.state(), StoreState::Failed);
    }

    #[test]
    fn second_start_skips_hook() {
        let lc = Lifecycle::new();
        lc.start_with(|| Ok(())).unwrap();
        lc.start_with(|| panic!("hook must not run")).unwrap();
    }

    #[test]
    fn stop_before_start_is_noop() {
        let lc = Lifecycle::new();
        lc.stop_with(|| panic!("hook must not run")).unwrap();
        assert_eq!(lc.state(), StoreState::New);
    }

    #[test]
    fn failed_stop_keeps_started() {
        let lc = Lifecycle::new();
        lc.start_with(|| Ok(())).unwrap();
        assert!(lc.stop_with(|| Err(StoreError::Backend("busy".into()))).is_err());
        assert!(lc.is_started());
    }

    #[test]
    fn ensure_started_reports_state() {
        let lc = Lifecycle::new();
        match lc.ensure_started("default") {
            Err(StoreError::NotStarted { name, state }) => {
                assert_eq!(name, "default");
                assert_eq!(state, "new");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
