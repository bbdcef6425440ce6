//! Scheduler lifecycle states and transition rules.

use crate::error::{Error, Result};

/// Lifecycle state of a [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl Status {
    /// Stable textual name.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Uninitialized => "uninitialized",
            Status::Initializing => "initializing",
            Status::Initialized => "initialized",
            Status::Starting => "starting",
            Status::Started => "started",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
        }
    }

    fn transitional(&self) -> bool {
        matches!(
            self,
            Status::Initializing | Status::Starting | Status::Stopping
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validates a requested transition from `current` to `wanted`.
///
/// Only the transitional states may be requested; a transition may not
/// start while another is in progress; an uninitialized scheduler may only
/// initialize; a started scheduler may only stop; stopping requires a
/// started scheduler; and starting requires a freshly initialized one — a
/// stopped scheduler must be re-initialized.
pub(crate) fn check_status(current: Status, wanted: Status) -> Result<()> {
    if current.transitional() {
        return Err(Error::scheduler(format!(
            "scheduler is busy: current status is {current}"
        )));
    }
    match wanted {
        Status::Initializing => {
            if current == Status::Started {
                return Err(Error::scheduler(
                    "cannot initialize a started scheduler: stop it first",
                ));
            }
            Ok(())
        }
        Status::Starting => {
            if current == Status::Uninitialized {
                return Err(Error::scheduler(
                    "cannot start an uninitialized scheduler",
                ));
            }
            if current != Status::Initialized {
                return Err(Error::scheduler(format!(
                    "cannot start the scheduler: current status is {current}"
                )));
            }
            Ok(())
        }
        Status::Stopping => {
            if current == Status::Uninitialized {
                return Err(Error::scheduler(
                    "cannot stop an uninitialized scheduler",
                ));
            }
            if current != Status::Started {
                return Err(Error::scheduler(format!(
                    "cannot stop the scheduler: current status is {current}"
                )));
            }
            Ok(())
        }
        other => Err(Error::scheduler(format!(
            "unsupported wanted status: {other}"
        ))),
    }
}
