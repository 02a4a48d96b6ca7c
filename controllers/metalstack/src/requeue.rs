//! Requeue directives returned by the reconcilers.

use kube_runtime::controller::Action;
use std::time::Duration;

/// What the driver should do after a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change event
    Never,
    /// Run again right away
    Instantly,
    /// Run again after the short delay (waiting on metal-api side effects)
    WithSmallDelay,
    /// Run again after the standard delay (waiting on external preconditions)
    WithDelay,
}

/// Delays backing the requeue classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueDelays {
    pub short: Duration,
    pub standard: Duration,
}

impl Default for RequeueDelays {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(5),
            standard: Duration::from_secs(30),
        }
    }
}

impl RequeueDelays {
    /// Translate a directive into a kube-runtime action
    pub fn action(&self, requeue: Requeue) -> Action {
        match requeue {
            Requeue::Never => Action::await_change(),
            Requeue::Instantly => Action::requeue(Duration::ZERO),
            Requeue::WithSmallDelay => Action::requeue(self.short),
            Requeue::WithDelay => Action::requeue(self.standard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_actions_use_configured_delays() {
        let delays = RequeueDelays {
            short: Duration::from_secs(2),
            standard: Duration::from_secs(20),
        };
        assert_eq!(delays.action(Requeue::Never), Action::await_change());
        assert_eq!(delays.action(Requeue::Instantly), Action::requeue(Duration::ZERO));
        assert_eq!(delays.action(Requeue::WithSmallDelay), Action::requeue(Duration::from_secs(2)));
        assert_eq!(delays.action(Requeue::WithDelay), Action::requeue(Duration::from_secs(20)));
    }
}
