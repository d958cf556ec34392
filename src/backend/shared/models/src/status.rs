use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::epoch::EpochRange;

/// Phase of a distribution attempt for one epoch range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionState {
    Calculating,
    GeneratingTree,
    Committing,
    Distributing,
    Completed,
    Failed,
}

impl DistributionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Calculating => 0,
            Self::GeneratingTree => 1,
            Self::Committing => 2,
            Self::Distributing => 3,
            Self::Completed | Self::Failed => 4,
        }
    }

    /// Transitions only move forward, except that a failed attempt may be
    /// restarted from `Calculating`.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Failed, Self::Calculating) => true,
            (current, _) if current.is_terminal() => false,
            (current, next) => next.rank() >= current.rank(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calculating => "calculating",
            Self::GeneratingTree => "generating_tree",
            Self::Committing => "committing",
            Self::Distributing => "distributing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DistributionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-local progress of a distribution attempt, exposed to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStatus {
    pub range: EpochRange,
    pub state: DistributionState,
    pub total_workers: usize,
    pub total_batches: usize,
    pub processed_batches: usize,
    pub total_rewards: u128,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DistributionStatus {
    pub fn new(range: EpochRange) -> Self {
        let now = Utc::now();
        Self {
            range,
            state: DistributionState::Calculating,
            total_workers: 0,
            total_batches: 0,
            processed_batches: 0,
            total_rewards: 0,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Apply `next` if the state machine allows it. Returns whether the state
    /// changed.
    pub fn transition(&mut self, next: DistributionState) -> bool {
        if self.state == next || !self.state.can_transition_to(next) {
            return false;
        }
        if self.state == DistributionState::Failed {
            // restart
            self.error = None;
            self.processed_batches = 0;
            self.started_at = Utc::now();
        }
        self.state = next;
        self.touch();
        true
    }

    /// Mark the attempt failed. A completed attempt stays completed.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.state != DistributionState::Failed
            && !self.state.can_transition_to(DistributionState::Failed)
        {
            return false;
        }
        self.error = Some(error.into());
        self.state = DistributionState::Failed;
        self.touch();
        true
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DistributionState::*;

    #[test]
    fn states_only_move_forward() {
        assert!(Calculating.can_transition_to(GeneratingTree));
        assert!(GeneratingTree.can_transition_to(Committing));
        assert!(Committing.can_transition_to(Distributing));
        assert!(Distributing.can_transition_to(Completed));
        assert!(Calculating.can_transition_to(Failed));
        assert!(!Distributing.can_transition_to(Committing));
        assert!(!Completed.can_transition_to(Calculating));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn failed_attempts_can_restart() {
        assert!(Failed.can_transition_to(Calculating));
        assert!(!Failed.can_transition_to(Distributing));

        let mut status = DistributionStatus::new(EpochRange::new(0, 10).unwrap());
        status.processed_batches = 2;
        status.fail("rpc down");
        assert_eq!(status.state, Failed);

        assert!(status.transition(Calculating));
        assert_eq!(status.error, None);
        assert_eq!(status.processed_batches, 0);
    }

    #[test]
    fn completed_attempt_cannot_fail() {
        let mut status = DistributionStatus::new(EpochRange::new(0, 10).unwrap());
        assert!(status.transition(Completed));
        assert!(!status.fail("late collision"));
        assert_eq!(status.state, Completed);
        assert_eq!(status.error, None);
    }

    #[test]
    fn backward_transition_is_ignored() {
        let mut status = DistributionStatus::new(EpochRange::new(0, 10).unwrap());
        assert!(status.transition(Distributing));
        assert!(!status.transition(Committing));
        assert_eq!(status.state, Distributing);
    }

    #[test]
    fn status_serializes_state_in_snake_case() {
        let status = DistributionStatus::new(EpochRange::new(5, 10).unwrap());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "calculating");
    }
}
