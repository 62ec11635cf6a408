/// Download status definitions for the dispatcher's state machine
///
/// This module defines every status a download record can hold and the
/// transitions the dispatcher is allowed to make between them.
use std::fmt;

/// Represents the current status of a download record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    /// Resource has been discovered and is waiting for a worker
    Pending,

    /// A worker is currently fetching the resource
    InProgress,

    /// The resource was fetched successfully
    Succeeded,

    /// The last fetch attempt failed
    Failed,
}

impl DownloadStatus {
    /// Returns true if a record in this status will not be fetched again
    ///
    /// `Failed` only becomes final once the attempt cap is reached, which the
    /// status alone cannot tell; see [`DownloadStatus::can_transition`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Checks a transition against the download state machine
    ///
    /// Allowed transitions:
    ///
    /// | From       | To         | Condition                 |
    /// |------------|------------|---------------------------|
    /// | Pending    | InProgress | always                    |
    /// | InProgress | Succeeded  | always                    |
    /// | InProgress | Failed     | always                    |
    /// | Failed     | InProgress | `attempts < max_attempts` |
    /// | Failed     | Pending    | `attempts < max_attempts` |
    ///
    /// `attempts` counts the attempts made during the current run.
    /// `Failed → Pending` hands a retry that was cut short to the next run.
    pub fn can_transition(&self, to: DownloadStatus, attempts: u32, max_attempts: u32) -> bool {
        match (self, to) {
            (Self::Pending, Self::InProgress) => true,
            (Self::InProgress, Self::Succeeded) => true,
            (Self::InProgress, Self::Failed) => true,
            (Self::Failed, Self::InProgress | Self::Pending) => attempts < max_attempts,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Succeeded, Self::Failed]
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(DownloadStatus::Pending.can_transition(DownloadStatus::InProgress, 0, 3));
        assert!(DownloadStatus::InProgress.can_transition(DownloadStatus::Succeeded, 1, 3));
        assert!(DownloadStatus::InProgress.can_transition(DownloadStatus::Failed, 1, 3));
    }

    #[test]
    fn test_retry_respects_attempt_cap() {
        assert!(DownloadStatus::Failed.can_transition(DownloadStatus::InProgress, 2, 3));
        assert!(!DownloadStatus::Failed.can_transition(DownloadStatus::InProgress, 3, 3));
    }

    #[test]
    fn test_requeue_only_with_attempts_left() {
        assert!(DownloadStatus::Failed.can_transition(DownloadStatus::Pending, 1, 3));
        assert!(!DownloadStatus::Failed.can_transition(DownloadStatus::Pending, 3, 3));
    }

    #[test]
    fn test_rejected_transitions() {
        use DownloadStatus::*;
        let rejected = [
            (Pending, Succeeded),
            (Pending, Failed),
            (Pending, Pending),
            (InProgress, Pending),
            (InProgress, InProgress),
            (Succeeded, InProgress),
            (Succeeded, Failed),
            (Succeeded, Pending),
            (Failed, Succeeded),
            (Failed, Failed),
        ];
        for (from, to) in rejected {
            assert!(
                !from.can_transition(to, 0, 3),
                "{} -> {} should be rejected",
                from,
                to
            );
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!DownloadStatus::Pending.is_terminal());
        assert!(!DownloadStatus::InProgress.is_terminal());
        assert!(DownloadStatus::Succeeded.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
    }

    #[test]
    fn test_db_string_parse() {
        for status in DownloadStatus::all() {
            assert_eq!(
                DownloadStatus::from_db_string(status.to_db_string()),
                Some(status)
            );
        }
        assert_eq!(DownloadStatus::from_db_string("downloading"), None);
    }
}
