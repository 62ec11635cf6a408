use std::fmt;

/// Lifecycle of one crawl run
///
/// `Idle -> Running -> {Draining, Cancelled} -> Terminated`. A draining run
/// may still be cancelled while it waits for in-flight downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    Running,
    Draining,
    Cancelled,
    Terminated,
}

impl RunPhase {
    pub fn can_transition(&self, to: RunPhase) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Cancelled)
                | (Self::Draining, Self::Cancelled)
                | (Self::Draining, Self::Terminated)
                | (Self::Cancelled, Self::Terminated)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Cancelled => "cancelled",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
