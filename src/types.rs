use std::fmt;

/// Which way a dialog transition runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionDirection {
    Show,
    Hide,
}

impl fmt::Display for TransitionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionDirection::Show => f.write_str("show"),
            TransitionDirection::Hide => f.write_str("hide"),
        }
    }
}

/// Outcome of a job's process, as reported to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(String),
}
