use std::fmt;

use serde::Serialize;

/// Counts printed at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Identities accepted during this run.
    pub new: usize,
    /// Size of the processed set after the run.
    pub total: usize,
    /// Candidates or backlog items skipped as already handled.
    pub duplicate: usize,
    /// Tasks or items that failed.
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={} total={} duplicate={} failed={}",
            self.new, self.total, self.duplicate, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_counter() {
        let summary = RunSummary {
            new: 3,
            total: 10,
            duplicate: 2,
            failed: 1,
        };
        assert_eq!(summary.to_string(), "new=3 total=10 duplicate=2 failed=1");
    }
}
