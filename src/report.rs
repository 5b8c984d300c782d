//! Outcome of a processing stage, dataset by dataset.

use std::fmt;

use log::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// What was being processed, e.g. a dataset directory or city.
    pub context: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub completed: usize,
    pub skipped: Vec<String>,
    pub failures: Vec<Failure>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    pub fn complete(&mut self) {
        self.completed += 1;
    }

    pub fn skip(&mut self, context: impl Into<String>, reason: &str) {
        let context = context.into();
        warn!("Skipping {}: {}", context, reason);
        self.skipped.push(context);
    }

    pub fn fail(&mut self, context: impl Into<String>, error: impl fmt::Display) {
        let failure = Failure {
            context: context.into(),
            error: format!("{:#}", error),
        };
        error!("{}: {}", failure.context, failure.error);
        self.failures.push(failure);
    }

    /// Counts `result` as completed or failed.
    pub fn record<T, E: fmt::Display>(&mut self, context: impl Into<String>, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => {
                self.complete();
                Some(value)
            }
            Err(e) => {
                self.fail(context, e);
                None
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn log_summary(&self) {
        info!("{}", self);
        for failure in &self.failures {
            error!("  failed: {} ({})", failure.context, failure.error);
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} skipped, {} failed",
            self.completed,
            self.skipped.len(),
            self.failures.len()
        )
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_count_outcomes() {
        let mut report = Report::new();

        assert_eq!(report.record("a", Ok::<_, String>(1)), Some(1));
        assert_eq!(report.record("b", Err::<i32, _>("cdo failed")), None);
        report.skip("c", "already downloaded");

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, vec!["c".to_string()]);
        assert!(report.has_failures());
        assert_eq!(report.failures[0].context, "b");
        assert_eq!(report.failures[0].error, "cdo failed");
        assert_eq!(report.to_string(), "1 completed, 1 skipped, 1 failed");
    }
}
