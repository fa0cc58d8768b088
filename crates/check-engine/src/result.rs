//! Check result value object
//!
//! A `CheckResult` is built once per run and never changes afterwards. The
//! cache hands out shared `Arc<CheckResult>` values; a new run replaces the
//! cached value instead of mutating it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a check run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The check passed (or its fix succeeded)
    Success,
    /// The check completed and reported problems
    Failure,
    /// The check could not be executed at all
    Null,
}

/// Result of running a check in query or fix mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    outcome: Outcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    failed_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fixed_items: Vec<String>,
    #[serde(default)]
    summary: String,
}

impl CheckResult {
    /// A passing result without items
    pub fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            failed_items: Vec::new(),
            fixed_items: Vec::new(),
            summary: String::new(),
        }
    }

    /// A failing result listing the offending items
    pub fn failed<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome: Outcome::Failure,
            failed_items: items.into_iter().map(Into::into).collect(),
            fixed_items: Vec::new(),
            summary: String::new(),
        }
    }

    /// A successful fix listing the items that were corrected
    pub fn fixed<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome: Outcome::Success,
            failed_items: Vec::new(),
            fixed_items: items.into_iter().map(Into::into).collect(),
            summary: String::new(),
        }
    }

    /// A fix that corrected some items but could not correct others
    pub fn partially_fixed<F, U, S, T>(fixed: F, still_failing: U) -> Self
    where
        F: IntoIterator<Item = S>,
        U: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            outcome: Outcome::Failure,
            failed_items: still_failing.into_iter().map(Into::into).collect(),
            fixed_items: fixed.into_iter().map(Into::into).collect(),
            summary: String::new(),
        }
    }

    /// Result of a check that crashed while executing
    ///
    /// Null results never carry items.
    pub fn null(summary: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Null,
            failed_items: Vec::new(),
            fixed_items: Vec::new(),
            summary: summary.into(),
        }
    }

    /// Attach a free-text summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_successful(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_null(&self) -> bool {
        self.outcome == Outcome::Null
    }

    pub fn failed_items(&self) -> &[String] {
        &self.failed_items
    }

    pub fn fixed_items(&self) -> &[String] {
        &self.fixed_items
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::Success if self.fixed_items.is_empty() => f.write_str("OK")?,
            Outcome::Success => write!(f, "OK ({} fixed)", self.fixed_items.len())?,
            Outcome::Failure => write!(f, "FAILED ({} failed)", self.failed_items.len())?,
            Outcome::Null => f.write_str("ERROR")?,
        }
        if !self.summary.is_empty() {
            write!(f, ": {}", self.summary)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_success_are_exclusive() {
        let null = CheckResult::null("exploded");
        assert!(null.is_null());
        assert!(!null.is_successful());
        assert!(null.failed_items().is_empty());
        assert!(null.fixed_items().is_empty());

        let ok = CheckResult::success();
        assert!(ok.is_successful());
        assert!(!ok.is_null());
    }

    #[test]
    fn test_failed_keeps_item_order() {
        let result = CheckResult::failed(["nodeB", "nodeA", "nodeC"]);
        assert!(!result.is_successful());
        assert_eq!(result.failed_items(), ["nodeB", "nodeA", "nodeC"]);
    }

    #[test]
    fn test_partial_fix_is_a_failure() {
        let result = CheckResult::partially_fixed(["a"], ["b"]);
        assert!(!result.is_successful());
        assert_eq!(result.fixed_items(), ["a"]);
        assert_eq!(result.failed_items(), ["b"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(CheckResult::success().to_string(), "OK");
        assert_eq!(CheckResult::fixed(["x"]).to_string(), "OK (1 fixed)");
        assert_eq!(
            CheckResult::failed(["x", "y"]).with_summary("bad names").to_string(),
            "FAILED (2 failed): bad names"
        );
        assert_eq!(CheckResult::null("boom").to_string(), "ERROR: boom");
    }

    #[test]
    fn test_serialization_skips_empty_lists() {
        let json = serde_json::to_value(CheckResult::failed(["n1"])).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["failedItems"][0], "n1");
        assert!(json.get("fixedItems").is_none());

        let back: CheckResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, CheckResult::failed(["n1"]));
    }
}
