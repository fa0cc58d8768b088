//! Per-check row model

use check_engine::{CheckHandle, CheckProcess, CheckResult};
use serde::Serialize;

/// Status indicator of a row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    #[default]
    NotRun,
    Success,
    Failed,
    Error,
}

impl StatusIcon {
    pub fn from_result(result: &CheckResult) -> Self {
        if result.is_successful() {
            StatusIcon::Success
        } else if result.is_null() {
            StatusIcon::Error
        } else {
            StatusIcon::Failed
        }
    }
}

/// One displayed check: name text, status icon, select button and an
/// optional fix button
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRow {
    pub check: CheckHandle,
    /// Check name
    pub name: String,
    pub annotation: String,
    /// Text currently shown; differs from `name` while running or after an error
    pub text: String,
    /// Result summary shown as the text's tooltip
    pub tooltip: String,
    pub icon: StatusIcon,
    pub has_fix_button: bool,
}

impl CheckRow {
    pub(crate) fn new(check: CheckHandle, process: &CheckProcess) -> Self {
        Self {
            check,
            name: process.label().to_string(),
            annotation: process.annotation().to_string(),
            text: process.label().to_string(),
            tooltip: process.annotation().to_string(),
            icon: StatusIcon::NotRun,
            has_fix_button: process.implements_fix(),
        }
    }

    pub(crate) fn pre_check(&mut self) {
        self.text = "Running ...".to_string();
    }

    pub(crate) fn post_check(&mut self, result: &CheckResult) {
        self.text = self.name.clone();
        self.set_result(result);
    }

    pub(crate) fn check_error(&mut self) {
        self.text = format!("{} ( ERROR )", self.name);
        self.icon = StatusIcon::Error;
    }

    pub(crate) fn set_result(&mut self, result: &CheckResult) {
        self.tooltip = result.to_string();
        self.icon = StatusIcon::from_result(result);
    }

    /// Back to the not-run state, keeping the label
    pub(crate) fn reset(&mut self) {
        self.text = self.name.clone();
        self.tooltip = self.annotation.clone();
        self.icon = StatusIcon::NotRun;
    }
}
