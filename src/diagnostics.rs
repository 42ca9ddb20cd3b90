// ABOUTME: Diagnostics accumulator for non-fatal findings during a plan run.
// ABOUTME: Collects warnings that shouldn't fail a plan but should be shown to users.

use serde::Serialize;

use crate::types::StackName;

/// Collects non-fatal warnings during a plan run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a plan run.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Stacks left unstarted because the run was cancelled.
    pub fn cancelled(unstarted: &[StackName]) -> Self {
        let names: Vec<&str> = unstarted.iter().map(StackName::as_str).collect();
        Self {
            kind: WarningKind::Cancelled,
            message: format!(
                "plan cancelled, {} stack(s) not started: {}",
                names.len(),
                names.join(", ")
            ),
        }
    }

    /// A drift check that produced no result for a stack.
    pub fn drift_not_checked(stack: &StackName, reason: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::DriftNotChecked,
            message: format!("drift not checked for {stack}: {}", reason.into()),
        }
    }
}

/// Categories of warnings that can occur during a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The run stopped before every stack started.
    Cancelled,
    /// A drift run left a stack without a drift result.
    DriftNotChecked,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> StackName {
        StackName::new(s).unwrap()
    }

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::cancelled(&[name("app"), name("dns")]));
        diag.warn(Warning::drift_not_checked(&name("vpc"), "stack does not exist"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(
            diag.warnings()[0].message,
            "plan cancelled, 2 stack(s) not started: app, dns"
        );
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        let cancelled = Warning::cancelled(&[]);
        assert_eq!(cancelled.kind, WarningKind::Cancelled);

        let drift = Warning::drift_not_checked(&name("vpc"), "no detection yet");
        assert_eq!(drift.kind, WarningKind::DriftNotChecked);
    }
}
