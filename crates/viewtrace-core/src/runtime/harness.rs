/*!
# Over-Render Harness

Drives a live view one reactive field at a time and checks the recorder afterwards:
every tracked expression that recomputed must declare the mutated field among its
dependencies.
*/

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::instrument::ViewMetadata;

use super::host::HostError;
use super::recorder::{Recorder, Snapshot};
use super::state::{FieldValue, LiveHost, StateError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("Field '{0}' has a trigger but the view does not expose it")]
    MissingField(String),

    #[error("Trigger for '{field}' cannot mutate a {found} value")]
    MutationMismatch { field: String, found: &'static str },

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Recomputed although its dependencies do not include the mutated field
    OverRender,
    /// Recomputed under an id the metadata does not know
    UnknownId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub view_id: String,
    pub field: String,
    pub file: String,
    pub line: u32,
    pub count: u64,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::OverRender => write!(
                f,
                "view '{}' at {}:{} recomputed unnecessarily when '{}' changed",
                self.view_id, self.file, self.line, self.field
            ),
            ViolationKind::UnknownId => write!(
                f,
                "view '{}' at {}:{} recomputed when '{}' changed but has no metadata entry",
                self.view_id, self.file, self.line, self.field
            ),
        }
    }
}

/// Counts observed after one trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub field: String,
    pub before: FieldValue,
    pub after: FieldValue,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessReport {
    pub view: String,
    pub outcomes: Vec<TriggerOutcome>,
    pub violations: Vec<Violation>,
    /// Fields whose declared type has no mutation
    pub skipped: Vec<String>,
}

impl HarnessReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn outcome(&self, field: &str) -> Option<&TriggerOutcome> {
        self.outcomes.iter().find(|outcome| outcome.field == field)
    }
}

impl fmt::Display for HarnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} trigger(s), {} violation(s)",
            self.view,
            self.outcomes.len(),
            self.violations.len()
        )?;
        for violation in &self.violations {
            writeln!(f, "  {violation}")?;
        }
        for field in &self.skipped {
            writeln!(f, "  skipped '{field}': no mutation for its type")?;
        }
        Ok(())
    }
}

pub struct OverRenderHarness {
    config: HarnessConfig,
}

impl OverRenderHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run every trigger of `metadata` against `view`, in declaration order
    pub fn run<H: LiveHost>(
        &self,
        view: &mut H,
        metadata: &ViewMetadata,
        recorder: &Recorder,
    ) -> Result<HarnessReport, HarnessError> {
        let mut report = HarnessReport {
            view: metadata.view.clone(),
            ..HarnessReport::default()
        };

        for trigger in &metadata.triggers {
            if !trigger.mutation.is_supported() {
                warn!(
                    view = %metadata.view,
                    field = %trigger.field,
                    declared_type = %trigger.declared_type,
                    "no mutation for field type, skipping"
                );
                report.skipped.push(trigger.field.clone());
                continue;
            }

            recorder.reset();
            let before = view
                .field(&trigger.field)
                .ok_or_else(|| HarnessError::MissingField(trigger.field.clone()))?;
            let after = trigger.mutation.apply(&before).ok_or_else(|| {
                HarnessError::MutationMismatch {
                    field: trigger.field.clone(),
                    found: before.type_name(),
                }
            })?;
            view.set_field(&trigger.field, after.clone())?;
            view.settle(self.config.settle)?;
            let snapshot = recorder.snapshot();

            let found = check_snapshot(&snapshot, metadata, &trigger.field);
            debug!(
                view = %metadata.view,
                field = %trigger.field,
                recomputed = snapshot.len(),
                violations = found.len(),
                "trigger checked"
            );
            report.violations.extend(found);
            report.outcomes.push(TriggerOutcome {
                field: trigger.field.clone(),
                before,
                after,
                snapshot,
            });

            if self.config.stop_on_first_violation && !report.is_clean() {
                break;
            }
        }

        info!(
            view = %report.view,
            triggers = report.outcomes.len(),
            violations = report.violations.len(),
            skipped = report.skipped.len(),
            "over-render check finished"
        );
        Ok(report)
    }
}

impl Default for OverRenderHarness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}

/// Violations in one post-mutation snapshot
pub fn check_snapshot(snapshot: &Snapshot, metadata: &ViewMetadata, field: &str) -> Vec<Violation> {
    snapshot
        .iter()
        .filter(|(_, record)| record.count > 0)
        .filter_map(|(id, record)| {
            let kind = match metadata.expression(id) {
                None => ViolationKind::UnknownId,
                Some(meta) if !meta.dependencies.iter().any(|dep| dep == field) => {
                    ViolationKind::OverRender
                }
                Some(_) => return None,
            };
            Some(Violation {
                view_id: id.clone(),
                field: field.to_string(),
                file: record.file.clone(),
                line: record.line,
                count: record.count,
                kind,
            })
        })
        .collect()
}
