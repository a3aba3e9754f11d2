//! Configuration for the instrumentation passes, the reference host and the harness.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::instrument::{ContainerKind, ReactiveSource};

/// Which member declarations an expansion splices into the view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    /// Only the metadata tables are added; the body is left as written
    #[default]
    MembersOnly,
    /// The body is replaced by its instrumented rewrite, and the tables are added
    ReplaceBody,
}

/// How the reference host decides which tracked statements to re-evaluate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationStrategy {
    /// Only statements whose last evaluation read a changed field
    #[default]
    FineGrained,
    /// Every mounted statement, on any change
    WholeBody,
}

/// Host dialect: the names the host language uses for the constructs the passes look for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub view_conformance: String,
    pub body_property: String,
    pub containers: IndexMap<String, ContainerKind>,
    pub reactive_attributes: IndexMap<String, ReactiveSource>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let containers = [
            ("VStack", ContainerKind::VerticalStack),
            ("HStack", ContainerKind::HorizontalStack),
            ("ZStack", ContainerKind::DepthStack),
            ("LazyVStack", ContainerKind::LazyVerticalStack),
            ("LazyHStack", ContainerKind::LazyHorizontalStack),
            ("List", ContainerKind::List),
            ("ForEach", ContainerKind::ForEach),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        let reactive_attributes = [
            ("State", ReactiveSource::State),
            ("Binding", ReactiveSource::Binding),
            ("ObservedObject", ReactiveSource::ObservedObject),
            ("Environment", ReactiveSource::Environment),
            ("EnvironmentObject", ReactiveSource::Environment),
        ]
        .into_iter()
        .map(|(name, source)| (name.to_string(), source))
        .collect();

        Self {
            view_conformance: "View".to_string(),
            body_property: "body".to_string(),
            containers,
            reactive_attributes,
        }
    }
}

impl Vocabulary {
    pub fn container_kind(&self, constructor: &str) -> Option<ContainerKind> {
        self.containers.get(constructor).copied()
    }

    pub fn reactive_source(&self, attribute: &str) -> Option<ReactiveSource> {
        self.reactive_attributes.get(attribute).copied()
    }
}

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub mode: ExpansionMode,
    /// Method name of the tracking shim call appended to each statement
    pub shim_method: String,
    pub metadata_member: String,
    pub dependencies_member: String,
    pub triggers_member: String,
    /// File name recorded when the context carries no source file
    pub unknown_file: String,
    pub vocabulary: Vocabulary,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            mode: ExpansionMode::MembersOnly,
            shim_method: "track_recomputations".to_string(),
            metadata_member: "performance_metadata".to_string(),
            dependencies_member: "tracked_dependencies".to_string(),
            triggers_member: "dependency_triggers".to_string(),
            unknown_file: "<unknown>".to_string(),
            vocabulary: Vocabulary::default(),
        }
    }
}

impl InstrumentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ExpansionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }
}

/// Reference render host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub strategy: InvalidationStrategy,
    /// Method name the host treats as the tracking shim
    pub shim_method: String,
    pub body_property: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            strategy: InvalidationStrategy::FineGrained,
            shim_method: "track_recomputations".to_string(),
            body_property: "body".to_string(),
        }
    }
}

impl HostConfig {
    pub fn with_strategy(mut self, strategy: InvalidationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Host settings matching the names an instrumentation pass emitted
    pub fn for_instrumentation(config: &InstrumentConfig) -> Self {
        Self {
            shim_method: config.shim_method.clone(),
            body_property: config.vocabulary.body_property.clone(),
            ..Self::default()
        }
    }
}

/// Over-render harness configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Fixed wait after each mutation before the snapshot is read
    pub settle: Duration,
    pub stop_on_first_violation: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(10),
            stop_on_first_violation: false,
        }
    }
}

impl HarnessConfig {
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}
