/*!
# View Instrumentation

The compile-time half of viewtrace. Given a view declaration it:

1. enumerates the reactive fields ([`dependencies`]),
2. rewrites every renderable statement of the body to report its evaluations
   ([`rewriter`], using [`analyzer`] per statement),
3. emits the metadata tables that tie tracked ids to the fields they read ([`emitter`]).

[`TrackPerformance`] packages the three steps as a declaration macro for the
[`ViewTracer`](crate::tracer::ViewTracer).

## Example

```rust,ignore
use viewtrace_core::instrument::instrument_view;
use viewtrace_core::config::InstrumentConfig;

let expansion = instrument_view(&decl, "Counter.view", &InstrumentConfig::default())?;
for (id, meta) in &expansion.metadata.expressions {
    println!("{id}: {:?}", meta.dependencies);
}
```
*/

pub mod analyzer;
pub mod dependencies;
pub mod emitter;
pub mod rewriter;

pub use analyzer::{ContainerKind, ExpressionAnalysis, ExpressionAnalyzer, UNKNOWN_VIEW_TYPE};
pub use dependencies::{extract_dependencies, ReactiveField, ReactiveSource};
pub use emitter::{
    ExpressionMetadata, MetadataEmitter, Mutation, TrackedField, TriggerEntry, ViewMetadata,
};
pub use rewriter::{BodyRewriter, RewrittenBody, SourceLocation, TrackedExpressionRecord};

use thiserror::Error;
use tracing::debug;

use crate::ast::{DeclKind, Member, Stmt, ViewDecl};
use crate::config::{ExpansionMode, InstrumentConfig};
use crate::tracer::{DeclarationMacro, TransformationContext};

/// Structural rejection of a declaration. Aborts that declaration only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("Macro can only be applied to structs conforming to {conformance}: '{name}'")]
    NotAView { name: String, conformance: String },

    #[error("View must have a {property} property: '{view}'")]
    NoBodyFound { view: String, property: String },
}

impl InstrumentError {
    pub fn not_a_view(name: impl Into<String>, conformance: impl Into<String>) -> Self {
        Self::NotAView {
            name: name.into(),
            conformance: conformance.into(),
        }
    }

    pub fn no_body_found(view: impl Into<String>, property: impl Into<String>) -> Self {
        Self::NoBodyFound {
            view: view.into(),
            property: property.into(),
        }
    }
}

/// Result of expanding one view declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub view: String,
    /// Static member declarations carrying the metadata tables
    pub members: Vec<Member>,
    pub metadata: ViewMetadata,
    /// The instrumented body, spliced only in [`ExpansionMode::ReplaceBody`]
    pub rewritten_body: Vec<Stmt>,
}

impl Expansion {
    /// Splice the expansion into the declaration it was computed from
    pub fn apply(&self, decl: &mut ViewDecl, mode: ExpansionMode, body_property: &str) {
        if mode == ExpansionMode::ReplaceBody {
            for member in &mut decl.members {
                if let Member::Property(property) = member {
                    if property.name == body_property && property.accessor.is_some() {
                        property.accessor = Some(self.rewritten_body.clone());
                    }
                }
            }
        }
        decl.members.extend(self.members.iter().cloned());
    }
}

/// Run the full pipeline on one declaration
pub fn instrument_view(
    decl: &ViewDecl,
    file: &str,
    config: &InstrumentConfig,
) -> Result<Expansion, InstrumentError> {
    let vocabulary = &config.vocabulary;

    if decl.kind != DeclKind::Struct || !decl.conforms_to(&vocabulary.view_conformance) {
        return Err(InstrumentError::not_a_view(&decl.name, &vocabulary.view_conformance));
    }

    let body = decl
        .property(&vocabulary.body_property)
        .and_then(|property| property.accessor.as_deref())
        .ok_or_else(|| InstrumentError::no_body_found(&decl.name, &vocabulary.body_property))?;
    debug!(view = %decl.name, statements = body.len(), "found render body");

    let fields = extract_dependencies(decl, vocabulary);
    let rewritten = BodyRewriter::new(&decl.name, file, &fields, config).rewrite(body);

    let emitter = MetadataEmitter::new(config);
    let metadata = emitter.emit(&decl.name, &rewritten.records, &fields);
    let members = emitter.declarations(&metadata);

    debug!(
        view = %decl.name,
        tracked = metadata.expressions.len(),
        fields = fields.len(),
        "instrumented view"
    );

    Ok(Expansion {
        view: decl.name.clone(),
        members,
        metadata,
        rewritten_body: rewritten.body,
    })
}

/// The `@TrackPerformance` declaration macro
#[derive(Debug, Clone, Default)]
pub struct TrackPerformance {
    config: InstrumentConfig,
}

impl TrackPerformance {
    pub fn new(config: InstrumentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }
}

impl DeclarationMacro for TrackPerformance {
    fn name(&self) -> &'static str {
        "TrackPerformance"
    }

    fn description(&self) -> &'static str {
        "Wraps each renderable body statement with a recomputation tracker and emits dependency metadata"
    }

    fn attribute(&self) -> &str {
        "TrackPerformance"
    }

    fn expand(
        &self,
        decl: &ViewDecl,
        context: &TransformationContext,
    ) -> Result<Expansion, InstrumentError> {
        let file = context
            .source_file
            .as_deref()
            .unwrap_or(&self.config.unknown_file);
        instrument_view(decl, file, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Attribute, Expr, IfStmt, Property, ToSource};

    fn counter() -> ViewDecl {
        ViewDecl::new("Counter", DeclKind::Struct)
            .with_attribute(Attribute::new("TrackPerformance"))
            .conforming_to("View")
            .with_member(
                Property::new("count")
                    .with_attribute(Attribute::new("State"))
                    .typed("Int")
                    .initialized(Expr::int(0))
                    .into_member(),
            )
            .with_member(
                Property::new("body")
                    .typed("some View")
                    .computed(vec![
                        Stmt::expr(Expr::call("Text", vec![]).at(4, 9)),
                        IfStmt::new(
                            Expr::ident("count"),
                            vec![Stmt::expr(Expr::call("Divider", vec![]).at(6, 13))],
                        )
                        .into_stmt(),
                    ])
                    .into_member(),
            )
    }

    #[test]
    fn test_rejects_non_struct_and_non_view() {
        let config = InstrumentConfig::default();
        let class = ViewDecl::new("Model", DeclKind::Class).conforming_to("View");
        assert_eq!(
            instrument_view(&class, "f", &config),
            Err(InstrumentError::not_a_view("Model", "View"))
        );

        let plain = ViewDecl::new("Plain", DeclKind::Struct).conforming_to("Equatable");
        assert!(matches!(
            instrument_view(&plain, "f", &config),
            Err(InstrumentError::NotAView { .. })
        ));
    }

    #[test]
    fn test_stored_body_is_not_a_body() {
        let decl = ViewDecl::new("Stored", DeclKind::Struct)
            .conforming_to("View")
            .with_member(Property::new("body").typed("Text").into_member());
        assert_eq!(
            instrument_view(&decl, "f", &InstrumentConfig::default()),
            Err(InstrumentError::no_body_found("Stored", "body"))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            InstrumentError::not_a_view("Model", "View").to_string(),
            "Macro can only be applied to structs conforming to View: 'Model'"
        );
        assert_eq!(
            InstrumentError::no_body_found("Stored", "body").to_string(),
            "View must have a body property: 'Stored'"
        );
    }

    #[test]
    fn test_ids_count_the_conditional_before_its_branches() {
        let expansion = instrument_view(&counter(), "Counter.view", &InstrumentConfig::default())
            .expect("counter is a view");
        let ids: Vec<&str> = expansion.metadata.expressions.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["Counter_Text_0", "Counter_Divider_2"]);
        assert_eq!(expansion.metadata.expression("Counter_Divider_2").unwrap().line, 6);
    }

    #[test]
    fn test_members_only_leaves_body_untouched() {
        let mut decl = counter();
        let original_body = decl.property("body").unwrap().accessor.clone();
        let expansion = instrument_view(&decl, "Counter.view", &InstrumentConfig::default()).unwrap();
        expansion.apply(&mut decl, ExpansionMode::MembersOnly, "body");

        assert_eq!(decl.property("body").unwrap().accessor, original_body);
        assert!(decl.property("performance_metadata").is_some());
        assert!(decl.property("tracked_dependencies").is_some());
        assert!(decl.property("dependency_triggers").is_some());
    }

    #[test]
    fn test_replace_body_splices_shim_calls() {
        let mut decl = counter();
        let expansion = instrument_view(&decl, "Counter.view", &InstrumentConfig::default()).unwrap();
        expansion.apply(&mut decl, ExpansionMode::ReplaceBody, "body");

        let body = decl.property("body").unwrap().accessor.as_ref().unwrap();
        assert_eq!(
            body[0].to_source(),
            "Text().track_recomputations(id: \"Counter_Text_0\", file: \"Counter.view\", line: 4)"
        );
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_macro_uses_context_file_or_unknown() {
        let track = TrackPerformance::default();
        let expansion = track.expand(&counter(), &TransformationContext::new()).unwrap();
        assert_eq!(
            expansion.metadata.expression("Counter_Text_0").unwrap().file,
            "<unknown>"
        );

        let context = TransformationContext::new().with_source_file("Views/Counter.json");
        let expansion = track.expand(&counter(), &context).unwrap();
        assert_eq!(
            expansion.metadata.expression("Counter_Text_0").unwrap().file,
            "Views/Counter.json"
        );
    }
}
