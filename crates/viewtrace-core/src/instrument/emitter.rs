/*!
# Metadata Emission

Turns the rewriter's records and the extracted fields into the static tables attached
to a view: the per-expression dependency table, the tracked-field list and the trigger
table used to drive one field at a time. Each table exists both as data
([`ViewMetadata`]) and as host member declarations.
*/

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::{Argument, Expr, Member, Property};
use crate::config::InstrumentConfig;

use super::dependencies::ReactiveField;
use super::rewriter::TrackedExpressionRecord;

/// Metadata for one tracked expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionMetadata {
    pub dependencies: Vec<String>,
    pub view_type: String,
    pub is_container: bool,
    pub file: String,
    pub line: u32,
}

/// One entry of the tracked-field list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedField {
    pub name: String,
    pub declared_type: String,
    pub source_annotation: String,
}

/// How the harness changes a field to simulate a state update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Increment,
    IncrementFloat,
    Toggle,
    Append(String),
    Unsupported,
}

impl Mutation {
    /// Mutation for a declared type, as written
    pub fn for_type(declared_type: &str) -> Self {
        match declared_type.trim() {
            "Int" => Mutation::Increment,
            "Double" | "Float" => Mutation::IncrementFloat,
            "Bool" => Mutation::Toggle,
            "String" => Mutation::Append("_modified".to_string()),
            _ => Mutation::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Mutation::Unsupported)
    }

    fn to_expr(&self) -> Expr {
        match self {
            Mutation::Increment => Expr::implicit_member("increment"),
            Mutation::IncrementFloat => Expr::implicit_member("increment_float"),
            Mutation::Toggle => Expr::implicit_member("toggle"),
            Mutation::Append(suffix) => Expr::call_expr(
                Expr::implicit_member("append"),
                vec![Argument::unlabeled(Expr::string(suffix.as_str()))],
            ),
            Mutation::Unsupported => Expr::implicit_member("unsupported"),
        }
    }
}

/// Setter dispatch entry: the field to drive and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEntry {
    pub field: String,
    pub declared_type: String,
    pub mutation: Mutation,
}

/// Everything emitted for one view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMetadata {
    pub view: String,
    /// Keyed by tracked-expression id, in visitation order
    pub expressions: IndexMap<String, ExpressionMetadata>,
    pub tracked_fields: Vec<TrackedField>,
    pub triggers: Vec<TriggerEntry>,
}

impl ViewMetadata {
    pub fn expression(&self, id: &str) -> Option<&ExpressionMetadata> {
        self.expressions.get(id)
    }

    /// Whether the expression `id` declares a dependency on `field`
    pub fn depends_on(&self, id: &str, field: &str) -> bool {
        self.expression(id)
            .is_some_and(|meta| meta.dependencies.iter().any(|dep| dep == field))
    }

    pub fn trigger(&self, field: &str) -> Option<&TriggerEntry> {
        self.triggers.iter().find(|trigger| trigger.field == field)
    }
}

pub struct MetadataEmitter<'a> {
    config: &'a InstrumentConfig,
}

impl<'a> MetadataEmitter<'a> {
    pub fn new(config: &'a InstrumentConfig) -> Self {
        Self { config }
    }

    pub fn emit(
        &self,
        view: &str,
        records: &[TrackedExpressionRecord],
        fields: &[ReactiveField],
    ) -> ViewMetadata {
        let expressions = records
            .iter()
            .map(|record| {
                let mut dependencies = record.dependencies.clone();
                dependencies.sort();
                dependencies.dedup();
                (
                    record.id.clone(),
                    ExpressionMetadata {
                        dependencies,
                        view_type: record.view_type.clone(),
                        is_container: record.is_container,
                        file: record.location.file.clone(),
                        line: record.location.line,
                    },
                )
            })
            .collect();

        let tracked_fields = fields
            .iter()
            .map(|field| TrackedField {
                name: field.name.clone(),
                declared_type: field.declared_type.clone(),
                source_annotation: field.annotation.clone(),
            })
            .collect();

        let triggers = fields
            .iter()
            .map(|field| TriggerEntry {
                field: field.name.clone(),
                declared_type: field.declared_type.clone(),
                mutation: Mutation::for_type(&field.declared_type),
            })
            .collect();

        ViewMetadata {
            view: view.to_string(),
            expressions,
            tracked_fields,
            triggers,
        }
    }

    /// Static member declarations carrying the tables, in splice order
    pub fn declarations(&self, metadata: &ViewMetadata) -> Vec<Member> {
        vec![
            self.metadata_declaration(metadata),
            self.dependencies_declaration(metadata),
            self.triggers_declaration(metadata),
        ]
    }

    fn metadata_declaration(&self, metadata: &ViewMetadata) -> Member {
        let entries = metadata
            .expressions
            .iter()
            .map(|(id, meta)| {
                let dependencies = Expr::array(
                    meta.dependencies
                        .iter()
                        .map(|dep| Expr::string(dep.as_str()))
                        .collect(),
                );
                let value = Expr::call(
                    "ExpressionMetadata",
                    vec![
                        Argument::labeled("dependencies", dependencies),
                        Argument::labeled("view_type", Expr::string(meta.view_type.as_str())),
                        Argument::labeled("is_container", Expr::bool(meta.is_container)),
                        Argument::labeled("file", Expr::string(meta.file.as_str())),
                        Argument::labeled("line", Expr::int(i64::from(meta.line))),
                    ],
                );
                (Expr::string(id.as_str()), value)
            })
            .collect();

        Property::new(self.config.metadata_member.as_str())
            .static_let()
            .typed("[String: ExpressionMetadata]")
            .initialized(Expr::dictionary(entries))
            .into_member()
    }

    fn dependencies_declaration(&self, metadata: &ViewMetadata) -> Member {
        let elements = metadata
            .tracked_fields
            .iter()
            .map(|field| {
                Expr::call(
                    "TrackedField",
                    vec![
                        Argument::labeled("name", Expr::string(field.name.as_str())),
                        Argument::labeled("declared_type", Expr::string(field.declared_type.as_str())),
                        Argument::labeled(
                            "source_annotation",
                            Expr::string(field.source_annotation.as_str()),
                        ),
                    ],
                )
            })
            .collect();

        Property::new(self.config.dependencies_member.as_str())
            .static_let()
            .typed("[TrackedField]")
            .initialized(Expr::array(elements))
            .into_member()
    }

    fn triggers_declaration(&self, metadata: &ViewMetadata) -> Member {
        let elements = metadata
            .triggers
            .iter()
            .map(|trigger| {
                Expr::call(
                    "DependencyTrigger",
                    vec![
                        Argument::labeled("field", Expr::string(trigger.field.as_str())),
                        Argument::labeled("declared_type", Expr::string(trigger.declared_type.as_str())),
                        Argument::labeled("mutation", trigger.mutation.to_expr()),
                    ],
                )
            })
            .collect();

        Property::new(self.config.triggers_member.as_str())
            .static_let()
            .typed("[DependencyTrigger]")
            .initialized(Expr::array(elements))
            .into_member()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ToSource;
    use crate::instrument::{ReactiveSource, SourceLocation};
    use pretty_assertions::assert_eq;

    fn record(id: &str, deps: &[&str], view_type: &str, line: u32) -> TrackedExpressionRecord {
        TrackedExpressionRecord {
            id: id.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            view_type: view_type.to_string(),
            is_container: view_type == "VStack",
            location: SourceLocation {
                file: "Counter.view".to_string(),
                line,
            },
        }
    }

    fn field(name: &str, ty: &str) -> ReactiveField {
        ReactiveField {
            name: name.to_string(),
            declared_type: ty.to_string(),
            source: ReactiveSource::State,
            annotation: "@State".to_string(),
        }
    }

    #[test]
    fn test_mutation_for_declared_types() {
        assert_eq!(Mutation::for_type("Int"), Mutation::Increment);
        assert_eq!(Mutation::for_type(" Bool"), Mutation::Toggle);
        assert_eq!(Mutation::for_type("String"), Mutation::Append("_modified".to_string()));
        assert_eq!(Mutation::for_type("Double"), Mutation::IncrementFloat);
        assert_eq!(Mutation::for_type("[Item]"), Mutation::Unsupported);
    }

    #[test]
    fn test_emit_keeps_visitation_order_and_sorts_dependencies() {
        let config = InstrumentConfig::default();
        let records = vec![
            record("Counter_Text_10", &["title", "count"], "Text", 9),
            record("Counter_VStack_2", &[], "VStack", 3),
        ];
        let metadata = MetadataEmitter::new(&config).emit("Counter", &records, &[field("count", "Int")]);

        let ids: Vec<&str> = metadata.expressions.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["Counter_Text_10", "Counter_VStack_2"]);
        assert_eq!(
            metadata.expression("Counter_Text_10").unwrap().dependencies,
            vec!["count".to_string(), "title".to_string()]
        );
        assert!(metadata.expression("Counter_VStack_2").unwrap().is_container);
        assert!(metadata.depends_on("Counter_Text_10", "count"));
        assert!(!metadata.depends_on("Counter_VStack_2", "count"));
        assert!(!metadata.depends_on("missing", "count"));
    }

    #[test]
    fn test_fields_and_triggers_follow_declaration_order() {
        let config = InstrumentConfig::default();
        let fields = vec![field("name", "String"), field("count", "Int"), field("items", "[Item]")];
        let metadata = MetadataEmitter::new(&config).emit("List", &[], &fields);

        let names: Vec<&str> = metadata.tracked_fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "count", "items"]);
        assert_eq!(metadata.trigger("count").unwrap().mutation, Mutation::Increment);
        assert!(!metadata.trigger("items").unwrap().mutation.is_supported());
        assert!(metadata.expressions.is_empty());
    }

    #[test]
    fn test_declarations_render_as_static_tables() {
        let config = InstrumentConfig::default();
        let metadata = MetadataEmitter::new(&config).emit(
            "Counter",
            &[record("Counter_Text_0", &["count"], "Text", 4)],
            &[field("count", "Int")],
        );
        let members = MetadataEmitter::new(&config).declarations(&metadata);
        assert_eq!(members.len(), 3);

        assert_eq!(
            members[0].to_source(),
            "static let performance_metadata: [String: ExpressionMetadata] = [\"Counter_Text_0\": \
             ExpressionMetadata(dependencies: [\"count\"], view_type: \"Text\", is_container: false, \
             file: \"Counter.view\", line: 4)]\n"
        );
        assert_eq!(
            members[1].to_source(),
            "static let tracked_dependencies: [TrackedField] = [TrackedField(name: \"count\", \
             declared_type: \"Int\", source_annotation: \"@State\")]\n"
        );
        assert_eq!(
            members[2].to_source(),
            "static let dependency_triggers: [DependencyTrigger] = [DependencyTrigger(field: \"count\", \
             declared_type: \"Int\", mutation: .increment)]\n"
        );
    }

    #[test]
    fn test_metadata_json_shape() {
        let config = InstrumentConfig::default();
        let metadata = MetadataEmitter::new(&config).emit(
            "Counter",
            &[record("Counter_Text_0", &["count"], "Text", 4)],
            &[field("flag", "Bool")],
        );
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["expressions"]["Counter_Text_0"]["line"], 4);
        assert_eq!(json["triggers"][0]["mutation"], "toggle");
        let back: ViewMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }
}
