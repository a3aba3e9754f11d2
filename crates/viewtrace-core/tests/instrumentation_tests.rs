//! Integration tests for the instrumentation passes and the declaration tracers

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use viewtrace_core::ast::{
    Argument, Attribute, DeclKind, Expr, IfStmt, Property, SourceFile, Stmt, StringPart, ToSource,
    ViewDecl,
};
use viewtrace_core::config::{ExpansionMode, InstrumentConfig};
use viewtrace_core::instrument::{instrument_view, Mutation, ViewMetadata};
use viewtrace_core::tracer::file_tracer::metadata_path_for;
use viewtrace_core::tracer::{FileTracer, ViewTracer};

fn state(name: &str, ty: &str, initial: Expr) -> Property {
    Property::new(name)
        .with_attribute(Attribute::new("State"))
        .typed(ty)
        .initialized(initial)
}

fn view(name: &str, fields: Vec<Property>, body: Vec<Stmt>) -> ViewDecl {
    let mut decl = ViewDecl::new(name, DeclKind::Struct)
        .with_attribute(Attribute::new("TrackPerformance"))
        .conforming_to("View");
    for field in fields {
        decl = decl.with_member(field.into_member());
    }
    decl.with_member(Property::new("body").typed("some View").computed(body).into_member())
}

fn text(value: Expr) -> Expr {
    Expr::call("Text", vec![Argument::unlabeled(value)])
}

fn profile() -> ViewDecl {
    view(
        "Profile",
        vec![
            state("name", "String", Expr::string("Ada")),
            state("score", "Double", Expr::float(1.5)),
            state("isEditing", "Bool", Expr::bool(false)),
            state("joined", "Date", Expr::call("Date", vec![])),
        ],
        vec![
            Stmt::expr(text(Expr::ident("name")).at(10, 9)),
            IfStmt::new(
                Expr::ident("isEditing"),
                vec![Stmt::expr(
                    Expr::call("TextField", vec![Argument::unlabeled(Expr::string("Name"))]).at(12, 13),
                )],
            )
            .otherwise(vec![Stmt::expr(
                text(Expr::interpolated(vec![
                    StringPart::text("Score: "),
                    StringPart::expr(Expr::ident("score")),
                ]))
                .at(14, 13),
            )])
            .into_stmt(),
            Stmt::expr(Expr::call("Spacer", vec![]).at(16, 9)),
        ],
    )
}

#[test]
fn test_profile_metadata_tables() {
    let expansion = instrument_view(&profile(), "Profile.view", &InstrumentConfig::default()).unwrap();
    let metadata = &expansion.metadata;

    let ids: Vec<&str> = metadata.expressions.keys().map(String::as_str).collect();
    assert_eq!(
        ids,
        vec!["Profile_Text_0", "Profile_TextField_2", "Profile_Text_3", "Profile_Spacer_4"]
    );
    assert_eq!(metadata.expression("Profile_Text_0").unwrap().dependencies, vec!["name"]);
    assert!(metadata.expression("Profile_TextField_2").unwrap().dependencies.is_empty());
    assert!(metadata.depends_on("Profile_Text_3", "score"));
    assert!(!metadata.depends_on("Profile_Text_3", "isEditing"));

    let fields: Vec<&str> = metadata.tracked_fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["name", "score", "isEditing", "joined"]);

    assert_eq!(metadata.trigger("name").unwrap().mutation, Mutation::Append("_modified".to_string()));
    assert_eq!(metadata.trigger("score").unwrap().mutation, Mutation::IncrementFloat);
    assert_eq!(metadata.trigger("isEditing").unwrap().mutation, Mutation::Toggle);
    assert_eq!(metadata.trigger("joined").unwrap().mutation, Mutation::Unsupported);
}

#[test]
fn test_zero_fields_preserves_shape_and_empties_tables() {
    let decl = view(
        "Banner",
        vec![],
        vec![
            Stmt::expr(text(Expr::string("Welcome"))),
            IfStmt::new(Expr::bool(true), vec![Stmt::expr(Expr::call("Divider", vec![]))]).into_stmt(),
        ],
    );
    let mut expanded = decl.clone();
    let expansion = instrument_view(&decl, "Banner.view", &InstrumentConfig::default()).unwrap();
    expansion.apply(&mut expanded, ExpansionMode::ReplaceBody, "body");

    assert!(expansion.metadata.tracked_fields.is_empty());
    assert!(expansion.metadata.triggers.is_empty());
    assert!(expansion
        .metadata
        .expressions
        .values()
        .all(|meta| meta.dependencies.is_empty()));

    let body = expanded.property("body").unwrap().accessor.as_ref().unwrap();
    assert_eq!(body.len(), 2);
    assert!(matches!(body[1], Stmt::If(_)));
}

#[test]
fn test_two_stacks_differ_only_in_suffix() {
    let decl = view(
        "Screen",
        vec![state("count", "Int", Expr::int(0))],
        vec![
            Stmt::expr(Expr::call("VStack", vec![]).with_trailing(None, vec![Stmt::expr(text(Expr::string("a")))])),
            Stmt::expr(
                Expr::call("VStack", vec![Argument::labeled("spacing", Expr::int(8))])
                    .with_trailing(None, vec![Stmt::expr(text(Expr::ident("count")))]),
            ),
        ],
    );
    let expansion = instrument_view(&decl, "Screen.view", &InstrumentConfig::default()).unwrap();
    let ids: Vec<&str> = expansion.metadata.expressions.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["Screen_VStack_0", "Screen_VStack_1"]);
    assert!(expansion.metadata.depends_on("Screen_VStack_1", "count"));
}

#[test]
fn test_empty_stack_is_a_container_but_filled_stack_is_named_after_its_content() {
    let decl = view(
        "Layout",
        vec![],
        vec![
            Stmt::expr(Expr::call("HStack", vec![]).with_trailing(None, vec![])),
            Stmt::expr(Expr::call("HStack", vec![]).with_trailing(None, vec![Stmt::expr(text(Expr::string("x")))])),
        ],
    );
    let expansion = instrument_view(&decl, "Layout.view", &InstrumentConfig::default()).unwrap();
    let empty = expansion.metadata.expression("Layout_HStack_0").unwrap();
    let filled = expansion.metadata.expression("Layout_HStack_1").unwrap();
    assert_eq!((empty.view_type.as_str(), empty.is_container), ("HStack", true));
    assert_eq!((filled.view_type.as_str(), filled.is_container), ("Text", false));
}

#[test]
fn test_expansion_is_deterministic() {
    let config = InstrumentConfig::default().with_mode(ExpansionMode::ReplaceBody);
    let first = instrument_view(&profile(), "Profile.view", &config).unwrap();
    let second = instrument_view(&profile(), "Profile.view", &config).unwrap();
    assert_eq!(first, second);

    let mut a = profile();
    let mut b = profile();
    first.apply(&mut a, config.mode, "body");
    second.apply(&mut b, config.mode, "body");
    assert_eq!(a.to_source(), b.to_source());
}

#[test]
fn test_tracer_reports_rejections_and_continues() {
    let class = ViewDecl::new("Store", DeclKind::Class)
        .with_attribute(Attribute::new("TrackPerformance"))
        .conforming_to("View")
        .at(3, 1);
    let stored_body = ViewDecl::new("Stored", DeclKind::Struct)
        .with_attribute(Attribute::new("TrackPerformance"))
        .conforming_to("View")
        .with_member(Property::new("body").typed("Text").into_member())
        .at(8, 1);
    let untouched = ViewDecl::new("Plain", DeclKind::Struct).conforming_to("View");
    let mut file = SourceFile::new("Mixed.view")
        .with_declaration(class)
        .with_declaration(stored_body)
        .with_declaration(profile())
        .with_declaration(untouched.clone());

    let mut tracer = ViewTracer::for_config(InstrumentConfig::default());
    let summary = tracer.expand_file(&mut file);

    assert_eq!(summary.declarations_seen, 4);
    assert_eq!(summary.declarations_expanded, 1);
    assert!(!summary.success());

    let messages: Vec<String> = summary.diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(
        messages,
        vec![
            "Mixed.view:3:1: error: @TrackPerformance: Macro can only be applied to structs conforming to View: 'Store'",
            "Mixed.view:8:1: error: @TrackPerformance: View must have a body property: 'Stored'",
        ]
    );

    assert!(file.declarations[2].property("performance_metadata").is_some());
    assert_eq!(file.declarations[3], untouched);

    let stats = &tracer.stats()["TrackPerformance"];
    assert_eq!((stats.applications, stats.expansions, stats.errors), (3, 1, 2));
}

#[test]
fn test_file_tracer_mirrors_directory_tree() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("src");
    let output = temp.path().join("out");
    fs::create_dir_all(input.join("screens"))?;

    let profile_file = SourceFile::new("screens/Profile.view").with_declaration(profile());
    fs::write(input.join("screens/Profile.json"), serde_json::to_string(&profile_file)?)?;
    fs::write(input.join("Broken.json"), "{ not json")?;
    fs::write(input.join("notes.txt"), "ignored")?;

    let mut tracer = FileTracer::new(ViewTracer::for_config(
        InstrumentConfig::default().with_mode(ExpansionMode::ReplaceBody),
    ));
    let summary = tracer.transform_path(&input, &output)?;

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_written, 1);
    assert_eq!(summary.declarations_expanded, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("Broken.json"));

    let written = output.join("screens/Profile.view");
    let source = fs::read_to_string(&written)?;
    assert!(source.contains(
        "track_recomputations(id: \"Profile_Spacer_4\", file: \"screens/Profile.view\", line: 16)"
    ));

    let metadata: ViewMetadata = serde_json::from_str(&fs::read_to_string(metadata_path_for(&written))?)?;
    assert_eq!(metadata, summary.metadata[0]);

    // A second run over the same tree ignores emitted metadata files
    let rerun = tracer.transform_path(&output, temp.path().join("again"))?;
    assert_eq!(rerun.files_processed, 0);
    Ok(())
}
