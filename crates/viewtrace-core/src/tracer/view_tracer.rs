/*!
# ViewTracer - In-Memory Expansion Engine

Expands every macro-decorated declaration of a source file and splices the generated
members back in. A declaration that fails to expand is left untouched and reported as
a [`Diagnostic`]; the remaining declarations are still processed.
*/

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ast::{SourceFile, Span};
use crate::config::{ExpansionMode, InstrumentConfig};
use crate::instrument::{InstrumentError, TrackPerformance, ViewMetadata};

use super::rules::{DeclarationMacro, MacroStats};
use super::TransformationContext;

/// A located expansion failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub declaration: String,
    pub line: u32,
    pub column: u32,
    pub macro_name: String,
    pub message: String,
}

impl Diagnostic {
    fn from_error(
        error: &InstrumentError,
        file: &str,
        declaration: &str,
        span: Span,
        macro_name: &str,
    ) -> Self {
        Self {
            file: file.to_string(),
            declaration: declaration.to_string(),
            line: span.line,
            column: span.column,
            macro_name: macro_name.to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: error: @{}: {}",
            self.file, self.line, self.column, self.macro_name, self.message
        )
    }
}

/// Summary of one expansion run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExpansionSummary {
    pub declarations_seen: u64,
    pub declarations_expanded: u64,
    pub metadata: Vec<ViewMetadata>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExpansionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: ExpansionSummary) {
        self.declarations_seen += other.declarations_seen;
        self.declarations_expanded += other.declarations_expanded;
        self.metadata.extend(other.metadata);
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Declaration expansion engine
pub struct ViewTracer {
    macros: Vec<Box<dyn DeclarationMacro>>,
    stats: HashMap<String, MacroStats>,
    mode: ExpansionMode,
    body_property: String,
    dry_run: bool,
}

impl ViewTracer {
    pub fn new() -> Self {
        Self {
            macros: Vec::new(),
            stats: HashMap::new(),
            mode: ExpansionMode::MembersOnly,
            body_property: "body".to_string(),
            dry_run: false,
        }
    }

    /// A tracer with `@TrackPerformance` registered and the splice mode taken from `config`
    pub fn for_config(config: InstrumentConfig) -> Self {
        let mut tracer = Self::new()
            .mode(config.mode)
            .body_property(config.vocabulary.body_property.clone());
        tracer.add_macro(Box::new(TrackPerformance::new(config)));
        tracer
    }

    /// Enable dry-run mode (expansions are computed but not spliced)
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn mode(mut self, mode: ExpansionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn body_property(mut self, name: impl Into<String>) -> Self {
        self.body_property = name.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Register a macro; macros run in priority order, higher first
    pub fn add_macro(&mut self, declaration_macro: Box<dyn DeclarationMacro>) {
        let name = declaration_macro.name().to_string();
        self.stats.insert(name.clone(), MacroStats::new(name));
        self.macros.push(declaration_macro);
        self.macros
            .sort_by_key(|registered| std::cmp::Reverse(registered.priority()));
    }

    /// Expand every decorated declaration of `file` in place
    pub fn expand_file(&mut self, file: &mut SourceFile) -> ExpansionSummary {
        let mut summary = ExpansionSummary::new();
        let file_name = file.path.clone();

        for decl in &mut file.declarations {
            summary.declarations_seen += 1;
            let context = TransformationContext::new()
                .with_source_file(file_name.as_str())
                .with_declaration(decl.name.as_str());

            for declaration_macro in &self.macros {
                if !declaration_macro.matches(decl) {
                    continue;
                }
                let start_time = Instant::now();
                let result = declaration_macro.expand(decl, &context);

                let stats = self
                    .stats
                    .entry(declaration_macro.name().to_string())
                    .or_insert_with(|| MacroStats::new(declaration_macro.name()));
                stats.applications += 1;
                stats.total_time_us += start_time.elapsed().as_micros() as u64;

                match result {
                    Ok(expansion) => {
                        stats.expansions += 1;
                        if !self.dry_run {
                            expansion.apply(decl, self.mode, &self.body_property);
                        }
                        debug!(
                            view = %decl.name,
                            members = expansion.members.len(),
                            dry_run = self.dry_run,
                            "expanded declaration"
                        );
                        summary.declarations_expanded += 1;
                        summary.metadata.push(expansion.metadata);
                    }
                    Err(error) => {
                        stats.errors += 1;
                        let diagnostic = Diagnostic::from_error(
                            &error,
                            &file_name,
                            &decl.name,
                            decl.span,
                            declaration_macro.attribute(),
                        );
                        warn!("{diagnostic}");
                        summary.diagnostics.push(diagnostic);
                    }
                }
            }
        }

        info!(
            file = %file_name,
            seen = summary.declarations_seen,
            expanded = summary.declarations_expanded,
            diagnostics = summary.diagnostics.len(),
            "expansion finished"
        );
        summary
    }

    /// Get expansion statistics
    pub fn stats(&self) -> &HashMap<String, MacroStats> {
        &self.stats
    }

    /// Clear statistics
    pub fn clear_stats(&mut self) {
        for stats in self.stats.values_mut() {
            *stats = MacroStats::new(stats.macro_name.clone());
        }
    }
}

impl Default for ViewTracer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Attribute, DeclKind, Expr, Property, Stmt, ViewDecl};
    use crate::instrument::Expansion;

    struct Marker {
        priority: u32,
    }

    impl DeclarationMacro for Marker {
        fn name(&self) -> &'static str {
            "Marker"
        }

        fn description(&self) -> &'static str {
            "Adds nothing"
        }

        fn attribute(&self) -> &str {
            "Marker"
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn expand(
            &self,
            decl: &ViewDecl,
            _context: &TransformationContext,
        ) -> Result<Expansion, InstrumentError> {
            Ok(Expansion {
                view: decl.name.clone(),
                members: Vec::new(),
                metadata: ViewMetadata {
                    view: decl.name.clone(),
                    expressions: Default::default(),
                    tracked_fields: Vec::new(),
                    triggers: Vec::new(),
                },
                rewritten_body: Vec::new(),
            })
        }
    }

    fn tracked_view(name: &str) -> ViewDecl {
        ViewDecl::new(name, DeclKind::Struct)
            .with_attribute(Attribute::new("TrackPerformance"))
            .conforming_to("View")
            .with_member(
                Property::new("body")
                    .typed("some View")
                    .computed(vec![Stmt::expr(Expr::call("Text", vec![]))])
                    .into_member(),
            )
    }

    #[test]
    fn test_undecorated_declarations_are_skipped() {
        let mut file = SourceFile::new("Views.json")
            .with_declaration(ViewDecl::new("Plain", DeclKind::Struct).conforming_to("View"));
        let mut tracer = ViewTracer::for_config(InstrumentConfig::default());
        let summary = tracer.expand_file(&mut file);
        assert_eq!(summary.declarations_seen, 1);
        assert_eq!(summary.declarations_expanded, 0);
        assert_eq!(tracer.stats()["TrackPerformance"].applications, 0);
    }

    #[test]
    fn test_dry_run_computes_without_splicing() {
        let mut file = SourceFile::new("Views.json").with_declaration(tracked_view("A"));
        let before = file.clone();
        let mut tracer = ViewTracer::for_config(InstrumentConfig::default()).dry_run(true);
        let summary = tracer.expand_file(&mut file);
        assert_eq!(summary.declarations_expanded, 1);
        assert_eq!(summary.metadata[0].expressions.len(), 1);
        assert_eq!(file, before);
    }

    #[test]
    fn test_macros_sorted_by_priority() {
        let mut tracer = ViewTracer::new();
        tracer.add_macro(Box::new(Marker { priority: 10 }));
        tracer.add_macro(Box::new(TrackPerformance::default()));
        assert_eq!(tracer.macros[0].name(), "TrackPerformance");
        assert_eq!(tracer.macros[1].name(), "Marker");
    }

    #[test]
    fn test_clear_stats_keeps_names() {
        let mut file = SourceFile::new("Views.json").with_declaration(tracked_view("A"));
        let mut tracer = ViewTracer::for_config(InstrumentConfig::default());
        tracer.expand_file(&mut file);
        assert_eq!(tracer.stats()["TrackPerformance"].expansions, 1);
        tracer.clear_stats();
        assert_eq!(tracer.stats()["TrackPerformance"], MacroStats::new("TrackPerformance"));
    }

    #[test]
    fn test_diagnostic_display_is_located() {
        let diagnostic = Diagnostic::from_error(
            &InstrumentError::no_body_found("Broken", "body"),
            "Views.json",
            "Broken",
            Span::new(12, 1),
            "TrackPerformance",
        );
        assert_eq!(
            diagnostic.to_string(),
            "Views.json:12:1: error: @TrackPerformance: View must have a body property: 'Broken'"
        );
    }
}
