/*!
# Body Rewriting

Rewrites a view's render body so that every renderable statement, at top level and in
every conditional branch, reports its evaluations through the tracking shim.
*/

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Argument, ElseBranch, Expr, IfStmt, NodeRef, Stmt, ToSource};
use crate::config::InstrumentConfig;

use super::analyzer::ExpressionAnalyzer;
use super::dependencies::ReactiveField;

/// Where a tracked statement was declared, before rewriting
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// One renderable statement found during a rewrite pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedExpressionRecord {
    pub id: String,
    /// Referenced reactive fields, sorted
    pub dependencies: Vec<String>,
    pub view_type: String,
    pub is_container: bool,
    pub location: SourceLocation,
}

/// Output of a rewrite pass
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenBody {
    pub body: Vec<Stmt>,
    /// Records in depth-first visitation order
    pub records: Vec<TrackedExpressionRecord>,
}

/// Single-use rewriter for one view body
pub struct BodyRewriter<'a> {
    view_name: &'a str,
    file: &'a str,
    shim_method: &'a str,
    analyzer: ExpressionAnalyzer<'a>,
    // Shared by every nesting level, never reset per branch
    next_index: usize,
    records: Vec<TrackedExpressionRecord>,
}

impl<'a> BodyRewriter<'a> {
    pub fn new(
        view_name: &'a str,
        file: &'a str,
        fields: &'a [ReactiveField],
        config: &'a InstrumentConfig,
    ) -> Self {
        Self {
            view_name,
            file,
            shim_method: &config.shim_method,
            analyzer: ExpressionAnalyzer::new(fields, &config.vocabulary),
            next_index: 0,
            records: Vec::new(),
        }
    }

    pub fn rewrite(mut self, body: &[Stmt]) -> RewrittenBody {
        let body = self.rewrite_block(body);
        RewrittenBody {
            body,
            records: self.records,
        }
    }

    fn rewrite_block(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        stmts.iter().map(|stmt| self.rewrite_stmt(stmt)).collect()
    }

    fn rewrite_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Expr(expr) => {
                let index = self.take_index();
                Stmt::Expr(self.track(expr, index))
            }
            Stmt::If(if_stmt) => {
                // The conditional takes its index before its branches are visited
                self.take_index();
                Stmt::If(self.rewrite_if(if_stmt))
            }
            Stmt::Let { .. } | Stmt::Assign { .. } => stmt.clone(),
        }
    }

    fn rewrite_if(&mut self, if_stmt: &IfStmt) -> IfStmt {
        let then_branch = self.rewrite_block(&if_stmt.then_branch);
        let else_branch = if_stmt.else_branch.as_ref().map(|branch| match branch {
            ElseBranch::Block(stmts) => ElseBranch::Block(self.rewrite_block(stmts)),
            ElseBranch::If(nested) => ElseBranch::If(Box::new(self.rewrite_if(nested))),
        });

        IfStmt {
            condition: if_stmt.condition.clone(),
            then_branch,
            else_branch,
            span: if_stmt.span,
        }
    }

    fn take_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn track(&mut self, expr: &Expr, index: usize) -> Expr {
        let analysis = self.analyzer.analyze(&NodeRef::from(expr));
        let id = synthesize_id(self.view_name, expr, index);
        let line = expr.span.line;

        debug!(
            id = %id,
            view_type = %analysis.constructor_name,
            container = analysis.is_container,
            deps = ?analysis.used_fields,
            "tracking statement"
        );

        self.records.push(TrackedExpressionRecord {
            id: id.clone(),
            dependencies: analysis.used_fields.into_iter().collect(),
            view_type: analysis.constructor_name,
            is_container: analysis.is_container,
            location: SourceLocation {
                file: self.file.to_string(),
                line,
            },
        });

        let mut tracked = Expr::method(
            expr.clone(),
            self.shim_method,
            vec![
                Argument::labeled("id", Expr::string(id)),
                Argument::labeled("file", Expr::string(self.file)),
                Argument::labeled("line", Expr::int(i64::from(line))),
            ],
        );
        tracked.span = expr.span;
        tracked
    }
}

/// `<View>_<fragment>_<index>`. Positional, so earlier insertions shift later ids.
pub fn synthesize_id(view_name: &str, expr: &Expr, index: usize) -> String {
    format!("{view_name}_{}_{index}", constructor_fragment(expr))
}

/// Rendered source up to the first `(` or `{`, alphanumerics only
pub fn constructor_fragment(expr: &Expr) -> String {
    let source = expr.to_source();
    let head = source
        .split(|c: char| c == '(' || c == '{')
        .next()
        .unwrap_or_default();
    let fragment: String = head.chars().filter(|c| c.is_alphanumeric()).collect();
    if fragment.is_empty() {
        "View".to_string()
    } else {
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, StringPart};

    #[test]
    fn test_fragment_cuts_at_paren_or_brace() {
        let text = Expr::call("Text", vec![Argument::unlabeled(Expr::string("x"))]);
        assert_eq!(constructor_fragment(&text), "Text");

        let stack = Expr::call("LazyVStack", vec![]).with_trailing(None, vec![Stmt::expr(text)]);
        assert_eq!(constructor_fragment(&stack), "LazyVStack");
    }

    #[test]
    fn test_fragment_strips_punctuation() {
        let expr = Expr::ternary(Expr::ident("is_on"), Expr::call("A", vec![]), Expr::call("B", vec![]));
        assert_eq!(constructor_fragment(&expr), "isonA");
    }

    #[test]
    fn test_fragment_falls_back_to_view() {
        let expr = Expr::interpolated(vec![StringPart::text("(")]);
        assert_eq!(constructor_fragment(&expr), "View");
    }

    #[test]
    fn test_fragment_of_operator_without_calls() {
        let expr = Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b"));
        assert_eq!(constructor_fragment(&expr), "ab");
    }
}
