/*!
# Syntax Visitor Interface

The minimal, host-neutral view of a syntax tree that the analysis passes depend on:
a node kind, its children in source order, and its span. [`NodeRef`] adapts this
crate's own tree; other hosts can implement [`SyntaxNode`] over their parse trees.
*/

use super::{ElseBranch, Expr, ExprKind, Span, Stmt, StringPart, ToSource};

/// What a visitor needs to know about a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind<'a> {
    /// A bare identifier reference
    Identifier(&'a str),
    /// A call expression, with the callee rendered as written
    Call { callee: String },
    /// Anything else (literals, operators, statements, closures, ...)
    Other,
}

/// Host-neutral tree node
pub trait SyntaxNode: Sized {
    fn kind(&self) -> NodeKind<'_>;

    /// Children in source order. For calls: callee, arguments, trailing closures.
    fn children(&self) -> Vec<Self>;

    fn span(&self) -> Span;
}

/// Borrowed handle into the crate's own tree
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

impl<'a> From<&'a Expr> for NodeRef<'a> {
    fn from(expr: &'a Expr) -> Self {
        NodeRef::Expr(expr)
    }
}

impl<'a> From<&'a Stmt> for NodeRef<'a> {
    fn from(stmt: &'a Stmt) -> Self {
        NodeRef::Stmt(stmt)
    }
}

impl<'a> SyntaxNode for NodeRef<'a> {
    fn kind(&self) -> NodeKind<'_> {
        match self {
            NodeRef::Expr(expr) => match &expr.kind {
                ExprKind::Identifier(name) => NodeKind::Identifier(name),
                ExprKind::Call { callee, .. } => NodeKind::Call {
                    callee: callee.to_source(),
                },
                _ => NodeKind::Other,
            },
            NodeRef::Stmt(_) => NodeKind::Other,
        }
    }

    fn children(&self) -> Vec<Self> {
        match *self {
            NodeRef::Stmt(stmt) => stmt_children(stmt),
            NodeRef::Expr(expr) => expr_children(expr),
        }
    }

    fn span(&self) -> Span {
        match self {
            NodeRef::Stmt(stmt) => stmt.span(),
            NodeRef::Expr(expr) => expr.span,
        }
    }
}

fn stmt_children(stmt: &Stmt) -> Vec<NodeRef<'_>> {
    match stmt {
        Stmt::Expr(expr) => vec![NodeRef::Expr(expr)],
        Stmt::If(if_stmt) => {
            let mut children = vec![NodeRef::Expr(&if_stmt.condition)];
            children.extend(if_stmt.then_branch.iter().map(NodeRef::Stmt));
            let mut else_branch = if_stmt.else_branch.as_ref();
            // else-if chains are flattened into the parent's children
            while let Some(branch) = else_branch {
                match branch {
                    ElseBranch::Block(stmts) => {
                        children.extend(stmts.iter().map(NodeRef::Stmt));
                        else_branch = None;
                    }
                    ElseBranch::If(nested) => {
                        children.push(NodeRef::Expr(&nested.condition));
                        children.extend(nested.then_branch.iter().map(NodeRef::Stmt));
                        else_branch = nested.else_branch.as_ref();
                    }
                }
            }
            children
        }
        Stmt::Let { value, .. } => vec![NodeRef::Expr(value)],
        Stmt::Assign { target, value, .. } => vec![NodeRef::Expr(target), NodeRef::Expr(value)],
    }
}

fn expr_children(expr: &Expr) -> Vec<NodeRef<'_>> {
    match &expr.kind {
        ExprKind::Identifier(_) | ExprKind::Literal(_) => Vec::new(),
        ExprKind::Interpolated(parts) => parts
            .iter()
            .filter_map(|part| match part {
                StringPart::Expr(inner) => Some(NodeRef::Expr(inner)),
                StringPart::Text(_) => None,
            })
            .collect(),
        ExprKind::Call {
            callee,
            arguments,
            trailing,
        } => {
            let mut children = vec![NodeRef::Expr(callee.as_ref())];
            children.extend(arguments.iter().map(|arg| NodeRef::Expr(&arg.value)));
            children.extend(trailing.iter().map(|arg| NodeRef::Expr(&arg.value)));
            children
        }
        ExprKind::Member { base, .. } => base.iter().map(|b| NodeRef::Expr(b.as_ref())).collect(),
        ExprKind::Binary { lhs, rhs, .. } => vec![NodeRef::Expr(lhs), NodeRef::Expr(rhs)],
        ExprKind::Unary { operand, .. } => vec![NodeRef::Expr(operand)],
        ExprKind::Ternary {
            condition,
            then_expr,
            else_expr,
        } => vec![
            NodeRef::Expr(condition),
            NodeRef::Expr(then_expr),
            NodeRef::Expr(else_expr),
        ],
        ExprKind::Closure { body, .. } => body.iter().map(NodeRef::Stmt).collect(),
        ExprKind::Array(elements) => elements.iter().map(NodeRef::Expr).collect(),
        ExprKind::Dictionary(entries) => entries
            .iter()
            .flat_map(|(k, v)| [NodeRef::Expr(k), NodeRef::Expr(v)])
            .collect(),
        ExprKind::Tuple(elements) => elements.iter().map(|arg| NodeRef::Expr(&arg.value)).collect(),
    }
}

/// Utility for deep traversal over any [`SyntaxNode`]
pub struct AstWalker;

impl AstWalker {
    /// Depth-first pre-order walk: a node is visited before its children
    pub fn walk<N, F>(node: &N, visit: &mut F)
    where
        N: SyntaxNode,
        F: FnMut(&N),
    {
        visit(node);
        for child in node.children() {
            Self::walk(&child, visit);
        }
    }

    /// Collect every node in the tree matching a predicate, in pre-order
    pub fn find_all<N, P>(node: N, predicate: P) -> Vec<N>
    where
        N: SyntaxNode + Clone,
        P: Fn(&N) -> bool,
    {
        let mut matches = Vec::new();
        Self::find_all_recursive(node, &predicate, &mut matches);
        matches
    }

    fn find_all_recursive<N, P>(node: N, predicate: &P, matches: &mut Vec<N>)
    where
        N: SyntaxNode + Clone,
        P: Fn(&N) -> bool,
    {
        if predicate(&node) {
            matches.push(node.clone());
        }
        for child in node.children() {
            Self::find_all_recursive(child, predicate, matches);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Argument, IfStmt};

    #[test]
    fn test_call_children_order_is_callee_arguments_trailing() {
        let expr = Expr::call("Button", vec![Argument::labeled("role", Expr::ident("role"))])
            .with_trailing(None, vec![Stmt::expr(Expr::ident("label"))]);
        let node = NodeRef::from(&expr);
        let kinds: Vec<String> = node
            .children()
            .iter()
            .map(|child| match child.kind() {
                NodeKind::Identifier(name) => name.to_string(),
                NodeKind::Call { callee } => format!("call {callee}"),
                NodeKind::Other => "other".to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["Button", "role", "other"]);
    }

    #[test]
    fn test_find_all_identifiers_through_else_if_chain() {
        let stmt = IfStmt::new(Expr::ident("a"), vec![Stmt::expr(Expr::ident("b"))])
            .otherwise_if(
                IfStmt::new(Expr::ident("c"), vec![]).otherwise(vec![Stmt::expr(Expr::ident("d"))]),
            )
            .into_stmt();
        let found: Vec<String> = AstWalker::find_all(NodeRef::from(&stmt), |n| {
            matches!(n.kind(), NodeKind::Identifier(_))
        })
        .iter()
        .filter_map(|n| match n.kind() {
            NodeKind::Identifier(name) => Some(name.to_string()),
            _ => None,
        })
        .collect();
        assert_eq!(found, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_call_kind_renders_member_callee() {
        let expr = Expr::method(Expr::call("Text", vec![]), "bold", vec![]);
        match NodeRef::from(&expr).kind() {
            NodeKind::Call { callee } => assert_eq!(callee, "Text().bold"),
            other => panic!("expected call, got {other:?}"),
        }
    }
}
