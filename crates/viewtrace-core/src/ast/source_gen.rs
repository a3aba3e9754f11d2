// Source code generation from the syntax tree
// Renders declarations back to brace-syntax text. Used for the instrumented output
// files and for deriving the constructor fragment of tracked-expression ids.

use super::*;

const INDENT: &str = "    ";

/// Trait for types that can generate their source code representation
pub trait ToSource {
    fn to_source(&self) -> String;
}

impl ToSource for SourceFile {
    fn to_source(&self) -> String {
        self.declarations
            .iter()
            .map(|decl| decl.to_source())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ToSource for ViewDecl {
    fn to_source(&self) -> String {
        let mut result = String::new();
        for attr in &self.attributes {
            result.push_str(&attr.to_source());
            result.push('\n');
        }
        let keyword = match self.kind {
            DeclKind::Struct => "struct",
            DeclKind::Class => "class",
            DeclKind::Enum => "enum",
        };
        result.push_str(&format!("{keyword} {}", self.name));
        if !self.conformances.is_empty() {
            result.push_str(&format!(": {}", self.conformances.join(", ")));
        }
        result.push_str(" {\n");
        for member in &self.members {
            result.push_str(&render_member(member, 1));
        }
        result.push_str("}\n");
        result
    }
}

impl ToSource for Attribute {
    fn to_source(&self) -> String {
        match &self.arguments {
            Some(args) => format!("@{}({})", self.name, args),
            None => format!("@{}", self.name),
        }
    }
}

impl ToSource for Member {
    fn to_source(&self) -> String {
        render_member(self, 0)
    }
}

impl ToSource for Stmt {
    fn to_source(&self) -> String {
        let mut out = String::new();
        render_stmt(self, 0, &mut out);
        out.trim_end().to_string()
    }
}

impl ToSource for Expr {
    fn to_source(&self) -> String {
        render_expr(self, 0)
    }
}

fn pad(level: usize) -> String {
    INDENT.repeat(level)
}

fn render_member(member: &Member, level: usize) -> String {
    match member {
        Member::Property(property) => {
            let mut result = pad(level);
            for attr in &property.attributes {
                result.push_str(&attr.to_source());
                result.push(' ');
            }
            if property.is_static {
                result.push_str("static ");
            }
            result.push_str(match property.binding {
                BindingKind::Var => "var ",
                BindingKind::Let => "let ",
            });
            result.push_str(&property.name);
            if let Some(ty) = &property.ty {
                result.push_str(&format!(": {ty}"));
            }
            if let Some(init) = &property.initializer {
                result.push_str(&format!(" = {}", render_expr(init, level)));
            }
            if let Some(body) = &property.accessor {
                result.push_str(" {\n");
                render_block(body, level + 1, &mut result);
                result.push_str(&pad(level));
                result.push('}');
            }
            result.push('\n');
            result
        }
        Member::Function(function) => {
            let mut result = format!(
                "{}func {}({}) {{\n",
                pad(level),
                function.name,
                function.params.join(", ")
            );
            render_block(&function.body, level + 1, &mut result);
            result.push_str(&pad(level));
            result.push_str("}\n");
            result
        }
    }
}

fn render_block(stmts: &[Stmt], level: usize, out: &mut String) {
    for stmt in stmts {
        render_stmt(stmt, level, out);
    }
}

fn render_stmt(stmt: &Stmt, level: usize, out: &mut String) {
    match stmt {
        Stmt::Expr(expr) => {
            out.push_str(&pad(level));
            out.push_str(&render_expr(expr, level));
            out.push('\n');
        }
        Stmt::If(if_stmt) => {
            out.push_str(&pad(level));
            render_if(if_stmt, level, out);
            out.push('\n');
        }
        Stmt::Let { name, value, .. } => {
            out.push_str(&format!("{}let {name} = {}\n", pad(level), render_expr(value, level)));
        }
        Stmt::Assign { target, op, value, .. } => {
            let op = match op {
                AssignOp::Assign => "=",
                AssignOp::AddAssign => "+=",
                AssignOp::SubAssign => "-=",
            };
            out.push_str(&format!(
                "{}{} {op} {}\n",
                pad(level),
                render_expr(target, level),
                render_expr(value, level)
            ));
        }
    }
}

// Renders `if cond { ... } else ...` without leading indentation or trailing newline.
fn render_if(if_stmt: &IfStmt, level: usize, out: &mut String) {
    out.push_str(&format!("if {} {{\n", render_expr(&if_stmt.condition, level)));
    render_block(&if_stmt.then_branch, level + 1, out);
    out.push_str(&pad(level));
    out.push('}');
    match &if_stmt.else_branch {
        None => {}
        Some(ElseBranch::Block(stmts)) => {
            out.push_str(" else {\n");
            render_block(stmts, level + 1, out);
            out.push_str(&pad(level));
            out.push('}');
        }
        Some(ElseBranch::If(nested)) => {
            out.push_str(" else ");
            render_if(nested, level, out);
        }
    }
}

fn render_expr(expr: &Expr, level: usize) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Literal(literal) => render_literal(literal),
        ExprKind::Interpolated(parts) => {
            let mut result = String::from("\"");
            for part in parts {
                match part {
                    StringPart::Text(text) => result.push_str(&escape(text)),
                    StringPart::Expr(inner) => {
                        result.push_str(&format!("\\({})", render_expr(inner, level)))
                    }
                }
            }
            result.push('"');
            result
        }
        ExprKind::Call {
            callee,
            arguments,
            trailing,
        } => {
            let mut result = render_expr(callee, level);
            if !arguments.is_empty() || trailing.is_empty() {
                result.push('(');
                result.push_str(&render_arguments(arguments, level));
                result.push(')');
            }
            for (i, closure) in trailing.iter().enumerate() {
                result.push(' ');
                if i > 0 {
                    if let Some(label) = &closure.label {
                        result.push_str(&format!("{label}: "));
                    }
                }
                result.push_str(&render_expr(&closure.value, level));
            }
            result
        }
        ExprKind::Member { base, name } => match base {
            Some(base) => format!("{}.{}", render_operand(base, level), name),
            None => format!(".{name}"),
        },
        ExprKind::Binary { op, lhs, rhs } => format!(
            "{} {} {}",
            render_operand(lhs, level),
            op.symbol(),
            render_operand(rhs, level)
        ),
        ExprKind::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
            };
            format!("{symbol}{}", render_operand(operand, level))
        }
        ExprKind::Ternary {
            condition,
            then_expr,
            else_expr,
        } => format!(
            "{} ? {} : {}",
            render_operand(condition, level),
            render_operand(then_expr, level),
            render_operand(else_expr, level)
        ),
        ExprKind::Closure { params, body } => {
            if body.is_empty() {
                return if params.is_empty() {
                    "{ }".to_string()
                } else {
                    format!("{{ {} in }}", params.join(", "))
                };
            }
            let mut result = String::from("{");
            if !params.is_empty() {
                result.push_str(&format!(" {} in", params.join(", ")));
            }
            result.push('\n');
            render_block(body, level + 1, &mut result);
            result.push_str(&pad(level));
            result.push('}');
            result
        }
        ExprKind::Array(elements) => format!(
            "[{}]",
            elements
                .iter()
                .map(|e| render_expr(e, level))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ExprKind::Dictionary(entries) => {
            if entries.is_empty() {
                return "[:]".to_string();
            }
            let body = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", render_expr(k, level), render_expr(v, level)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{body}]")
        }
        ExprKind::Tuple(elements) => format!("({})", render_arguments(elements, level)),
    }
}

// Operands that are themselves operator expressions get parenthesized.
fn render_operand(expr: &Expr, level: usize) -> String {
    match expr.kind {
        ExprKind::Binary { .. } | ExprKind::Ternary { .. } => {
            format!("({})", render_expr(expr, level))
        }
        _ => render_expr(expr, level),
    }
}

fn render_arguments(arguments: &[Argument], level: usize) -> String {
    arguments
        .iter()
        .map(|arg| match &arg.label {
            Some(label) => format!("{label}: {}", render_expr(&arg.value, level)),
            None => render_expr(&arg.value, level),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => format!("{f:?}"),
        Literal::Bool(b) => b.to_string(),
        Literal::Str(s) => format!("\"{}\"", escape(s)),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_with_count() -> Expr {
        Expr::call(
            "Text",
            vec![Argument::unlabeled(Expr::interpolated(vec![
                StringPart::text("Count: "),
                StringPart::expr(Expr::ident("count")),
            ]))],
        )
    }

    #[test]
    fn test_interpolated_call_to_source() {
        assert_eq!(text_with_count().to_source(), r#"Text("Count: \(count)")"#);
    }

    #[test]
    fn test_trailing_closure_omits_empty_parens() {
        let stack = Expr::call("VStack", vec![]).with_trailing(None, vec![Stmt::expr(text_with_count())]);
        assert_eq!(
            stack.to_source(),
            "VStack {\n    Text(\"Count: \\(count)\")\n}"
        );
    }

    #[test]
    fn test_labeled_second_trailing_closure() {
        let button = Expr::call("Button", vec![])
            .with_trailing(
                None,
                vec![Stmt::Assign {
                    target: Expr::ident("count"),
                    op: AssignOp::AddAssign,
                    value: Expr::int(1),
                    span: Span::synthetic(),
                }],
            )
            .with_trailing(Some("label"), vec![Stmt::expr(Expr::call("Text", vec![Argument::unlabeled(Expr::string("Add"))]))]);
        let source = button.to_source();
        assert!(source.starts_with("Button {\n    count += 1\n} label: {"));
    }

    #[test]
    fn test_modifier_chain_and_implicit_member() {
        let expr = Expr::method(
            Expr::call("Text", vec![Argument::unlabeled(Expr::string("Hi"))]),
            "font",
            vec![Argument::unlabeled(Expr::implicit_member("title"))],
        );
        assert_eq!(expr.to_source(), r#"Text("Hi").font(.title)"#);
    }

    #[test]
    fn test_if_else_if_rendering() {
        let stmt = IfStmt::new(
            Expr::ident("isHidden"),
            vec![Stmt::expr(Expr::call("EmptyView", vec![]))],
        )
        .otherwise_if(
            IfStmt::new(Expr::binary(BinaryOp::Gt, Expr::ident("count"), Expr::int(3)), vec![])
                .otherwise(vec![Stmt::expr(Expr::call("Spacer", vec![]))]),
        )
        .into_stmt();
        assert_eq!(
            stmt.to_source(),
            "if isHidden {\n    EmptyView()\n} else if count > 3 {\n} else {\n    Spacer()\n}"
        );
    }

    #[test]
    fn test_nested_operators_are_parenthesized() {
        let expr = Expr::ternary(
            Expr::unary(UnaryOp::Not, Expr::ident("isHidden")),
            Expr::string("Hide"),
            Expr::binary(BinaryOp::Add, Expr::string("a"), Expr::string("b")),
        );
        assert_eq!(expr.to_source(), r#"!isHidden ? "Hide" : ("a" + "b")"#);
    }

    #[test]
    fn test_static_property_with_dictionary() {
        let member = Property::new("table")
            .static_let()
            .typed("[String: Int]")
            .initialized(Expr::dictionary(vec![]))
            .into_member();
        assert_eq!(member.to_source(), "static let table: [String: Int] = [:]\n");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(Expr::string("say \"hi\"\n").to_source(), r#""say \"hi\"\n""#);
    }
}
