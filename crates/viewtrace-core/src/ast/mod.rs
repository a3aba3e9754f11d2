// Unified syntax tree for view declarations
// Host adapters lower their own parse trees into this shape (it round-trips through
// serde, so the hand-off can be plain JSON). The instrumentation passes only walk and
// rebuild it; nothing in this crate parses source text.

pub mod source_gen;
pub mod syntax;

pub use source_gen::ToSource;
pub use syntax::{AstWalker, NodeKind, NodeRef, SyntaxNode};

use serde::{Deserialize, Serialize};

/// Position of a node in the original source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Span used for synthesized nodes
    pub fn synthetic() -> Self {
        Self::default()
    }
}

/// One host source file, as handed over by the host adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    #[serde(default)]
    pub declarations: Vec<ViewDecl>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            declarations: Vec::new(),
        }
    }

    pub fn with_declaration(mut self, decl: ViewDecl) -> Self {
        self.declarations.push(decl);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Struct,
    Class,
    Enum,
}

/// A type declaration: the unit a declaration macro is attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDecl {
    pub name: String,
    pub kind: DeclKind,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub conformances: Vec<String>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub span: Span,
}

impl ViewDecl {
    pub fn new(name: impl Into<String>, kind: DeclKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: Vec::new(),
            conformances: Vec::new(),
            members: Vec::new(),
            span: Span::synthetic(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn conforming_to(mut self, conformance: impl Into<String>) -> Self {
        self.conformances.push(conformance.into());
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }

    pub fn conforms_to(&self, name: &str) -> bool {
        self.conformances.iter().any(|c| c.trim() == name)
    }

    /// Iterate over property members only
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.members.iter().filter_map(|member| match member {
            Member::Property(property) => Some(property),
            Member::Function(_) => None,
        })
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties().find(|property| property.name == name)
    }
}

/// Attribute attached to a declaration or property, e.g. `@State`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Member {
    Property(Property),
    Function(Function),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    #[default]
    Var,
    Let,
}

/// A property member. Stored properties have no accessor block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub binding: BindingKind,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub ty: Option<String>,
    #[serde(default)]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub accessor: Option<Vec<Stmt>>,
    #[serde(default)]
    pub span: Span,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            binding: BindingKind::Var,
            is_static: false,
            ty: None,
            initializer: None,
            accessor: None,
            span: Span::synthetic(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn typed(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn initialized(mut self, value: Expr) -> Self {
        self.initializer = Some(value);
        self
    }

    pub fn computed(mut self, body: Vec<Stmt>) -> Self {
        self.accessor = Some(body);
        self
    }

    pub fn static_let(mut self) -> Self {
        self.is_static = true;
        self.binding = BindingKind::Let;
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn is_stored(&self) -> bool {
        self.accessor.is_none()
    }

    pub fn into_member(self) -> Member {
        Member::Property(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Expr(Expr),
    If(IfStmt),
    Let {
        name: String,
        value: Expr,
        #[serde(default)]
        span: Span,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
        #[serde(default)]
        span: Span,
    },
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(expr) => expr.span,
            Stmt::If(if_stmt) => if_stmt.span,
            Stmt::Let { span, .. } | Stmt::Assign { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    #[serde(default)]
    pub then_branch: Vec<Stmt>,
    #[serde(default)]
    pub else_branch: Option<ElseBranch>,
    #[serde(default)]
    pub span: Span,
}

impl IfStmt {
    pub fn new(condition: Expr, then_branch: Vec<Stmt>) -> Self {
        let span = condition.span;
        Self {
            condition,
            then_branch,
            else_branch: None,
            span,
        }
    }

    pub fn otherwise(mut self, else_branch: Vec<Stmt>) -> Self {
        self.else_branch = Some(ElseBranch::Block(else_branch));
        self
    }

    pub fn otherwise_if(mut self, nested: IfStmt) -> Self {
        self.else_branch = Some(ElseBranch::If(Box::new(nested)));
        self
    }

    pub fn into_stmt(self) -> Stmt {
        Stmt::If(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElseBranch {
    Block(Vec<Stmt>),
    If(Box<IfStmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    // Leaves
    Identifier(String),
    Literal(Literal),
    Interpolated(Vec<StringPart>),

    // Calls and member access
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        arguments: Vec<Argument>,
        #[serde(default)]
        trailing: Vec<Argument>,
    },
    /// `base.name`, or the implicit `.name` form when `base` is absent
    Member {
        #[serde(default)]
        base: Option<Box<Expr>>,
        name: String,
    },

    // Operators
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    Closure {
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        body: Vec<Stmt>,
    },

    // Collections
    Array(Vec<Expr>),
    Dictionary(Vec<(Expr, Expr)>),
    Tuple(Vec<Argument>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringPart {
    Text(String),
    Expr(Expr),
}

/// Call argument, tuple element or trailing closure, with its optional label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    #[serde(default)]
    pub label: Option<String>,
    pub value: Expr,
}

impl Argument {
    pub fn unlabeled(value: Expr) -> Self {
        Self { label: None, value }
    }

    pub fn labeled(label: impl Into<String>, value: Expr) -> Self {
        Self {
            label: Some(label.into()),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

// Construction helpers, used by host adapters, the emitter and tests.
impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Identifier(name.into()))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(Literal::Str(value.into())))
    }

    pub fn interpolated(parts: Vec<StringPart>) -> Self {
        Self::new(ExprKind::Interpolated(parts))
    }

    /// Call of a named constructor or function: `name(args)`
    pub fn call(name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self::call_expr(Self::ident(name), arguments)
    }

    pub fn call_expr(callee: Expr, arguments: Vec<Argument>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            arguments,
            trailing: Vec::new(),
        })
    }

    /// Method or modifier call: `receiver.name(args)`
    pub fn method(receiver: Expr, name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        let span = receiver.span;
        let mut call = Self::call_expr(Self::member(receiver, name), arguments);
        call.span = span;
        call
    }

    pub fn member(base: Expr, name: impl Into<String>) -> Self {
        let span = base.span;
        Self {
            kind: ExprKind::Member {
                base: Some(Box::new(base)),
                name: name.into(),
            },
            span,
        }
    }

    pub fn implicit_member(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Member {
            base: None,
            name: name.into(),
        })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        let span = lhs.span;
        Self {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let span = operand.span;
        Self {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        }
    }

    pub fn ternary(condition: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        let span = condition.span;
        Self {
            kind: ExprKind::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        }
    }

    pub fn closure(body: Vec<Stmt>) -> Self {
        Self::new(ExprKind::Closure {
            params: Vec::new(),
            body,
        })
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Self::new(ExprKind::Array(elements))
    }

    pub fn dictionary(entries: Vec<(Expr, Expr)>) -> Self {
        Self::new(ExprKind::Dictionary(entries))
    }

    pub fn tuple(elements: Vec<Argument>) -> Self {
        Self::new(ExprKind::Tuple(elements))
    }

    /// Append a trailing closure to a call; non-call expressions are returned unchanged
    pub fn with_trailing(mut self, label: Option<&str>, body: Vec<Stmt>) -> Self {
        if let ExprKind::Call { trailing, .. } = &mut self.kind {
            trailing.push(Argument {
                label: label.map(str::to_string),
                value: Expr::closure(body),
            });
        }
        self
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl StringPart {
    pub fn text(text: impl Into<String>) -> Self {
        StringPart::Text(text.into())
    }

    pub fn expr(expr: Expr) -> Self {
        StringPart::Expr(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_json_round_trip_keeps_spans() {
        let decl = ViewDecl::new("Counter", DeclKind::Struct)
            .conforming_to("View")
            .with_member(
                Property::new("count")
                    .with_attribute(Attribute::new("State"))
                    .typed("Int")
                    .initialized(Expr::int(0))
                    .at(3, 5)
                    .into_member(),
            );
        let file = SourceFile::new("Counter.view").with_declaration(decl);

        let json = serde_json::to_string(&file).unwrap();
        let back: SourceFile = serde_json::from_str(&json).unwrap();

        assert_eq!(back, file);
        assert_eq!(back.declarations[0].property("count").unwrap().span, Span::new(3, 5));
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "path": "Empty.view",
            "declarations": [{ "name": "Empty", "kind": "struct" }]
        }"#;
        let file: SourceFile = serde_json::from_str(json).unwrap();
        let decl = &file.declarations[0];
        assert!(decl.members.is_empty());
        assert!(!decl.conforms_to("View"));
        assert_eq!(decl.span, Span::synthetic());
    }

    #[test]
    fn test_method_builder_keeps_receiver_span() {
        let text = Expr::call("Text", vec![]).at(7, 9);
        let modified = Expr::method(text, "bold", vec![]);
        assert_eq!(modified.span, Span::new(7, 9));
    }
}
