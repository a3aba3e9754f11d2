/*!
# Reference Render Host

A small interpreter standing in for the UI framework: it mounts a view declaration,
seeds its state from the property initializers, renders the body, and re-renders on
state changes.

Each body-level statement is a slot that remembers which fields its last evaluation
read. With [`InvalidationStrategy::FineGrained`] a change re-evaluates only the slots
whose reads intersect the changed fields; conditionals re-check their guard and
remount a branch only when a different arm is taken. With
[`InvalidationStrategy::WholeBody`] every change re-renders the whole body.

Closures are content when they appear as trailing closures of a constructor, and
actions otherwise. Assignments are never run during a render.
*/

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::mem;
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{
    Argument, BinaryOp, ElseBranch, Expr, ExprKind, IfStmt, Literal, Stmt, StringPart, ToSource,
    UnaryOp, ViewDecl,
};
use crate::config::{HostConfig, InvalidationStrategy};

use super::recorder::Recorder;
use super::shim::TrackRecomputations;
use super::state::{FieldValue, LiveHost, ReactiveState, StateError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("View '{0}' has no body to render")]
    NoBody(String),

    #[error("Unbound identifier: {0}")]
    UnboundIdentifier(String),

    #[error("Type error: expected {expected}, got {found} in `{expr}`")]
    TypeError {
        expected: &'static str,
        found: &'static str,
        expr: String,
    },

    #[error("Division by zero in `{0}`")]
    DivisionByZero(String),

    #[error("Unsupported expression: `{0}`")]
    Unsupported(String),

    #[error("Malformed tracking call: `{0}`")]
    MalformedTrackingCall(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl HostError {
    fn type_error(expected: &'static str, found: &Value, expr: &Expr) -> Self {
        Self::TypeError {
            expected,
            found: found.type_name(),
            expr: expr.to_source(),
        }
    }

    fn unsupported(expr: &Expr) -> Self {
        Self::Unsupported(expr.to_source())
    }
}

type HostResult<T> = Result<T, HostError>;

/// Runtime value produced while rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A type or member path that names something outside the view, e.g. `Color.red`
    Symbol(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    /// A closure that is not rendered
    Action,
    Node(Element),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "Void",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Double",
            Value::Text(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Tuple(_) => "Tuple",
            Value::Action => "Closure",
            Value::Node(_) => "View",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    fn into_field_value(self) -> Option<FieldValue> {
        match self {
            Value::Bool(b) => Some(FieldValue::Bool(b)),
            Value::Int(n) => Some(FieldValue::Int(n)),
            Value::Float(x) => Some(FieldValue::Float(x)),
            Value::Text(s) => Some(FieldValue::Text(s)),
            _ => None,
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Int(n) => Value::Int(n),
            FieldValue::Float(x) => Value::Float(x),
            FieldValue::Text(s) => Value::Text(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) | Value::Symbol(s) => write!(f, "{s}"),
            Value::Array(items) => write!(f, "[{}]", join(items)),
            Value::Tuple(items) => write!(f, "({})", join(items)),
            Value::Action => write!(f, "<action>"),
            Value::Node(element) => write!(f, "{}", element.kind),
        }
    }
}

fn join(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A constructed view
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: String,
    pub arguments: Vec<(Option<String>, Value)>,
    pub modifiers: Vec<Modifier>,
    pub children: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub name: String,
    pub arguments: Vec<(Option<String>, Value)>,
}

/// Rendered output
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Element(Element),
    Text(String),
    Group(Vec<RenderNode>),
    Empty,
}

impl From<Value> for RenderNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Node(element) => RenderNode::Element(element),
            Value::Unit | Value::Action => RenderNode::Empty,
            Value::Array(items) => RenderNode::Group(items.into_iter().map(RenderNode::from).collect()),
            other => RenderNode::Text(other.to_string()),
        }
    }
}

// One arm of a flattened if / else-if / else chain; `None` is the final else.
#[derive(Debug, Clone)]
struct Arm {
    condition: Option<Expr>,
    body: Vec<Stmt>,
}

fn arms_of(if_stmt: &IfStmt) -> Vec<Arm> {
    let mut arms = vec![Arm {
        condition: Some(if_stmt.condition.clone()),
        body: if_stmt.then_branch.clone(),
    }];
    match &if_stmt.else_branch {
        None => {}
        Some(ElseBranch::Block(body)) => arms.push(Arm {
            condition: None,
            body: body.clone(),
        }),
        Some(ElseBranch::If(nested)) => arms.extend(arms_of(nested)),
    }
    arms
}

/// Mounted body statement
#[derive(Debug)]
enum Slot {
    Render {
        expr: Expr,
        reads: BTreeSet<String>,
        tracked: Vec<String>,
        output: RenderNode,
    },
    Binding {
        name: String,
        expr: Expr,
        value: Value,
        reads: BTreeSet<String>,
    },
    Conditional {
        arms: Vec<Arm>,
        condition_reads: BTreeSet<String>,
        taken: Option<usize>,
        branch: Vec<Slot>,
    },
    Action,
}

#[derive(Debug, Clone)]
struct Local {
    value: Value,
    // Fields the local's value was computed from
    reads: BTreeSet<String>,
}

struct Evaluator<'a> {
    state: &'a IndexMap<String, FieldValue>,
    constants: &'a IndexMap<String, Value>,
    recorder: &'a Recorder,
    shim_method: &'a str,
    scopes: Vec<HashMap<String, Local>>,
    reads: BTreeSet<String>,
    tracked: Vec<String>,
}

impl<'a> Evaluator<'a> {
    fn new(
        state: &'a IndexMap<String, FieldValue>,
        constants: &'a IndexMap<String, Value>,
        recorder: &'a Recorder,
        shim_method: &'a str,
    ) -> Self {
        Self {
            state,
            constants,
            recorder,
            shim_method,
            scopes: Vec::new(),
            reads: BTreeSet::new(),
            tracked: Vec::new(),
        }
    }

    /// Run `f`, returning what it read and which tracked ids it evaluated
    fn capture<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> HostResult<T>,
    ) -> HostResult<(T, BTreeSet<String>, Vec<String>)> {
        let outer_reads = mem::take(&mut self.reads);
        let outer_tracked = mem::take(&mut self.tracked);
        let result = f(self);
        let reads = mem::replace(&mut self.reads, outer_reads);
        let tracked = mem::replace(&mut self.tracked, outer_tracked);
        result.map(|value| (value, reads, tracked))
    }

    fn scoped<T>(
        &mut self,
        bindings: HashMap<String, Local>,
        f: impl FnOnce(&mut Self) -> HostResult<T>,
    ) -> HostResult<T> {
        self.scopes.push(bindings);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn bind(&mut self, name: &str, local: Local) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), local);
            }
            None => self.scopes.push(HashMap::from([(name.to_string(), local)])),
        }
    }

    // Mounting and updating body slots

    fn mount_block(&mut self, stmts: &[Stmt]) -> HostResult<Vec<Slot>> {
        stmts.iter().map(|stmt| self.mount_stmt(stmt)).collect()
    }

    fn mount_stmt(&mut self, stmt: &Stmt) -> HostResult<Slot> {
        match stmt {
            Stmt::Expr(expr) => {
                let (value, reads, tracked) = self.capture(|ev| ev.eval(expr))?;
                Ok(Slot::Render {
                    expr: expr.clone(),
                    reads,
                    tracked,
                    output: value.into(),
                })
            }
            Stmt::Let { name, value, .. } => {
                let (computed, reads, _) = self.capture(|ev| ev.eval(value))?;
                self.bind(
                    name,
                    Local {
                        value: computed.clone(),
                        reads: reads.clone(),
                    },
                );
                Ok(Slot::Binding {
                    name: name.clone(),
                    expr: value.clone(),
                    value: computed,
                    reads,
                })
            }
            Stmt::Assign { .. } => Ok(Slot::Action),
            Stmt::If(if_stmt) => {
                let arms = arms_of(if_stmt);
                let (taken, condition_reads, _) = self.capture(|ev| ev.choose_arm(&arms))?;
                let branch = match taken {
                    Some(index) => self.scoped(HashMap::new(), |ev| ev.mount_block(&arms[index].body))?,
                    None => Vec::new(),
                };
                Ok(Slot::Conditional {
                    arms,
                    condition_reads,
                    taken,
                    branch,
                })
            }
        }
    }

    fn update_block(&mut self, slots: &mut [Slot], changed: &BTreeSet<String>) -> HostResult<()> {
        for slot in slots {
            match slot {
                Slot::Render {
                    expr,
                    reads,
                    tracked,
                    output,
                } => {
                    if !reads.is_disjoint(changed) {
                        let (value, new_reads, new_tracked) = self.capture(|ev| ev.eval(expr))?;
                        *reads = new_reads;
                        *tracked = new_tracked;
                        *output = value.into();
                    }
                }
                Slot::Binding {
                    name,
                    expr,
                    value,
                    reads,
                } => {
                    if !reads.is_disjoint(changed) {
                        let (computed, new_reads, _) = self.capture(|ev| ev.eval(expr))?;
                        *value = computed;
                        *reads = new_reads;
                    }
                    self.bind(
                        name,
                        Local {
                            value: value.clone(),
                            reads: reads.clone(),
                        },
                    );
                }
                Slot::Conditional {
                    arms,
                    condition_reads,
                    taken,
                    branch,
                } => {
                    let mut remount = false;
                    if !condition_reads.is_disjoint(changed) {
                        let (now_taken, new_reads, _) = self.capture(|ev| ev.choose_arm(arms))?;
                        *condition_reads = new_reads;
                        remount = now_taken != *taken;
                        *taken = now_taken;
                    }
                    if remount {
                        trace!(arm = ?taken, "switching conditional branch");
                        *branch = match *taken {
                            Some(index) => {
                                self.scoped(HashMap::new(), |ev| ev.mount_block(&arms[index].body))?
                            }
                            None => Vec::new(),
                        };
                    } else {
                        self.scoped(HashMap::new(), |ev| ev.update_block(branch, changed))?;
                    }
                }
                Slot::Action => {}
            }
        }
        Ok(())
    }

    fn choose_arm(&mut self, arms: &[Arm]) -> HostResult<Option<usize>> {
        for (index, arm) in arms.iter().enumerate() {
            match &arm.condition {
                None => return Ok(Some(index)),
                Some(condition) => {
                    if self.eval_bool(condition)? {
                        return Ok(Some(index));
                    }
                }
            }
        }
        Ok(None)
    }

    // Expressions

    fn eval_bool(&mut self, expr: &Expr) -> HostResult<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(HostError::type_error("Bool", &other, expr)),
        }
    }

    fn eval(&mut self, expr: &Expr) -> HostResult<Value> {
        match &expr.kind {
            ExprKind::Identifier(name) => self.lookup(name),
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(x) => Value::Float(*x),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Str(s) => Value::Text(s.clone()),
            }),
            ExprKind::Interpolated(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StringPart::Text(literal) => text.push_str(literal),
                        StringPart::Expr(inner) => text.push_str(&self.eval(inner)?.to_string()),
                    }
                }
                Ok(Value::Text(text))
            }
            ExprKind::Call {
                callee,
                arguments,
                trailing,
            } => self.eval_call(expr, callee, arguments, trailing),
            ExprKind::Member { base: None, name } => Ok(Value::Symbol(format!(".{name}"))),
            ExprKind::Member {
                base: Some(base),
                name,
            } => match (self.eval(base)?, name.as_str()) {
                (Value::Symbol(path), _) => Ok(Value::Symbol(format!("{path}.{name}"))),
                (Value::Text(s), "count") => Ok(Value::Int(s.chars().count() as i64)),
                (Value::Text(s), "isEmpty") => Ok(Value::Bool(s.is_empty())),
                (Value::Array(items), "count") => Ok(Value::Int(items.len() as i64)),
                (Value::Array(items), "isEmpty") => Ok(Value::Bool(items.is_empty())),
                _ => Err(HostError::unsupported(expr)),
            },
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(expr, *op, lhs, rhs),
            ExprKind::Unary { op, operand } => match (op, self.eval(operand)?) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                (UnaryOp::Not, other) => Err(HostError::type_error("Bool", &other, expr)),
                (UnaryOp::Neg, other) => Err(HostError::type_error("number", &other, expr)),
            },
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.eval_bool(condition)? {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
            ExprKind::Closure { .. } => Ok(Value::Action),
            ExprKind::Array(elements) => Ok(Value::Array(
                elements
                    .iter()
                    .map(|element| self.eval(element))
                    .collect::<HostResult<_>>()?,
            )),
            ExprKind::Dictionary(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    pairs.push(Value::Tuple(vec![self.eval(key)?, self.eval(value)?]));
                }
                Ok(Value::Array(pairs))
            }
            ExprKind::Tuple(elements) => Ok(Value::Tuple(
                elements
                    .iter()
                    .map(|arg| self.eval(&arg.value))
                    .collect::<HostResult<_>>()?,
            )),
        }
    }

    fn lookup(&mut self, name: &str) -> HostResult<Value> {
        if let Some(local) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            let value = local.value.clone();
            self.reads.extend(local.reads.iter().cloned());
            return Ok(value);
        }
        if let Some(value) = self.state.get(name) {
            self.reads.insert(name.to_string());
            return Ok(value.clone().into());
        }
        // Never changes after mount, so it is not a read
        if let Some(value) = self.constants.get(name) {
            return Ok(value.clone());
        }
        if name.starts_with(|c: char| c.is_uppercase()) {
            return Ok(Value::Symbol(name.to_string()));
        }
        Err(HostError::UnboundIdentifier(name.to_string()))
    }

    fn eval_binary(&mut self, expr: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> HostResult<Value> {
        match op {
            BinaryOp::And => return Ok(Value::Bool(self.eval_bool(lhs)? && self.eval_bool(rhs)?)),
            BinaryOp::Or => return Ok(Value::Bool(self.eval_bool(lhs)? || self.eval_bool(rhs)?)),
            _ => {}
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => return Ok(Value::Bool(left == right)),
            BinaryOp::Ne => return Ok(Value::Bool(left != right)),
            _ => {}
        }

        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => int_op(expr, op, *a, *b),
            (Value::Text(a), Value::Text(b)) => text_op(expr, op, a, b),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(float_op(op, a, b)),
                (None, _) => Err(HostError::type_error("number", &left, expr)),
                (_, None) => Err(HostError::type_error("number", &right, expr)),
            },
        }
    }

    fn eval_call(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        arguments: &[Argument],
        trailing: &[Argument],
    ) -> HostResult<Value> {
        match &callee.kind {
            ExprKind::Member {
                base: Some(base),
                name,
            } if name == self.shim_method => {
                let content = self.eval(base)?;
                let (id, file, line) = self.tracking_arguments(expr, arguments)?;
                self.tracked.push(id.clone());
                Ok(content.track_recomputations(id, file, line).evaluate(self.recorder))
            }
            ExprKind::Member {
                base: Some(base),
                name,
            } => match self.eval(base)? {
                Value::Node(mut element) => {
                    // Trailing closures on modifiers are actions
                    let arguments = self.eval_arguments(arguments)?;
                    element.modifiers.push(Modifier {
                        name: name.clone(),
                        arguments,
                    });
                    Ok(Value::Node(element))
                }
                Value::Symbol(path) => self.construct(format!("{path}.{name}"), arguments, trailing),
                Value::Text(s) if arguments.is_empty() => match name.as_str() {
                    "uppercased" => Ok(Value::Text(s.to_uppercase())),
                    "lowercased" => Ok(Value::Text(s.to_lowercase())),
                    _ => Err(HostError::unsupported(expr)),
                },
                _ => Err(HostError::unsupported(expr)),
            },
            ExprKind::Member { base: None, name } => {
                self.construct(format!(".{name}"), arguments, trailing)
            }
            ExprKind::Identifier(name) => self.construct(name.clone(), arguments, trailing),
            _ => Err(HostError::unsupported(expr)),
        }
    }

    fn tracking_arguments(&self, expr: &Expr, arguments: &[Argument]) -> HostResult<(String, String, u32)> {
        let mut id = None;
        let mut file = None;
        let mut line = None;
        for argument in arguments {
            match (argument.label.as_deref(), &argument.value.kind) {
                (Some("id"), ExprKind::Literal(Literal::Str(s))) => id = Some(s.clone()),
                (Some("file"), ExprKind::Literal(Literal::Str(s))) => file = Some(s.clone()),
                (Some("line"), ExprKind::Literal(Literal::Int(n))) => line = u32::try_from(*n).ok(),
                _ => {}
            }
        }
        match (id, file, line) {
            (Some(id), Some(file), Some(line)) => Ok((id, file, line)),
            _ => Err(HostError::MalformedTrackingCall(expr.to_source())),
        }
    }

    fn eval_arguments(&mut self, arguments: &[Argument]) -> HostResult<Vec<(Option<String>, Value)>> {
        arguments
            .iter()
            .map(|arg| -> HostResult<_> { Ok((arg.label.clone(), self.eval(&arg.value)?)) })
            .collect()
    }

    fn construct(&mut self, kind: String, arguments: &[Argument], trailing: &[Argument]) -> HostResult<Value> {
        let arguments = self.eval_arguments(arguments)?;
        let mut children = Vec::new();

        for closure in trailing {
            let ExprKind::Closure { params, body } = &closure.value.kind else {
                children.push(RenderNode::from(self.eval(&closure.value)?));
                continue;
            };
            // A closure with a parameter over an array argument renders once per item
            match (params.first(), arguments.first()) {
                (Some(param), Some((_, Value::Array(items)))) => {
                    for item in items {
                        let binding = HashMap::from([(
                            param.clone(),
                            Local {
                                value: item.clone(),
                                reads: BTreeSet::new(),
                            },
                        )]);
                        children.extend(self.scoped(binding, |ev| ev.eval_content(body))?);
                    }
                }
                _ => children.extend(self.scoped(HashMap::new(), |ev| ev.eval_content(body))?),
            }
        }

        Ok(Value::Node(Element {
            kind,
            arguments,
            modifiers: Vec::new(),
            children,
        }))
    }

    fn eval_content(&mut self, body: &[Stmt]) -> HostResult<Vec<RenderNode>> {
        let mut nodes = Vec::new();
        for stmt in body {
            match stmt {
                Stmt::Expr(expr) => nodes.push(self.eval(expr)?.into()),
                Stmt::If(if_stmt) => {
                    let arms = arms_of(if_stmt);
                    if let Some(index) = self.choose_arm(&arms)? {
                        let body = &arms[index].body;
                        nodes.extend(self.scoped(HashMap::new(), |ev| ev.eval_content(body))?);
                    }
                }
                Stmt::Let { name, value, .. } => {
                    let (computed, reads, _) = self.capture(|ev| ev.eval(value))?;
                    // The enclosing statement depends on whatever the local read
                    self.reads.extend(reads.iter().cloned());
                    self.bind(name, Local { value: computed, reads });
                }
                Stmt::Assign { .. } => {}
            }
        }
        Ok(nodes)
    }
}

fn int_op(expr: &Expr, op: BinaryOp, a: i64, b: i64) -> HostResult<Value> {
    Ok(match op {
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinaryOp::Div => Value::Int(
            a.checked_div(b)
                .ok_or_else(|| HostError::DivisionByZero(expr.to_source()))?,
        ),
        BinaryOp::Rem => Value::Int(
            a.checked_rem(b)
                .ok_or_else(|| HostError::DivisionByZero(expr.to_source()))?,
        ),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => {
            return Err(HostError::unsupported(expr))
        }
    })
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Value {
    match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Rem => Value::Float(a % b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::And | BinaryOp::Or => Value::Bool(false),
    }
}

fn text_op(expr: &Expr, op: BinaryOp, a: &str, b: &str) -> HostResult<Value> {
    Ok(match op {
        BinaryOp::Add => Value::Text(format!("{a}{b}")),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        _ => return Err(HostError::unsupported(expr)),
    })
}

/// A mounted view on the reference host
pub struct LiveView {
    name: String,
    body: Vec<Stmt>,
    state: IndexMap<String, FieldValue>,
    constants: IndexMap<String, Value>,
    pending: Vec<(String, FieldValue)>,
    slots: Vec<Slot>,
    recorder: Recorder,
    config: HostConfig,
}

impl LiveView {
    /// Seed state from the stored properties and render the body once
    pub fn mount(decl: &ViewDecl, config: HostConfig, recorder: Recorder) -> HostResult<Self> {
        let body = decl
            .property(&config.body_property)
            .and_then(|property| property.accessor.clone())
            .ok_or_else(|| HostError::NoBody(decl.name.clone()))?;

        let mut state = IndexMap::new();
        let mut constants = IndexMap::new();
        let (no_state, no_constants) = (IndexMap::new(), IndexMap::new());
        for property in decl.properties().filter(|p| p.is_stored() && !p.is_static) {
            let declared = property.ty.as_deref();
            let evaluated = property.initializer.as_ref().and_then(|init| {
                Evaluator::new(&no_state, &no_constants, &recorder, &config.shim_method)
                    .eval(init)
                    .ok()
            });
            let initial = evaluated
                .clone()
                .and_then(Value::into_field_value)
                .and_then(|value| value.conform_to(declared))
                .or_else(|| declared.and_then(FieldValue::default_for));

            match (initial, evaluated) {
                (Some(value), _) => {
                    state.insert(property.name.clone(), value);
                }
                // Readable by the body, but not a field the harness can drive
                (None, Some(value)) => {
                    constants.insert(property.name.clone(), value);
                }
                (None, None) => debug!(
                    view = %decl.name,
                    field = %property.name,
                    "field has no value the host can represent"
                ),
            }
        }

        let mut view = Self {
            name: decl.name.clone(),
            body,
            state,
            constants,
            pending: Vec::new(),
            slots: Vec::new(),
            recorder,
            config,
        };
        view.render_all()?;
        debug!(view = %view.name, fields = view.state.len(), "mounted view");
        Ok(view)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Changes queued by `set_field` and not yet applied
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// The current rendered output
    pub fn tree(&self) -> RenderNode {
        RenderNode::Group(collect_nodes(&self.slots))
    }

    /// Fields read by the last evaluation of tracked id `id`
    pub fn reads_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        find_reads(&self.slots, id)
    }

    fn render_all(&mut self) -> HostResult<()> {
        let mut ev = Evaluator::new(
            &self.state,
            &self.constants,
            &self.recorder,
            &self.config.shim_method,
        );
        let slots = ev.scoped(HashMap::new(), |ev| ev.mount_block(&self.body))?;
        self.slots = slots;
        Ok(())
    }

    fn apply_pending(&mut self) -> HostResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut changed = BTreeSet::new();
        for (name, value) in self.pending.drain(..) {
            self.state.insert(name.clone(), value);
            changed.insert(name);
        }
        debug!(view = %self.name, changed = ?changed, strategy = ?self.config.strategy, "applying state changes");

        match self.config.strategy {
            InvalidationStrategy::WholeBody => self.render_all(),
            InvalidationStrategy::FineGrained => {
                let mut ev = Evaluator::new(
                    &self.state,
                    &self.constants,
                    &self.recorder,
                    &self.config.shim_method,
                );
                ev.scoped(HashMap::new(), |ev| ev.update_block(&mut self.slots, &changed))
            }
        }
    }
}

fn collect_nodes(slots: &[Slot]) -> Vec<RenderNode> {
    slots
        .iter()
        .filter_map(|slot| match slot {
            Slot::Render { output, .. } => Some(output.clone()),
            Slot::Conditional { branch, .. } => Some(RenderNode::Group(collect_nodes(branch))),
            Slot::Binding { .. } | Slot::Action => None,
        })
        .collect()
}

fn find_reads<'s>(slots: &'s [Slot], id: &str) -> Option<&'s BTreeSet<String>> {
    slots.iter().find_map(|slot| match slot {
        Slot::Render { tracked, reads, .. } if tracked.iter().any(|t| t == id) => Some(reads),
        Slot::Conditional { branch, .. } => find_reads(branch, id),
        _ => None,
    })
}

impl ReactiveState for LiveView {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.state.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), StateError> {
        let current = self
            .state
            .get(name)
            .ok_or_else(|| StateError::UnknownField(name.to_string()))?;
        if !current.same_type(&value) {
            return Err(StateError::TypeMismatch {
                field: name.to_string(),
                expected: current.type_name(),
                found: value.type_name(),
            });
        }
        self.pending.push((name.to_string(), value));
        Ok(())
    }
}

impl LiveHost for LiveView {
    fn settle(&mut self, wait: Duration) -> Result<(), HostError> {
        self.apply_pending()?;
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        Ok(())
    }
}
