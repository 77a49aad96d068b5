//! The expression/statement tree.
//!
//! [`Expr`] is a closed set of node kinds. Every node answers its result type
//! through [`Expr::ty`] and lists its immediate children, in document order,
//! through [`Expr::children`]. That order is part of the wire format: the
//! encoder emits children in it and the decoder reads them back in it.
//!
//! [`Parameter`] and [`LabelTarget`] are shared handles. Cloning one keeps the
//! same identity (`ptr_eq`); `==` compares structurally.
pub mod build;
pub mod member;

use std::sync::Arc;

pub use member::{ConstructorRef, ElementInit, MemberBinding, MemberRef, MethodRef};

use crate::refs::RefKey;
use crate::ty::Ty;
use crate::value::Value;

// -------------------------------- Ops ------------------------------------- //

macro_rules! tagged_ops {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Document tag of the node.
            pub fn tag(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn from_tag(tag: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|op| op.tag() == tag)
            }
        }
    };
}

tagged_ops!(UnaryOp {
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
    IsTrue,
    IsFalse,
    Convert,
    TypeAs,
    ArrayLength,
    Quote,
    Throw,
    Unbox,
    Increment,
    Decrement,
    PreIncrementAssign,
    PreDecrementAssign,
    PostIncrementAssign,
    PostDecrementAssign,
});

tagged_ops!(BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    And,
    Or,
    ExclusiveOr,
    AndAlso,
    OrElse,
    LeftShift,
    RightShift,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
    ArrayIndex,
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
});

tagged_ops!(TypeTestOp { TypeIs, TypeEqual });

tagged_ops!(
    /// Flavor of an unconditional jump. All four share the `Goto` tag.
    GotoKind { Goto, Return, Break, Continue }
);

impl UnaryOp {
    /// Only `Throw` may omit its operand (a rethrow).
    pub fn operand_optional(self) -> bool {
        self == UnaryOp::Throw
    }

    pub fn is_predicate(self) -> bool {
        matches!(self, UnaryOp::IsTrue | UnaryOp::IsFalse)
    }
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Equal | NotEqual | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }
}

// --------------------------- Shared entities ------------------------------ //

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDef {
    pub name: Option<String>,
    pub ty: Ty,
    pub by_ref: bool,
}

/// A bound variable: lambda parameter, block local or catch variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter(Arc<ParameterDef>);

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self::from_def(ParameterDef { name: Some(name.into()), ty, by_ref: false })
    }

    pub fn anonymous(ty: Ty) -> Self {
        Self::from_def(ParameterDef { name: None, ty, by_ref: false })
    }

    pub fn by_ref(name: impl Into<String>, ty: Ty) -> Self {
        Self::from_def(ParameterDef { name: Some(name.into()), ty, by_ref: true })
    }

    pub fn from_def(def: ParameterDef) -> Self {
        Self(Arc::new(def))
    }

    pub fn def(&self) -> &ParameterDef {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn key(&self) -> RefKey {
        RefKey::parameter(Arc::as_ptr(&self.0) as usize)
    }

    pub fn expr(&self) -> Expr {
        Expr::Parameter(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDef {
    pub name: Option<String>,
    /// Type of the value carried by jumps to this label; `void` for none.
    pub ty: Ty,
}

/// A jump destination shared by `Goto`, `Label` and `Loop` nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTarget(Arc<LabelDef>);

impl LabelTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_def(LabelDef { name: Some(name.into()), ty: Ty::VOID })
    }

    pub fn typed(name: impl Into<String>, ty: Ty) -> Self {
        Self::from_def(LabelDef { name: Some(name.into()), ty })
    }

    pub fn from_def(def: LabelDef) -> Self {
        Self(Arc::new(def))
    }

    pub fn def(&self) -> &LabelDef {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn key(&self) -> RefKey {
        RefKey::label(Arc::as_ptr(&self.0) as usize)
    }
}

// -------------------------------- Nodes ----------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant { ty: Ty, value: Value },
    Parameter(Parameter),
    Default(Ty),
    Unary(Box<Unary>),
    Binary(Box<Binary>),
    TypeTest(Box<TypeTest>),
    Conditional(Box<Conditional>),
    MemberAccess(Box<MemberAccess>),
    Call(Box<Call>),
    Invoke(Box<Invoke>),
    Lambda(Box<Lambda>),
    New(Box<New>),
    MemberInit(Box<MemberInit>),
    ListInit(Box<ListInit>),
    NewArrayInit { elem: Ty, items: Vec<Expr> },
    NewArrayBounds { elem: Ty, bounds: Vec<Expr> },
    Index(Box<Index>),
    Block(Box<Block>),
    Loop(Box<Loop>),
    Goto(Box<Goto>),
    Label(Box<Label>),
    Switch(Box<Switch>),
    Try(Box<Try>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    /// `None` only for a rethrow.
    pub operand: Option<Expr>,
    pub ty: Ty,
    pub checked: bool,
    pub method: Option<MethodRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
    pub ty: Ty,
    pub checked: bool,
    pub lifted_to_null: bool,
    pub method: Option<MethodRef>,
    /// A `Lambda` applied to the result (coalesce and compound assignment).
    pub conversion: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeTest {
    pub op: TypeTestOp,
    pub expr: Expr,
    pub operand: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub test: Expr,
    pub if_true: Expr,
    pub if_false: Expr,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccess {
    /// `None` for a static member.
    pub expr: Option<Expr>,
    pub member: MemberRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// `None` for a static method.
    pub object: Option<Expr>,
    pub method: MethodRef,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoke {
    pub expr: Expr,
    pub arguments: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub body: Expr,
    pub ret: Ty,
    pub tail_call: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct New {
    pub ty: Ty,
    /// `None` for the implicit default constructor of a value type.
    pub constructor: Option<ConstructorRef>,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberInit {
    /// Always an `Expr::New`.
    pub new: Expr,
    pub bindings: Vec<MemberBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListInit {
    /// Always an `Expr::New`.
    pub new: Expr,
    pub initializers: Vec<ElementInit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub object: Expr,
    pub indexer: Option<MemberRef>,
    pub arguments: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub ty: Ty,
    pub variables: Vec<Parameter>,
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub body: Expr,
    pub break_label: Option<LabelTarget>,
    pub continue_label: Option<LabelTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Goto {
    pub kind: GotoKind,
    pub target: LabelTarget,
    pub value: Option<Expr>,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub target: LabelTarget,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test_values: Vec<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub ty: Ty,
    pub value: Expr,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Expr>,
    pub comparison: Option<MethodRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchBlock {
    /// Exception type caught.
    pub test: Ty,
    pub variable: Option<Parameter>,
    pub filter: Option<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Try {
    pub ty: Ty,
    pub body: Expr,
    pub handlers: Vec<CatchBlock>,
    pub finally: Option<Expr>,
    pub fault: Option<Expr>,
}

// ------------------------------ Children ---------------------------------- //

/// One immediate child of a node, as the traversal sees it.
#[derive(Debug, Clone, Copy)]
pub enum Child<'a> {
    Expr(&'a Expr),
    Param(&'a Parameter),
    Label(&'a LabelTarget),
}

fn binding_children<'a>(binding: &'a MemberBinding, out: &mut Vec<Child<'a>>) {
    match binding {
        MemberBinding::Assignment { expr, .. } => out.push(Child::Expr(expr)),
        MemberBinding::MemberBinding { bindings, .. } => {
            bindings.iter().for_each(|b| binding_children(b, out));
        }
        MemberBinding::ListBinding { initializers, .. } => {
            out.extend(initializers.iter().flat_map(|i| i.arguments.iter().map(Child::Expr)));
        }
    }
}

impl Expr {
    /// Document tag of this node.
    pub fn tag(&self) -> &'static str {
        match self {
            Expr::Constant { .. } => "Constant",
            Expr::Parameter(_) => "Parameter",
            Expr::Default(_) => "Default",
            Expr::Unary(u) => u.op.tag(),
            Expr::Binary(b) => b.op.tag(),
            Expr::TypeTest(t) => t.op.tag(),
            Expr::Conditional(_) => "Conditional",
            Expr::MemberAccess(_) => "MemberAccess",
            Expr::Call(_) => "Call",
            Expr::Invoke(_) => "Invoke",
            Expr::Lambda(_) => "Lambda",
            Expr::New(_) => "New",
            Expr::MemberInit(_) => "MemberInit",
            Expr::ListInit(_) => "ListInit",
            Expr::NewArrayInit { .. } => "NewArrayInit",
            Expr::NewArrayBounds { .. } => "NewArrayBounds",
            Expr::Index(_) => "Index",
            Expr::Block(_) => "Block",
            Expr::Loop(_) => "Loop",
            Expr::Goto(_) => "Goto",
            Expr::Label(_) => "Label",
            Expr::Switch(_) => "Switch",
            Expr::Try(_) => "Try",
        }
    }

    /// Result type of the node.
    pub fn ty(&self) -> Ty {
        match self {
            Expr::Constant { ty, .. } | Expr::Default(ty) => ty.clone(),
            Expr::Parameter(p) => p.ty().clone(),
            Expr::Unary(u) => u.ty.clone(),
            Expr::Binary(b) => b.ty.clone(),
            Expr::TypeTest(_) => Ty::BOOL,
            Expr::Conditional(c) => c.ty.clone(),
            Expr::MemberAccess(m) => m.member.ty().clone(),
            Expr::Call(c) => c.method.ret.clone(),
            Expr::Invoke(i) => i.ty.clone(),
            Expr::Lambda(l) => l.delegate_ty(),
            Expr::New(n) => n.ty.clone(),
            Expr::MemberInit(m) => m.new.ty(),
            Expr::ListInit(l) => l.new.ty(),
            Expr::NewArrayInit { elem, .. } | Expr::NewArrayBounds { elem, .. } => Ty::array(elem.clone()),
            Expr::Index(i) => i.ty.clone(),
            Expr::Block(b) => b.ty.clone(),
            Expr::Loop(l) => l.break_label.as_ref().map(|t| t.ty().clone()).unwrap_or(Ty::VOID),
            Expr::Goto(g) => g.ty.clone(),
            Expr::Label(l) => l.target.ty().clone(),
            Expr::Switch(s) => s.ty.clone(),
            Expr::Try(t) => t.ty.clone(),
        }
    }

    /// Immediate children in document order.
    pub fn children(&self) -> Vec<Child<'_>> {
        let mut out = Vec::new();
        match self {
            Expr::Constant { .. } | Expr::Parameter(_) | Expr::Default(_) => {}
            Expr::Unary(u) => out.extend(u.operand.iter().map(Child::Expr)),
            Expr::Binary(b) => {
                out.push(Child::Expr(&b.left));
                out.push(Child::Expr(&b.right));
                out.extend(b.conversion.iter().map(Child::Expr));
            }
            Expr::TypeTest(t) => out.push(Child::Expr(&t.expr)),
            Expr::Conditional(c) => {
                out.extend([Child::Expr(&c.test), Child::Expr(&c.if_true), Child::Expr(&c.if_false)]);
            }
            Expr::MemberAccess(m) => out.extend(m.expr.iter().map(Child::Expr)),
            Expr::Call(c) => {
                out.extend(c.object.iter().map(Child::Expr));
                out.extend(c.arguments.iter().map(Child::Expr));
            }
            Expr::Invoke(i) => {
                out.push(Child::Expr(&i.expr));
                out.extend(i.arguments.iter().map(Child::Expr));
            }
            Expr::Lambda(l) => {
                out.extend(l.parameters.iter().map(Child::Param));
                out.push(Child::Expr(&l.body));
            }
            Expr::New(n) => out.extend(n.arguments.iter().map(Child::Expr)),
            Expr::MemberInit(m) => {
                out.push(Child::Expr(&m.new));
                m.bindings.iter().for_each(|b| binding_children(b, &mut out));
            }
            Expr::ListInit(l) => {
                out.push(Child::Expr(&l.new));
                out.extend(l.initializers.iter().flat_map(|i| i.arguments.iter().map(Child::Expr)));
            }
            Expr::NewArrayInit { items, .. } => out.extend(items.iter().map(Child::Expr)),
            Expr::NewArrayBounds { bounds, .. } => out.extend(bounds.iter().map(Child::Expr)),
            Expr::Index(i) => {
                out.push(Child::Expr(&i.object));
                out.extend(i.arguments.iter().map(Child::Expr));
            }
            Expr::Block(b) => {
                out.extend(b.variables.iter().map(Child::Param));
                out.extend(b.expressions.iter().map(Child::Expr));
            }
            Expr::Loop(l) => {
                out.push(Child::Expr(&l.body));
                out.extend(l.break_label.iter().map(Child::Label));
                out.extend(l.continue_label.iter().map(Child::Label));
            }
            Expr::Goto(g) => {
                out.push(Child::Label(&g.target));
                out.extend(g.value.iter().map(Child::Expr));
            }
            Expr::Label(l) => {
                out.push(Child::Label(&l.target));
                out.extend(l.default.iter().map(Child::Expr));
            }
            Expr::Switch(s) => {
                out.push(Child::Expr(&s.value));
                for case in &s.cases {
                    out.extend(case.test_values.iter().map(Child::Expr));
                    out.push(Child::Expr(&case.body));
                }
                out.extend(s.default.iter().map(Child::Expr));
            }
            Expr::Try(t) => {
                out.push(Child::Expr(&t.body));
                for h in &t.handlers {
                    out.extend(h.variable.iter().map(Child::Param));
                    out.extend(h.filter.iter().map(Child::Expr));
                    out.push(Child::Expr(&h.body));
                }
                out.extend(t.finally.iter().map(Child::Expr));
                out.extend(t.fault.iter().map(Child::Expr));
            }
        }
        out
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            Expr::Parameter(p) => Some(p),
            _ => None,
        }
    }
}

impl Lambda {
    /// `Func<..>` or `Action<..>` over the parameter types.
    pub fn delegate_ty(&self) -> Ty {
        Ty::func(self.parameters.iter().map(|p| p.ty().clone()).collect(), self.ret.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn op_tags_round_trip() {
        for op in UnaryOp::ALL {
            assert_eq!(UnaryOp::from_tag(op.tag()), Some(*op));
        }
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_tag(op.tag()), Some(*op));
        }
        assert_eq!(BinaryOp::ALL.len(), 26);
        assert_eq!(UnaryOp::ALL.len(), 18);
        assert_eq!(BinaryOp::from_tag("Frobnicate"), None);
    }

    #[test]
    fn parameter_identity_is_pointer_identity() {
        let a = Parameter::new("x", Ty::INT);
        let b = Parameter::new("x", Ty::INT);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
    }

    #[test]
    fn binary_children_order_is_left_right_conversion() {
        let x = Parameter::new("x", Ty::nullable(Ty::INT));
        let conv = lambda(vec![x.clone()], x.expr());
        let node = Expr::Binary(Box::new(Binary {
            op: BinaryOp::Coalesce,
            left: constant(Ty::nullable(Ty::INT), Value::Null),
            right: int(2),
            ty: Ty::INT,
            checked: false,
            lifted_to_null: false,
            method: None,
            conversion: Some(conv),
        }));
        let tags: Vec<&str> = node
            .children()
            .iter()
            .map(|c| match c {
                Child::Expr(e) => e.tag(),
                _ => "?",
            })
            .collect();
        assert_eq!(tags, ["Constant", "Constant", "Lambda"]);
    }

    #[test]
    fn switch_and_try_flatten_in_document_order() {
        let sw = switch(
            int(0),
            vec![case(vec![int(1), int(2)], string("a")), case(vec![int(3)], string("b"))],
            Some(string("z")),
        );
        assert_eq!(sw.children().len(), 1 + 3 + 1 + 2 + 1);

        let e = Parameter::new("e", Ty::named("Exception"));
        let t = try_catch(
            default(Ty::VOID),
            vec![catch_block(Ty::named("Exception"), Some(e.clone()), Some(constant(Ty::BOOL, Value::Bool(true))), default(Ty::VOID))],
        );
        let kinds: Vec<&str> = t
            .children()
            .iter()
            .map(|c| match c {
                Child::Expr(e) => e.tag(),
                Child::Param(_) => "param",
                Child::Label(_) => "label",
            })
            .collect();
        assert_eq!(kinds, ["Default", "param", "Constant", "Default"]);
    }

    #[test]
    fn result_types_are_implied_where_fixed() {
        assert_eq!(binary(BinaryOp::LessThan, int(1), int(2)).ty(), Ty::BOOL);
        assert_eq!(binary(BinaryOp::Add, int(1), int(2)).ty(), Ty::INT);
        let x = Parameter::new("x", Ty::INT);
        assert_eq!(lambda(vec![x.clone()], x.expr()).ty(), Ty::generic("Func", vec![Ty::INT, Ty::INT]));
        assert_eq!(new_array(Ty::STRING, vec![]).ty(), Ty::array(Ty::STRING));
        let brk = LabelTarget::typed("done", Ty::INT);
        assert_eq!(loop_(default(Ty::VOID), Some(brk), None).ty(), Ty::INT);
    }
}
