//! Shorthand constructors. Result types follow the usual typing rules; use the
//! node structs directly when a different type is needed.
use super::*;
use crate::ty::Ty;
use crate::value::Value;

pub fn constant(ty: Ty, value: Value) -> Expr {
    Expr::Constant { ty, value }
}

pub fn int(v: i32) -> Expr {
    constant(Ty::INT, Value::I32(v))
}

pub fn long(v: i64) -> Expr {
    constant(Ty::LONG, Value::I64(v))
}

pub fn boolean(v: bool) -> Expr {
    constant(Ty::BOOL, Value::Bool(v))
}

pub fn string(v: &str) -> Expr {
    constant(Ty::STRING, Value::string(v))
}

pub fn default(ty: Ty) -> Expr {
    Expr::Default(ty)
}

// ------------------------------ operators --------------------------------- //

fn unary_node(op: UnaryOp, operand: Option<Expr>, ty: Ty) -> Expr {
    Expr::Unary(Box::new(Unary { op, operand, ty, checked: false, method: None }))
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    let ty = match op {
        UnaryOp::IsTrue | UnaryOp::IsFalse => Ty::BOOL,
        UnaryOp::ArrayLength => Ty::INT,
        UnaryOp::Quote => Ty::generic("Expression", vec![operand.ty()]),
        _ => operand.ty(),
    };
    unary_node(op, Some(operand), ty)
}

/// `Convert`, `TypeAs` and `Unbox` take their target type explicitly.
pub fn convert(op: UnaryOp, operand: Expr, ty: Ty) -> Expr {
    unary_node(op, Some(operand), ty)
}

/// `throw e`, or a rethrow when `operand` is `None`.
pub fn throw(operand: Option<Expr>, ty: Ty) -> Expr {
    unary_node(UnaryOp::Throw, operand, ty)
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let ty = if op.is_comparison() || op.is_logical() {
        Ty::BOOL
    } else {
        match (op, left.ty()) {
            (BinaryOp::ArrayIndex, Ty::Array(elem)) => *elem,
            (BinaryOp::Coalesce, Ty::Nullable(inner)) if *inner == right.ty() => *inner,
            (BinaryOp::Coalesce, _) => right.ty(),
            (_, ty) => ty,
        }
    };
    Expr::Binary(Box::new(Binary {
        op,
        left,
        right,
        ty,
        checked: false,
        lifted_to_null: false,
        method: None,
        conversion: None,
    }))
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    binary(BinaryOp::Assign, target, value)
}

/// Marks an arithmetic node as overflow-checked.
pub fn checked(expr: Expr) -> Expr {
    match expr {
        Expr::Unary(mut u) => {
            u.checked = true;
            Expr::Unary(u)
        }
        Expr::Binary(mut b) => {
            b.checked = true;
            Expr::Binary(b)
        }
        other => other,
    }
}

pub fn type_test(op: TypeTestOp, expr: Expr, operand: Ty) -> Expr {
    Expr::TypeTest(Box::new(TypeTest { op, expr, operand }))
}

pub fn condition(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
    let ty = if_true.ty();
    Expr::Conditional(Box::new(Conditional { test, if_true, if_false, ty }))
}

// ------------------------- members and calls ------------------------------ //

pub fn member(expr: Option<Expr>, member: MemberRef) -> Expr {
    Expr::MemberAccess(Box::new(MemberAccess { expr, member }))
}

pub fn call(object: Option<Expr>, method: MethodRef, arguments: Vec<Expr>) -> Expr {
    Expr::Call(Box::new(Call { object, method, arguments }))
}

/// Invokes a delegate-typed expression; the result is the last `Func` argument.
pub fn invoke(expr: Expr, arguments: Vec<Expr>) -> Expr {
    let ty = match expr.ty() {
        Ty::Named { name, mut args } if name == "Func" && !args.is_empty() => args.pop().unwrap_or(Ty::VOID),
        _ => Ty::VOID,
    };
    Expr::Invoke(Box::new(Invoke { expr, arguments, ty }))
}

pub fn lambda(parameters: Vec<Parameter>, body: Expr) -> Expr {
    let ret = body.ty();
    Expr::Lambda(Box::new(Lambda { name: None, parameters, body, ret, tail_call: false }))
}

pub fn new(constructor: ConstructorRef, arguments: Vec<Expr>) -> Expr {
    let ty = constructor.declaring.clone();
    Expr::New(Box::new(New { ty, constructor: Some(constructor), arguments }))
}

pub fn member_init(new: Expr, bindings: Vec<MemberBinding>) -> Expr {
    Expr::MemberInit(Box::new(MemberInit { new, bindings }))
}

pub fn list_init(new: Expr, initializers: Vec<ElementInit>) -> Expr {
    Expr::ListInit(Box::new(ListInit { new, initializers }))
}

pub fn element_init(add_method: MethodRef, arguments: Vec<Expr>) -> ElementInit {
    ElementInit { add_method, arguments }
}

pub fn new_array(elem: Ty, items: Vec<Expr>) -> Expr {
    Expr::NewArrayInit { elem, items }
}

pub fn new_array_bounds(elem: Ty, bounds: Vec<Expr>) -> Expr {
    Expr::NewArrayBounds { elem, bounds }
}

pub fn index(object: Expr, indexer: Option<MemberRef>, arguments: Vec<Expr>, ty: Ty) -> Expr {
    Expr::Index(Box::new(Index { object, indexer, arguments, ty }))
}

// ----------------------------- control flow ------------------------------- //

/// The block's type is the type of its last expression (`void` when empty).
pub fn block(variables: Vec<Parameter>, expressions: Vec<Expr>) -> Expr {
    let ty = expressions.last().map(Expr::ty).unwrap_or(Ty::VOID);
    Expr::Block(Box::new(Block { ty, variables, expressions }))
}

pub fn loop_(body: Expr, break_label: Option<LabelTarget>, continue_label: Option<LabelTarget>) -> Expr {
    Expr::Loop(Box::new(Loop { body, break_label, continue_label }))
}

pub fn goto(kind: GotoKind, target: LabelTarget, value: Option<Expr>) -> Expr {
    Expr::Goto(Box::new(Goto { kind, target, value, ty: Ty::VOID }))
}

pub fn label(target: LabelTarget, default: Option<Expr>) -> Expr {
    Expr::Label(Box::new(Label { target, default }))
}

pub fn case(test_values: Vec<Expr>, body: Expr) -> SwitchCase {
    SwitchCase { test_values, body }
}

pub fn switch(value: Expr, cases: Vec<SwitchCase>, default: Option<Expr>) -> Expr {
    let ty = cases
        .first()
        .map(|c| c.body.ty())
        .or_else(|| default.as_ref().map(Expr::ty))
        .unwrap_or(Ty::VOID);
    Expr::Switch(Box::new(Switch { ty, value, cases, default, comparison: None }))
}

pub fn catch_block(test: Ty, variable: Option<Parameter>, filter: Option<Expr>, body: Expr) -> CatchBlock {
    CatchBlock { test, variable, filter, body }
}

pub fn try_catch(body: Expr, handlers: Vec<CatchBlock>) -> Expr {
    let ty = body.ty();
    Expr::Try(Box::new(Try { ty, body, handlers, finally: None, fault: None }))
}

pub fn try_finally(body: Expr, handlers: Vec<CatchBlock>, finally: Expr) -> Expr {
    let ty = body.ty();
    Expr::Try(Box::new(Try { ty, body, handlers, finally: Some(finally), fault: None }))
}

pub fn try_fault(body: Expr, fault: Expr) -> Expr {
    let ty = body.ty();
    Expr::Try(Box::new(Try { ty, body, handlers: Vec::new(), finally: None, fault: Some(fault) }))
}
