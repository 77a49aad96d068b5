//! A named corpus of trees covering every node kind, plus the registry that
//! resolves the types they mention.
use crate::ast::build::*;
use crate::ast::{
    BinaryOp, ConstructorRef, Expr, GotoKind, LabelTarget, MemberBinding, MemberRef, MethodRef, Parameter, TypeTestOp,
    UnaryOp,
};
use crate::ty::{EnumDef, IntKind, Prim, RecordDef, Ty, TypeRegistry};
use crate::value::{EnumValue, RecordValue, Value};
use indexmap::IndexMap;

pub struct Sample {
    pub name: &'static str,
    pub tree: Expr,
}

impl Sample {
    fn new(name: &'static str, tree: Expr) -> Self {
        Self { name, tree }
    }
}

pub fn registry() -> TypeRegistry {
    TypeRegistry::default()
        .with_class("Math", Some(0))
        .with_class("Point", Some(0))
        .with_class("Console", Some(0))
        .with_enum(EnumDef::new("Color", IntKind::Int, false).member("Red", 0).member("Green", 1))
        .with_record(RecordDef::new("Size").field("Width", Ty::INT).field("Height", Ty::INT))
}

fn color(raw: i128) -> Expr {
    constant(Ty::named("Color"), Value::Enum(EnumValue { ty: "Color".into(), raw }))
}

pub fn corpus() -> Vec<Sample> {
    let x = Parameter::new("x", Ty::INT);
    let s = Parameter::by_ref("s", Ty::STRING);
    let e = Parameter::new("e", Ty::named("Exception"));
    let brk = LabelTarget::typed("break", Ty::INT);
    let cont = LabelTarget::new("continue");
    let ret = LabelTarget::typed("ret", Ty::INT);
    let point = Ty::named("Point");
    let list = Ty::generic("List", vec![Ty::INT]);
    let add_method = MethodRef::new(list.clone(), "Add", vec![Ty::INT], Ty::VOID);
    let writeline = MethodRef::new(Ty::named("Console"), "WriteLine", vec![Ty::STRING], Ty::VOID);

    let mut coalesce = binary(BinaryOp::Coalesce, constant(Ty::nullable(Ty::INT), Value::Null), int(0));
    if let Expr::Binary(b) = &mut coalesce {
        let y = Parameter::new("y", Ty::INT);
        b.conversion = Some(lambda(vec![y.clone()], y.expr()));
    }
    let mut lifted = binary(BinaryOp::Equal, constant(Ty::nullable(Ty::INT), Value::I32(1)), default(Ty::nullable(Ty::INT)));
    if let Expr::Binary(b) = &mut lifted {
        b.lifted_to_null = true;
        b.ty = Ty::nullable(Ty::BOOL);
    }
    let size = Value::Record(RecordValue {
        ty: "Size".into(),
        fields: IndexMap::from([("Width".to_string(), Value::int(3)), ("Height".to_string(), Value::int(4))]),
    });
    let mut named = lambda(vec![], int(1));
    if let Expr::Lambda(l) = &mut named {
        l.name = Some("one".into());
        l.tail_call = true;
    }

    vec![
        Sample::new("add", add(int(2), int(3))),
        Sample::new("checked-multiply", checked(binary(BinaryOp::Multiply, long(1 << 60), long(3)))),
        Sample::new("coalesce-with-conversion", coalesce),
        Sample::new("lifted-equal", lifted),
        Sample::new("named-lambda", named),
        Sample::new("not", unary(UnaryOp::Not, boolean(true))),
        Sample::new("checked-negate", checked(unary(UnaryOp::Negate, int(5)))),
        Sample::new("convert", convert(UnaryOp::Convert, int(1), Ty::DOUBLE)),
        Sample::new("type-as", convert(UnaryOp::TypeAs, string("s"), Ty::OBJECT)),
        Sample::new("rethrow", throw(None, Ty::VOID)),
        Sample::new(
            "throw-new",
            throw(Some(new(ConstructorRef::new(Ty::named("Exception"), vec![]), vec![])), Ty::VOID),
        ),
        Sample::new("array-length", unary(UnaryOp::ArrayLength, new_array(Ty::INT, vec![int(1), int(2)]))),
        Sample::new("type-is", type_test(TypeTestOp::TypeIs, string("s"), Ty::STRING)),
        Sample::new("type-equal", type_test(TypeTestOp::TypeEqual, string("s"), Ty::OBJECT)),
        Sample::new("conditional", condition(boolean(false), string("a"), string("b"))),
        Sample::new("static-field", member(None, MemberRef::field(point.clone(), "Origin", point.clone()))),
        Sample::new(
            "instance-property",
            member(Some(default(point.clone())), MemberRef::property(point.clone(), "X", Ty::INT)),
        ),
        Sample::new("static-call", call(None, writeline.clone(), vec![string("hi")])),
        Sample::new(
            "instance-call",
            call(Some(constant(list.clone(), Value::Null)), add_method.clone(), vec![int(1)]),
        ),
        Sample::new("shared-parameter", lambda(vec![x.clone(), s.clone()], add(x.expr(), x.expr()))),
        Sample::new("invoke", invoke(lambda(vec![x.clone()], x.expr()), vec![int(4)])),
        Sample::new(
            "member-init",
            member_init(
                new(ConstructorRef::new(point.clone(), vec![]), vec![]),
                vec![MemberBinding::Assignment { member: MemberRef::field(point.clone(), "X", Ty::INT), expr: int(1) }],
            ),
        ),
        Sample::new(
            "member-init-nested",
            member_init(
                new(ConstructorRef::new(point.clone(), vec![]), vec![]),
                vec![MemberBinding::MemberBinding {
                    member: MemberRef::property(point.clone(), "Corner", point.clone()),
                    bindings: vec![
                        MemberBinding::Assignment { member: MemberRef::field(point.clone(), "X", Ty::INT), expr: int(1) },
                        MemberBinding::Assignment { member: MemberRef::field(point.clone(), "Y", Ty::INT), expr: int(2) },
                        MemberBinding::MemberBinding {
                            member: MemberRef::property(point.clone(), "Origin", point.clone()),
                            bindings: vec![MemberBinding::Assignment {
                                member: MemberRef::field(point.clone(), "X", Ty::INT),
                                expr: int(3),
                            }],
                        },
                    ],
                }],
            ),
        ),
        Sample::new(
            "member-init-list-bindings",
            member_init(
                new(ConstructorRef::new(point.clone(), vec![]), vec![]),
                vec![
                    MemberBinding::ListBinding { member: MemberRef::property(point.clone(), "Empty", list.clone()), initializers: vec![] },
                    MemberBinding::ListBinding {
                        member: MemberRef::property(point.clone(), "Single", list.clone()),
                        initializers: vec![element_init(add_method.clone(), vec![int(1)])],
                    },
                    MemberBinding::ListBinding {
                        member: MemberRef::property(point.clone(), "Many", list.clone()),
                        initializers: vec![
                            element_init(add_method.clone(), vec![int(1)]),
                            element_init(add_method.clone(), vec![add(int(2), int(3))]),
                            element_init(add_method.clone(), vec![int(4)]),
                        ],
                    },
                ],
            ),
        ),
        Sample::new(
            "list-init",
            list_init(
                new(ConstructorRef::new(list.clone(), vec![]), vec![]),
                vec![element_init(add_method.clone(), vec![int(1)]), element_init(add_method, vec![int(2)])],
            ),
        ),
        Sample::new("new-array-bounds", new_array_bounds(Ty::DOUBLE, vec![int(3)])),
        Sample::new("index", index(constant(Ty::array(Ty::INT), Value::Null), None, vec![int(0)], Ty::INT)),
        Sample::new("block", block(vec![x.clone()], vec![assign(x.expr(), int(1)), x.expr()])),
        Sample::new(
            "loop",
            loop_(
                block(
                    vec![],
                    vec![goto(GotoKind::Continue, cont.clone(), None), goto(GotoKind::Break, brk.clone(), Some(int(7)))],
                ),
                Some(brk),
                Some(cont),
            ),
        ),
        Sample::new(
            "return-label",
            block(vec![], vec![goto(GotoKind::Return, ret.clone(), Some(int(1))), label(ret, Some(int(0)))]),
        ),
        Sample::new("switch", switch(color(1), vec![case(vec![color(0)], string("red"))], Some(string("other")))),
        Sample::new(
            "try-catch-finally",
            try_finally(
                call(None, writeline.clone(), vec![string("body")]),
                vec![catch_block(
                    Ty::named("Exception"),
                    Some(e),
                    Some(boolean(true)),
                    call(None, writeline.clone(), vec![string("caught")]),
                )],
                call(None, writeline, vec![string("finally")]),
            ),
        ),
        Sample::new("try-fault", try_fault(int(1), default(Ty::VOID))),
        Sample::new("record-constant", constant(Ty::named("Size"), size)),
        Sample::new("list-constant", constant(list.clone(), Value::seq(list, vec![Value::int(1), Value::int(2)]))),
        Sample::new("ulong-max", constant(Ty::Prim(Prim::ULong), Value::U64(u64::MAX))),
    ]
}
