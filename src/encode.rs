//! Tree → document.
//!
//! Post-order walk with an explicit output stack. Every child pushes exactly
//! one fragment; once a node's children are done, the node pops exactly as
//! many fragments as [`Expr::children`] lists, assembles its own fragment from
//! them and pushes it. The depth delta is checked on every node and the walk
//! must end with exactly one fragment on the stack. Any mismatch is a codec
//! defect and surfaces as `InternalInvariant`.
use tracing::trace;

use crate::ast::{Child, ElementInit, Expr, LabelTarget, MemberBinding, Parameter};
use crate::error::{CodecError, Result};
use crate::fragment::{Document, Fragment, MAX_DEPTH};
use crate::refs::{self, Bindings};
use crate::ty::Ty;
use crate::value::ValueCodec;

/// The fragments a node owns, in child order.
struct Tail {
    owner: &'static str,
    items: std::vec::IntoIter<Fragment>,
}

impl Tail {
    fn take(&mut self, role: &str) -> Result<Fragment> {
        self.items.next().ok_or_else(|| {
            CodecError::internal(format!("`{}` ran out of child fragments at `{role}`", self.owner))
        })
    }

    fn slot(&mut self, role: &str) -> Result<Fragment> {
        Ok(Fragment::slot(role, self.take(role)?))
    }

    fn opt_slot(&mut self, role: &str, present: bool) -> Result<Option<Fragment>> {
        present.then(|| self.slot(role)).transpose()
    }

    fn list(&mut self, role: &str, n: usize) -> Result<Fragment> {
        let items = (0..n).map(|_| self.take(role)).collect::<Result<Vec<_>>>()?;
        Ok(Fragment::list(role, items))
    }

    fn finish(self) -> Result<()> {
        match self.items.len() {
            0 => Ok(()),
            n => Err(CodecError::internal(format!("`{}` left {n} child fragment(s) unused", self.owner))),
        }
    }
}

fn type_slot(ty: &Ty) -> Fragment {
    Fragment::scalar("type", ty.render())
}

fn flag(name: &str, on: bool) -> Option<Fragment> {
    on.then(|| Fragment::scalar(name, true))
}

/// One encode call: output stack plus reference bookkeeping.
pub struct Encoder<'c> {
    values: &'c ValueCodec,
    stack: Vec<Fragment>,
    bindings: Bindings,
    /// Nodes currently open on the walk.
    open: usize,
}

impl<'c> Encoder<'c> {
    pub fn new(values: &'c ValueCodec) -> Self {
        Self { values, stack: Vec::new(), bindings: Bindings::new(), open: 0 }
    }

    pub fn encode(&mut self, root: &Expr) -> Result<Document> {
        self.stack.clear();
        self.bindings.reset();
        self.open = 0;

        self.visit(Child::Expr(root))?;

        if self.stack.len() != 1 {
            return Err(CodecError::internal(format!(
                "traversal ended with {} fragment(s) on the stack",
                self.stack.len()
            )));
        }
        let root = self.stack.pop().ok_or_else(|| CodecError::internal("empty output stack"))?;
        if root.depth() > MAX_DEPTH {
            return Err(CodecError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(Document::new(root))
    }

    fn visit(&mut self, child: Child<'_>) -> Result<()> {
        let frag = match child {
            Child::Expr(e) => return self.node(e),
            Child::Param(p) => self.parameter(p)?,
            Child::Label(l) => self.label(l)?,
        };
        self.stack.push(frag);
        Ok(())
    }

    fn node(&mut self, e: &Expr) -> Result<()> {
        // A nested node sits at least two fragment levels below its parent.
        self.open += 1;
        if 2 * self.open - 1 > MAX_DEPTH {
            return Err(CodecError::TooDeep { limit: MAX_DEPTH });
        }
        let children = e.children();
        let base = self.stack.len();
        for child in &children {
            self.visit(*child)?;
        }

        let produced = self.stack.len().saturating_sub(base);
        if self.stack.len() < base || produced != children.len() {
            return Err(CodecError::internal(format!(
                "`{}` expected {} child fragment(s), found {produced}",
                e.tag(),
                children.len()
            )));
        }

        let mut tail = Tail { owner: e.tag(), items: self.stack.split_off(base).into_iter() };
        let frag = self.assemble(e, &mut tail)?;
        tail.finish()?;

        trace!(tag = frag.tag.as_str(), depth = self.open, children = children.len(), "encoded node");
        self.stack.push(frag);
        self.open -= 1;
        Ok(())
    }

    fn parameter(&mut self, p: &Parameter) -> Result<Fragment> {
        let key = p.key();
        if self.bindings.is_defined(key) {
            return self.bindings.reference(key);
        }
        let id = self.bindings.define(key)?;
        let frag = Fragment::node("Parameter")
            .with(Fragment::scalar(refs::ID, id))?
            .with_opt(p.name().map(|n| Fragment::scalar("name", n)))?
            .with(type_slot(p.ty()))?
            .with_opt(flag("byRef", p.def().by_ref))?;
        self.bindings.remember(key, frag.clone())?;
        Ok(frag)
    }

    fn label(&mut self, l: &LabelTarget) -> Result<Fragment> {
        let key = l.key();
        if self.bindings.is_defined(key) {
            return self.bindings.reference(key);
        }
        let id = self.bindings.define(key)?;
        let frag = Fragment::node("LabelTarget")
            .with(Fragment::scalar(refs::ID, id))?
            .with_opt(l.name().map(|n| Fragment::scalar("name", n)))?
            .with(type_slot(l.ty()))?;
        self.bindings.remember(key, frag.clone())?;
        Ok(frag)
    }

    fn assemble(&mut self, e: &Expr, tail: &mut Tail) -> Result<Fragment> {
        let node = Fragment::node(e.tag());
        match e {
            Expr::Constant { ty, value } => node.with(type_slot(ty))?.with(self.values.encode_as("value", ty, value)?),
            Expr::Parameter(p) => self.parameter(p),
            Expr::Default(ty) => node.with(type_slot(ty)),
            Expr::Unary(u) => node
                .with(type_slot(&u.ty))?
                .with_opt(flag("checked", u.checked))?
                .with_opt(u.method.as_ref().map(|m| m.to_fragment("method")).transpose()?)?
                .with_opt(tail.opt_slot("operand", u.operand.is_some())?),
            Expr::Binary(b) => node
                .with(type_slot(&b.ty))?
                .with_opt(flag("checked", b.checked))?
                .with_opt(flag("liftedToNull", b.lifted_to_null))?
                .with_opt(b.method.as_ref().map(|m| m.to_fragment("method")).transpose()?)?
                .with(tail.slot("left")?)?
                .with(tail.slot("right")?)?
                .with_opt(tail.opt_slot("conversion", b.conversion.is_some())?),
            Expr::TypeTest(t) => node
                .with(Fragment::scalar("typeOperand", t.operand.render()))?
                .with(tail.slot("expression")?),
            Expr::Conditional(c) => node
                .with(type_slot(&c.ty))?
                .with(tail.slot("test")?)?
                .with(tail.slot("ifTrue")?)?
                .with(tail.slot("ifFalse")?),
            Expr::MemberAccess(m) => node
                .with(m.member.to_fragment("member")?)?
                .with_opt(tail.opt_slot("expression", m.expr.is_some())?),
            Expr::Call(c) => node
                .with(c.method.to_fragment("method")?)?
                .with_opt(tail.opt_slot("object", c.object.is_some())?)?
                .with(tail.list("arguments", c.arguments.len())?),
            Expr::Invoke(i) => node
                .with(type_slot(&i.ty))?
                .with(tail.slot("expression")?)?
                .with(tail.list("arguments", i.arguments.len())?),
            Expr::Lambda(l) => node
                .with_opt(l.name.as_deref().map(|n| Fragment::scalar("name", n)))?
                .with(Fragment::scalar("returnType", l.ret.render()))?
                .with_opt(flag("tailCall", l.tail_call))?
                .with(tail.list("parameters", l.parameters.len())?)?
                .with(tail.slot("body")?),
            Expr::New(n) => node
                .with(type_slot(&n.ty))?
                .with_opt(n.constructor.as_ref().map(|c| c.to_fragment()).transpose()?)?
                .with(tail.list("arguments", n.arguments.len())?),
            Expr::MemberInit(m) => {
                let node = node.with(tail.slot("newExpression")?)?;
                let bindings = m.bindings.iter().map(|b| binding(b, tail)).collect::<Result<Vec<_>>>()?;
                node.with(Fragment::list("bindings", bindings))
            }
            Expr::ListInit(l) => {
                let node = node.with(tail.slot("newExpression")?)?;
                node.with(Fragment::list("initializers", element_inits(&l.initializers, tail)?))
            }
            Expr::NewArrayInit { elem, items } => node
                .with(Fragment::scalar("elementType", elem.render()))?
                .with(tail.list("expressions", items.len())?),
            Expr::NewArrayBounds { elem, bounds } => node
                .with(Fragment::scalar("elementType", elem.render()))?
                .with(tail.list("bounds", bounds.len())?),
            Expr::Index(i) => node
                .with(type_slot(&i.ty))?
                .with(tail.slot("object")?)?
                .with_opt(i.indexer.as_ref().map(|m| m.to_fragment("indexer")).transpose()?)?
                .with(tail.list("arguments", i.arguments.len())?),
            Expr::Block(b) => node
                .with(type_slot(&b.ty))?
                .with(tail.list("variables", b.variables.len())?)?
                .with(tail.list("expressions", b.expressions.len())?),
            Expr::Loop(l) => node
                .with(tail.slot("body")?)?
                .with_opt(tail.opt_slot("breakLabel", l.break_label.is_some())?)?
                .with_opt(tail.opt_slot("continueLabel", l.continue_label.is_some())?),
            Expr::Goto(g) => node
                .with(Fragment::scalar("kind", g.kind.tag()))?
                .with(type_slot(&g.ty))?
                .with(tail.slot("target")?)?
                .with_opt(tail.opt_slot("value", g.value.is_some())?),
            Expr::Label(l) => node
                .with(tail.slot("target")?)?
                .with_opt(tail.opt_slot("defaultValue", l.default.is_some())?),
            Expr::Switch(s) => {
                let node = node
                    .with(type_slot(&s.ty))?
                    .with(tail.slot("switchValue")?)?
                    .with_opt(s.comparison.as_ref().map(|m| m.to_fragment("comparison")).transpose()?)?;
                let cases = s
                    .cases
                    .iter()
                    .map(|c| {
                        Fragment::node("SwitchCase")
                            .with(tail.list("testValues", c.test_values.len())?)?
                            .with(tail.slot("body")?)
                    })
                    .collect::<Result<Vec<_>>>()?;
                node.with(Fragment::list("cases", cases))?
                    .with_opt(tail.opt_slot("defaultBody", s.default.is_some())?)
            }
            Expr::Try(t) => {
                let node = node.with(type_slot(&t.ty))?.with(tail.slot("body")?)?;
                let handlers = t
                    .handlers
                    .iter()
                    .map(|h| {
                        Fragment::node("CatchBlock")
                            .with(Fragment::scalar("test", h.test.render()))?
                            .with_opt(tail.opt_slot("variable", h.variable.is_some())?)?
                            .with_opt(tail.opt_slot("filter", h.filter.is_some())?)?
                            .with(tail.slot("body")?)
                    })
                    .collect::<Result<Vec<_>>>()?;
                node.with(Fragment::list("handlers", handlers))?
                    .with_opt(tail.opt_slot("finally", t.finally.is_some())?)?
                    .with_opt(tail.opt_slot("fault", t.fault.is_some())?)
            }
        }
    }
}

fn binding(b: &MemberBinding, tail: &mut Tail) -> Result<Fragment> {
    let node = Fragment::node(b.tag()).with(b.member().to_fragment("member")?)?;
    match b {
        MemberBinding::Assignment { .. } => node.with(tail.slot("expression")?),
        MemberBinding::MemberBinding { bindings, .. } => {
            let inner = bindings.iter().map(|b| binding(b, tail)).collect::<Result<Vec<_>>>()?;
            node.with(Fragment::list("bindings", inner))
        }
        MemberBinding::ListBinding { initializers, .. } => {
            node.with(Fragment::list("initializers", element_inits(initializers, tail)?))
        }
    }
}

fn element_inits(inits: &[ElementInit], tail: &mut Tail) -> Result<Vec<Fragment>> {
    inits
        .iter()
        .map(|i| {
            Fragment::node("ElementInit")
                .with(i.add_method.to_fragment("addMethod")?)?
                .with(tail.list("arguments", i.arguments.len())?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{BinaryOp, GotoKind, MemberRef, MethodRef, UnaryOp};
    use crate::ty::TypeRegistry;
    use serde_json::json;

    fn values() -> ValueCodec {
        ValueCodec::new(TypeRegistry::default().with_class("Math", Some(0)).shared())
    }

    fn json_of(e: &Expr) -> serde_json::Value {
        let v = values();
        Encoder::new(&v).encode(e).unwrap().to_json().unwrap()
    }

    #[test]
    fn add_of_two_constants() {
        assert_eq!(
            json_of(&add(int(2), int(3))),
            json!({"Add": {
                "type": "int",
                "left": {"Constant": {"type": "int", "value": 2}},
                "right": {"Constant": {"type": "int", "value": 3}}
            }})
        );
    }

    #[test]
    fn flags_and_method_are_only_written_when_set() {
        let max = MethodRef::new(Ty::named("Math"), "Max", vec![Ty::INT, Ty::INT], Ty::INT);
        let mut node = checked(binary(BinaryOp::Multiply, int(2), int(3)));
        if let Expr::Binary(b) = &mut node {
            b.method = Some(max);
        }
        let doc = json_of(&node);
        let body = &doc["Multiply"];
        assert_eq!(body["checked"], json!(true));
        assert!(body.get("liftedToNull").is_none());
        assert_eq!(body["method"]["name"], json!("Max"));
    }

    #[test]
    fn list_bindings_keep_initializer_counts() {
        let v = ValueCodec::new(crate::samples::registry().shared());
        let sample = crate::samples::corpus().into_iter().find(|s| s.name == "member-init-list-bindings").unwrap();
        let doc = Encoder::new(&v).encode(&sample.tree).unwrap().to_json().unwrap();
        let counts: Vec<usize> = doc["MemberInit"]["bindings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["ListBinding"]["initializers"].as_array().unwrap().len())
            .collect();
        assert_eq!(counts, [0, 1, 3]);
    }

    #[test]
    fn variable_arity_lists_keep_count_and_order() {
        let sum = MethodRef::new(Ty::named("Math"), "Sum", vec![], Ty::INT);
        for n in [0usize, 1, 5] {
            let args: Vec<Expr> = (0..n as i32).map(int).collect();
            let doc = json_of(&call(None, sum.clone(), args));
            let items = doc["Call"]["arguments"].as_array().unwrap();
            assert_eq!(items.len(), n);
            for (i, item) in items.iter().enumerate() {
                assert_eq!(item["Constant"]["value"], json!(i));
            }

            let stmts: Vec<Expr> = (0..n as i32).map(int).collect();
            let doc = json_of(&block(vec![], stmts));
            assert_eq!(doc["Block"]["expressions"].as_array().unwrap().len(), n);
        }
    }

    #[test]
    fn switch_cases_own_their_test_values() {
        let sw = switch(
            int(0),
            vec![case(vec![int(1), int(2)], string("a")), case(vec![int(3)], string("b"))],
            Some(string("z")),
        );
        let doc = json_of(&sw);
        let cases = doc["Switch"]["cases"].as_array().unwrap();
        assert_eq!(cases[0]["SwitchCase"]["testValues"].as_array().unwrap().len(), 2);
        assert_eq!(cases[1]["SwitchCase"]["body"]["Constant"]["value"], json!("b"));
        assert_eq!(doc["Switch"]["defaultBody"]["Constant"]["value"], json!("z"));
    }

    #[test]
    fn lambda_defines_then_references() {
        let x = Parameter::new("x", Ty::INT);
        let doc = json_of(&lambda(vec![x.clone()], add(x.expr(), x.expr())));
        let l = &doc["Lambda"];
        assert_eq!(l["parameters"], json!([{"Parameter": {"id": "p0", "name": "x", "type": "int"}}]));
        assert_eq!(l["body"]["Add"]["left"], json!({"Parameter": {"ref": "p0", "name": "x", "type": "int"}}));
        assert_eq!(l["body"]["Add"]["right"], l["body"]["Add"]["left"]);
    }

    #[test]
    fn distinct_parameters_with_equal_shape_get_distinct_ids() {
        let a = Parameter::new("x", Ty::INT);
        let b = Parameter::new("x", Ty::INT);
        let doc = json_of(&lambda(vec![a.clone(), b.clone()], add(a.expr(), b.expr())));
        let params = doc["Lambda"]["parameters"].as_array().unwrap();
        assert_eq!(params[0]["Parameter"]["id"], json!("p0"));
        assert_eq!(params[1]["Parameter"]["id"], json!("p1"));
        assert_eq!(doc["Lambda"]["body"]["Add"]["right"]["Parameter"]["ref"], json!("p1"));
    }

    #[test]
    fn labels_are_shared_between_goto_and_label() {
        let end = LabelTarget::new("end");
        let tree = block(vec![], vec![goto(GotoKind::Goto, end.clone(), None), label(end, None)]);
        let doc = json_of(&tree);
        let exprs = doc["Block"]["expressions"].as_array().unwrap();
        assert_eq!(exprs[0]["Goto"]["target"]["LabelTarget"]["id"], json!("l0"));
        assert_eq!(exprs[0]["Goto"]["kind"], json!("Goto"));
        assert_eq!(exprs[1]["Label"]["target"]["LabelTarget"]["ref"], json!("l0"));
    }

    #[test]
    fn encoding_is_deterministic() {
        let x = Parameter::new("x", Ty::INT);
        let tree = lambda(
            vec![x.clone()],
            condition(binary(BinaryOp::GreaterThan, x.expr(), int(0)), x.expr(), unary(UnaryOp::Negate, x.expr())),
        );
        let v = values();
        let first = Encoder::new(&v).encode(&tree).unwrap().to_json_string().unwrap();
        let mut enc = Encoder::new(&v);
        enc.encode(&int(1)).unwrap();
        let second = enc.encode(&tree).unwrap().to_json_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn member_bindings_consume_fragments_depth_first() {
        let reg = TypeRegistry::default().with_class("Point", Some(0)).with_class("Line", Some(0));
        let v = ValueCodec::new(reg.shared());
        let point = Ty::named("Point");
        let line = Ty::named("Line");
        let tree = member_init(
            new(crate::ast::ConstructorRef::new(line.clone(), vec![]), vec![]),
            vec![
                MemberBinding::MemberBinding {
                    member: MemberRef::property(line.clone(), "Start", point.clone()),
                    bindings: vec![
                        MemberBinding::Assignment { member: MemberRef::field(point.clone(), "X", Ty::INT), expr: int(1) },
                        MemberBinding::Assignment { member: MemberRef::field(point.clone(), "Y", Ty::INT), expr: int(2) },
                    ],
                },
                MemberBinding::Assignment { member: MemberRef::property(line, "Width", Ty::INT), expr: int(3) },
            ],
        );
        let doc = Encoder::new(&v).encode(&tree).unwrap().to_json().unwrap();
        let bindings = doc["MemberInit"]["bindings"].as_array().unwrap();
        let nested = bindings[0]["MemberBinding"]["bindings"].as_array().unwrap();
        assert_eq!(nested[1]["Assignment"]["expression"]["Constant"]["value"], json!(2));
        assert_eq!(bindings[1]["Assignment"]["expression"]["Constant"]["value"], json!(3));
    }

    #[test]
    fn tail_reports_arity_defects() {
        let mut short = Tail { owner: "Add", items: vec![Fragment::null("x")].into_iter() };
        short.take("left").unwrap();
        assert!(short.take("right").unwrap_err().is_internal());

        let long = Tail { owner: "Add", items: vec![Fragment::null("x")].into_iter() };
        assert!(long.finish().unwrap_err().is_internal());
    }

    #[test]
    fn value_mismatch_fails_the_whole_call() {
        let v = values();
        let err = Encoder::new(&v).encode(&add(int(1), constant(Ty::INT, crate::value::Value::string("no")))).unwrap_err();
        assert!(matches!(err, CodecError::ValueMismatch { .. }));
    }
}
