//! Document → tree.
//!
//! A closed table maps each node tag to its handler. Handlers read their named
//! slots in the same order the encoder produced them, so a parameter or label
//! is always met at its defining `id` before any `ref` to it. Unlike encoder
//! input, documents are untrusted: every shape and reference is checked.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::trace;

use crate::ast::{
    BinaryOp, Binary, Block, Call, CatchBlock, Conditional, ConstructorRef, ElementInit, Expr, Goto, GotoKind,
    Index, Invoke, Label, LabelDef, LabelTarget, Lambda, ListInit, Loop, MemberAccess, MemberBinding, MemberInit,
    MemberRef, MethodRef, New, Parameter, ParameterDef, Switch, SwitchCase, Try, TypeTest, TypeTestOp, Unary,
    UnaryOp,
};
use crate::error::{CodecError, Result};
use crate::fragment::{Document, Fragment, MAX_DEPTH};
use crate::refs::{Definitions, ID, REF};
use crate::ty::Ty;
use crate::value::ValueCodec;

type Handler = fn(&mut Decoder<'_>, &Fragment) -> Result<Expr>;

static HANDLERS: Lazy<HashMap<&'static str, Handler>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Handler> = HashMap::new();
    table.insert("Constant", decode_constant);
    table.insert("Parameter", decode_parameter);
    table.insert("Default", decode_default);
    table.insert("Conditional", decode_conditional);
    table.insert("MemberAccess", decode_member_access);
    table.insert("Call", decode_call);
    table.insert("Invoke", decode_invoke);
    table.insert("Lambda", decode_lambda);
    table.insert("New", decode_new);
    table.insert("MemberInit", decode_member_init);
    table.insert("ListInit", decode_list_init);
    table.insert("NewArrayInit", decode_new_array_init);
    table.insert("NewArrayBounds", decode_new_array_bounds);
    table.insert("Index", decode_index);
    table.insert("Block", decode_block);
    table.insert("Loop", decode_loop);
    table.insert("Goto", decode_goto);
    table.insert("Label", decode_label);
    table.insert("Switch", decode_switch);
    table.insert("Try", decode_try);
    for op in UnaryOp::ALL {
        table.insert(op.tag(), decode_unary);
    }
    for op in BinaryOp::ALL {
        table.insert(op.tag(), decode_binary);
    }
    for op in TypeTestOp::ALL {
        table.insert(op.tag(), decode_type_test);
    }
    table
});

/// Every tag the decoder accepts as a node.
pub fn node_tags() -> Vec<&'static str> {
    let mut tags: Vec<&'static str> = HANDLERS.keys().copied().collect();
    tags.sort_unstable();
    tags
}

/// One decode call: the id tables for parameters and labels.
pub struct Decoder<'c> {
    values: &'c ValueCodec,
    params: Definitions<Parameter>,
    labels: Definitions<LabelTarget>,
}

impl<'c> Decoder<'c> {
    pub fn new(values: &'c ValueCodec) -> Self {
        Self { values, params: Definitions::new(), labels: Definitions::new() }
    }

    pub fn decode(&mut self, doc: &Document) -> Result<Expr> {
        self.params.reset();
        self.labels.reset();
        if doc.depth() > MAX_DEPTH {
            return Err(CodecError::TooDeep { limit: MAX_DEPTH });
        }
        self.expr(&doc.root)
    }

    fn expr(&mut self, frag: &Fragment) -> Result<Expr> {
        let handler = HANDLERS
            .get(frag.tag.as_str())
            .ok_or_else(|| CodecError::UnknownElement { tag: frag.tag.clone() })?;
        trace!(tag = frag.tag.as_str(), "decoding node");
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || handler(self, frag))
    }

    fn slot(&mut self, frag: &Fragment, key: &str) -> Result<Expr> {
        let child = frag.require(key)?.sole_child()?;
        self.expr(child)
    }

    fn opt_slot(&mut self, frag: &Fragment, key: &str) -> Result<Option<Expr>> {
        match frag.get(key) {
            Some(slot) => Ok(Some(self.expr(slot.sole_child()?)?)),
            None => Ok(None),
        }
    }

    fn list(&mut self, frag: &Fragment, key: &str) -> Result<Vec<Expr>> {
        frag.require(key)?.items()?.iter().map(|item| self.expr(item)).collect()
    }

    fn ty(&self, frag: &Fragment, key: &str) -> Result<Ty> {
        self.values.registry().parse(frag.require(key)?.str_value()?)
    }

    fn method(&self, frag: &Fragment, key: &str) -> Result<Option<MethodRef>> {
        frag.get(key).map(|m| MethodRef::from_fragment(m, self.values.registry())).transpose()
    }

    fn parameter(&mut self, frag: &Fragment) -> Result<Parameter> {
        expect_tag(frag, "Parameter")?;
        let def = ParameterDef {
            name: opt_name(frag)?,
            ty: self.ty(frag, "type")?,
            by_ref: flag(frag, "byRef")?,
        };
        if let Some(id) = frag.get(ID) {
            let p = Parameter::from_def(def);
            self.params.define(id.str_value()?, p.clone())?;
            return Ok(p);
        }
        let id = reference_id(frag)?;
        let p = self.params.resolve(id)?;
        if *p.def() != def {
            return Err(CodecError::value_decode(format!("reference matching `{id}`"), frag.describe()));
        }
        Ok(p)
    }

    fn parameters(&mut self, frag: &Fragment, key: &str) -> Result<Vec<Parameter>> {
        frag.require(key)?.items()?.iter().map(|item| self.parameter(item)).collect()
    }

    fn label_target(&mut self, frag: &Fragment) -> Result<LabelTarget> {
        expect_tag(frag, "LabelTarget")?;
        let def = LabelDef { name: opt_name(frag)?, ty: self.ty(frag, "type")? };
        if let Some(id) = frag.get(ID) {
            let l = LabelTarget::from_def(def);
            self.labels.define(id.str_value()?, l.clone())?;
            return Ok(l);
        }
        let id = reference_id(frag)?;
        let l = self.labels.resolve(id)?;
        if *l.def() != def {
            return Err(CodecError::value_decode(format!("reference matching `{id}`"), frag.describe()));
        }
        Ok(l)
    }

    fn opt_label(&mut self, frag: &Fragment, key: &str) -> Result<Option<LabelTarget>> {
        match frag.get(key) {
            Some(slot) => Ok(Some(self.label_target(slot.sole_child()?)?)),
            None => Ok(None),
        }
    }

    fn element_inits(&mut self, frag: &Fragment, key: &str) -> Result<Vec<ElementInit>> {
        let mut out = Vec::new();
        for item in frag.require(key)?.items()? {
            expect_tag(item, "ElementInit")?;
            let add_method = MethodRef::from_fragment(item.require("addMethod")?, self.values.registry())?;
            out.push(ElementInit { add_method, arguments: self.list(item, "arguments")? });
        }
        Ok(out)
    }

    fn binding(&mut self, frag: &Fragment) -> Result<MemberBinding> {
        let member = MemberRef::from_fragment(frag.require("member")?, self.values.registry())?;
        match frag.tag.as_str() {
            "Assignment" => Ok(MemberBinding::Assignment { member, expr: self.slot(frag, "expression")? }),
            "MemberBinding" => {
                let bindings =
                    frag.require("bindings")?.items()?.iter().map(|b| self.binding(b)).collect::<Result<_>>()?;
                Ok(MemberBinding::MemberBinding { member, bindings })
            }
            "ListBinding" => {
                Ok(MemberBinding::ListBinding { member, initializers: self.element_inits(frag, "initializers")? })
            }
            _ => Err(CodecError::value_decode("Assignment, MemberBinding or ListBinding", frag.describe())),
        }
    }

    fn new_expression(&mut self, frag: &Fragment) -> Result<Expr> {
        let new = self.slot(frag, "newExpression")?;
        if !matches!(new, Expr::New(_)) {
            return Err(CodecError::value_decode("`New` in `newExpression`", new.tag()));
        }
        Ok(new)
    }
}

fn expect_tag(frag: &Fragment, tag: &str) -> Result<()> {
    if frag.tag != tag {
        return Err(CodecError::value_decode(format!("`{tag}`"), frag.describe()));
    }
    Ok(())
}

fn opt_name(frag: &Fragment) -> Result<Option<String>> {
    frag.get("name").map(|n| n.str_value().map(str::to_string)).transpose()
}

fn reference_id(frag: &Fragment) -> Result<&str> {
    frag.get(REF)
        .ok_or_else(|| CodecError::value_decode("`id` or `ref`", frag.describe()))?
        .str_value()
}

fn flag(frag: &Fragment, key: &str) -> Result<bool> {
    match frag.get(key) {
        Some(f) => f.bool_value(),
        None => Ok(false),
    }
}

// ------------------------------- Handlers --------------------------------- //

fn decode_constant(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let value = d.values.decode(&ty, f.require("value")?)?;
    Ok(Expr::Constant { ty, value })
}

fn decode_parameter(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    Ok(Expr::Parameter(d.parameter(f)?))
}

fn decode_default(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    Ok(Expr::Default(d.ty(f, "type")?))
}

fn decode_unary(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let op = UnaryOp::from_tag(&f.tag).ok_or_else(|| CodecError::internal(format!("`{}` is not unary", f.tag)))?;
    let ty = d.ty(f, "type")?;
    let checked = flag(f, "checked")?;
    let method = d.method(f, "method")?;
    let operand = d.opt_slot(f, "operand")?;
    if operand.is_none() && !op.operand_optional() {
        return Err(CodecError::value_decode(format!("`operand` inside `{}`", f.tag), f.describe()));
    }
    Ok(Expr::Unary(Box::new(Unary { op, operand, ty, checked, method })))
}

fn decode_binary(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let op = BinaryOp::from_tag(&f.tag).ok_or_else(|| CodecError::internal(format!("`{}` is not binary", f.tag)))?;
    let ty = d.ty(f, "type")?;
    let checked = flag(f, "checked")?;
    let lifted_to_null = flag(f, "liftedToNull")?;
    let method = d.method(f, "method")?;
    let left = d.slot(f, "left")?;
    let right = d.slot(f, "right")?;
    let conversion = d.opt_slot(f, "conversion")?;
    if let Some(c) = &conversion {
        if !matches!(c, Expr::Lambda(_)) {
            return Err(CodecError::value_decode("`Lambda` in `conversion`", c.tag()));
        }
    }
    Ok(Expr::Binary(Box::new(Binary { op, left, right, ty, checked, lifted_to_null, method, conversion })))
}

fn decode_type_test(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let op = TypeTestOp::from_tag(&f.tag)
        .ok_or_else(|| CodecError::internal(format!("`{}` is not a type test", f.tag)))?;
    let operand = d.ty(f, "typeOperand")?;
    let expr = d.slot(f, "expression")?;
    Ok(Expr::TypeTest(Box::new(TypeTest { op, expr, operand })))
}

fn decode_conditional(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let test = d.slot(f, "test")?;
    let if_true = d.slot(f, "ifTrue")?;
    let if_false = d.slot(f, "ifFalse")?;
    Ok(Expr::Conditional(Box::new(Conditional { test, if_true, if_false, ty })))
}

fn decode_member_access(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let member = MemberRef::from_fragment(f.require("member")?, d.values.registry())?;
    if let MemberRef::Method(_) = member {
        return Err(CodecError::value_decode("field or property in `member`", "method"));
    }
    let expr = d.opt_slot(f, "expression")?;
    Ok(Expr::MemberAccess(Box::new(MemberAccess { expr, member })))
}

fn decode_call(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let method = MethodRef::from_fragment(f.require("method")?, d.values.registry())?;
    let object = d.opt_slot(f, "object")?;
    let arguments = d.list(f, "arguments")?;
    Ok(Expr::Call(Box::new(Call { object, method, arguments })))
}

fn decode_invoke(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let expr = d.slot(f, "expression")?;
    let arguments = d.list(f, "arguments")?;
    Ok(Expr::Invoke(Box::new(Invoke { expr, arguments, ty })))
}

fn decode_lambda(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let name = opt_name(f)?;
    let ret = d.ty(f, "returnType")?;
    let tail_call = flag(f, "tailCall")?;
    let parameters = d.parameters(f, "parameters")?;
    let body = d.slot(f, "body")?;
    Ok(Expr::Lambda(Box::new(Lambda { name, parameters, body, ret, tail_call })))
}

fn decode_new(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let constructor = f
        .get("constructor")
        .map(|c| ConstructorRef::from_fragment(c, d.values.registry()))
        .transpose()?;
    let arguments = d.list(f, "arguments")?;
    Ok(Expr::New(Box::new(New { ty, constructor, arguments })))
}

fn decode_member_init(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let new = d.new_expression(f)?;
    let bindings = f.require("bindings")?.items()?.iter().map(|b| d.binding(b)).collect::<Result<_>>()?;
    Ok(Expr::MemberInit(Box::new(MemberInit { new, bindings })))
}

fn decode_list_init(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let new = d.new_expression(f)?;
    let initializers = d.element_inits(f, "initializers")?;
    Ok(Expr::ListInit(Box::new(ListInit { new, initializers })))
}

fn decode_new_array_init(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let elem = d.ty(f, "elementType")?;
    Ok(Expr::NewArrayInit { elem, items: d.list(f, "expressions")? })
}

fn decode_new_array_bounds(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let elem = d.ty(f, "elementType")?;
    Ok(Expr::NewArrayBounds { elem, bounds: d.list(f, "bounds")? })
}

fn decode_index(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let object = d.slot(f, "object")?;
    let indexer = f
        .get("indexer")
        .map(|m| MemberRef::from_fragment(m, d.values.registry()))
        .transpose()?;
    let arguments = d.list(f, "arguments")?;
    Ok(Expr::Index(Box::new(Index { object, indexer, arguments, ty })))
}

fn decode_block(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let variables = d.parameters(f, "variables")?;
    let expressions = d.list(f, "expressions")?;
    Ok(Expr::Block(Box::new(Block { ty, variables, expressions })))
}

fn decode_loop(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let body = d.slot(f, "body")?;
    let break_label = d.opt_label(f, "breakLabel")?;
    let continue_label = d.opt_label(f, "continueLabel")?;
    Ok(Expr::Loop(Box::new(Loop { body, break_label, continue_label })))
}

fn decode_goto(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let kind_text = f.require("kind")?.str_value()?;
    let kind = GotoKind::from_tag(kind_text)
        .ok_or_else(|| CodecError::value_decode("Goto, Return, Break or Continue", format!("`{kind_text}`")))?;
    let ty = d.ty(f, "type")?;
    let target = d.label_target(f.require("target")?.sole_child()?)?;
    let value = d.opt_slot(f, "value")?;
    Ok(Expr::Goto(Box::new(Goto { kind, target, value, ty })))
}

fn decode_label(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let target = d.label_target(f.require("target")?.sole_child()?)?;
    let default = d.opt_slot(f, "defaultValue")?;
    Ok(Expr::Label(Box::new(Label { target, default })))
}

fn decode_switch(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let value = d.slot(f, "switchValue")?;
    let comparison = d.method(f, "comparison")?;
    let mut cases = Vec::new();
    for item in f.require("cases")?.items()? {
        expect_tag(item, "SwitchCase")?;
        let test_values = d.list(item, "testValues")?;
        cases.push(SwitchCase { test_values, body: d.slot(item, "body")? });
    }
    let default = d.opt_slot(f, "defaultBody")?;
    Ok(Expr::Switch(Box::new(Switch { ty, value, cases, default, comparison })))
}

fn decode_try(d: &mut Decoder<'_>, f: &Fragment) -> Result<Expr> {
    let ty = d.ty(f, "type")?;
    let body = d.slot(f, "body")?;
    let mut handlers = Vec::new();
    for item in f.require("handlers")?.items()? {
        expect_tag(item, "CatchBlock")?;
        let test = d.ty(item, "test")?;
        let variable = match item.get("variable") {
            Some(slot) => Some(d.parameter(slot.sole_child()?)?),
            None => None,
        };
        let filter = d.opt_slot(item, "filter")?;
        handlers.push(CatchBlock { test, variable, filter, body: d.slot(item, "body")? });
    }
    let finally = d.opt_slot(f, "finally")?;
    let fault = d.opt_slot(f, "fault")?;
    Ok(Expr::Try(Box::new(Try { ty, body, handlers, finally, fault })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::encode::Encoder;
    use crate::samples::{self, registry};
    use serde_json::json;

    fn round_trip(tree: &Expr) -> Expr {
        let v = ValueCodec::new(registry().shared());
        let doc = Encoder::new(&v).encode(tree).unwrap();
        let text = doc.to_json_string().unwrap();
        let back = Document::from_json_str(&text).unwrap();
        Decoder::new(&v).decode(&back).unwrap()
    }

    fn decode_json(v: serde_json::Value) -> Result<Expr> {
        let values = ValueCodec::new(registry().shared());
        Decoder::new(&values).decode(&Document::from_json(v)?)
    }

    #[test]
    fn every_sample_round_trips() {
        for sample in samples::corpus() {
            assert_eq!(round_trip(&sample.tree), sample.tree, "{}", sample.name);
        }
    }

    #[test]
    fn shared_parameter_is_one_entity_after_decode() {
        let x = Parameter::new("x", Ty::INT);
        let tree = lambda(vec![x.clone()], add(x.expr(), x.expr()));
        let Expr::Lambda(l) = round_trip(&tree) else { panic!("lambda") };
        let Expr::Binary(b) = &l.body else { panic!("binary") };
        let (left, right) = (b.left.as_parameter().unwrap(), b.right.as_parameter().unwrap());
        assert!(l.parameters[0].ptr_eq(left));
        assert!(left.ptr_eq(right));
    }

    #[test]
    fn shared_label_is_one_entity_after_decode() {
        let end = LabelTarget::new("end");
        let tree = block(vec![], vec![goto(GotoKind::Goto, end.clone(), None), goto(GotoKind::Goto, end.clone(), None), label(end, None)]);
        let Expr::Block(b) = round_trip(&tree) else { panic!("block") };
        let targets: Vec<&LabelTarget> = b
            .expressions
            .iter()
            .map(|e| match e {
                Expr::Goto(g) => &g.target,
                Expr::Label(l) => &l.target,
                _ => panic!("unexpected node"),
            })
            .collect();
        assert!(targets[0].ptr_eq(targets[1]) && targets[1].ptr_eq(targets[2]));
    }

    #[test]
    fn variable_arity_nodes_survive_zero_one_and_many() {
        let m = MethodRef::new(Ty::named("Math"), "Sum", vec![], Ty::INT);
        let e = Parameter::new("e", Ty::named("Exception"));
        for n in [0usize, 1, 4] {
            let items = || (0..n as i32).map(int).collect::<Vec<_>>();
            let cases = (0..n as i32).map(|i| case(vec![int(i)], string("c"))).collect();
            let handlers = (0..n)
                .map(|i| {
                    let var = (i % 2 == 0).then(|| e.clone());
                    catch_block(Ty::named("Exception"), var, None, int(i as i32))
                })
                .collect();
            for tree in [
                block(vec![], items()),
                call(None, m.clone(), items()),
                switch(int(0), cases, None),
                try_catch(int(1), handlers),
            ] {
                assert_eq!(round_trip(&tree), tree, "{} with {n}", tree.tag());
            }
        }
    }

    #[test]
    fn scenario_add_decodes_from_literal_json() {
        let tree = decode_json(json!({"Add": {
            "type": "int",
            "left": {"Constant": {"type": "int", "value": 2}},
            "right": {"Constant": {"type": "int", "value": 3}}
        }}))
        .unwrap();
        assert_eq!(tree, add(int(2), int(3)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = decode_json(json!({"Add": {
            "type": "int",
            "left": {"Frobnicate": {}},
            "right": {"Constant": {"type": "int", "value": 3}}
        }}))
        .unwrap_err();
        assert_eq!(err.to_string(), "don't know how to deserialize element `Frobnicate`");
    }

    #[test]
    fn dangling_reference_is_reported() {
        let err = decode_json(json!({"Lambda": {
            "returnType": "int",
            "parameters": [],
            "body": {"Parameter": {"ref": "p0", "name": "x", "type": "int"}}
        }}))
        .unwrap_err();
        assert!(matches!(err, CodecError::DanglingReference { id } if id == "p0"));
    }

    #[test]
    fn reference_must_match_its_definition() {
        let err = decode_json(json!({"Lambda": {
            "returnType": "int",
            "parameters": [{"Parameter": {"id": "p0", "name": "x", "type": "int"}}],
            "body": {"Parameter": {"ref": "p0", "name": "x", "type": "long"}}
        }}))
        .unwrap_err();
        assert!(matches!(err, CodecError::ValueDecode { .. }));
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let p = json!({"Parameter": {"id": "p0", "name": "x", "type": "int"}});
        let err = decode_json(json!({"Lambda": {
            "returnType": "int",
            "parameters": [p.clone(), p],
            "body": {"Constant": {"type": "int", "value": 1}}
        }}))
        .unwrap_err();
        assert!(matches!(err, CodecError::ValueDecode { .. }));
    }

    #[test]
    fn missing_operand_and_wrong_shapes_are_value_errors() {
        let missing = decode_json(json!({"Negate": {"type": "int"}})).unwrap_err();
        assert!(matches!(missing, CodecError::ValueDecode { .. }));

        let bad_kind = decode_json(json!({"Goto": {
            "kind": "Jump",
            "type": "void",
            "target": {"LabelTarget": {"id": "l0", "type": "void"}}
        }}))
        .unwrap_err();
        assert!(matches!(bad_kind, CodecError::ValueDecode { .. }));

        let not_new = decode_json(json!({"ListInit": {
            "newExpression": {"Default": {"type": "int"}},
            "initializers": []
        }}))
        .unwrap_err();
        assert!(matches!(not_new, CodecError::ValueDecode { .. }));
    }

    #[test]
    fn unknown_type_name_surfaces() {
        let err = decode_json(json!({"Default": {"type": "Widget"}})).unwrap_err();
        assert!(matches!(err, CodecError::UnknownType { .. }));
    }

    #[test]
    fn decoder_tables_are_reset_between_calls() {
        let v = ValueCodec::new(registry().shared());
        let x = Parameter::new("x", Ty::INT);
        let doc = Encoder::new(&v).encode(&lambda(vec![x.clone()], x.expr())).unwrap();
        let mut dec = Decoder::new(&v);
        let a = dec.decode(&doc).unwrap();
        let b = dec.decode(&doc).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn node_tag_table_covers_every_operator() {
        let tags = node_tags();
        assert_eq!(tags.len(), 20 + UnaryOp::ALL.len() + BinaryOp::ALL.len() + TypeTestOp::ALL.len());
        assert!(tags.contains(&"PostDecrementAssign"));
        assert!(tags.contains(&"TypeEqual"));
    }
}
