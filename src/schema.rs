//! Schema gate: a JSON-Schema subset validator and the built-in schema of the
//! document vocabulary.
//!
//! Supported keywords: `type`, `properties`, `required`,
//! `additionalProperties`, `propertyNames`, `items`, `prefixItems`,
//! `minItems`, `maxItems`, `minProperties`, `maxProperties`, `enum`, `const`,
//! `oneOf`, `anyOf`, `allOf`, `pattern`, `minimum`, `maximum`, `$defs` and
//! `$ref` into `#/$defs/…`. Unknown keywords are ignored.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::ast::{BinaryOp, GotoKind, TypeTestOp, UnaryOp};
use crate::error::{CodecError, Result, SchemaValidationError, Violation};
use crate::fragment::Document;

/// `$ref` chains deeper than this without consuming input are treated as cycles.
const MAX_REF_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct Schema {
    root: Value,
    patterns: HashMap<String, Regex>,
}

impl Schema {
    pub fn from_json(root: Value) -> Result<Self> {
        if !root.is_object() && !root.is_boolean() {
            return Err(invalid("", "a schema must be an object or a boolean"));
        }
        let mut patterns = HashMap::new();
        collect_patterns(&root, "", &mut patterns)?;
        Ok(Self { root, patterns })
    }

    pub fn from_str(src: &str) -> Result<Self> {
        let root: Value = crate::path_de::from_str_with_path(src)?;
        Self::from_json(root)
    }

    /// Schema of every document the codec produces.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn as_json(&self) -> &Value {
        &self.root
    }

    pub fn validate(&self, instance: &Value) -> std::result::Result<(), SchemaValidationError> {
        let mut walk = Walk { schema: self, violations: Vec::new() };
        walk.check(&self.root, instance, "", 0);
        match walk.violations.is_empty() {
            true => Ok(()),
            false => Err(SchemaValidationError { violations: walk.violations }),
        }
    }

    pub fn validate_document(&self, doc: &Document) -> Result<()> {
        self.validate(&doc.to_json()?)?;
        Ok(())
    }

    fn resolve(&self, reference: &str) -> Option<&Value> {
        let name = reference.strip_prefix("#/$defs/")?;
        self.root.get("$defs")?.get(name)
    }
}

fn invalid(path: &str, message: &str) -> CodecError {
    CodecError::Schema(SchemaValidationError {
        violations: vec![Violation { path: path.to_string(), message: format!("invalid schema: {message}") }],
    })
}

fn collect_patterns(node: &Value, path: &str, out: &mut HashMap<String, Regex>) -> Result<()> {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{path}/{}", escape_pointer(key));
                if key == "pattern" {
                    if let Value::String(src) = child {
                        let rx = Regex::new(src).map_err(|e| invalid(&child_path, &e.to_string()))?;
                        out.insert(src.clone(), rx);
                        continue;
                    }
                }
                if key == "$ref" {
                    match child.as_str() {
                        Some(r) if r.starts_with("#/$defs/") => {}
                        _ => return Err(invalid(&child_path, "only `#/$defs/…` references are supported")),
                    }
                }
                collect_patterns(child, &child_path, out)?;
            }
            Ok(())
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, child)| collect_patterns(child, &format!("{path}/{i}"), out)),
        _ => Ok(()),
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

// ------------------------------- Walk ------------------------------------- //

struct Walk<'s> {
    schema: &'s Schema,
    violations: Vec<Violation>,
}

impl Walk<'_> {
    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation { path: path.to_string(), message: message.into() });
    }

    fn passes(&self, node: &Value, instance: &Value, depth: usize) -> bool {
        let mut trial = Walk { schema: self.schema, violations: Vec::new() };
        trial.check(node, instance, "", depth);
        trial.violations.is_empty()
    }

    fn check(&mut self, node: &Value, instance: &Value, path: &str, depth: usize) {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.check_node(node, instance, path, depth))
    }

    fn check_node(&mut self, node: &Value, instance: &Value, path: &str, depth: usize) {
        let map = match node {
            Value::Bool(true) => return,
            Value::Bool(false) => return self.fail(path, "no value is allowed here"),
            Value::Object(map) => map,
            _ => return,
        };

        if let Some(Value::String(reference)) = map.get("$ref") {
            match self.schema.resolve(reference) {
                None => self.fail(path, format!("unresolvable reference `{reference}`")),
                Some(_) if depth >= MAX_REF_DEPTH => self.fail(path, format!("reference cycle through `{reference}`")),
                Some(target) => self.check(target, instance, path, depth + 1),
            }
        }

        if let Some(expected) = map.get("type") {
            let names: Vec<&str> = match expected {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            if !names.is_empty() && !names.iter().any(|n| type_matches(n, instance)) {
                self.fail(path, format!("expected {}, found {}", names.join(" or "), kind_of(instance)));
                return;
            }
        }

        if let Some(Value::Array(options)) = map.get("enum") {
            if !options.contains(instance) {
                self.fail(path, format!("{instance} is not one of {}", Value::Array(options.clone())));
            }
        }
        if let Some(expected) = map.get("const") {
            if expected != instance {
                self.fail(path, format!("expected {expected}, found {instance}"));
            }
        }

        self.check_combinators(map, instance, path, depth);

        match instance {
            Value::String(s) => self.check_string(map, s, path),
            Value::Number(_) => self.check_number(map, instance, path),
            Value::Object(fields) => self.check_object(map, fields, path),
            Value::Array(items) => self.check_array(map, items, path),
            _ => {}
        }
    }

    fn check_combinators(&mut self, map: &Map<String, Value>, instance: &Value, path: &str, depth: usize) {
        if let Some(Value::Array(all)) = map.get("allOf") {
            for sub in all {
                self.check(sub, instance, path, depth);
            }
        }
        if let Some(Value::Array(any)) = map.get("anyOf") {
            if !any.iter().any(|sub| self.passes(sub, instance, depth)) {
                self.fail(path, "matches none of `anyOf`");
            }
        }
        if let Some(Value::Array(one)) = map.get("oneOf") {
            let matched = one.iter().filter(|sub| self.passes(sub, instance, depth)).count();
            if matched != 1 {
                self.fail(path, format!("matches {matched} of `oneOf`, expected exactly one"));
            }
        }
    }

    fn check_string(&mut self, map: &Map<String, Value>, s: &str, path: &str) {
        if let Some(Value::String(src)) = map.get("pattern") {
            match self.schema.patterns.get(src) {
                Some(rx) if rx.is_match(s) => {}
                Some(_) => self.fail(path, format!("{s:?} does not match /{src}/")),
                None => self.fail(path, format!("pattern /{src}/ was not compiled")),
            }
        }
    }

    fn check_number(&mut self, map: &Map<String, Value>, instance: &Value, path: &str) {
        let Some(x) = instance.as_f64() else { return };
        if let Some(min) = map.get("minimum").and_then(Value::as_f64) {
            if x < min {
                self.fail(path, format!("{instance} is below the minimum {min}"));
            }
        }
        if let Some(max) = map.get("maximum").and_then(Value::as_f64) {
            if x > max {
                self.fail(path, format!("{instance} is above the maximum {max}"));
            }
        }
    }

    fn check_object(&mut self, map: &Map<String, Value>, fields: &Map<String, Value>, path: &str) {
        if let Some(Value::Array(required)) = map.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(key) {
                    self.fail(path, format!("missing `{key}`"));
                }
            }
        }
        if let Some(min) = map.get("minProperties").and_then(Value::as_u64) {
            if (fields.len() as u64) < min {
                self.fail(path, format!("expected at least {min} key(s), found {}", fields.len()));
            }
        }
        if let Some(max) = map.get("maxProperties").and_then(Value::as_u64) {
            if fields.len() as u64 > max {
                self.fail(path, format!("expected at most {max} key(s), found {}", fields.len()));
            }
        }

        let properties = map.get("properties").and_then(Value::as_object);
        let additional = map.get("additionalProperties");
        let names = map.get("propertyNames");
        for (key, value) in fields {
            let child_path = format!("{path}/{}", escape_pointer(key));
            if let Some(names) = names {
                let key_value = Value::String(key.clone());
                if !self.passes(names, &key_value, 0) {
                    self.fail(&child_path, format!("`{key}` is not an allowed key"));
                    continue;
                }
            }
            match (properties.and_then(|p| p.get(key)), additional) {
                (Some(sub), _) => self.check(sub, value, &child_path, 0),
                (None, Some(Value::Bool(false))) => self.fail(&child_path, format!("unexpected key `{key}`")),
                (None, Some(sub)) => self.check(sub, value, &child_path, 0),
                (None, None) => {}
            }
        }
    }

    fn check_array(&mut self, map: &Map<String, Value>, items: &[Value], path: &str) {
        if let Some(min) = map.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                self.fail(path, format!("expected at least {min} item(s), found {}", items.len()));
            }
        }
        if let Some(max) = map.get("maxItems").and_then(Value::as_u64) {
            if items.len() as u64 > max {
                self.fail(path, format!("expected at most {max} item(s), found {}", items.len()));
            }
        }
        let prefix = map.get("prefixItems").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{path}/{i}");
            match prefix.get(i) {
                Some(sub) => self.check(sub, item, &item_path, 0),
                None => {
                    if let Some(sub) = map.get("items") {
                        self.check(sub, item, &item_path, 0);
                    }
                }
            }
        }
    }
}

fn type_matches(name: &str, v: &Value) -> bool {
    match name {
        "null" => v.is_null(),
        "boolean" => v.is_boolean(),
        "object" => v.is_object(),
        "array" => v.is_array(),
        "string" => v.is_string(),
        "number" => v.is_number(),
        "integer" => v.is_i64() || v.is_u64() || v.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ------------------------------ Built-in ---------------------------------- //

fn r(name: &str) -> Value {
    json!({ "$ref": format!("#/$defs/{name}") })
}

/// A closed object: the listed properties, some of them required.
fn obj(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// `{"<key>": <schema>}` and nothing else.
fn single(key: &str, schema: Value) -> Value {
    let mut properties = Map::new();
    properties.insert(key.to_string(), schema);
    obj(Value::Object(properties), &[key])
}

fn array_of(items: Value) -> Value {
    json!({ "type": "array", "items": items })
}

/// Exactly one key, chosen from `variants`.
fn tagged(variants: Vec<(&str, Value)>) -> Value {
    let mut properties = Map::new();
    for (tag, schema) in variants {
        properties.insert(tag.to_string(), schema);
    }
    json!({
        "type": "object",
        "properties": properties,
        "minProperties": 1,
        "maxProperties": 1,
        "additionalProperties": false
    })
}

fn shared_entity(prefix: char) -> Value {
    let id = json!({ "type": "string", "pattern": format!("^{prefix}[0-9]+$") });
    let mut node = obj(
        json!({ "id": id, "ref": id, "name": { "type": "string" }, "type": r("typeName"), "byRef": { "type": "boolean" } }),
        &["type"],
    );
    node["oneOf"] = json!([{ "required": ["id"] }, { "required": ["ref"] }]);
    node
}

fn node_shapes() -> Vec<(&'static str, Value)> {
    let mut shapes = vec![
        ("Constant", obj(json!({ "type": r("typeName"), "value": true }), &["type", "value"])),
        ("Parameter", r("parameter")),
        ("Default", obj(json!({ "type": r("typeName") }), &["type"])),
        (
            "Conditional",
            obj(
                json!({ "type": r("typeName"), "test": r("node"), "ifTrue": r("node"), "ifFalse": r("node") }),
                &["type", "test", "ifTrue", "ifFalse"],
            ),
        ),
        ("MemberAccess", obj(json!({ "member": r("member"), "expression": r("node") }), &["member"])),
        (
            "Call",
            obj(json!({ "method": r("method"), "object": r("node"), "arguments": r("nodes") }), &["method", "arguments"]),
        ),
        (
            "Invoke",
            obj(
                json!({ "type": r("typeName"), "expression": r("node"), "arguments": r("nodes") }),
                &["type", "expression", "arguments"],
            ),
        ),
        (
            "Lambda",
            obj(
                json!({
                    "name": { "type": "string" },
                    "returnType": r("typeName"),
                    "tailCall": { "type": "boolean" },
                    "parameters": r("parameters"),
                    "body": r("node")
                }),
                &["returnType", "parameters", "body"],
            ),
        ),
        (
            "New",
            obj(
                json!({ "type": r("typeName"), "constructor": r("constructor"), "arguments": r("nodes") }),
                &["type", "arguments"],
            ),
        ),
        (
            "MemberInit",
            obj(
                json!({ "newExpression": r("node"), "bindings": array_of(r("binding")) }),
                &["newExpression", "bindings"],
            ),
        ),
        (
            "ListInit",
            obj(
                json!({ "newExpression": r("node"), "initializers": r("initializers") }),
                &["newExpression", "initializers"],
            ),
        ),
        (
            "NewArrayInit",
            obj(json!({ "elementType": r("typeName"), "expressions": r("nodes") }), &["elementType", "expressions"]),
        ),
        (
            "NewArrayBounds",
            obj(json!({ "elementType": r("typeName"), "bounds": r("nodes") }), &["elementType", "bounds"]),
        ),
        (
            "Index",
            obj(
                json!({ "type": r("typeName"), "object": r("node"), "indexer": r("member"), "arguments": r("nodes") }),
                &["type", "object", "arguments"],
            ),
        ),
        (
            "Block",
            obj(
                json!({ "type": r("typeName"), "variables": r("parameters"), "expressions": r("nodes") }),
                &["type", "variables", "expressions"],
            ),
        ),
        (
            "Loop",
            obj(json!({ "body": r("node"), "breakLabel": r("label"), "continueLabel": r("label") }), &["body"]),
        ),
        (
            "Goto",
            obj(
                json!({
                    "kind": { "enum": GotoKind::ALL.iter().map(|k| k.tag()).collect::<Vec<_>>() },
                    "type": r("typeName"),
                    "target": r("label"),
                    "value": r("node")
                }),
                &["kind", "type", "target"],
            ),
        ),
        ("Label", obj(json!({ "target": r("label"), "defaultValue": r("node") }), &["target"])),
        (
            "Switch",
            obj(
                json!({
                    "type": r("typeName"),
                    "switchValue": r("node"),
                    "comparison": r("method"),
                    "cases": array_of(single(
                        "SwitchCase",
                        obj(json!({ "testValues": r("nodes"), "body": r("node") }), &["testValues", "body"]),
                    )),
                    "defaultBody": r("node")
                }),
                &["type", "switchValue", "cases"],
            ),
        ),
        (
            "Try",
            obj(
                json!({
                    "type": r("typeName"),
                    "body": r("node"),
                    "handlers": array_of(single(
                        "CatchBlock",
                        obj(
                            json!({
                                "test": r("typeName"),
                                "variable": single("Parameter", r("parameter")),
                                "filter": r("node"),
                                "body": r("node")
                            }),
                            &["test", "body"],
                        ),
                    )),
                    "finally": r("node"),
                    "fault": r("node")
                }),
                &["type", "body", "handlers"],
            ),
        ),
    ];
    shapes.extend(UnaryOp::ALL.iter().map(|op| (op.tag(), r("unary"))));
    shapes.extend(BinaryOp::ALL.iter().map(|op| (op.tag(), r("binary"))));
    shapes.extend(TypeTestOp::ALL.iter().map(|op| (op.tag(), r("typeTest"))));
    shapes
}

fn build_builtin() -> Value {
    let member_info = obj(
        json!({ "declaringType": r("typeName"), "name": { "type": "string" }, "type": r("typeName") }),
        &["declaringType", "name", "type"],
    );
    let defs = json!({
        "node": tagged(node_shapes()),
        "nodes": array_of(r("node")),
        "typeName": { "type": "string", "pattern": r"^\S+$" },
        "typeList": array_of(single("type", r("typeName"))),
        "parameter": shared_entity('p'),
        "parameters": array_of(single("Parameter", r("parameter"))),
        "label": single("LabelTarget", r("labelTarget")),
        "labelTarget": shared_entity('l'),
        "method": obj(
            json!({
                "declaringType": r("typeName"),
                "name": { "type": "string" },
                "genericArguments": r("typeList"),
                "parameters": r("typeList"),
                "returnType": r("typeName")
            }),
            &["declaringType", "name", "parameters", "returnType"],
        ),
        "constructor": obj(
            json!({ "declaringType": r("typeName"), "parameters": r("typeList") }),
            &["declaringType", "parameters"],
        ),
        "member": tagged(vec![("Field", member_info.clone()), ("Property", member_info), ("Method", r("method"))]),
        "binding": tagged(vec![
            ("Assignment", obj(json!({ "member": r("member"), "expression": r("node") }), &["member", "expression"])),
            ("MemberBinding", obj(json!({ "member": r("member"), "bindings": array_of(r("binding")) }), &["member", "bindings"])),
            ("ListBinding", obj(json!({ "member": r("member"), "initializers": r("initializers") }), &["member", "initializers"])),
        ]),
        "initializers": array_of(single(
            "ElementInit",
            obj(json!({ "addMethod": r("method"), "arguments": r("nodes") }), &["addMethod", "arguments"]),
        )),
        "unary": obj(
            json!({
                "type": r("typeName"),
                "checked": { "type": "boolean" },
                "method": r("method"),
                "operand": r("node")
            }),
            &["type"],
        ),
        "binary": obj(
            json!({
                "type": r("typeName"),
                "checked": { "type": "boolean" },
                "liftedToNull": { "type": "boolean" },
                "method": r("method"),
                "left": r("node"),
                "right": r("node"),
                "conversion": r("node")
            }),
            &["type", "left", "right"],
        ),
        "typeTest": obj(json!({ "typeOperand": r("typeName"), "expression": r("node") }), &["typeOperand", "expression"]),
    });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "expression document",
        "$ref": "#/$defs/node",
        "$defs": defs
    })
}

static BUILTIN: Lazy<Schema> = Lazy::new(|| {
    let root = build_builtin();
    let mut patterns = HashMap::new();
    collect_patterns(&root, "", &mut patterns).expect("built-in schema patterns compile");
    Schema { root, patterns }
});
