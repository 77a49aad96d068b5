//! Constant values and the value codec.
//!
//! [`ValueCodec::transform`] classifies a declared type into one encode/decode
//! pair, in priority order:
//!
//! 1. primitive table (bool, integers, floats, decimal, char, string, time, guid, uri, DBNull)
//! 2. enum (flag names + raw base value)
//! 3. nullable wrapper (`{hasValue: false}` when empty)
//! 4. structural record (property bag)
//! 5. byte sequence (base64 + declared length)
//! 6. dictionary (ordered key/value entries)
//! 7. homogeneous sequence
//! 8. tuple (per-item declared type)
//! 9. opaque fallback (declared + concrete type, explicit structural dump)
//!
//! `null` for any type that admits it is the null scalar, except for the
//! nullable wrapper which emits its own explicit no-value fragment.
pub mod blob;
pub mod num;
pub mod time;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use half::f16;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::fragment::{Content, Fragment, Scalar};
use crate::ty::{EnumDef, Prim, RecordDef, Ty, TypeRegistry};

// ------------------------------- Values ----------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    DbNull,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    ISize(i64),
    USize(u64),
    Half(f16),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Decimal(Decimal),
    Char(char),
    String(String),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(TimeDelta),
    Guid(Uuid),
    Uri(String),
    Enum(EnumValue),
    Bytes(Vec<u8>),
    Seq(SeqValue),
    Dict(DictValue),
    Tuple(Vec<Value>),
    Record(RecordValue),
    Object(ObjectValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub ty: String,
    pub raw: i128,
}

/// A homogeneous collection; `ty` is the collection type (`T[]`, `List<T>`, `IEnumerable<T>`).
#[derive(Debug, Clone, PartialEq)]
pub struct SeqValue {
    pub ty: Ty,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictValue {
    pub key: Ty,
    pub value: Ty,
    /// Iteration order is the encoding order.
    pub entries: Vec<(Value, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub ty: String,
    pub fields: IndexMap<String, Value>,
}

/// The structural dump of a value with no specific transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    pub ty: Ty,
    pub fields: IndexMap<String, Value>,
}

/// Opt-in capability for putting arbitrary objects into a constant.
///
/// There is no reflection to fall back on: only types implementing this trait
/// can take the opaque path, and their dump is what round-trips.
pub trait StructuralDump {
    fn type_of(&self) -> Ty;
    fn dump(&self) -> std::result::Result<IndexMap<String, Value>, Box<dyn std::error::Error + Send + Sync>>;
}

impl Value {
    pub fn int(v: i32) -> Self {
        Value::I32(v)
    }

    pub fn long(v: i64) -> Self {
        Value::I64(v)
    }

    pub fn double(v: f64) -> Self {
        Value::Double(OrderedFloat(v))
    }

    pub fn float(v: f32) -> Self {
        Value::Float(OrderedFloat(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    pub fn seq(ty: Ty, items: Vec<Value>) -> Self {
        Value::Seq(SeqValue { ty, items })
    }

    /// Captures an object through its structural dump. Failures surface as
    /// `UnknownType` carrying the original cause.
    pub fn from_dump(obj: &dyn StructuralDump) -> Result<Self> {
        let ty = obj.type_of();
        match obj.dump() {
            Ok(fields) => Ok(Value::Object(ObjectValue { ty, fields })),
            Err(source) => Err(CodecError::UnknownType { name: ty.render(), source: Some(source) }),
        }
    }

    /// The runtime type of the value; `None` for `null`.
    pub fn concrete_ty(&self) -> Option<Ty> {
        let p = |p: Prim| Some(Ty::Prim(p));
        match self {
            Value::Null => None,
            Value::DbNull => p(Prim::DbNull),
            Value::Bool(_) => p(Prim::Bool),
            Value::I8(_) => p(Prim::SByte),
            Value::U8(_) => p(Prim::Byte),
            Value::I16(_) => p(Prim::Short),
            Value::U16(_) => p(Prim::UShort),
            Value::I32(_) => p(Prim::Int),
            Value::U32(_) => p(Prim::UInt),
            Value::I64(_) => p(Prim::Long),
            Value::U64(_) => p(Prim::ULong),
            Value::ISize(_) => p(Prim::NInt),
            Value::USize(_) => p(Prim::NUInt),
            Value::Half(_) => p(Prim::Half),
            Value::Float(_) => p(Prim::Float),
            Value::Double(_) => p(Prim::Double),
            Value::Decimal(_) => p(Prim::Decimal),
            Value::Char(_) => p(Prim::Char),
            Value::String(_) => p(Prim::String),
            Value::DateTime(_) => p(Prim::DateTime),
            Value::DateTimeOffset(_) => p(Prim::DateTimeOffset),
            Value::TimeSpan(_) => p(Prim::TimeSpan),
            Value::Guid(_) => p(Prim::Guid),
            Value::Uri(_) => p(Prim::Uri),
            Value::Enum(e) => Some(Ty::named(e.ty.clone())),
            Value::Bytes(_) => Some(Ty::array(Ty::Prim(Prim::Byte))),
            Value::Seq(s) => Some(s.ty.clone()),
            Value::Dict(d) => Some(Ty::generic("Dictionary", vec![d.key.clone(), d.value.clone()])),
            Value::Tuple(items) => Some(Ty::Tuple(
                items.iter().map(|v| v.concrete_ty().unwrap_or(Ty::OBJECT)).collect(),
            )),
            Value::Record(r) => Some(Ty::named(r.ty.clone())),
            Value::Object(o) => Some(o.ty.clone()),
        }
    }

    pub fn type_label(&self) -> String {
        self.concrete_ty().map(|t| t.render()).unwrap_or_else(|| "null".to_string())
    }
}

// ------------------------------ Transforms -------------------------------- //

pub type EncodeFn = fn(&ValueCodec, &Ty, &Value) -> Result<Content>;
pub type DecodeFn = fn(&ValueCodec, &Ty, &Fragment) -> Result<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Primitive(Prim),
    Enum,
    Nullable,
    Record,
    Bytes,
    Dictionary,
    Sequence,
    Tuple,
    Opaque,
}

#[derive(Clone, Copy)]
pub struct Transform {
    pub kind: TransformKind,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").field("kind", &self.kind).finish()
    }
}

static PRIMITIVES: Lazy<HashMap<Prim, Transform>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for p in Prim::ALL {
        let (encode, decode) = match p {
            Prim::Object | Prim::Void => continue,
            Prim::NInt | Prim::NUInt => (num::encode_int as EncodeFn, num::decode_int as DecodeFn),
            p if p.is_integral() => (num::encode_int as EncodeFn, num::decode_int as DecodeFn),
            Prim::Half | Prim::Float | Prim::Double => (num::encode_float as EncodeFn, num::decode_float as DecodeFn),
            Prim::DateTime | Prim::DateTimeOffset | Prim::TimeSpan => (time::encode as EncodeFn, time::decode as DecodeFn),
            _ => (encode_basic as EncodeFn, decode_basic as DecodeFn),
        };
        table.insert(p, Transform { kind: TransformKind::Primitive(p), encode, decode });
    }
    table
});

fn composite(kind: TransformKind) -> Transform {
    let encode: EncodeFn = match kind {
        TransformKind::Enum => encode_enum,
        TransformKind::Nullable => encode_nullable,
        TransformKind::Record => encode_record,
        TransformKind::Bytes => blob::encode,
        TransformKind::Dictionary => encode_dict,
        TransformKind::Sequence => encode_seq,
        TransformKind::Tuple => encode_tuple,
        TransformKind::Opaque | TransformKind::Primitive(_) => encode_opaque,
    };
    let decode: DecodeFn = match kind {
        TransformKind::Enum => decode_enum,
        TransformKind::Nullable => decode_nullable,
        TransformKind::Record => decode_record,
        TransformKind::Bytes => blob::decode,
        TransformKind::Dictionary => decode_dict,
        TransformKind::Sequence => decode_seq,
        TransformKind::Tuple => decode_tuple,
        TransformKind::Opaque | TransformKind::Primitive(_) => decode_opaque,
    };
    Transform { kind, encode, decode }
}

/// Encodes and decodes constant payloads against a declared type.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    registry: Arc<TypeRegistry>,
}

impl ValueCodec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn transform(&self, ty: &Ty) -> Result<Transform> {
        if let Ty::Prim(p) = ty {
            if let Some(t) = PRIMITIVES.get(p) {
                return Ok(*t);
            }
            if *p == Prim::Void {
                return Err(CodecError::UnknownType {
                    name: ty.render(),
                    source: Some("void has no values".into()),
                });
            }
        }
        let kind = if self.registry.enum_def(ty).is_some() {
            TransformKind::Enum
        } else if matches!(ty, Ty::Nullable(_)) {
            TransformKind::Nullable
        } else if self.registry.record_def(ty).is_some() {
            TransformKind::Record
        } else if is_byte_array(ty) {
            TransformKind::Bytes
        } else if dict_args(ty).is_some() {
            TransformKind::Dictionary
        } else if seq_elem(ty).is_some() {
            TransformKind::Sequence
        } else if matches!(ty, Ty::Tuple(_)) {
            TransformKind::Tuple
        } else {
            self.registry.check(ty)?;
            TransformKind::Opaque
        };
        Ok(composite(kind))
    }

    pub fn encode(&self, ty: &Ty, value: &Value) -> Result<Content> {
        let t = self.transform(ty)?;
        if matches!(value, Value::Null) && t.kind != TransformKind::Nullable {
            if self.registry.admits_null(ty) {
                return Ok(Content::Scalar(Scalar::Null));
            }
            return Err(CodecError::mismatch(ty, "null"));
        }
        (t.encode)(self, ty, value)
    }

    pub fn decode(&self, ty: &Ty, frag: &Fragment) -> Result<Value> {
        let t = self.transform(ty)?;
        if frag.is_null() && t.kind != TransformKind::Nullable {
            if self.registry.admits_null(ty) {
                return Ok(Value::Null);
            }
            return Err(CodecError::value_decode(ty.render(), frag.describe()));
        }
        (t.decode)(self, ty, frag)
    }

    pub fn encode_as(&self, tag: &str, ty: &Ty, value: &Value) -> Result<Fragment> {
        Ok(Fragment::with_content(tag, self.encode(ty, value)?))
    }
}

fn is_byte_array(ty: &Ty) -> bool {
    matches!(ty, Ty::Array(elem) if **elem == Ty::Prim(Prim::Byte))
}

fn seq_elem(ty: &Ty) -> Option<&Ty> {
    match ty {
        Ty::Array(elem) => Some(elem),
        Ty::Named { name, args } if args.len() == 1 && (name == "List" || name == "IEnumerable") => Some(&args[0]),
        _ => None,
    }
}

fn dict_args(ty: &Ty) -> Option<(&Ty, &Ty)> {
    match ty {
        Ty::Named { name, args } if name == "Dictionary" && args.len() == 2 => Some((&args[0], &args[1])),
        _ => None,
    }
}

pub(crate) fn named(children: Vec<Fragment>) -> Result<Content> {
    let mut node = Fragment::node("");
    for child in children {
        node.push(child)?;
    }
    Ok(node.content)
}

fn decode_err(ty: &Ty, frag: &Fragment) -> CodecError {
    CodecError::value_decode(ty.render(), frag.describe())
}

fn expect_type(frag: &Fragment, key: &str, expected: &Ty) -> Result<()> {
    let found = frag.require(key)?.str_value()?;
    if found != expected.render() {
        return Err(CodecError::value_decode(format!("{key} `{expected}`"), format!("`{found}`")));
    }
    Ok(())
}

fn item_fragments<'a>(frag: &'a Fragment, key: &str, item_tag: &str) -> Result<&'a [Fragment]> {
    let items = frag.require(key)?.items()?;
    if let Some(bad) = items.iter().find(|f| f.tag != item_tag) {
        return Err(CodecError::value_decode(format!("`{item_tag}` entries"), bad.describe()));
    }
    Ok(items)
}

fn expect_count(frag: &Fragment, found: usize) -> Result<()> {
    let declared = frag.require("count")?.usize_value()?;
    if declared != found {
        return Err(CodecError::value_decode(format!("{declared} item(s)"), format!("{found}")));
    }
    Ok(())
}

// ------------------------------- Basic ------------------------------------ //

fn encode_basic(_: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let scalar = match (ty.as_prim(), v) {
        (Some(Prim::Bool), Value::Bool(b)) => Scalar::Bool(*b),
        (Some(Prim::Decimal), Value::Decimal(d)) => Scalar::Str(d.to_string()),
        (Some(Prim::Char), Value::Char(c)) => Scalar::Str(c.to_string()),
        (Some(Prim::String), Value::String(s)) => Scalar::Str(s.clone()),
        (Some(Prim::Guid), Value::Guid(g)) => Scalar::Str(g.hyphenated().to_string()),
        (Some(Prim::Uri), Value::Uri(u)) => Scalar::Str(u.clone()),
        (Some(Prim::DbNull), Value::DbNull) => return named(vec![Fragment::scalar("dbNull", true)]),
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    Ok(Content::Scalar(scalar))
}

fn decode_basic(_: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let fail = || decode_err(ty, frag);
    let prim = ty.as_prim().ok_or_else(fail)?;
    if prim == Prim::DbNull {
        return match frag.get("dbNull").map(Fragment::bool_value) {
            Some(Ok(true)) => Ok(Value::DbNull),
            _ => Err(fail()),
        };
    }
    if prim == Prim::Bool {
        return frag.as_scalar().and_then(Scalar::as_bool).map(Value::Bool).ok_or_else(fail);
    }
    let text = frag.as_scalar().and_then(Scalar::as_str).ok_or_else(fail)?;
    Ok(match prim {
        Prim::Decimal => Value::Decimal(text.parse::<Decimal>().map_err(|_| fail())?),
        Prim::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(fail()),
            }
        }
        Prim::String => Value::String(text.to_string()),
        Prim::Guid => Value::Guid(Uuid::parse_str(text).map_err(|_| fail())?),
        Prim::Uri => Value::Uri(text.to_string()),
        _ => return Err(fail()),
    })
}

// -------------------------------- Enum ------------------------------------ //

/// Flag enums take the largest matching member first and list names in
/// ascending value order; plain enums name the single matching member.
/// Bits without a name leave the list empty.
fn enum_names(def: &EnumDef, raw: i128) -> String {
    if !def.flags || raw == 0 {
        return def
            .members
            .iter()
            .find(|(_, v)| *v == raw)
            .map(|(n, _)| n.clone())
            .unwrap_or_default();
    }
    let mut candidates: Vec<&(String, i128)> = def.members.iter().filter(|(_, v)| *v != 0).collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    let mut names = Vec::new();
    let mut rest = raw;
    for (name, bits) in candidates {
        if raw & bits == *bits && rest & bits != 0 {
            names.push(name.as_str());
            rest &= !bits;
        }
    }
    if rest != 0 {
        return String::new();
    }
    names.reverse();
    names.join(", ")
}

fn encode_enum(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let def = codec.registry.enum_def(ty).ok_or_else(|| CodecError::unknown_type(ty.render()))?;
    let e = match v {
        Value::Enum(e) if e.ty == def.name => e,
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    let (lo, hi) = def.underlying.range();
    if e.raw < lo || e.raw > hi {
        return Err(CodecError::mismatch(ty, format!("{} (out of range)", e.raw)));
    }
    let mut children = vec![
        Fragment::scalar("names", enum_names(def, e.raw)),
        Fragment::with_content("raw", Content::Scalar(num::wide_scalar(e.raw))),
    ];
    if def.underlying.prim() != Prim::Int {
        children.push(Fragment::scalar("base", def.underlying.prim().keyword()));
    }
    named(children)
}

fn decode_enum(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let def = codec.registry.enum_def(ty).ok_or_else(|| CodecError::unknown_type(ty.render()))?;
    let base = match frag.get("base") {
        Some(b) => Prim::from_keyword(b.str_value()?).ok_or_else(|| decode_err(ty, b))?,
        None => Prim::Int,
    };
    if base != def.underlying.prim() {
        return Err(CodecError::value_decode(
            format!("{} based on {}", def.name, def.underlying.prim().keyword()),
            base.keyword(),
        ));
    }
    let raw = match frag.get("raw") {
        Some(raw) => num::wide_value(raw, true)?,
        None => {
            let names = frag.require("names")?.str_value()?;
            let mut raw = 0i128;
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                raw |= def.value_of(name).ok_or_else(|| {
                    CodecError::value_decode(format!("member of {}", def.name), name)
                })?;
            }
            raw
        }
    };
    let (lo, hi) = def.underlying.range();
    if raw < lo || raw > hi {
        return Err(CodecError::value_decode(format!("{} in range", def.name), raw.to_string()));
    }
    Ok(Value::Enum(EnumValue { ty: def.name.clone(), raw }))
}

// ------------------------------ Nullable ---------------------------------- //

fn encode_nullable(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let Ty::Nullable(inner) = ty else {
        return Err(CodecError::internal(format!("nullable transform on `{ty}`")));
    };
    match v {
        Value::Null => named(vec![Fragment::scalar("hasValue", false)]),
        v => codec.encode(inner, v),
    }
}

fn decode_nullable(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let Ty::Nullable(inner) = ty else {
        return Err(CodecError::internal(format!("nullable transform on `{ty}`")));
    };
    if let Some(has_value) = frag.get("hasValue") {
        return match has_value.bool_value()? {
            false => Ok(Value::Null),
            true => Err(decode_err(ty, frag)),
        };
    }
    if frag.is_null() {
        return Err(decode_err(ty, frag));
    }
    codec.decode(inner, frag)
}

// ------------------------------- Record ----------------------------------- //

fn encode_record(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let def = record_def(codec, ty)?;
    let record = match v {
        Value::Record(r) if r.ty == def.name && r.fields.len() == def.fields.len() => r,
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    let mut properties = Vec::with_capacity(def.fields.len());
    for (name, fty) in &def.fields {
        let value = record.fields.get(name).ok_or_else(|| {
            CodecError::mismatch(ty, format!("{} without `{name}`", record.ty))
        })?;
        properties.push(Fragment::with_content(
            "property",
            named(vec![
                Fragment::scalar("name", name.as_str()),
                Fragment::scalar("type", fty.render()),
                codec.encode_as("value", fty, value)?,
            ])?,
        ));
    }
    named(vec![Fragment::list("properties", properties)])
}

fn decode_record(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let def = record_def(codec, ty)?;
    let properties = item_fragments(frag, "properties", "property")?;
    if properties.len() != def.fields.len() {
        return Err(CodecError::value_decode(
            format!("{} properties of {}", def.fields.len(), def.name),
            properties.len().to_string(),
        ));
    }
    let mut fields = IndexMap::with_capacity(def.fields.len());
    for ((name, fty), prop) in def.fields.iter().zip(properties) {
        let found = prop.require("name")?.str_value()?;
        if found != name {
            return Err(CodecError::value_decode(format!("property `{name}`"), format!("`{found}`")));
        }
        expect_type(prop, "type", fty)?;
        fields.insert(name.clone(), codec.decode(fty, prop.require("value")?)?);
    }
    Ok(Value::Record(RecordValue { ty: def.name.clone(), fields }))
}

fn record_def<'a>(codec: &'a ValueCodec, ty: &Ty) -> Result<&'a RecordDef> {
    codec.registry.record_def(ty).ok_or_else(|| CodecError::unknown_type(ty.render()))
}

// ----------------------------- Dictionary --------------------------------- //

fn encode_dict(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let (kt, vt) = dict_args(ty).ok_or_else(|| CodecError::internal(format!("dictionary transform on `{ty}`")))?;
    let dict = match v {
        Value::Dict(d) if d.key == *kt && d.value == *vt => d,
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    let mut entries = Vec::with_capacity(dict.entries.len());
    for (key, value) in &dict.entries {
        if matches!(key, Value::Null) {
            return Err(CodecError::mismatch(kt, "null dictionary key"));
        }
        entries.push(Fragment::with_content(
            "entry",
            named(vec![codec.encode_as("key", kt, key)?, codec.encode_as("value", vt, value)?])?,
        ));
    }
    named(vec![
        Fragment::scalar("keyType", kt.render()),
        Fragment::scalar("valueType", vt.render()),
        Fragment::scalar("count", entries.len()),
        Fragment::list("entries", entries),
    ])
}

fn decode_dict(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let (kt, vt) = dict_args(ty).ok_or_else(|| decode_err(ty, frag))?;
    expect_type(frag, "keyType", kt)?;
    expect_type(frag, "valueType", vt)?;
    let items = item_fragments(frag, "entries", "entry")?;
    expect_count(frag, items.len())?;
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let key = codec.decode(kt, item.require("key")?)?;
        if matches!(key, Value::Null) {
            return Err(decode_err(kt, item));
        }
        entries.push((key, codec.decode(vt, item.require("value")?)?));
    }
    Ok(Value::Dict(DictValue { key: kt.clone(), value: vt.clone(), entries }))
}

// ------------------------------ Sequence ---------------------------------- //

fn encode_seq(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let elem = seq_elem(ty).ok_or_else(|| CodecError::internal(format!("sequence transform on `{ty}`")))?;
    let seq = match v {
        Value::Seq(s) if seq_elem(&s.ty) == Some(elem) => s,
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    let mut children = vec![Fragment::scalar("elementType", elem.render())];
    if seq.ty != *ty {
        children.push(Fragment::scalar("concreteType", seq.ty.render()));
    }
    let items = seq
        .items
        .iter()
        .map(|item| codec.encode_as("item", elem, item))
        .collect::<Result<Vec<_>>>()?;
    children.push(Fragment::scalar("count", items.len()));
    children.push(Fragment::list("items", items));
    named(children)
}

fn decode_seq(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let elem = seq_elem(ty).ok_or_else(|| decode_err(ty, frag))?;
    expect_type(frag, "elementType", elem)?;
    let collection = match frag.get("concreteType") {
        Some(c) => {
            let concrete = codec.registry.parse(c.str_value()?)?;
            if seq_elem(&concrete) != Some(elem) {
                return Err(CodecError::value_decode(format!("collection of {elem}"), concrete.render()));
            }
            concrete
        }
        None => ty.clone(),
    };
    let items = item_fragments(frag, "items", "item")?;
    expect_count(frag, items.len())?;
    let items = items.iter().map(|item| codec.decode(elem, item)).collect::<Result<Vec<_>>>()?;
    Ok(Value::Seq(SeqValue { ty: collection, items }))
}

// -------------------------------- Tuple ----------------------------------- //

fn encode_tuple(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let Ty::Tuple(decls) = ty else {
        return Err(CodecError::internal(format!("tuple transform on `{ty}`")));
    };
    let items = match v {
        Value::Tuple(items) if items.len() == decls.len() => items,
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    let items = decls
        .iter()
        .zip(items)
        .map(|(decl, item)| {
            Ok(Fragment::with_content(
                "item",
                named(vec![Fragment::scalar("type", decl.render()), codec.encode_as("value", decl, item)?])?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    named(vec![Fragment::list("items", items)])
}

fn decode_tuple(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let Ty::Tuple(decls) = ty else {
        return Err(decode_err(ty, frag));
    };
    let items = item_fragments(frag, "items", "item")?;
    if items.len() != decls.len() {
        return Err(CodecError::value_decode(format!("{} tuple item(s)", decls.len()), items.len().to_string()));
    }
    let mut values = Vec::with_capacity(items.len());
    for (decl, item) in decls.iter().zip(items) {
        expect_type(item, "type", decl)?;
        values.push(codec.decode(decl, item.require("value")?)?);
    }
    Ok(Value::Tuple(values))
}

// ------------------------------- Opaque ----------------------------------- //

fn encode_opaque(codec: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let concrete = v.concrete_ty().ok_or_else(|| CodecError::mismatch(ty, "null"))?;
    let mut children = vec![Fragment::scalar("declaredType", ty.render())];
    if concrete != *ty {
        children.push(Fragment::scalar("concreteType", concrete.render()));
        let specific = codec.transform(&concrete)?;
        if specific.kind != TransformKind::Opaque {
            children.push(Fragment::with_content("value", (specific.encode)(codec, &concrete, v)?));
            return named(children);
        }
    }
    let Value::Object(obj) = v else {
        return Err(CodecError::UnknownType {
            name: concrete.render(),
            source: Some(format!("no transform for a {} value", v.type_label()).into()),
        });
    };
    codec.registry.check(&obj.ty)?;
    let mut fields = Vec::with_capacity(obj.fields.len());
    for (name, value) in &obj.fields {
        let fty = value.concrete_ty().unwrap_or(Ty::OBJECT);
        fields.push(Fragment::with_content(
            "field",
            named(vec![
                Fragment::scalar("name", name.as_str()),
                Fragment::scalar("type", fty.render()),
                codec.encode_as("value", &fty, value)?,
            ])?,
        ));
    }
    children.push(Fragment::list("fields", fields));
    named(children)
}

fn decode_opaque(codec: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    expect_type(frag, "declaredType", ty)?;
    let concrete = match frag.get("concreteType") {
        Some(c) => codec.registry.parse(c.str_value()?)?,
        None => ty.clone(),
    };
    if let Some(value) = frag.get("value") {
        let specific = codec.transform(&concrete)?;
        if specific.kind == TransformKind::Opaque || value.is_null() {
            return Err(decode_err(&concrete, value));
        }
        return (specific.decode)(codec, &concrete, value);
    }
    let items = item_fragments(frag, "fields", "field")?;
    let mut fields = IndexMap::with_capacity(items.len());
    for item in items {
        let name = item.require("name")?.str_value()?;
        let fty = codec.registry.parse(item.require("type")?.str_value()?)?;
        let value = codec.decode(&fty, item.require("value")?)?;
        if fields.insert(name.to_string(), value).is_some() {
            return Err(CodecError::value_decode("unique field names", format!("`{name}` twice")));
        }
    }
    Ok(Value::Object(ObjectValue { ty: concrete, fields }))
}

// ------------------------------- Tests ------------------------------------ //
