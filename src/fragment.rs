//! Format-neutral document fragments and their concrete syntaxes.
//!
//! A [`Fragment`] is a tag plus one of: a scalar, an ordered list of tagged
//! fragments, or a set of uniquely named sub-fragments. JSON realization:
//!
//! ```text
//! Fragment("Add", Named{type, left})      →  "Add": { "type": "int", "left": {...} }
//! Fragment("arguments", List[a, b])       →  "arguments": [ {"Constant": ...}, {...} ]
//! Fragment("value", Scalar(2))            →  "value": 2
//! ```
//!
//! A [`Document`] is a single root fragment, i.e. a one-key JSON object.
use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

// ------------------------------- Model ------------------------------------ //

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    /// Canonical for every integer that fits; `UInt` only above `i64::MAX`.
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Scalar(Scalar),
    List(Vec<Fragment>),
    /// Keys always equal the tag of the fragment they map to.
    Named(IndexMap<String, Fragment>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub tag: String,
    pub content: Content,
}

/// Deepest fragment nesting the codec reads or writes, counting the root as 1.
pub const MAX_DEPTH: usize = 512;

impl From<bool> for Scalar {
    fn from(v: bool) -> Self { Scalar::Bool(v) }
}
impl From<i64> for Scalar {
    fn from(v: i64) -> Self { Scalar::Int(v) }
}
impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(Scalar::Int).unwrap_or(Scalar::UInt(v))
    }
}
impl From<usize> for Scalar {
    fn from(v: usize) -> Self { Scalar::from(v as u64) }
}
impl From<f64> for Scalar {
    fn from(v: f64) -> Self { Scalar::Float(v) }
}
impl From<&str> for Scalar {
    fn from(v: &str) -> Self { Scalar::Str(v.to_string()) }
}
impl From<String> for Scalar {
    fn from(v: String) -> Self { Scalar::Str(v) }
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Scalar::Int(i) => Some(*i as i128),
            Scalar::UInt(u) => Some(*u as i128),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) | Scalar::UInt(_) => "integer",
            Scalar::Float(_) => "number",
            Scalar::Str(_) => "string",
        }
    }
}

impl Fragment {
    pub fn scalar(tag: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self { tag: tag.into(), content: Content::Scalar(value.into()) }
    }

    pub fn null(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), content: Content::Scalar(Scalar::Null) }
    }

    pub fn list(tag: impl Into<String>, items: Vec<Fragment>) -> Self {
        Self { tag: tag.into(), content: Content::List(items) }
    }

    pub fn node(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), content: Content::Named(IndexMap::new()) }
    }

    /// A named slot holding exactly one tagged child, e.g. `"left": {"Constant": ...}`.
    pub fn slot(tag: impl Into<String>, child: Fragment) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(child.tag.clone(), child);
        Self { tag: tag.into(), content: Content::Named(map) }
    }

    pub fn with_content(tag: impl Into<String>, content: Content) -> Self {
        Self { tag: tag.into(), content }
    }

    /// Adds a named child. Duplicate keys are a codec defect.
    pub fn push(&mut self, child: Fragment) -> Result<()> {
        match &mut self.content {
            Content::Named(map) => {
                if map.contains_key(&child.tag) {
                    return Err(CodecError::internal(format!(
                        "duplicate key `{}` in `{}`",
                        child.tag, self.tag
                    )));
                }
                map.insert(child.tag.clone(), child);
                Ok(())
            }
            _ => Err(CodecError::internal(format!("`{}` cannot hold named children", self.tag))),
        }
    }

    pub fn with(mut self, child: Fragment) -> Result<Self> {
        self.push(child)?;
        Ok(self)
    }

    pub fn with_opt(self, child: Option<Fragment>) -> Result<Self> {
        match child {
            Some(c) => self.with(c),
            None => Ok(self),
        }
    }

    pub fn renamed(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    // ---------------------------- accessors -------------------------------- //

    pub fn get(&self, key: &str) -> Option<&Fragment> {
        match &self.content {
            Content::Named(map) => map.get(key),
            _ => None,
        }
    }

    pub fn require(&self, key: &str) -> Result<&Fragment> {
        self.get(key).ok_or_else(|| {
            CodecError::value_decode(format!("`{key}` inside `{}`", self.tag), self.describe())
        })
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.content {
            Content::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.content, Content::Scalar(Scalar::Null))
    }

    pub fn str_value(&self) -> Result<&str> {
        self.as_scalar()
            .and_then(Scalar::as_str)
            .ok_or_else(|| CodecError::value_decode(format!("string `{}`", self.tag), self.describe()))
    }

    pub fn bool_value(&self) -> Result<bool> {
        self.as_scalar()
            .and_then(Scalar::as_bool)
            .ok_or_else(|| CodecError::value_decode(format!("boolean `{}`", self.tag), self.describe()))
    }

    pub fn usize_value(&self) -> Result<usize> {
        self.as_scalar()
            .and_then(Scalar::as_i128)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| CodecError::value_decode(format!("count `{}`", self.tag), self.describe()))
    }

    pub fn items(&self) -> Result<&[Fragment]> {
        match &self.content {
            Content::List(items) => Ok(items),
            _ => Err(CodecError::value_decode(format!("list `{}`", self.tag), self.describe())),
        }
    }

    pub fn named(&self) -> Result<&IndexMap<String, Fragment>> {
        match &self.content {
            Content::Named(map) => Ok(map),
            _ => Err(CodecError::value_decode(format!("object `{}`", self.tag), self.describe())),
        }
    }

    /// The single tagged child of a slot.
    pub fn sole_child(&self) -> Result<&Fragment> {
        match &self.content {
            Content::Named(map) if map.len() == 1 => Ok(&map[0]),
            _ => Err(CodecError::value_decode(format!("single node inside `{}`", self.tag), self.describe())),
        }
    }

    /// Levels of nesting below and including this fragment.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((frag, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            match &frag.content {
                Content::Scalar(_) => {}
                Content::List(items) => pending.extend(items.iter().map(|f| (f, depth + 1))),
                Content::Named(map) => pending.extend(map.values().map(|f| (f, depth + 1))),
            }
        }
        deepest
    }

    /// Short shape description for diagnostics.
    pub fn describe(&self) -> String {
        match &self.content {
            Content::Scalar(s) => format!("{} `{}`", s.kind(), self.tag),
            Content::List(items) => format!("list `{}` of {} item(s)", self.tag, items.len()),
            Content::Named(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                format!("`{}` {{{}}}", self.tag, keys.join(", "))
            }
        }
    }
}

// ------------------------------ Document ---------------------------------- //

/// A complete encoded tree: one root fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Fragment,
}

impl Document {
    pub fn new(root: Fragment) -> Self {
        Self { root }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| CodecError::internal(format!("json conversion: {e}")))
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let text = value.to_string();
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CodecError::internal(format!("json text: {e}")))
    }

    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CodecError::internal(format!("json text: {e}")))
    }

    pub fn from_json_str(src: &str) -> Result<Self> {
        crate::path_de::document_from_str(src)
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        write_xml(&mut out, &self.root, 0);
        out
    }
}

// -------------------------------- JSON ------------------------------------ //

struct ContentRef<'a>(&'a Content);
struct ListItem<'a>(&'a Fragment);

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ListItem(&self.root).serialize(serializer)
    }
}

impl Serialize for ListItem<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.0.tag, &ContentRef(&self.0.content))?;
        map.end()
    }
}

impl Serialize for ContentRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Content::Scalar(s) => match s {
                Scalar::Null => serializer.serialize_unit(),
                Scalar::Bool(b) => serializer.serialize_bool(*b),
                Scalar::Int(i) => serializer.serialize_i64(*i),
                Scalar::UInt(u) => serializer.serialize_u64(*u),
                Scalar::Float(f) => serializer.serialize_f64(*f),
                Scalar::Str(s) => serializer.serialize_str(s),
            },
            Content::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&ListItem(item))?;
                }
                seq.end()
            }
            Content::Named(children) => {
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (key, child) in children {
                    map.serialize_entry(key, &ContentRef(&child.content))?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let root = ItemSeed { depth: 1 }.deserialize(deserializer)?;
        Ok(Document { root })
    }
}

/// A single-key object read as a fragment at `depth`.
struct ItemSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for ItemSeed {
    type Value = Fragment;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Fragment, D::Error> {
        deserializer.deserialize_map(ItemVisitor { depth: self.depth })
    }
}

struct ItemVisitor {
    depth: usize,
}

impl<'de> Visitor<'de> for ItemVisitor {
    type Value = Fragment;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object with exactly one key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> std::result::Result<Fragment, M::Error> {
        let tag: String = map
            .next_key()?
            .ok_or_else(|| <M::Error as de::Error>::custom("expected an object with exactly one key, found {}"))?;
        let content = map.next_value_seed(ContentSeed { depth: self.depth })?;
        if let Some(extra) = map.next_key::<String>()? {
            return Err(de::Error::custom(format!(
                "expected an object with exactly one key, found `{tag}` and `{extra}`"
            )));
        }
        Ok(Fragment { tag, content })
    }
}

/// The content of a fragment sitting `depth` levels below the root (root = 1).
struct ContentSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for ContentSeed {
    type Value = Content;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Content, D::Error> {
        if self.depth > MAX_DEPTH {
            return Err(de::Error::custom(format!("document nests deeper than {MAX_DEPTH} levels")));
        }
        deserializer.deserialize_any(ContentVisitor { depth: self.depth })
    }
}

struct ContentVisitor {
    depth: usize,
}

impl<'de> Visitor<'de> for ContentVisitor {
    type Value = Content;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar, an array of single-key objects, or an object")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Null))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Null))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Str(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Content, E> {
        Ok(Content::Scalar(Scalar::Str(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Content, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(fragment) = seq.next_element_seed(ItemSeed { depth: self.depth + 1 })? {
            items.push(fragment);
        }
        Ok(Content::List(items))
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> std::result::Result<Content, M::Error> {
        let mut children = IndexMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let content = map.next_value_seed(ContentSeed { depth: self.depth + 1 })?;
            if children.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            children.insert(key.clone(), Fragment { tag: key, content });
        }
        Ok(Content::Named(children))
    }
}

// -------------------------------- XML ------------------------------------- //

fn write_xml(out: &mut String, frag: &Fragment, depth: usize) {
    let indent = "  ".repeat(depth);
    let tag = &frag.tag;
    match &frag.content {
        Content::Scalar(Scalar::Null) => {
            out.push_str(&format!("{indent}<{tag} nil=\"true\"/>\n"));
        }
        Content::Scalar(s) => {
            let text = match s {
                Scalar::Null => String::new(),
                Scalar::Bool(b) => b.to_string(),
                Scalar::Int(i) => i.to_string(),
                Scalar::UInt(u) => u.to_string(),
                Scalar::Float(f) => format!("{f:?}"),
                Scalar::Str(s) => escape_xml(s),
            };
            out.push_str(&format!("{indent}<{tag}>{text}</{tag}>\n"));
        }
        Content::List(items) if items.is_empty() => out.push_str(&format!("{indent}<{tag}/>\n")),
        Content::Named(map) if map.is_empty() => out.push_str(&format!("{indent}<{tag}/>\n")),
        Content::List(items) => {
            out.push_str(&format!("{indent}<{tag}>\n"));
            for item in items {
                write_xml(out, item, depth + 1);
            }
            out.push_str(&format!("{indent}</{tag}>\n"));
        }
        Content::Named(map) => {
            out.push_str(&format!("{indent}<{tag}>\n"));
            for child in map.values() {
                write_xml(out, child, depth + 1);
            }
            out.push_str(&format!("{indent}</{tag}>\n"));
        }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Fragment {
        Fragment::node("Add")
            .with(Fragment::scalar("type", "int"))
            .unwrap()
            .with(Fragment::slot(
                "left",
                Fragment::node("Constant").with(Fragment::scalar("value", 2i64)).unwrap(),
            ))
            .unwrap()
            .with(Fragment::list("tags", vec![Fragment::scalar("item", "a"), Fragment::null("item")]))
            .unwrap()
    }

    #[test]
    fn renders_to_nested_json() {
        let doc = Document::new(sample());
        assert_eq!(
            doc.to_json().unwrap(),
            json!({"Add": {"type": "int", "left": {"Constant": {"value": 2}}, "tags": [{"item": "a"}, {"item": null}]}})
        );
    }

    #[test]
    fn json_text_round_trip_keeps_key_order() {
        let doc = Document::new(sample());
        let text = doc.to_json_string().unwrap();
        assert_eq!(Document::from_json_str(&text).unwrap(), doc);
        assert!(text.find("\"type\"").unwrap() < text.find("\"left\"").unwrap());
    }

    #[test]
    fn large_unsigned_stays_unsigned_small_collapses_to_int() {
        let doc = Document::from_json_str(r#"{"v": [{"a": 18446744073709551615}, {"b": 7}, {"c": -1.5}]}"#).unwrap();
        let items = doc.root.items().unwrap();
        assert_eq!(items[0].as_scalar(), Some(&Scalar::UInt(u64::MAX)));
        assert_eq!(items[1].as_scalar(), Some(&Scalar::Int(7)));
        assert_eq!(items[2].as_scalar(), Some(&Scalar::Float(-1.5)));
    }

    #[test]
    fn rejects_multi_key_roots_and_duplicate_keys() {
        assert!(Document::from_json_str(r#"{"a": 1, "b": 2}"#).is_err());
        assert!(Document::from_json_str(r#"{"a": {"x": 1, "x": 2}}"#).is_err());
        assert!(Document::from_json_str(r#"{"a": [{"x": 1, "y": 2}]}"#).is_err());
        assert!(Document::from_json_str("{}").is_err());
    }

    #[test]
    fn push_rejects_duplicate_names() {
        let node = Fragment::node("Call").with(Fragment::scalar("type", "int")).unwrap();
        let err = node.with(Fragment::scalar("type", "long")).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn xml_writer_nests_and_escapes() {
        let frag = Fragment::node("Constant")
            .with(Fragment::scalar("type", "string"))
            .unwrap()
            .with(Fragment::scalar("value", "a<b & c"))
            .unwrap();
        let xml = Document::new(frag).to_xml_string();
        assert!(xml.contains("<Constant>\n  <type>string</type>\n  <value>a&lt;b &amp; c</value>\n</Constant>"));
    }

    #[test]
    fn depth_counts_lists_and_slots() {
        assert_eq!(Fragment::scalar("v", 1i64).depth(), 1);
        assert_eq!(sample().depth(), 3);
    }

    #[test]
    fn nesting_past_the_cap_is_an_error_not_a_crash() {
        let nest = |levels: usize| format!("{}null{}", r#"{"a":"#.repeat(levels), "}".repeat(levels));
        assert_eq!(Document::from_json_str(&nest(MAX_DEPTH)).unwrap().depth(), MAX_DEPTH);
        match Document::from_json_str(&nest(MAX_DEPTH + 1)) {
            Err(CodecError::Json { message, .. }) => assert!(message.contains("deeper than"), "{message}"),
            other => panic!("unexpected {other:?}"),
        }
        let lists = format!("{}null{}", r#"{"a":["#.repeat(100_000), "]}".repeat(100_000));
        assert!(Document::from_json_str(&lists).is_err());
    }

    #[test]
    fn sole_child_requires_exactly_one() {
        let slot = Fragment::slot("body", Fragment::node("Default"));
        assert_eq!(slot.sole_child().unwrap().tag, "Default");
        assert!(Fragment::node("body").sole_child().is_err());
    }
}
