//! Definition/use bookkeeping for shared parameters and label targets.
//!
//! Encode side ([`Bindings`]) is keyed by entity identity and mints ids; the
//! first occurrence of an entity is its definition, every later occurrence is
//! a reference carrying the same id. Decode side ([`Definitions`]) maps ids
//! back to the entity built at the definition.
//!
//! Both tables live for exactly one encode or decode call.
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{CodecError, Result};
use crate::fragment::{Content, Fragment};

pub const ID: &str = "id";
pub const REF: &str = "ref";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Parameter,
    Label,
}

impl RefKind {
    fn prefix(self) -> char {
        match self {
            RefKind::Parameter => 'p',
            RefKind::Label => 'l',
        }
    }
}

/// Identity of a shared entity: its kind plus the address of its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefKey {
    kind: RefKind,
    addr: usize,
}

impl RefKey {
    pub fn parameter(addr: usize) -> Self {
        Self { kind: RefKind::Parameter, addr }
    }

    pub fn label(addr: usize) -> Self {
        Self { kind: RefKind::Label, addr }
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }
}

// ------------------------------- Encode ----------------------------------- //

#[derive(Debug, Default)]
pub struct Bindings {
    ids: HashMap<RefKey, String>,
    fragments: HashMap<RefKey, Fragment>,
    counters: HashMap<RefKind, usize>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.ids.clear();
        self.fragments.clear();
        self.counters.clear();
    }

    pub fn is_defined(&self, key: RefKey) -> bool {
        self.ids.contains_key(&key)
    }

    /// Mints the id for `key`. Defining twice is a codec defect.
    pub fn define(&mut self, key: RefKey) -> Result<String> {
        if let Some(id) = self.ids.get(&key) {
            return Err(CodecError::internal(format!("`{id}` defined twice")));
        }
        let n = self.counters.entry(key.kind).or_insert(0);
        let id = format!("{}{}", key.kind.prefix(), n);
        *n += 1;
        self.ids.insert(key, id.clone());
        Ok(id)
    }

    /// Keeps the defining fragment so later references can copy it.
    pub fn remember(&mut self, key: RefKey, fragment: Fragment) -> Result<()> {
        if !self.is_defined(key) {
            return Err(CodecError::internal("remembering an undefined entity"));
        }
        self.fragments.insert(key, fragment);
        Ok(())
    }

    /// A copy of the defining fragment with its `id` slot turned into `ref`.
    pub fn reference(&self, key: RefKey) -> Result<Fragment> {
        let original = self
            .fragments
            .get(&key)
            .ok_or_else(|| CodecError::internal(format!("{:?} referenced before definition", key.kind)))?;
        let Content::Named(slots) = &original.content else {
            return Err(CodecError::internal(format!("`{}` definition is not a node", original.tag)));
        };
        let slots: IndexMap<String, Fragment> = slots
            .iter()
            .map(|(k, v)| match k.as_str() {
                ID => (REF.to_string(), v.clone().renamed(REF)),
                _ => (k.clone(), v.clone()),
            })
            .collect();
        if !slots.contains_key(REF) {
            return Err(CodecError::internal(format!("`{}` definition has no id", original.tag)));
        }
        Ok(Fragment::with_content(original.tag.clone(), Content::Named(slots)))
    }
}

// ------------------------------- Decode ----------------------------------- //

#[derive(Debug)]
pub struct Definitions<T> {
    entities: HashMap<String, T>,
}

impl<T> Default for Definitions<T> {
    fn default() -> Self {
        Self { entities: HashMap::new() }
    }
}

impl<T: Clone> Definitions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entities.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registers the entity built at a definition site.
    pub fn define(&mut self, id: &str, entity: T) -> Result<()> {
        if self.entities.contains_key(id) {
            return Err(CodecError::value_decode("a fresh id", format!("`{id}` defined twice")));
        }
        self.entities.insert(id.to_string(), entity);
        Ok(())
    }

    pub fn resolve(&self, id: &str) -> Result<T> {
        self.entities
            .get(id)
            .cloned()
            .ok_or_else(|| CodecError::DanglingReference { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param_fragment(id: &str) -> Fragment {
        Fragment::node("Parameter")
            .with(Fragment::scalar(ID, id))
            .unwrap()
            .with(Fragment::scalar("name", "x"))
            .unwrap()
            .with(Fragment::scalar("type", "int"))
            .unwrap()
    }

    #[test]
    fn ids_are_minted_per_kind_in_order() {
        let mut b = Bindings::new();
        assert_eq!(b.define(RefKey::parameter(1)).unwrap(), "p0");
        assert_eq!(b.define(RefKey::label(1)).unwrap(), "l0");
        assert_eq!(b.define(RefKey::parameter(2)).unwrap(), "p1");
        assert!(b.define(RefKey::parameter(1)).unwrap_err().is_internal());
    }

    #[test]
    fn reference_is_a_copy_with_ref_in_place_of_id() {
        let mut b = Bindings::new();
        let key = RefKey::parameter(7);
        let id = b.define(key).unwrap();
        b.remember(key, param_fragment(&id)).unwrap();

        let r = b.reference(key).unwrap();
        let keys: Vec<&str> = r.named().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["ref", "name", "type"]);
        assert_eq!(r.get(REF).unwrap().str_value().unwrap(), "p0");
        assert!(r.get(ID).is_none());
    }

    #[test]
    fn use_before_define_is_internal() {
        let b = Bindings::new();
        assert!(b.reference(RefKey::label(3)).unwrap_err().is_internal());
    }

    #[test]
    fn reset_restarts_numbering() {
        let mut b = Bindings::new();
        b.define(RefKey::parameter(1)).unwrap();
        b.reset();
        assert!(!b.is_defined(RefKey::parameter(1)));
        assert_eq!(b.define(RefKey::parameter(9)).unwrap(), "p0");
    }

    #[test]
    fn definitions_resolve_and_reject() {
        let mut d: Definitions<String> = Definitions::new();
        d.define("p0", "x".into()).unwrap();
        assert_eq!(d.resolve("p0").unwrap(), "x");
        assert!(matches!(d.resolve("p1"), Err(CodecError::DanglingReference { id }) if id == "p1"));
        assert!(matches!(d.define("p0", "y".into()), Err(CodecError::ValueDecode { .. })));
        d.reset();
        assert!(d.is_empty());
    }
}
