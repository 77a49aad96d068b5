//! Member, method and constructor descriptors plus the binding forms used by
//! object and collection initializers.
//!
//! Descriptors are plain data: they name a member by declaring type, name and
//! signature. They never resolve anything at runtime.
use crate::error::{CodecError, Result};
use crate::fragment::Fragment;
use crate::ty::{Ty, TypeRegistry};

use super::Expr;

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    pub declaring: Ty,
    pub name: String,
    pub generic_args: Vec<Ty>,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorRef {
    pub declaring: Ty,
    pub params: Vec<Ty>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberRef {
    Field { declaring: Ty, name: String, ty: Ty },
    Property { declaring: Ty, name: String, ty: Ty },
    Method(MethodRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementInit {
    pub add_method: MethodRef,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberBinding {
    /// `member = expr`
    Assignment { member: MemberRef, expr: Expr },
    /// `member = { nested bindings }`
    MemberBinding { member: MemberRef, bindings: Vec<MemberBinding> },
    /// `member = { add(..), add(..) }`
    ListBinding { member: MemberRef, initializers: Vec<ElementInit> },
}

impl MethodRef {
    pub fn new(declaring: Ty, name: impl Into<String>, params: Vec<Ty>, ret: Ty) -> Self {
        Self { declaring, name: name.into(), generic_args: Vec::new(), params, ret }
    }

    pub fn with_generic_args(mut self, args: Vec<Ty>) -> Self {
        self.generic_args = args;
        self
    }
}

impl ConstructorRef {
    pub fn new(declaring: Ty, params: Vec<Ty>) -> Self {
        Self { declaring, params }
    }
}

impl MemberRef {
    pub fn field(declaring: Ty, name: impl Into<String>, ty: Ty) -> Self {
        MemberRef::Field { declaring, name: name.into(), ty }
    }

    pub fn property(declaring: Ty, name: impl Into<String>, ty: Ty) -> Self {
        MemberRef::Property { declaring, name: name.into(), ty }
    }

    pub fn name(&self) -> &str {
        match self {
            MemberRef::Field { name, .. } | MemberRef::Property { name, .. } => name,
            MemberRef::Method(m) => &m.name,
        }
    }

    /// Field/property type, or the method's return type.
    pub fn ty(&self) -> &Ty {
        match self {
            MemberRef::Field { ty, .. } | MemberRef::Property { ty, .. } => ty,
            MemberRef::Method(m) => &m.ret,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MemberRef::Field { .. } => "Field",
            MemberRef::Property { .. } => "Property",
            MemberRef::Method(_) => "Method",
        }
    }
}

impl MemberBinding {
    pub fn member(&self) -> &MemberRef {
        match self {
            MemberBinding::Assignment { member, .. }
            | MemberBinding::MemberBinding { member, .. }
            | MemberBinding::ListBinding { member, .. } => member,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MemberBinding::Assignment { .. } => "Assignment",
            MemberBinding::MemberBinding { .. } => "MemberBinding",
            MemberBinding::ListBinding { .. } => "ListBinding",
        }
    }
}

// ----------------------------- Fragments ---------------------------------- //

fn type_list(tag: &str, types: &[Ty]) -> Fragment {
    Fragment::list(tag, types.iter().map(|t| Fragment::scalar("type", t.render())).collect())
}

fn read_type_list(frag: &Fragment, key: &str, reg: &TypeRegistry) -> Result<Vec<Ty>> {
    frag.require(key)?
        .items()?
        .iter()
        .map(|item| match item.tag.as_str() {
            "type" => reg.parse(item.str_value()?),
            _ => Err(CodecError::value_decode(format!("`type` entries in `{key}`"), item.describe())),
        })
        .collect()
}

fn read_type(frag: &Fragment, key: &str, reg: &TypeRegistry) -> Result<Ty> {
    reg.parse(frag.require(key)?.str_value()?)
}

impl MethodRef {
    pub(crate) fn to_fragment(&self, tag: &str) -> Result<Fragment> {
        let generic = (!self.generic_args.is_empty()).then(|| type_list("genericArguments", &self.generic_args));
        Fragment::node(tag)
            .with(Fragment::scalar("declaringType", self.declaring.render()))?
            .with(Fragment::scalar("name", self.name.as_str()))?
            .with_opt(generic)?
            .with(type_list("parameters", &self.params))?
            .with(Fragment::scalar("returnType", self.ret.render()))
    }

    pub(crate) fn from_fragment(frag: &Fragment, reg: &TypeRegistry) -> Result<Self> {
        let generic_args = match frag.get("genericArguments") {
            Some(_) => read_type_list(frag, "genericArguments", reg)?,
            None => Vec::new(),
        };
        Ok(Self {
            declaring: read_type(frag, "declaringType", reg)?,
            name: frag.require("name")?.str_value()?.to_string(),
            generic_args,
            params: read_type_list(frag, "parameters", reg)?,
            ret: read_type(frag, "returnType", reg)?,
        })
    }
}

impl ConstructorRef {
    pub(crate) fn to_fragment(&self) -> Result<Fragment> {
        Fragment::node("constructor")
            .with(Fragment::scalar("declaringType", self.declaring.render()))?
            .with(type_list("parameters", &self.params))
    }

    pub(crate) fn from_fragment(frag: &Fragment, reg: &TypeRegistry) -> Result<Self> {
        Ok(Self {
            declaring: read_type(frag, "declaringType", reg)?,
            params: read_type_list(frag, "parameters", reg)?,
        })
    }
}

impl MemberRef {
    /// `"member": {"Property": {declaringType, name, type}}`
    pub(crate) fn to_fragment(&self, tag: &str) -> Result<Fragment> {
        let inner = match self {
            MemberRef::Field { declaring, name, ty } | MemberRef::Property { declaring, name, ty } => {
                Fragment::node(self.tag())
                    .with(Fragment::scalar("declaringType", declaring.render()))?
                    .with(Fragment::scalar("name", name.as_str()))?
                    .with(Fragment::scalar("type", ty.render()))?
            }
            MemberRef::Method(m) => m.to_fragment("Method")?,
        };
        Ok(Fragment::slot(tag, inner))
    }

    pub(crate) fn from_fragment(slot: &Fragment, reg: &TypeRegistry) -> Result<Self> {
        let frag = slot.sole_child()?;
        let simple = || -> Result<(Ty, String, Ty)> {
            Ok((
                read_type(frag, "declaringType", reg)?,
                frag.require("name")?.str_value()?.to_string(),
                read_type(frag, "type", reg)?,
            ))
        };
        match frag.tag.as_str() {
            "Field" => simple().map(|(declaring, name, ty)| MemberRef::Field { declaring, name, ty }),
            "Property" => simple().map(|(declaring, name, ty)| MemberRef::Property { declaring, name, ty }),
            "Method" => MethodRef::from_fragment(frag, reg).map(MemberRef::Method),
            _ => Err(CodecError::value_decode("Field, Property or Method", frag.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::default().with_class("Math", Some(0)).with_class("Point", Some(0))
    }

    #[test]
    fn method_descriptor_round_trips() {
        let reg = registry();
        let m = MethodRef::new(Ty::named("Math"), "Max", vec![Ty::INT, Ty::INT], Ty::INT)
            .with_generic_args(vec![Ty::STRING]);
        let frag = m.to_fragment("method").unwrap();
        let doc = crate::fragment::Document::new(frag.clone());
        assert_eq!(
            doc.to_json().unwrap(),
            json!({"method": {
                "declaringType": "Math",
                "name": "Max",
                "genericArguments": [{"type": "string"}],
                "parameters": [{"type": "int"}, {"type": "int"}],
                "returnType": "int"
            }})
        );
        assert_eq!(MethodRef::from_fragment(&frag, &reg).unwrap(), m);
    }

    #[test]
    fn member_slot_carries_its_kind() {
        let reg = registry();
        for member in [
            MemberRef::field(Ty::named("Point"), "X", Ty::INT),
            MemberRef::property(Ty::named("Point"), "Length", Ty::DOUBLE),
            MemberRef::Method(MethodRef::new(Ty::named("Point"), "Norm", vec![], Ty::DOUBLE)),
        ] {
            let frag = member.to_fragment("member").unwrap();
            assert_eq!(frag.sole_child().unwrap().tag, member.tag());
            assert_eq!(MemberRef::from_fragment(&frag, &reg).unwrap(), member);
        }
    }

    #[test]
    fn unregistered_declaring_type_is_unknown() {
        let c = ConstructorRef::new(Ty::named("Widget"), vec![]);
        let frag = c.to_fragment().unwrap();
        assert!(matches!(
            ConstructorRef::from_fragment(&frag, &registry()),
            Err(CodecError::UnknownType { .. })
        ));
    }
}
