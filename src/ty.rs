//! Type descriptors and the type-name codec.
//!
//! A [`Ty`] renders to one canonical string and parses back from it:
//!
//! - primitive keywords: `int`, `string`, `DateTime`, ...
//! - arrays `T[]` and nullable wrappers `T?`
//! - positional tuples `Tuple<A,B,...>`
//! - registered composites, optionally generic: `List<int>`, `Dictionary<string,int>`
//!
//! Composite names only parse when they are known to a [`TypeRegistry`].
mod parse;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::{CodecError, Result};

// ------------------------------- Primitives ------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prim {
    Bool,
    SByte,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    NInt,
    NUInt,
    Half,
    Float,
    Double,
    Decimal,
    Char,
    String,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    Uri,
    DbNull,
    Object,
    Void,
}

impl Prim {
    pub const ALL: [Prim; 25] = [
        Prim::Bool, Prim::SByte, Prim::Byte, Prim::Short, Prim::UShort, Prim::Int,
        Prim::UInt, Prim::Long, Prim::ULong, Prim::NInt, Prim::NUInt, Prim::Half,
        Prim::Float, Prim::Double, Prim::Decimal, Prim::Char, Prim::String,
        Prim::DateTime, Prim::DateTimeOffset, Prim::TimeSpan, Prim::Guid, Prim::Uri,
        Prim::DbNull, Prim::Object, Prim::Void,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Prim::Bool => "bool",
            Prim::SByte => "sbyte",
            Prim::Byte => "byte",
            Prim::Short => "short",
            Prim::UShort => "ushort",
            Prim::Int => "int",
            Prim::UInt => "uint",
            Prim::Long => "long",
            Prim::ULong => "ulong",
            Prim::NInt => "nint",
            Prim::NUInt => "nuint",
            Prim::Half => "half",
            Prim::Float => "float",
            Prim::Double => "double",
            Prim::Decimal => "decimal",
            Prim::Char => "char",
            Prim::String => "string",
            Prim::DateTime => "DateTime",
            Prim::DateTimeOffset => "DateTimeOffset",
            Prim::TimeSpan => "TimeSpan",
            Prim::Guid => "Guid",
            Prim::Uri => "Uri",
            Prim::DbNull => "DBNull",
            Prim::Object => "object",
            Prim::Void => "void",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Prim> {
        static BY_KEYWORD: Lazy<IndexMap<&'static str, Prim>> =
            Lazy::new(|| Prim::ALL.iter().map(|p| (p.keyword(), *p)).collect());
        BY_KEYWORD.get(s).copied()
    }

    /// Value types can never hold `null` unless wrapped in `T?`.
    pub fn is_value_type(self) -> bool {
        !matches!(self, Prim::String | Prim::Uri | Prim::Object | Prim::DbNull | Prim::Void)
    }

    pub fn is_integral(self) -> bool {
        IntKind::from_prim(self).is_some()
    }
}

/// Integral primitives; the possible underlying types of an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    SByte,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
}

impl IntKind {
    pub fn prim(self) -> Prim {
        match self {
            IntKind::SByte => Prim::SByte,
            IntKind::Byte => Prim::Byte,
            IntKind::Short => Prim::Short,
            IntKind::UShort => Prim::UShort,
            IntKind::Int => Prim::Int,
            IntKind::UInt => Prim::UInt,
            IntKind::Long => Prim::Long,
            IntKind::ULong => Prim::ULong,
        }
    }

    pub fn from_prim(p: Prim) -> Option<IntKind> {
        Some(match p {
            Prim::SByte => IntKind::SByte,
            Prim::Byte => IntKind::Byte,
            Prim::Short => IntKind::Short,
            Prim::UShort => IntKind::UShort,
            Prim::Int => IntKind::Int,
            Prim::UInt => IntKind::UInt,
            Prim::Long => IntKind::Long,
            Prim::ULong => IntKind::ULong,
            _ => return None,
        })
    }

    pub fn range(self) -> (i128, i128) {
        match self {
            IntKind::SByte => (i8::MIN as i128, i8::MAX as i128),
            IntKind::Byte => (0, u8::MAX as i128),
            IntKind::Short => (i16::MIN as i128, i16::MAX as i128),
            IntKind::UShort => (0, u16::MAX as i128),
            IntKind::Int => (i32::MIN as i128, i32::MAX as i128),
            IntKind::UInt => (0, u32::MAX as i128),
            IntKind::Long => (i64::MIN as i128, i64::MAX as i128),
            IntKind::ULong => (0, u64::MAX as i128),
        }
    }
}

// ------------------------------- Descriptor ------------------------------- //

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Prim(Prim),
    Array(Box<Ty>),
    Nullable(Box<Ty>),
    Tuple(Vec<Ty>),
    Named { name: String, args: Vec<Ty> },
}

impl Ty {
    pub const BOOL: Ty = Ty::Prim(Prim::Bool);
    pub const INT: Ty = Ty::Prim(Prim::Int);
    pub const LONG: Ty = Ty::Prim(Prim::Long);
    pub const DOUBLE: Ty = Ty::Prim(Prim::Double);
    pub const STRING: Ty = Ty::Prim(Prim::String);
    pub const OBJECT: Ty = Ty::Prim(Prim::Object);
    pub const VOID: Ty = Ty::Prim(Prim::Void);

    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn nullable(inner: Ty) -> Ty {
        Ty::Nullable(Box::new(inner))
    }

    pub fn named(name: impl Into<String>) -> Ty {
        Ty::Named { name: name.into(), args: Vec::new() }
    }

    pub fn generic(name: impl Into<String>, args: Vec<Ty>) -> Ty {
        Ty::Named { name: name.into(), args }
    }

    /// `Func<A.., R>` for a lambda with the given parameter and return types.
    pub fn func(params: Vec<Ty>, ret: Ty) -> Ty {
        if ret == Ty::VOID {
            return Ty::generic("Action", params);
        }
        let mut args = params;
        args.push(ret);
        Ty::generic("Func", args)
    }

    pub fn as_prim(&self) -> Option<Prim> {
        match self {
            Ty::Prim(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Prim(Prim::Void))
    }

    /// Can a value of this type be `null`? Named types are assumed nullable.
    pub fn admits_null(&self) -> bool {
        match self {
            Ty::Prim(p) => !p.is_value_type(),
            Ty::Nullable(_) | Ty::Array(_) | Ty::Named { .. } => true,
            Ty::Tuple(_) => true,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Prim(p) => f.write_str(p.keyword()),
            Ty::Array(elem) => write!(f, "{elem}[]"),
            Ty::Nullable(inner) => write!(f, "{inner}?"),
            Ty::Tuple(items) => {
                f.write_str("Tuple<")?;
                write_args(f, items)?;
                f.write_str(">")
            }
            Ty::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_args(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Ty]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{a}")?;
    }
    Ok(())
}

// -------------------------------- Registry -------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub enum Composite {
    /// A reference type known only by name. `arity == None` means variadic.
    Class { arity: Option<usize> },
    Enum(EnumDef),
    Record(RecordDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub underlying: IntKind,
    pub flags: bool,
    /// Declaration order is kept; flag decomposition walks it.
    pub members: Vec<(String, i128)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, underlying: IntKind, flags: bool) -> Self {
        Self { name: name.into(), underlying, flags, members: Vec::new() }
    }

    pub fn member(mut self, name: impl Into<String>, value: i128) -> Self {
        self.members.push((name.into(), value));
        self
    }

    pub fn value_of(&self, name: &str) -> Option<i128> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// A structural (anonymous) record: an ordered property bag with typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<(String, Ty)>,
}

impl RecordDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<String>, ty: Ty) -> Self {
        self.fields.push((name.into(), ty));
        self
    }
}

/// Known composite names. Built once, then shared read-only between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRegistry {
    composites: IndexMap<String, Composite>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut composites = IndexMap::new();
        for (name, arity) in [
            ("List", Some(1)),
            ("IEnumerable", Some(1)),
            ("Dictionary", Some(2)),
            ("Expression", Some(1)),
            ("Func", None),
            ("Action", None),
            ("Exception", Some(0)),
        ] {
            composites.insert(name.to_string(), Composite::Class { arity });
        }
        Self { composites }
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn with_class(mut self, name: impl Into<String>, arity: Option<usize>) -> Self {
        self.composites.insert(name.into(), Composite::Class { arity });
        self
    }

    pub fn with_enum(mut self, def: EnumDef) -> Self {
        self.composites.insert(def.name.clone(), Composite::Enum(def));
        self
    }

    pub fn with_record(mut self, def: RecordDef) -> Self {
        self.composites.insert(def.name.clone(), Composite::Record(def));
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&Composite> {
        self.composites.get(name)
    }

    pub fn enum_def(&self, ty: &Ty) -> Option<&EnumDef> {
        match ty {
            Ty::Named { name, args } if args.is_empty() => match self.lookup(name) {
                Some(Composite::Enum(def)) => Some(def),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn record_def(&self, ty: &Ty) -> Option<&RecordDef> {
        match ty {
            Ty::Named { name, args } if args.is_empty() => match self.lookup(name) {
                Some(Composite::Record(def)) => Some(def),
                _ => None,
            },
            _ => None,
        }
    }

    /// Like [`Ty::admits_null`], but registered enums are value types.
    pub fn admits_null(&self, ty: &Ty) -> bool {
        ty.admits_null() && self.enum_def(ty).is_none()
    }

    pub fn parse(&self, src: &str) -> Result<Ty> {
        parse::parse(self, src)
    }

    /// Checks that a descriptor built in code only names registered composites.
    pub fn check(&self, ty: &Ty) -> Result<()> {
        match ty {
            Ty::Prim(_) => Ok(()),
            Ty::Array(t) | Ty::Nullable(t) => self.check(t),
            Ty::Tuple(items) => items.iter().try_for_each(|t| self.check(t)),
            Ty::Named { name, args } => {
                self.check_arity(name, args.len())?;
                args.iter().try_for_each(|t| self.check(t))
            }
        }
    }

    pub(crate) fn check_arity(&self, name: &str, found: usize) -> Result<()> {
        let expected = match self.lookup(name) {
            None => return Err(CodecError::unknown_type(name)),
            Some(Composite::Class { arity }) => *arity,
            Some(Composite::Enum(_)) | Some(Composite::Record(_)) => Some(0),
        };
        match expected {
            Some(n) if n != found => Err(CodecError::UnknownType {
                name: format!("{name}`{found}"),
                source: Some(format!("`{name}` takes {n} type argument(s)").into()),
            }),
            _ => Ok(()),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_descriptors() {
        let ty = Ty::generic("Dictionary", vec![Ty::STRING, Ty::array(Ty::nullable(Ty::INT))]);
        assert_eq!(ty.render(), "Dictionary<string,int?[]>");
        let tuple = Ty::Tuple(vec![Ty::OBJECT, Ty::Prim(Prim::Guid)]);
        assert_eq!(tuple.render(), "Tuple<object,Guid>");
    }

    #[test]
    fn func_collapses_void_to_action() {
        assert_eq!(Ty::func(vec![Ty::INT], Ty::VOID).render(), "Action<int>");
        assert_eq!(Ty::func(vec![Ty::INT], Ty::BOOL).render(), "Func<int,bool>");
    }

    #[test]
    fn keywords_are_unique() {
        for p in Prim::ALL {
            assert_eq!(Prim::from_keyword(p.keyword()), Some(p));
        }
    }

    #[test]
    fn check_rejects_wrong_arity() {
        let reg = TypeRegistry::default();
        assert!(reg.check(&Ty::generic("List", vec![Ty::INT])).is_ok());
        assert!(matches!(
            reg.check(&Ty::generic("List", vec![Ty::INT, Ty::INT])),
            Err(CodecError::UnknownType { .. })
        ));
        assert!(reg.check(&Ty::named("Widget")).is_err());
    }
}
