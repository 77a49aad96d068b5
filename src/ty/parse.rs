use super::{Prim, Ty, TypeRegistry};
use crate::error::{CodecError, Result};

/// Deepest type nesting accepted, counting every `<…>`, `[]` and `?` level.
pub const MAX_TYPE_DEPTH: usize = 64;

pub(super) fn parse(reg: &TypeRegistry, src: &str) -> Result<Ty> {
    let mut p = Parser { src, pos: 0, open: 0, reg };
    let (ty, _) = p.ty()?;
    p.skip_ws();
    if p.pos != src.len() {
        return Err(p.fail("trailing input"));
    }
    Ok(ty)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Argument lists currently open.
    open: usize,
    reg: &'a TypeRegistry,
}

impl<'a> Parser<'a> {
    /// A type and its nesting depth.
    fn ty(&mut self) -> Result<(Ty, usize)> {
        let (mut ty, mut depth) = self.base()?;
        loop {
            let wrap: fn(Box<Ty>) -> Ty = if self.eat("[]") {
                Ty::Array
            } else if self.eat("?") {
                Ty::Nullable
            } else {
                return Ok((ty, depth));
            };
            depth += 1;
            if depth > MAX_TYPE_DEPTH {
                return Err(self.fail("type nests too deeply"));
            }
            ty = wrap(Box::new(ty));
        }
    }

    fn base(&mut self) -> Result<(Ty, usize)> {
        self.skip_ws();
        let name = self.ident()?;
        let (args, depth) = if self.eat("<") { self.args()? } else { (Vec::new(), 1) };

        if name == "Tuple" {
            if args.is_empty() {
                return Err(self.fail("Tuple needs at least one item type"));
            }
            return Ok((Ty::Tuple(args), depth));
        }
        if let Some(prim) = Prim::from_keyword(name) {
            if !args.is_empty() {
                return Err(self.fail("primitive types take no type arguments"));
            }
            return Ok((Ty::Prim(prim), depth));
        }
        self.reg.check_arity(name, args.len())?;
        Ok((Ty::Named { name: name.to_string(), args }, depth))
    }

    /// Arguments after `<`, with the depth of the generic they belong to.
    fn args(&mut self) -> Result<(Vec<Ty>, usize)> {
        self.open += 1;
        if self.open >= MAX_TYPE_DEPTH {
            return Err(self.fail("type nests too deeply"));
        }
        let (first, mut deepest) = self.ty()?;
        let mut args = vec![first];
        loop {
            self.skip_ws();
            if self.eat(",") {
                let (arg, depth) = self.ty()?;
                deepest = deepest.max(depth);
                args.push(arg);
            } else if self.eat(">") {
                self.open -= 1;
                let depth = deepest + 1;
                if depth > MAX_TYPE_DEPTH {
                    return Err(self.fail("type nests too deeply"));
                }
                return Ok((args, depth));
            } else {
                return Err(self.fail("expected `,` or `>`"));
            }
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        let src: &'a str = self.src;
        let rest = &src[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && (c.is_ascii_digit() || c == '.'))))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.fail("expected a type name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn fail(&self, why: &str) -> CodecError {
        CodecError::UnknownType {
            name: self.src.to_string(),
            source: Some(format!("{why} at offset {}", self.pos).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{EnumDef, IntKind, RecordDef};
    use super::*;

    fn reg() -> TypeRegistry {
        TypeRegistry::default()
            .with_enum(EnumDef::new("Access", IntKind::Byte, true))
            .with_record(RecordDef::new("Point").field("X", Ty::INT))
    }

    #[test]
    fn parses_what_it_renders() {
        let reg = reg();
        let cases = [
            Ty::INT,
            Ty::array(Ty::nullable(Ty::LONG)),
            Ty::nullable(Ty::array(Ty::LONG)),
            Ty::Tuple(vec![Ty::STRING, Ty::Tuple(vec![Ty::INT, Ty::named("Point")])]),
            Ty::generic("Dictionary", vec![Ty::STRING, Ty::generic("List", vec![Ty::named("Access")])]),
            Ty::func(vec![Ty::INT, Ty::INT], Ty::BOOL),
            Ty::generic("Action", vec![]),
        ];
        for ty in cases {
            let text = ty.render();
            assert_eq!(reg.parse(&text).unwrap(), ty, "{text}");
        }
    }

    #[test]
    fn tolerates_spaces_between_arguments() {
        let ty = reg().parse("Dictionary< string , int[] >").unwrap();
        assert_eq!(ty.render(), "Dictionary<string,int[]>");
    }

    #[test]
    fn nesting_is_capped_without_exhausting_the_stack() {
        let reg = reg();
        let at_cap = format!("{}int{}", "List<".repeat(MAX_TYPE_DEPTH - 1), ">".repeat(MAX_TYPE_DEPTH - 1));
        assert!(reg.parse(&at_cap).is_ok());
        let arrays = format!("int{}", "[]".repeat(MAX_TYPE_DEPTH - 1));
        assert!(reg.parse(&arrays).is_ok());

        let too_deep = [
            format!("{}int{}", "List<".repeat(MAX_TYPE_DEPTH), ">".repeat(MAX_TYPE_DEPTH)),
            format!("{}int{}", "List<".repeat(200_000), ">".repeat(200_000)),
            format!("int{}", "[]".repeat(200_000)),
            format!("{}int{}", "List<".repeat(40), "[]>".repeat(40)),
        ];
        for src in &too_deep {
            assert!(matches!(reg.parse(src), Err(CodecError::UnknownType { .. })), "{}", &src[..20]);
        }
    }

    #[test]
    fn rejects_unknown_and_malformed_names() {
        let reg = reg();
        for bad in ["Widget", "int<string>", "List<int", "Tuple<>", "", "int]", "List<int,int>", "9abc"] {
            assert!(
                matches!(reg.parse(bad), Err(CodecError::UnknownType { .. })),
                "{bad:?} should not parse"
            );
        }
    }
}
