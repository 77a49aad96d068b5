//! Integer and floating-point transforms.
//!
//! Integers whose magnitude exceeds 2^53 − 1 are written as decimal strings so
//! consumers that read numbers as IEEE-754 doubles never round them. Float
//! specials are written as string sentinels; JSON numbers cannot spell them.
use half::f16;
use ordered_float::OrderedFloat;

use super::{Value, ValueCodec};
use crate::error::{CodecError, Result};
use crate::fragment::{Content, Fragment, Scalar};
use crate::ty::{Prim, Ty};

/// Largest integer magnitude a double represents exactly.
pub const SAFE_INTEGER_MAX: u64 = (1 << 53) - 1;

pub const NAN: &str = "NaN";
pub const POSITIVE_INFINITY: &str = "Infinity";
pub const NEGATIVE_INFINITY: &str = "-Infinity";

pub fn wide_scalar(v: i128) -> Scalar {
    if v.unsigned_abs() > SAFE_INTEGER_MAX as u128 {
        Scalar::Str(v.to_string())
    } else {
        Scalar::Int(v as i64)
    }
}

/// Reads an integer literal, or its string form when `allow_text` is set.
pub fn wide_value(frag: &Fragment, allow_text: bool) -> Result<i128> {
    match frag.as_scalar() {
        Some(Scalar::Int(i)) => Ok(*i as i128),
        Some(Scalar::UInt(u)) => Ok(*u as i128),
        Some(Scalar::Str(s)) if allow_text => s
            .parse::<i128>()
            .map_err(|_| CodecError::value_decode("integer text", format!("{s:?}"))),
        _ => Err(CodecError::value_decode("integer", frag.describe())),
    }
}

pub(super) fn encode_int(_: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let raw: i128 = match (ty.as_prim(), v) {
        (Some(Prim::SByte), Value::I8(x)) => *x as i128,
        (Some(Prim::Byte), Value::U8(x)) => *x as i128,
        (Some(Prim::Short), Value::I16(x)) => *x as i128,
        (Some(Prim::UShort), Value::U16(x)) => *x as i128,
        (Some(Prim::Int), Value::I32(x)) => *x as i128,
        (Some(Prim::UInt), Value::U32(x)) => *x as i128,
        (Some(Prim::Long), Value::I64(x)) => *x as i128,
        (Some(Prim::ULong), Value::U64(x)) => *x as i128,
        (Some(Prim::NInt), Value::ISize(x)) => *x as i128,
        (Some(Prim::NUInt), Value::USize(x)) => *x as i128,
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    Ok(Content::Scalar(wide_scalar(raw)))
}

pub(super) fn decode_int(_: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let prim = ty.as_prim().ok_or_else(|| CodecError::value_decode(ty.render(), frag.describe()))?;
    let wide = matches!(prim, Prim::Long | Prim::ULong | Prim::NInt | Prim::NUInt);
    let raw = wide_value(frag, wide)?;
    let out_of_range = |_| CodecError::value_decode(format!("{} in range", prim.keyword()), raw.to_string());
    Ok(match prim {
        Prim::SByte => Value::I8(i8::try_from(raw).map_err(out_of_range)?),
        Prim::Byte => Value::U8(u8::try_from(raw).map_err(out_of_range)?),
        Prim::Short => Value::I16(i16::try_from(raw).map_err(out_of_range)?),
        Prim::UShort => Value::U16(u16::try_from(raw).map_err(out_of_range)?),
        Prim::Int => Value::I32(i32::try_from(raw).map_err(out_of_range)?),
        Prim::UInt => Value::U32(u32::try_from(raw).map_err(out_of_range)?),
        Prim::Long => Value::I64(i64::try_from(raw).map_err(out_of_range)?),
        Prim::ULong => Value::U64(u64::try_from(raw).map_err(out_of_range)?),
        Prim::NInt => Value::ISize(i64::try_from(raw).map_err(out_of_range)?),
        Prim::NUInt => Value::USize(u64::try_from(raw).map_err(out_of_range)?),
        _ => return Err(CodecError::internal(format!("integer transform on `{ty}`"))),
    })
}

fn float_scalar(v: f64) -> Scalar {
    if v.is_nan() {
        Scalar::Str(NAN.to_string())
    } else if v == f64::INFINITY {
        Scalar::Str(POSITIVE_INFINITY.to_string())
    } else if v == f64::NEG_INFINITY {
        Scalar::Str(NEGATIVE_INFINITY.to_string())
    } else {
        Scalar::Float(v)
    }
}

/// Widens through the shortest decimal spelling so `0.1f32` is written as `0.1`.
fn widen(v: f32) -> f64 {
    if !v.is_finite() {
        return v as f64;
    }
    v.to_string().parse::<f64>().unwrap_or(v as f64)
}

pub(super) fn encode_float(_: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let scalar = match (ty.as_prim(), v) {
        (Some(Prim::Double), Value::Double(x)) => float_scalar(x.0),
        (Some(Prim::Float), Value::Float(x)) => float_scalar(widen(x.0)),
        (Some(Prim::Half), Value::Half(x)) => float_scalar(widen(x.to_f32())),
        _ => return Err(CodecError::mismatch(ty, v.type_label())),
    };
    Ok(Content::Scalar(scalar))
}

pub(super) fn decode_float(_: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let fail = || CodecError::value_decode(ty.render(), frag.describe());
    let x = match frag.as_scalar() {
        Some(Scalar::Float(f)) => *f,
        Some(Scalar::Int(i)) => *i as f64,
        Some(Scalar::UInt(u)) => *u as f64,
        Some(Scalar::Str(s)) => match s.as_str() {
            NAN => f64::NAN,
            POSITIVE_INFINITY => f64::INFINITY,
            NEGATIVE_INFINITY => f64::NEG_INFINITY,
            _ => return Err(fail()),
        },
        _ => return Err(fail()),
    };
    match ty.as_prim() {
        Some(Prim::Double) => Ok(Value::Double(OrderedFloat(x))),
        Some(Prim::Float) => {
            let y = x as f32;
            if x.is_finite() && !y.is_finite() {
                return Err(fail());
            }
            Ok(Value::Float(OrderedFloat(y)))
        }
        Some(Prim::Half) => {
            let y = f16::from_f64(x);
            if x.is_finite() && !y.is_finite() {
                return Err(fail());
            }
            Ok(Value::Half(y))
        }
        _ => Err(CodecError::internal(format!("float transform on `{ty}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeRegistry;

    fn codec() -> ValueCodec {
        ValueCodec::new(TypeRegistry::default().shared())
    }

    fn scalar_of(codec: &ValueCodec, ty: &Ty, v: &Value) -> Scalar {
        match codec.encode(ty, v).unwrap() {
            Content::Scalar(s) => s,
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    fn back(codec: &ValueCodec, ty: &Ty, s: Scalar) -> Value {
        codec.decode(ty, &Fragment::scalar("value", s)).unwrap()
    }

    #[test]
    fn long_switches_to_text_exactly_past_the_safe_bound() {
        let c = codec();
        let safe = (1i64 << 53) - 1;
        let cases = [
            (safe, Scalar::Int(safe)),
            (safe + 1, Scalar::Str("9007199254740992".into())),
            (safe + 2, Scalar::Str("9007199254740993".into())),
            (-safe, Scalar::Int(-safe)),
            (-(safe + 1), Scalar::Str("-9007199254740992".into())),
            (-(safe + 2), Scalar::Str("-9007199254740993".into())),
            (i64::MIN, Scalar::Str(i64::MIN.to_string())),
        ];
        for (n, expected) in cases {
            let s = scalar_of(&c, &Ty::LONG, &Value::I64(n));
            assert_eq!(s, expected, "{n}");
            assert_eq!(back(&c, &Ty::LONG, s), Value::I64(n));
        }
    }

    #[test]
    fn ulong_and_pointer_sized_follow_the_same_bound() {
        let c = codec();
        let ulong = Ty::Prim(Prim::ULong);
        assert_eq!(scalar_of(&c, &ulong, &Value::U64(SAFE_INTEGER_MAX)), Scalar::Int(SAFE_INTEGER_MAX as i64));
        let s = scalar_of(&c, &ulong, &Value::U64(u64::MAX));
        assert_eq!(s, Scalar::Str(u64::MAX.to_string()));
        assert_eq!(back(&c, &ulong, s), Value::U64(u64::MAX));

        let nint = Ty::Prim(Prim::NInt);
        assert_eq!(scalar_of(&c, &nint, &Value::ISize(1 << 53)), Scalar::Str("9007199254740992".into()));
        let nuint = Ty::Prim(Prim::NUInt);
        assert_eq!(scalar_of(&c, &nuint, &Value::USize(42)), Scalar::Int(42));
    }

    #[test]
    fn literal_beyond_bound_is_still_accepted() {
        let c = codec();
        assert_eq!(back(&c, &Ty::LONG, Scalar::Int(9007199254740993)), Value::I64(9007199254740993));
        assert_eq!(back(&c, &Ty::Prim(Prim::ULong), Scalar::UInt(u64::MAX)), Value::U64(u64::MAX));
    }

    #[test]
    fn narrow_integers_reject_text_and_overflow() {
        let c = codec();
        let frag = Fragment::scalar("value", "12");
        assert!(c.decode(&Ty::INT, &frag).is_err());
        let frag = Fragment::scalar("value", 300i64);
        assert!(c.decode(&Ty::Prim(Prim::Byte), &frag).is_err());
        assert_eq!(back(&c, &Ty::Prim(Prim::SByte), Scalar::Int(-128)), Value::I8(-128));
    }

    #[test]
    fn float_specials_use_sentinels_for_both_precisions() {
        let c = codec();
        let float = Ty::Prim(Prim::Float);
        for (d, token) in [(f64::NAN, NAN), (f64::INFINITY, POSITIVE_INFINITY), (f64::NEG_INFINITY, NEGATIVE_INFINITY)] {
            let s = scalar_of(&c, &Ty::DOUBLE, &Value::double(d));
            assert_eq!(s, Scalar::Str(token.into()));
            let Value::Double(out) = back(&c, &Ty::DOUBLE, s) else { panic!("double") };
            assert!(out.0.is_nan() == d.is_nan() && (d.is_nan() || out.0 == d));

            let f = d as f32;
            let s = scalar_of(&c, &float, &Value::float(f));
            assert_eq!(s, Scalar::Str(token.into()));
            let Value::Float(out) = back(&c, &float, s) else { panic!("float") };
            assert!(out.0.is_nan() == f.is_nan() && (f.is_nan() || out.0 == f));
        }
    }

    #[test]
    fn floats_keep_their_shortest_spelling() {
        let c = codec();
        let float = Ty::Prim(Prim::Float);
        assert_eq!(scalar_of(&c, &float, &Value::float(0.1)), Scalar::Float(0.1));
        assert_eq!(back(&c, &float, Scalar::Float(0.1)), Value::float(0.1));
        assert_eq!(back(&c, &Ty::DOUBLE, Scalar::Int(3)), Value::double(3.0));
        assert!(c.decode(&float, &Fragment::scalar("value", 1e300)).is_err());
    }

    #[test]
    fn half_is_promoted_to_float() {
        let c = codec();
        let half = Ty::Prim(Prim::Half);
        let v = Value::Half(f16::from_f32(1.5));
        assert_eq!(scalar_of(&c, &half, &v), Scalar::Float(1.5));
        assert_eq!(back(&c, &half, Scalar::Float(1.5)), v);
        assert_eq!(scalar_of(&c, &half, &Value::Half(f16::INFINITY)), Scalar::Str(POSITIVE_INFINITY.into()));
    }
}
