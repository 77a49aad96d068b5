//! `byte[]` payloads: base64 text plus the declared length.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{Value, ValueCodec, named};
use crate::error::{CodecError, Result};
use crate::fragment::{Content, Fragment};
use crate::ty::Ty;

pub(super) fn encode(_: &ValueCodec, ty: &Ty, v: &Value) -> Result<Content> {
    let Value::Bytes(bytes) = v else {
        return Err(CodecError::mismatch(ty, v.type_label()));
    };
    named(vec![
        Fragment::scalar("length", bytes.len()),
        Fragment::scalar("base64", STANDARD.encode(bytes)),
    ])
}

pub(super) fn decode(_: &ValueCodec, ty: &Ty, frag: &Fragment) -> Result<Value> {
    let length = frag.require("length")?.usize_value()?;
    let text = frag.require("base64")?.str_value()?;
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| CodecError::value_decode(format!("base64 {ty}"), e.to_string()))?;
    if bytes.len() != length {
        return Err(CodecError::value_decode(format!("{length} byte(s)"), bytes.len().to_string()));
    }
    Ok(Value::Bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{Prim, TypeRegistry};
    use serde_json::json;

    fn bytes_ty() -> Ty {
        Ty::array(Ty::Prim(Prim::Byte))
    }

    #[test]
    fn null_and_empty_stay_distinct() {
        let c = ValueCodec::new(TypeRegistry::default().shared());
        let empty = c.encode_as("value", &bytes_ty(), &Value::Bytes(vec![])).unwrap();
        let null = c.encode_as("value", &bytes_ty(), &Value::Null).unwrap();
        assert_ne!(empty, null);
        assert_eq!(c.decode(&bytes_ty(), &empty).unwrap(), Value::Bytes(vec![]));
        assert_eq!(c.decode(&bytes_ty(), &null).unwrap(), Value::Null);
    }

    #[test]
    fn payload_is_base64_with_length() {
        let c = ValueCodec::new(TypeRegistry::default().shared());
        let frag = c.encode_as("value", &bytes_ty(), &Value::Bytes(b"hi!".to_vec())).unwrap();
        let doc = crate::fragment::Document::new(frag.clone());
        assert_eq!(doc.to_json().unwrap(), json!({"value": {"length": 3, "base64": "aGkh"}}));
        assert_eq!(c.decode(&bytes_ty(), &frag).unwrap(), Value::Bytes(b"hi!".to_vec()));
    }

    #[test]
    fn length_mismatch_is_a_decode_error() {
        let c = ValueCodec::new(TypeRegistry::default().shared());
        let frag = Fragment::node("value")
            .with(Fragment::scalar("length", 4usize))
            .unwrap()
            .with(Fragment::scalar("base64", "aGkh"))
            .unwrap();
        assert!(matches!(c.decode(&bytes_ty(), &frag), Err(CodecError::ValueDecode { .. })));
    }
}
