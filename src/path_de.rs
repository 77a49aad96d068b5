use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::fragment::Document;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, CodecError> {
    run(serde_json::Deserializer::from_str(src), false)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    run(serde_json::Deserializer::from_slice(bytes), false)
}

pub fn from_reader_with_path<T: DeserializeOwned, R: std::io::Read>(reader: R) -> Result<T, CodecError> {
    run(serde_json::Deserializer::from_reader(reader), false)
}

/// Documents bound their own nesting (see [`crate::fragment::MAX_DEPTH`]), so
/// serde_json's fixed recursion limit is lifted for them and the stack grows
/// on demand while parsing.
pub fn document_from_str(src: &str) -> Result<Document, CodecError> {
    run(serde_json::Deserializer::from_str(src), true)
}

pub fn document_from_slice(bytes: &[u8]) -> Result<Document, CodecError> {
    run(serde_json::Deserializer::from_slice(bytes), true)
}

pub fn document_from_reader<R: std::io::Read>(reader: R) -> Result<Document, CodecError> {
    run(serde_json::Deserializer::from_reader(reader), true)
}

fn run<'de, R, T>(mut de: serde_json::Deserializer<R>, unbounded: bool) -> Result<T, CodecError>
where
    R: serde_json::de::Read<'de>,
    T: Deserialize<'de>,
{
    let value = if unbounded {
        de.disable_recursion_limit();
        serde_path_to_error::deserialize::<_, T>(serde_stacker::Deserializer::new(&mut de))
    } else {
        serde_path_to_error::deserialize::<_, T>(&mut de)
    }
    .map_err(into_codec_error)?;
    de.end().map_err(|inner| json_error(".".to_string(), inner))?;
    Ok(value)
}

fn into_codec_error(err: serde_path_to_error::Error<serde_json::Error>) -> CodecError {
    let path = err.path().to_string();
    json_error(path, err.into_inner())
}

fn json_error(path: String, inner: serde_json::Error) -> CodecError {
    if inner.is_io() {
        return CodecError::Io(inner.into());
    }
    CodecError::Json { path, message: inner.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_the_path_of_the_bad_node() {
        let err = from_str_with_path::<Document>(r#"{"Block": {"expressions": [{"a": 1}, {"b": 1, "c": 2}]}}"#)
            .unwrap_err();
        match err {
            CodecError::Json { path, .. } => assert!(path.contains("expressions"), "{path}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trailing_text_is_rejected() {
        assert!(matches!(document_from_str(r#"{"a": 1} {"b": 2}"#), Err(CodecError::Json { .. })));
    }

    #[test]
    fn documents_nest_past_the_generic_recursion_limit() {
        let depth = 300;
        let src = format!("{}1{}", r#"{"a":"#.repeat(depth), "}".repeat(depth));
        assert!(from_str_with_path::<Document>(&src).is_err());
        let doc = document_from_str(&src).unwrap();
        assert_eq!(doc.depth(), depth);
    }
}
