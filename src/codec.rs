//! Public entry points: tree ↔ document, plus text and stream adapters.
use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ast::Expr;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{CodecError, Result};
use crate::fragment::Document;
use crate::path_de;
use crate::schema::Schema;
use crate::ty::TypeRegistry;
use crate::value::ValueCodec;

/// Long-lived, read-only codec configuration. Each call builds its own
/// encoder or decoder state, so one `Codec` can serve many threads.
#[derive(Debug, Clone)]
pub struct Codec {
    values: ValueCodec,
    schema: Option<Schema>,
    validate_on_encode: bool,
    validate_on_decode: bool,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::default())
    }

    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self::with_shared_registry(registry.shared())
    }

    pub fn with_shared_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            values: ValueCodec::new(registry),
            schema: None,
            validate_on_encode: true,
            validate_on_decode: true,
        }
    }

    /// Installs a schema gate. Validation runs on the stream entry points
    /// unless switched off below.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn validate_on_encode(mut self, on: bool) -> Self {
        self.validate_on_encode = on;
        self
    }

    pub fn validate_on_decode(mut self, on: bool) -> Self {
        self.validate_on_decode = on;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.values.registry()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    // ------------------------------ trees --------------------------------- //

    pub fn encode(&self, tree: &Expr) -> Result<Document> {
        debug!(root = tree.tag(), "encode");
        let doc = Encoder::new(&self.values).encode(tree)?;
        debug!(root = doc.root.tag.as_str(), "encoded");
        Ok(doc)
    }

    pub fn decode(&self, doc: &Document) -> Result<Expr> {
        debug!(root = doc.root.tag.as_str(), "decode");
        let tree = Decoder::new(&self.values).decode(doc)?;
        debug!(root = tree.tag(), "decoded");
        Ok(tree)
    }

    // ------------------------------ streams ------------------------------- //

    /// Encodes and writes JSON text. Nothing is written when the document
    /// fails validation.
    pub fn encode_to_writer<W: Write>(&self, tree: &Expr, mut writer: W) -> Result<()> {
        let doc = self.encode(tree)?;
        if self.validate_on_encode {
            self.gate(&doc)?;
        }
        serde_json::to_writer(&mut writer, &doc).map_err(|e| match e.is_io() {
            true => CodecError::Io(e.into()),
            false => CodecError::internal(format!("json text: {e}")),
        })?;
        writer.flush()?;
        Ok(())
    }

    pub fn encode_to_string(&self, tree: &Expr) -> Result<String> {
        let mut out = Vec::new();
        self.encode_to_writer(tree, &mut out)?;
        String::from_utf8(out).map_err(|e| CodecError::internal(format!("json text is not utf-8: {e}")))
    }

    pub fn decode_from_str(&self, src: &str) -> Result<Expr> {
        self.decode_checked(path_de::document_from_str(src)?)
    }

    pub fn decode_from_slice(&self, bytes: &[u8]) -> Result<Expr> {
        self.decode_checked(path_de::document_from_slice(bytes)?)
    }

    pub fn decode_from_reader<R: Read>(&self, reader: R) -> Result<Expr> {
        self.decode_checked(path_de::document_from_reader(reader)?)
    }

    fn decode_checked(&self, doc: Document) -> Result<Expr> {
        if self.validate_on_decode {
            self.gate(&doc)?;
        }
        self.decode(&doc)
    }

    fn gate(&self, doc: &Document) -> Result<()> {
        let Some(schema) = &self.schema else { return Ok(()) };
        schema.validate_document(doc).inspect_err(|e| {
            warn!(root = doc.root.tag.as_str(), error = %e, "schema validation failed");
        })
    }
}

/// Encodes with the default registry.
pub fn encode(tree: &Expr) -> Result<Document> {
    Codec::new().encode(tree)
}

/// Decodes with the default registry.
pub fn decode(doc: &Document) -> Result<Expr> {
    Codec::new().decode(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{LabelTarget, Parameter};
    use crate::samples;
    use crate::ty::Ty;

    fn codec() -> Codec {
        Codec::with_registry(samples::registry()).with_schema(Schema::builtin())
    }

    #[test]
    fn codec_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Codec>();
    }

    #[test]
    fn corpus_survives_the_stream_entry_points() {
        let codec = codec();
        for sample in samples::corpus() {
            let text = codec.encode_to_string(&sample.tree).unwrap();
            assert_eq!(codec.decode_from_str(&text).unwrap(), sample.tree, "{}", sample.name);
            assert_eq!(codec.decode_from_slice(text.as_bytes()).unwrap(), sample.tree, "{}", sample.name);
            assert_eq!(codec.decode_from_reader(text.as_bytes()).unwrap(), sample.tree, "{}", sample.name);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let codec = codec();
        for sample in samples::corpus() {
            let a = codec.encode_to_string(&sample.tree).unwrap();
            let b = codec.encode_to_string(&sample.tree).unwrap();
            assert_eq!(a, b, "{}", sample.name);
        }
    }

    #[test]
    fn schema_gate_runs_before_decoding() {
        let err = codec().decode_from_str(r#"{"Add": {"type": "int"}}"#).unwrap_err();
        assert!(matches!(err, CodecError::Schema(_)), "{err}");

        let lenient = codec().validate_on_decode(false);
        let err = lenient.decode_from_str(r#"{"Add": {"type": "int"}}"#).unwrap_err();
        assert!(matches!(err, CodecError::ValueDecode { .. }), "{err}");
    }

    #[test]
    fn malformed_text_reports_json_path() {
        let err = codec().decode_from_str(r#"{"Block": {"expressions": [1, }}"#).unwrap_err();
        assert!(matches!(err, CodecError::Json { .. }), "{err}");
    }

    #[test]
    fn no_partial_output_on_failure() {
        let codec = Codec::new();
        let bad = constant(Ty::INT, crate::value::Value::string("nope"));
        let mut out = Vec::new();
        assert!(codec.encode_to_writer(&bad, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn doubles_survive_json_text_bit_for_bit() {
        let codec = codec();
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut awkward = vec![-184430.02896458854, 1.0715660391465826e-75, 5e-324, f64::MAX, 0.1 + 0.2];
        for _ in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            awkward.push(f64::from_bits(seed));
        }
        for x in awkward {
            let tree = constant(Ty::DOUBLE, crate::value::Value::double(x));
            let text = codec.encode_to_string(&tree).unwrap();
            assert_eq!(codec.decode_from_str(&text).unwrap(), tree, "{x:e} via {text}");
        }
    }

    fn left_chain(nodes: i32) -> Expr {
        (1..nodes).fold(int(0), |acc, i| add(acc, int(i)))
    }

    #[test]
    fn deep_chains_round_trip_through_text() {
        let codec = codec();
        for nodes in [70, 129, 200] {
            let tree = left_chain(nodes);
            let text = codec.encode_to_string(&tree).unwrap();
            assert_eq!(codec.decode_from_str(&text).unwrap(), tree, "{nodes}");
            assert_eq!(codec.decode_from_reader(text.as_bytes()).unwrap(), tree, "{nodes}");
        }
    }

    #[test]
    fn nesting_past_the_cap_is_rejected_both_ways() {
        let codec = codec();
        let err = codec.encode(&left_chain(400)).unwrap_err();
        assert!(matches!(err, CodecError::TooDeep { .. }), "{err}");

        let deep = (0..crate::fragment::MAX_DEPTH).fold(crate::fragment::Fragment::node("Default"), |inner, _| {
            crate::fragment::Fragment::slot("operand", inner)
        });
        let err = codec.decode(&Document::new(deep)).unwrap_err();
        assert!(matches!(err, CodecError::TooDeep { .. }), "{err}");
    }

    #[test]
    fn free_functions_use_the_default_registry() {
        let x = Parameter::new("x", Ty::INT);
        let end = LabelTarget::new("end");
        let tree = lambda(vec![x.clone()], block(vec![], vec![x.expr(), goto(crate::ast::GotoKind::Goto, end.clone(), None), label(end, None)]));
        assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
    }
}
