//! Bidirectional codec between expression trees and format-neutral documents.
//!
//! ```text
//! Expr ──Encoder──▶ Document ──serde_json──▶ JSON text
//!      ◀─Decoder───          ◀─path_de─────
//! ```
pub mod ast;
pub mod codec;
pub mod decode;
pub mod encode;
pub mod error;
pub mod fragment;
pub mod path_de;
pub mod refs;
pub mod samples;
pub mod schema;
pub mod ty;
pub mod value;

pub use ast::{Expr, LabelTarget, Parameter};
pub use codec::{Codec, decode, encode};
pub use error::{CodecError, Result, SchemaValidationError, Violation};
pub use fragment::{Content, Document, Fragment, Scalar};
pub use schema::Schema;
pub use ty::{Ty, TypeRegistry};
pub use value::{Value, ValueCodec};
