//! Round-trips the sample corpus through JSON text and prints one report line
//! per sample. Optional first argument: a regex over sample names.
use exdoc::{Codec, Document, Schema, samples};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static CODEC: Lazy<Codec> = Lazy::new(|| Codec::with_registry(samples::registry()).with_schema(Schema::builtin()));

#[derive(Serialize)]
struct Report {
    name: &'static str,
    ok: bool,
    bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn round_trip(tree: &exdoc::Expr) -> Result<usize, String> {
    let text = CODEC.encode_to_string(tree).map_err(|e| e.to_string())?;
    let mut de = serde_json::Deserializer::from_str(&text);
    // Document nesting is capped by its own visitor.
    de.disable_recursion_limit();
    let doc: Document =
        serde_path_to_error::deserialize(&mut de).map_err(|e| format!("{}: {}", e.path(), e.inner()))?;
    let back = CODEC.decode(&doc).map_err(|e| e.to_string())?;
    if &back != tree {
        return Err("decoded tree differs from the original".to_string());
    }
    Ok(text.len())
}

fn main() {
    let filter = match std::env::args().nth(1).map(|src| Regex::new(&src)).transpose() {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("bad filter: {error}");
            std::process::exit(2);
        }
    };

    let mut failures = 0;
    for sample in samples::corpus() {
        if filter.as_ref().is_some_and(|rx| !rx.is_match(sample.name)) {
            continue;
        }
        let report = match round_trip(&sample.tree) {
            Ok(bytes) => Report { name: sample.name, ok: true, bytes, error: None },
            Err(error) => {
                failures += 1;
                Report { name: sample.name, ok: false, bytes: 0, error: Some(error) }
            }
        };
        match serde_json::to_string(&report) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("{}: {error}", sample.name),
        }
    }

    if failures > 0 {
        eprintln!("{failures} sample(s) failed");
        std::process::exit(1);
    }
}
