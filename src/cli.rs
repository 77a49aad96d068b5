//! Command line front end: check | schema | xml | samples
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use tracing::info;

use exdoc::{Codec, Document, Schema, TypeRegistry, samples};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// encode/decode expression documents, validate them and render them as XML
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// decode each document, re-encode it and compare with the input
    Check(CheckCmd),
    /// print the built-in document schema
    Schema(SchemaCmd),
    /// render JSON documents as XML
    Xml(XmlCmd),
    /// write the built-in sample corpus as JSON documents
    Samples(SamplesCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct TypeSettings {
    /// register a non-generic class name (repeatable)
    #[arg(long = "class")]
    classes: Vec<String>,

    /// also register the types used by the sample corpus
    #[arg(long, default_value_t = false)]
    sample_types: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    type_settings: TypeSettings,

    /// validate against this schema file before decoding
    #[arg(long, conflicts_with = "builtin_schema")]
    schema: Option<PathBuf>,

    /// validate against the built-in schema before decoding
    #[arg(long, default_value_t = false)]
    builtin_schema: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaCmd {
    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct XmlCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory; one .xml per input (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SamplesCmd {
    /// output directory
    #[arg(short, long)]
    out: PathBuf,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn registry(&self) -> TypeRegistry {
        let base = match self.sample_types {
            true => samples::registry(),
            false => TypeRegistry::default(),
        };
        self.classes.iter().fold(base, |reg, name| reg.with_class(name.as_str(), Some(0)))
    }
}

impl CheckCmd {
    fn codec(&self) -> Result<Codec> {
        let codec = Codec::with_registry(self.type_settings.registry());
        let schema = match (&self.schema, self.builtin_schema) {
            (Some(path), _) => {
                let src = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read schema file {}", path.display()))?;
                Some(Schema::from_str(&src).with_context(|| format!("invalid schema {}", path.display()))?)
            }
            (None, true) => Some(Schema::builtin()),
            (None, false) => None,
        };
        Ok(match schema {
            Some(schema) => codec.with_schema(schema),
            None => codec,
        })
    }

    fn run(&self) -> Result<()> {
        let codec = self.codec()?;
        let paths = resolve_file_path_patterns(&self.input_settings.input)?;
        info!(files = paths.len(), "checking documents");

        let results: Vec<(PathBuf, Result<()>)> = paths
            .into_par_iter()
            .map(|path| {
                let outcome = check_one(&codec, &path);
                (path, outcome)
            })
            .collect();

        let mut failed = 0usize;
        for (path, outcome) in &results {
            match outcome {
                Ok(()) => eprintln!("✅ {}", path.display().to_string().green()),
                Err(error) => {
                    failed += 1;
                    eprintln!("❌ {}: {error:#}", path.display().to_string().red());
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} document(s) failed", results.len());
        }
        Ok(())
    }
}

fn check_one(codec: &Codec, path: &Path) -> Result<()> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let tree = codec.decode_from_str(&source)?;
    let original = Document::from_json_str(&source)?;
    if codec.encode(&tree)? != original {
        bail!("re-encoded document differs from the input");
    }
    Ok(())
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Schema(target) => {
                let schema_src = serde_json::to_string_pretty(Schema::builtin().as_json())?;
                write_or_print(target.out.as_deref(), &schema_src)
            }
            Command::Xml(target) => {
                let paths = resolve_file_path_patterns(&target.input_settings.input)?;
                for path in paths {
                    let source =
                        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
                    let doc = Document::from_json_str(&source).with_context(|| format!("{}", path.display()))?;
                    let xml = doc.to_xml_string();
                    match target.out.as_ref() {
                        Some(dir) => {
                            let name = path.with_extension("xml");
                            let name = name.file_name().context("input path has no file name")?;
                            write_or_print(Some(&dir.join(name)), &xml)?;
                        }
                        None => println!("{xml}"),
                    }
                }
                Ok(())
            }
            Command::Samples(target) => {
                let codec = Codec::with_registry(samples::registry()).with_schema(Schema::builtin());
                for sample in samples::corpus() {
                    let out = target.out.join(format!("{}.json", sample.name));
                    let doc = codec.encode(&sample.tree)?;
                    write_or_print(Some(&out), &doc.to_json_string_pretty()?)?;
                }
                info!(dir = %target.out.display(), "wrote sample corpus");
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_or_print(out: Option<&Path>, text: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
