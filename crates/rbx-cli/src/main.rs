// SPDX-License-Identifier: Apache-2.0
//! Command-line surface for the rbx document codecs.
//!
//! This binary is a thin wrapper: all it does is read bytes, hand them to
//! [`rbx_binary`] or [`rbx_text`], and write bytes back out. Nothing in the
//! format contract depends on this crate existing.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rbx_model::Diagnostics;
use rbx_text::Schema;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Command to execute
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a B-form document and re-emit it as T-form text.
    Decode {
        /// Path to the B-form (binary) input document.
        input: PathBuf,
        /// Path to write the T-form (text) output. Defaults to stdout.
        output: Option<PathBuf>,
        /// Optional class/property schema used to disambiguate property
        /// types on re-encode (e.g. `int` vs `BrickColor`).
        #[clap(long)]
        api: Option<PathBuf>,
    },
    /// Encode a T-form document into B-form bytes.
    Encode {
        /// Path to the T-form (text) input document.
        input: PathBuf,
        /// Path to write the B-form (binary) output document.
        output: PathBuf,
        /// Optional class/property schema used to resolve enum properties
        /// and disambiguate ambiguous scalar types.
        #[clap(long)]
        api: Option<PathBuf>,
        /// Compress each chunk with LZ4 (the default Roblox convention).
        #[clap(long)]
        compress: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.cmd {
        Command::Decode { input, output, api } => decode(&input, output.as_deref(), api.as_deref()),
        Command::Encode { input, output, api, compress } => {
            encode(&input, &output, api.as_deref(), compress)
        }
    }
}

fn load_schema(path: Option<&std::path::Path>) -> Result<Option<Schema>> {
    let Some(path) = path else { return Ok(None) };
    let bytes = fs::read(path).with_context(|| format!("reading schema {}", path.display()))?;
    let schema = Schema::from_json(&bytes).with_context(|| format!("parsing schema {}", path.display()))?;
    Ok(Some(schema))
}

fn decode(input: &std::path::Path, output: Option<&std::path::Path>, api: Option<&std::path::Path>) -> Result<()> {
    let schema = load_schema(api)?;
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let (doc, diagnostics) =
        rbx_binary::decode(&bytes).with_context(|| format!("decoding B-form document {}", input.display()))?;
    report(&diagnostics);

    let (text, diagnostics) = rbx_text::encode(&doc.scene, schema.as_ref());
    report(&diagnostics);

    match output {
        Some(path) => fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?,
        None => {
            let text = String::from_utf8_lossy(&text);
            println!("{text}");
        }
    }
    Ok(())
}

fn encode(input: &std::path::Path, output: &std::path::Path, api: Option<&std::path::Path>, compress: bool) -> Result<()> {
    let schema = load_schema(api)?;
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let (scene, diagnostics) =
        rbx_text::decode(&bytes, schema.as_ref()).with_context(|| format!("decoding T-form document {}", input.display()))?;
    report(&diagnostics);

    let doc = rbx_binary::BformDocument { scene, prnt_version: 0 };
    let out = rbx_binary::encode(&doc, compress).context("encoding B-form document")?;
    fs::write(output, out).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn report(diagnostics: &Diagnostics) {
    for warning in diagnostics.warnings() {
        eprintln!("warning: {warning}");
    }
}
