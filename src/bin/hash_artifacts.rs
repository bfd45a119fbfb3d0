//! Manifest utility for Glimpse model artifacts.
//!
//! Hashes every `*.json` artifact in a model directory and writes
//! `manifest.json`, which the server checks at startup.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin hash_artifacts -- <model_dir> [--require-all]
//! ```
//!
//! `--require-all` fails unless all twelve expected artifact files are present.

use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

use glimpse::adapters::artifacts::{model_file, scaler_file, ArtifactManifest, MANIFEST_FILE};
use glimpse::domain::{Domain, ModelTag};

fn usage() -> String {
    "Usage: hash_artifacts <model_dir> [--require-all]".to_string()
}

fn parse_args() -> Result<(PathBuf, bool)> {
    let mut model_dir: Option<PathBuf> = None;
    let mut require_all = false;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--require-all" => require_all = true,
            "-h" | "--help" => bail!(usage()),
            _ if model_dir.is_none() => model_dir = Some(PathBuf::from(arg)),
            _ => bail!(usage()),
        }
    }

    match model_dir {
        Some(dir) => Ok((dir, require_all)),
        None => bail!(usage()),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    let (model_dir, require_all) = parse_args()?;
    if !model_dir.is_dir() {
        bail!("{model_dir:?} is not a directory");
    }

    let manifest = ArtifactManifest::build(&model_dir, unix_now())
        .with_context(|| format!("Failed to hash artifacts in {model_dir:?}"))?;

    let expected: Vec<String> = Domain::ALL
        .iter()
        .flat_map(|d| {
            ModelTag::ALL
                .iter()
                .flat_map(move |t| [scaler_file(*d, *t), model_file(*d, *t)])
        })
        .collect();
    let missing: Vec<&String> = expected
        .iter()
        .filter(|name| !manifest.files.contains_key(*name))
        .collect();

    if !missing.is_empty() {
        for name in &missing {
            eprintln!("warning: expected artifact {name} not found");
        }
        if require_all {
            bail!("{} expected artifact(s) missing", missing.len());
        }
    }
    if manifest.files.is_empty() {
        bail!("No JSON artifacts found in {model_dir:?}");
    }

    manifest
        .write(&model_dir)
        .with_context(|| format!("Failed to write {MANIFEST_FILE}"))?;

    for (name, digest) in &manifest.files {
        println!("{digest}  {name}");
    }
    println!("Wrote {:?}", model_dir.join(MANIFEST_FILE));
    Ok(())
}
