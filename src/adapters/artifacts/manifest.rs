//! SHA-256 manifest binding the artifact files in a model directory.
//!
//! `hash_artifacts` writes `manifest.json`; the loader checks every artifact
//! it reads against it when present (or always, when configured to require it).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ArtifactError;

/// File name of the manifest inside a model directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_VERSION: u32 = 1;

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    /// Unix timestamp (seconds) when the manifest was written
    pub created_at: i64,
    /// File name -> hex digest
    pub files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    /// Read `manifest.json` from `dir`, if there is one.
    ///
    /// # Errors
    /// Returns error if the file exists but is unreadable or malformed.
    pub fn read(dir: &Path) -> Result<Option<Self>, ArtifactError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let manifest: Self = serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Parse {
            file: MANIFEST_FILE.to_string(),
            reason: e.to_string(),
        })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::Invalid {
                file: MANIFEST_FILE.to_string(),
                reason: format!("unsupported manifest version {}", manifest.version),
            });
        }
        Ok(Some(manifest))
    }

    /// Check `bytes` against the digest recorded for `name`.
    ///
    /// # Errors
    /// Returns error if `name` is not listed or its digest differs.
    pub fn verify(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let expected = self
            .files
            .get(name)
            .ok_or_else(|| ArtifactError::NotInManifest(name.to_string()))?;
        if !expected.eq_ignore_ascii_case(&sha256_hex(bytes)) {
            return Err(ArtifactError::DigestMismatch(name.to_string()));
        }
        Ok(())
    }

    /// Hash every `*.json` artifact in `dir` except the manifest itself.
    ///
    /// # Errors
    /// Returns error if the directory cannot be listed or a file cannot be read.
    pub fn build(dir: &Path, created_at: i64) -> Result<Self, ArtifactError> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == MANIFEST_FILE {
                continue;
            }
            files.insert(name.to_string(), sha256_hex(&fs::read(&path)?));
        }

        Ok(Self {
            version: MANIFEST_VERSION,
            created_at,
            files,
        })
    }

    /// Write this manifest to `dir/manifest.json`.
    ///
    /// # Errors
    /// Returns error on serialization or IO failure.
    pub fn write(&self, dir: &Path) -> Result<(), ArtifactError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| ArtifactError::Parse {
            file: MANIFEST_FILE.to_string(),
            reason: e.to_string(),
        })?;
        fs::write(dir.join(MANIFEST_FILE), bytes)?;
        Ok(())
    }
}
