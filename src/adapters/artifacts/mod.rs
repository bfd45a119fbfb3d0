//! JSON model artifacts.
//!
//! A model directory holds one scaler and one classifier file per
//! (domain, family): `<domain>_<family>_scaler.json` and
//! `<domain>_<family>_model.json`. An optional `manifest.json` binds every
//! file to a SHA-256 digest.

mod classifier;
mod manifest;
mod scaler;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::domain::{Domain, ModelTag};
use crate::ports::{Classifier, Scaler};

pub use classifier::{ClassifierArtifact, SplitRule, Tree, TreeNode};
pub use manifest::{sha256_hex, ArtifactManifest, MANIFEST_FILE};
pub use scaler::ScalerArtifact;

/// Errors raised while loading model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact file not found: {0}")]
    Missing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("Invalid artifact {file}: {reason}")]
    Invalid { file: String, reason: String },

    #[error("manifest.json is required but was not found in {0}")]
    ManifestRequired(PathBuf),

    #[error("Digest mismatch for {0}")]
    DigestMismatch(String),

    #[error("{0} is not listed in manifest.json")]
    NotInManifest(String),
}

/// Scaler file name for a (domain, family).
#[must_use]
pub fn scaler_file(domain: Domain, tag: ModelTag) -> String {
    format!("{}_{}_scaler.json", domain.as_str(), tag.as_str())
}

/// Classifier file name for a (domain, family).
#[must_use]
pub fn model_file(domain: Domain, tag: ModelTag) -> String {
    format!("{}_{}_model.json", domain.as_str(), tag.as_str())
}

/// One family's artifacts, ready to be wrapped in a model pair.
pub struct LoadedPair {
    pub tag: ModelTag,
    pub scaler: Box<dyn Scaler>,
    pub classifier: Box<dyn Classifier>,
}

/// Reads and verifies artifacts from a model directory.
#[derive(Debug)]
pub struct ArtifactLoader {
    dir: PathBuf,
    manifest: Option<ArtifactManifest>,
}

impl ArtifactLoader {
    /// Open a model directory, reading its manifest if present.
    ///
    /// # Errors
    /// Returns error if the manifest is malformed, or absent while required.
    pub fn open(dir: impl Into<PathBuf>, require_manifest: bool) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        let manifest = ArtifactManifest::read(&dir)?;
        match &manifest {
            Some(m) => tracing::info!(files = m.files.len(), "Artifact manifest loaded"),
            None if require_manifest => return Err(ArtifactError::ManifestRequired(dir)),
            None => tracing::warn!(
                "No manifest.json in {:?}; artifact digests will not be checked",
                dir
            ),
        }
        Ok(Self { dir, manifest })
    }

    /// Load all three families for `domain`, in tag order.
    ///
    /// # Errors
    /// Returns error if any file is absent, unreadable, fails its digest or
    /// is structurally invalid.
    pub fn load_domain(&self, domain: Domain) -> Result<Vec<LoadedPair>, ArtifactError> {
        let mut pairs = Vec::with_capacity(ModelTag::ALL.len());
        for tag in ModelTag::ALL {
            let scaler_name = scaler_file(domain, tag);
            let scaler: ScalerArtifact = self.read_json(&scaler_name)?;
            scaler.validate().map_err(|reason| ArtifactError::Invalid {
                file: scaler_name.clone(),
                reason,
            })?;

            let expected = domain.feature_names();
            if scaler.feature_names().iter().map(String::as_str).ne(expected.iter().copied()) {
                // Loaded anyway; every prediction through this pair will be rejected.
                tracing::warn!(
                    %domain,
                    family = %tag,
                    "{scaler_name} was fit on columns that differ from the {domain} schema"
                );
            }

            let model_name = model_file(domain, tag);
            let classifier: ClassifierArtifact = self.read_json(&model_name)?;
            classifier.validate().map_err(|reason| ArtifactError::Invalid {
                file: model_name.clone(),
                reason,
            })?;

            tracing::debug!(%domain, family = %tag, "Loaded model pair");
            pairs.push(LoadedPair {
                tag,
                scaler: Box::new(scaler),
                classifier: Box::new(classifier),
            });
        }
        Ok(pairs)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArtifactError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(ArtifactError::Missing(path));
        }
        let bytes = fs::read(&path)?;
        if let Some(manifest) = &self.manifest {
            manifest.verify(name, &bytes)?;
        }
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Parse {
            file: name.to_string(),
            reason: e.to_string(),
        })
    }
}
