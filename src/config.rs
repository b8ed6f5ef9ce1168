//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cleaner::CleaningRules;
use crate::error::{DatasetError, Result};

/// Settings of the per-product transform.
///
/// Everything a worker needs to turn one product and its labels into
/// output records; serializable so foreign engines can pass it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub rules: CleaningRules,
    /// Drop script, stylesheet and markup-debris paragraphs
    pub filter_paragraphs: bool,
    /// Drop products whose title produced no paragraph
    pub require_title: bool,
    /// Metadata keys read after the known source tags, in this order
    pub extra_sources: Vec<String>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            rules: CleaningRules::default(),
            filter_paragraphs: true,
            require_title: true,
            extra_sources: Vec::new(),
        }
    }
}

impl JoinConfig {
    /// Loads a JSON config file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Default number of metadata records processed per parallel batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Inputs, outputs and knobs of one local run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub metadata_path: PathBuf,
    pub positive_labels_path: PathBuf,
    pub negative_labels_path: PathBuf,
    pub positive_output_path: PathBuf,
    pub negative_output_path: PathBuf,
    pub stats_output_path: Option<PathBuf>,
    pub join: JoinConfig,
    pub batch_size: usize,
    /// Worker threads; 0 lets rayon decide
    pub threads: usize,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DatasetError::Config("batch size must be positive".into()));
        }

        let mut outputs = vec![&self.positive_output_path, &self.negative_output_path];
        outputs.extend(self.stats_output_path.as_ref());
        for (i, path) in outputs.iter().enumerate() {
            if outputs[..i].contains(path) {
                return Err(DatasetError::Config(format!(
                    "output path {} is used twice",
                    path.display()
                )));
            }
            let inputs = [
                &self.metadata_path,
                &self.positive_labels_path,
                &self.negative_labels_path,
            ];
            if inputs.contains(path) {
                return Err(DatasetError::Config(format!(
                    "output path {} would overwrite an input",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
