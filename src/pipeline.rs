use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{FareError, Result};
use crate::features::{FeatureVector, TransformerState};
use crate::forest::{ForestModel, ForestParams};
use crate::record::{FareRecord, TripQuery};

/// Bumped whenever the serialized layout of `FittedPipeline` changes.
pub const ARTIFACT_VERSION: u32 = 1;

/// Transformer and model fitted together. Neither half is valid alone,
/// so they are only ever built, saved and loaded as one value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FittedPipeline {
    transformer: TransformerState,
    model: ForestModel,
}

#[derive(Deserialize)]
struct Artifact {
    version: u32,
    pipeline: FittedPipeline,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    version: u32,
    pipeline: &'a FittedPipeline,
}

impl FittedPipeline {
    pub fn fit(records: &[FareRecord], params: &ForestParams) -> Self {
        let transformer = TransformerState::fit(records);
        let x = transformer.transform_all(records);
        let y: Vec<f64> = records.iter().map(|r| r.price).collect();
        let model = ForestModel::fit(&x, &y, params);
        Self { transformer, model }
    }

    pub fn transformer(&self) -> &TransformerState {
        &self.transformer
    }

    pub fn model(&self) -> &ForestModel {
        &self.model
    }

    pub fn features(&self, trip: &TripQuery) -> FeatureVector {
        self.transformer.transform(trip)
    }

    pub fn predict(&self, trip: &TripQuery) -> f64 {
        self.model.predict(&self.features(trip))
    }

    /// Writes the artifact through a temporary file in the target directory
    /// and renames it into place, so readers never see a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent_dir).map_err(|e| FareError::io(parent_dir, e))?;

        let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| FareError::io(parent_dir, e))?;
        {
            let mut writer = BufWriter::new(&temp_file);
            bincode::serialize_into(
                &mut writer,
                &ArtifactRef {
                    version: ARTIFACT_VERSION,
                    pipeline: self,
                },
            )?;
            writer.flush().map_err(|e| FareError::io(path, e))?;
        }
        temp_file
            .persist(path)
            .map_err(|e| FareError::io(path, e.error))?;
        tracing::info!(path = %path.display(), trees = self.model.trees().len(), "saved model artifact");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FareError::io(path, e))?;
        let artifact: Artifact = bincode::deserialize_from(BufReader::new(file))?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(FareError::IncompatibleArtifact {
                found: artifact.version,
                expected: ARTIFACT_VERSION,
            });
        }
        tracing::info!(
            path = %path.display(),
            width = artifact.pipeline.transformer.width(),
            "loaded model artifact"
        );
        Ok(artifact.pipeline)
    }
}
