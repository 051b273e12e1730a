//! JSON-file prediction history.
//!
//! Every saved prediction produces one prediction record plus one disease
//! record per class. Deletion is soft: the record stays on disk with status
//! `Deleted` and is hidden from listings.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::inference::ClassProbability;
use crate::utils::error::{MangoError, Result};

/// Diseases at or below this likelihood are left out of listings
pub const DEFAULT_MIN_LIKELIHOOD: f32 = 0.5;

/// Record status, stored as `1` (active) or `2` (deleted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecordStatus {
    Active,
    Deleted,
}

impl From<RecordStatus> for u8 {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Active => 1,
            RecordStatus::Deleted => 2,
        }
    }
}

impl TryFrom<u8> for RecordStatus {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(RecordStatus::Active),
            2 => Ok(RecordStatus::Deleted),
            other => Err(format!("unknown record status {}", other)),
        }
    }
}

/// One analyzed photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub pred_id: Uuid,
    /// Photo as a data URL
    pub image_data: String,
    pub status: RecordStatus,
    pub predicted_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Likelihood of one class for one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseIdentified {
    pub disease_identified_id: Uuid,
    pub pred_id: Uuid,
    pub disease_name: String,
    pub likelihood_score: f32,
}

/// A prediction with its filtered diseases, as listed to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub prediction: PredictionRecord,
    pub diseases: Vec<DiseaseIdentified>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    predictions: Vec<PredictionRecord>,
    diseases: Vec<DiseaseIdentified>,
}

/// Prediction history backed by a single JSON file
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    data: HistoryFile,
}

impl HistoryStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let data = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json).map_err(|e| {
                MangoError::Serialization(format!("Failed to read history {:?}: {}", path, e))
            })?
        } else {
            debug!("No history at {:?}, starting empty", path);
            HistoryFile::default()
        };

        Ok(Self { path, data })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of active predictions
    pub fn len(&self) -> usize {
        self.active().count()
    }

    /// Whether there are no active predictions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a prediction and its class probabilities.
    ///
    /// Nothing changes in memory unless the write succeeds.
    pub fn save(&mut self, image_data: &str, probabilities: &[ClassProbability]) -> Result<Uuid> {
        let pred_id = Uuid::new_v4();
        let mut next = self.data.clone();

        next.predictions.push(PredictionRecord {
            pred_id,
            image_data: image_data.to_string(),
            status: RecordStatus::Active,
            predicted_at: Utc::now(),
            updated_at: None,
        });

        next.diseases.extend(probabilities.iter().map(|p| DiseaseIdentified {
            disease_identified_id: Uuid::new_v4(),
            pred_id,
            disease_name: p.class_name.clone(),
            likelihood_score: p.probability,
        }));

        self.persist(&next)?;
        self.data = next;
        info!("Saved prediction {}", pred_id);
        Ok(pred_id)
    }

    /// Active predictions, newest first, each with the diseases whose
    /// likelihood exceeds `min_likelihood` (most likely first)
    pub fn results(&self, min_likelihood: f32) -> Vec<HistoryEntry> {
        // Reverse insertion order so equal timestamps still list newest first
        let mut entries: Vec<HistoryEntry> = self
            .active()
            .rev()
            .map(|prediction| {
                let mut diseases: Vec<DiseaseIdentified> = self
                    .data
                    .diseases
                    .iter()
                    .filter(|d| d.pred_id == prediction.pred_id)
                    .filter(|d| d.likelihood_score > min_likelihood)
                    .cloned()
                    .collect();
                diseases.sort_by(|a, b| {
                    b.likelihood_score
                        .partial_cmp(&a.likelihood_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                HistoryEntry {
                    prediction: prediction.clone(),
                    diseases,
                }
            })
            .collect();

        entries.sort_by(|a, b| b.prediction.predicted_at.cmp(&a.prediction.predicted_at));
        entries
    }

    /// Soft-delete a prediction; the in-memory state is unchanged if the
    /// write fails
    pub fn delete(&mut self, pred_id: Uuid) -> Result<()> {
        let mut next = self.data.clone();
        let record = next
            .predictions
            .iter_mut()
            .find(|p| p.pred_id == pred_id)
            .ok_or_else(|| MangoError::NotFound(format!("prediction {}", pred_id)))?;

        record.status = RecordStatus::Deleted;
        record.updated_at = Some(Utc::now());

        self.persist(&next)?;
        self.data = next;
        info!("Deleted prediction {}", pred_id);
        Ok(())
    }

    fn active(&self) -> impl DoubleEndedIterator<Item = &PredictionRecord> {
        self.data
            .predictions
            .iter()
            .filter(|p| p.status == RecordStatus::Active)
    }

    /// Write to a sibling temp file, then rename it over the target
    fn persist(&self, data: &HistoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| MangoError::Config(format!("history path {:?} has no file name", self.path)))?;
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("History written to {:?}", self.path);
        Ok(())
    }
}
