//! Local prediction history
//!
//! Saved analyses are kept in a JSON file so they can be listed and
//! soft-deleted later from the CLI.

pub mod store;

pub use store::{
    DiseaseIdentified, HistoryEntry, HistoryStore, PredictionRecord, RecordStatus,
    DEFAULT_MIN_LIKELIHOOD,
};
