//! Validation and idempotent insertion of fetched records

use crate::model::{NewRecord, RawRecord, Record, RequiredField, SourceId};
use crate::storage::{InsertOutcome, RecordStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

/// What the gate did with a record
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Newly written
    Inserted(Record),
    /// Already stored; carries the stored row
    Duplicate(Record),
}

impl PersistOutcome {
    pub fn record(&self) -> &Record {
        match self {
            Self::Inserted(record) | Self::Duplicate(record) => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Self::Inserted(record) | Self::Duplicate(record) => record,
        }
    }
}

/// Why a record was not persisted
#[derive(Debug, Error)]
pub enum GateError {
    #[error("{source_id} record missing required fields: {fields:?}")]
    Validation {
        source_id: SourceId,
        fields: Vec<RequiredField>,
    },

    #[error("failed to persist record: {0}")]
    Persistence(#[from] StorageError),
}

/// The only path by which records reach the store
#[derive(Clone)]
pub struct PersistenceGate {
    store: Arc<dyn RecordStore>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Validates, normalizes and inserts a record unless it is already stored
    ///
    /// Safe to call concurrently for the same key: the store decides the
    /// conflict atomically and the loser gets the stored row back.
    pub fn persist(&self, raw: RawRecord) -> Result<PersistOutcome, GateError> {
        let source = raw.source;
        let record = NewRecord::from_raw(raw).map_err(|fields| GateError::Validation {
            source_id: source,
            fields,
        })?;

        match self.store.insert_if_absent(&record)? {
            InsertOutcome::Inserted(stored) => {
                tracing::info!("{}: stored {} ({})", source, stored.natural_key, stored.title);
                Ok(PersistOutcome::Inserted(stored))
            }
            InsertOutcome::AlreadyPresent(stored) => {
                tracing::debug!("{}: {} already stored, skipping", source, stored.natural_key);
                Ok(PersistOutcome::Duplicate(stored))
            }
        }
    }
}
