//! Persistence seams for session state
//!
//! Hosts provide storage for the serialized ledger and a sink for exported
//! documents. Loads degrade gracefully: a failed read starts the session
//! from a clean slate with a warning rather than refusing to open the
//! document. User-initiated saves surface their errors.

use crate::error::SessionError;
use markup_core::EditLedger;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A persisted ledger together with the document it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub document_name: String,
    pub ledger: EditLedger,
}

pub trait AnnotationStore {
    /// Load the saved record for a document, `None` when nothing is saved.
    fn load(&self, document_name: &str) -> Result<Option<AnnotationRecord>, SessionError>;

    /// Persist the record, replacing any previous one.
    fn save(&mut self, record: &AnnotationRecord) -> Result<(), SessionError>;

    /// Remove any saved record for the document.
    fn remove(&mut self, document_name: &str) -> Result<(), SessionError>;
}

pub trait ExportSink {
    /// Deliver a finished document to the host (download, filesystem,
    /// upload).
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), SessionError>;
}

/// Load a saved ledger, tolerating storage failures. Only an explicit user
/// action should ever hard-fail on storage.
pub fn load_or_default(store: &dyn AnnotationStore, document_name: &str) -> EditLedger {
    match store.load(document_name) {
        Ok(Some(record)) => record.ledger,
        Ok(None) => EditLedger::new(),
        Err(e) => {
            warn!("Failed to load saved annotations for '{}': {}", document_name, e);
            EditLedger::new()
        }
    }
}
