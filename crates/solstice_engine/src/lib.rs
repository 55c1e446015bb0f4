//! Core engine for Solstice: milestone progress reconciliation and the safe
//! document-versioning protocol.
//!
//! The engine never talks to a database directly. It is generic over the
//! [`store::DocumentStore`] and [`store::ProjectStore`] traits, which the
//! `solstice_db` crate implements over SQLite and tests implement in memory.

pub mod reconciler;
pub mod store;
pub mod writer;

pub use reconciler::{
    evaluate_project, reconcile_all, reconcile_project, Evaluation, ReconcileOutcome,
};
pub use store::{DocumentStore, NewDocumentRow, ProjectStore, StoreError, StoreResult};
pub use writer::{replace_current, AttachmentInput, DocumentUpload, WriterError};
