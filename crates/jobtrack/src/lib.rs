//! Jobtrack crate - job application tracking from a mailbox
//!
//! This crate provides:
//! - Domain models (JobApplication, Classification, CheckpointEntry)
//! - A Gmail message source and a MIME parser
//! - Classifier backends (OpenAI, Ollama, keyword heuristics)
//! - Storage traits with in-memory and SQLite implementations
//! - A Google Sheets mirror
//! - The incremental ingestion pipeline tying them together

pub mod classifier;
pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod parser;
pub mod sheets;
pub mod source;
pub mod storage;
pub mod sync;

pub use classifier::{
    Classifier, ClassifyError, KeywordClassifier, OllamaClassifier, OpenAiClassifier,
    build_classifier,
};
pub use self::config::{ClassifierConfig, IngestConfig};
pub use error::{IngestError, ProviderError, SkipStage, SkippedMessage};
pub use gmail::GmailClient;
pub use models::{
    ApplicationKey, ApplicationStatus, ApplicationUpdate, CheckpointEntry, Classification,
    JobApplication, MessageId, ParsedEmail, RawMessage, SheetRow,
};
pub use parser::{MessageParser, ParseError};
pub use sheets::{
    FailedRow, GoogleSheetsClient, MirrorReport, SheetMirror, range_for, spreadsheet_id_from_url,
};
pub use source::{MessagePage, MessageSource};
pub use storage::{ApplicationStore, CheckpointLog, InMemoryStore, SqliteStore};
pub use sync::{
    CancellationFlag, IngestionPipeline, OwnerLocks, RunPhase, RunReport, resolve_watermark,
};
