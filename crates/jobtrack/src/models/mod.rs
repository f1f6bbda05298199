//! Domain models for the job tracker

mod application;
mod checkpoint;
mod classification;
mod message;

pub use application::{ApplicationKey, ApplicationUpdate, JobApplication, SheetRow};
pub use checkpoint::CheckpointEntry;
pub use classification::{ApplicationStatus, Classification, UnknownStatus};
pub use message::{MessageId, ParsedEmail, RawMessage};
