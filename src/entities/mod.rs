//! Persistence layer: row types and queries for each table.

pub mod channels;
pub mod notes;
pub mod transcription_jobs;
pub mod videos;

pub use channels::Channel;
pub use notes::Note;
pub use transcription_jobs::{JobStatus, TranscriptFormat, TranscriptionJob};
pub use videos::Video;
