//! Version 1 endpoints: channels, videos, notes and transcription jobs.

pub mod channels;
pub mod notes;
pub mod routes;
pub mod transcription_jobs;
pub mod videos;
