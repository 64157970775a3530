pub mod deepgram;
pub mod media;
pub mod transcript_format;
pub mod transcription;
pub mod url_validator;
pub mod youtube_api;
