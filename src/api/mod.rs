pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, Backend, StatusSource};
pub use error::ApiError;
pub use types::{
    AsyncJobResponse, DrawingAnalysis, JobKind, JobState, JobStatus, LibraryEntry,
    PipelineRequest, PresignedUrl, StoryRequest, StoryScript, Style, Theme, VideoResult,
    VoiceType,
};
