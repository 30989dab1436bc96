//! Uploads due posts through the configured browser automation.

pub mod cycle;
pub mod scheduler;
pub mod uploader;

pub use cycle::{PublishOutcome, Publisher};
pub use uploader::{CommandUploader, UploadJob, Uploader};
