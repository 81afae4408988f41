//! Media file handling: upload classification and storage.

pub mod service;
pub mod storage;

pub use service::{MAX_FILE_SIZE, MediaService, MediaType, Upload, UploadError};
pub use storage::{FileStorage, LocalFileStorage};
