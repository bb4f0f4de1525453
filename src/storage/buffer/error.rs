use thiserror::Error;

use crate::storage::buffer::replacer::ReplacerError;
use crate::storage::disk::{DiskManagerError, DiskSchedulerError};

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("Disk scheduler error: {0}")]
    DiskSchedulerError(#[from] DiskSchedulerError),

    #[error("Replacer error: {0}")]
    ReplacerError(#[from] ReplacerError),
}
