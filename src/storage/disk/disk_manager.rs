use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Short page buffer: got {0} bytes, need {1}")]
    ShortBuffer(usize, usize),
}

/// DiskManager owns the database file and performs the actual page I/O.
///
/// The file is a flat array of `PAGE_SIZE` slots addressed by page ID.
pub struct DiskManager {
    db_file: Mutex<File>,
}

impl DiskManager {
    /// Create a new DiskManager over the given database file
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        Ok(Self {
            db_file: Mutex::new(file),
        })
    }

    /// Read a page from disk into the given buffer
    ///
    /// A slot past the end of the file reads as zeroes, matching a page
    /// that was allocated but never written back.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), DiskManagerError> {
        if buf.len() < PAGE_SIZE {
            return Err(DiskManagerError::ShortBuffer(buf.len(), PAGE_SIZE));
        }

        let offset = Self::page_offset(page_id);
        let mut file = self.db_file.lock();

        let file_size = file.metadata()?.len();
        if offset >= file_size {
            buf[..PAGE_SIZE].fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..PAGE_SIZE])?;

        Ok(())
    }

    /// Write a page to disk
    pub fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), DiskManagerError> {
        if buf.len() < PAGE_SIZE {
            return Err(DiskManagerError::ShortBuffer(buf.len(), PAGE_SIZE));
        }

        let offset = Self::page_offset(page_id);
        let mut file = self.db_file.lock();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&buf[..PAGE_SIZE])?;
        file.flush()?;

        Ok(())
    }

    /// Make sure the on-disk slot for `page_id` exists
    ///
    /// Grows the file with zeroes as needed; never shrinks it.
    pub fn increase_disk_space(&self, page_id: PageId) -> Result<(), DiskManagerError> {
        let needed = Self::page_offset(page_id) + PAGE_SIZE as u64;
        let file = self.db_file.lock();

        if file.metadata()?.len() < needed {
            file.set_len(needed)?;
        }

        Ok(())
    }

    /// Hint that a page is no longer needed. Disk space is not reclaimed.
    pub fn deallocate_page(&self, page_id: PageId) {
        debug!("Deallocation hint for page {} ignored", page_id);
    }

    /// Calculate the offset of a page in the file
    fn page_offset(page_id: PageId) -> u64 {
        page_id * PAGE_SIZE as u64
    }
}
