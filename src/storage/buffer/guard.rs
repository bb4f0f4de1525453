use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::types::{FrameId, PageId};
use crate::storage::buffer::manager::BufferPoolManager;

/// Shared, read-only access to one resident page.
///
/// The guard keeps the page pinned and holds the frame latch in shared
/// mode for as long as it lives; any number of read guards may coexist on
/// the same page. Dropping the guard releases the frame latch, then
/// unpins, and a pin count that reaches zero makes the frame evictable
/// again.
pub struct ReadPageGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    data: Option<RwLockReadGuard<'a, Box<[u8]>>>,
}

impl<'a> ReadPageGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        data: RwLockReadGuard<'a, Box<[u8]>>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The page bytes
    ///
    /// Panics when called after `drop_guard`.
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().expect("page guard already released")
    }

    /// Release the guard early. Safe to call more than once.
    pub fn drop_guard(&mut self) {
        if let Some(lock) = self.data.take() {
            drop(lock);
            self.bpm.unpin_frame(self.frame_id);
        }
    }

    /// Whether `drop_guard` has already run
    pub fn is_dropped(&self) -> bool {
        self.data.is_none()
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Exclusive, mutable access to one resident page.
///
/// At most one write guard exists per page, and it excludes all readers.
/// The frame was marked dirty when the guard was handed out. Drop behaves
/// like [`ReadPageGuard`].
pub struct WritePageGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    data: Option<RwLockWriteGuard<'a, Box<[u8]>>>,
}

impl<'a> WritePageGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        data: RwLockWriteGuard<'a, Box<[u8]>>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The page bytes
    ///
    /// Panics when called after `drop_guard`.
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().expect("page guard already released")
    }

    /// The page bytes, mutable
    ///
    /// Panics when called after `drop_guard`.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data
            .as_deref_mut()
            .expect("page guard already released")
    }

    /// Release the guard early. Safe to call more than once.
    pub fn drop_guard(&mut self) {
        if let Some(lock) = self.data.take() {
            drop(lock);
            self.bpm.unpin_frame(self.frame_id);
        }
    }

    /// Whether `drop_guard` has already run
    pub fn is_dropped(&self) -> bool {
        self.data.is_none()
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}
