use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::types::{FrameId, PageId, PAGE_SIZE};

/// A fixed-size in-memory frame plus its bookkeeping.
///
/// The page bytes sit behind their own reader/writer latch, held by page
/// guards for as long as they live. `pin_count` is atomic and may be read
/// without any latch; `page_id` and `is_dirty` are only written while the
/// buffer pool latch is held.
pub struct FrameHeader {
    frame_id: FrameId,
    page_id: Mutex<Option<PageId>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
    data: RwLock<Box<[u8]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// The page currently resident, or `None` for a free frame
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    /// Increment the pin count, returning the new value
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement the pin count, returning the new value
    ///
    /// Panics on underflow; an unpin without a matching pin means a guard
    /// has been double-released.
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::SeqCst);
        assert!(old > 0, "pin count underflow on frame {}", self.frame_id);
        old - 1
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::SeqCst)
    }

    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::SeqCst);
    }

    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::SeqCst);
    }

    /// Shared latch on the page bytes
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Exclusive latch on the page bytes
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    /// Return the frame to its freshly-constructed state: zeroed bytes, no
    /// page, unpinned, clean.
    pub fn reset(&self) {
        self.data_mut().fill(0);
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::SeqCst);
        self.is_dirty.store(false, Ordering::SeqCst);
    }
}
