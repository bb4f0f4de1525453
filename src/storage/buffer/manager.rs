use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::common::types::{AccessType, FrameId, PageId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::frame::FrameHeader;
use crate::storage::buffer::guard::{ReadPageGuard, WritePageGuard};
use crate::storage::buffer::replacer::LRUKReplacer;
use crate::storage::disk::{DiskManager, DiskRequest, DiskScheduler, DiskSchedulerError};
use crate::wal::LogManager;

/// State guarded by the buffer pool latch.
///
/// By convention the latch also covers frame metadata mutations during
/// page turnover; only `pin_count` moves outside it.
struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
}

/// Mediates between a fixed set of in-memory frames and the much larger
/// page space on disk.
///
/// Pages are brought in on demand and pushed out by the LRU-K replacer
/// when memory runs short. Callers get at page bytes exclusively through
/// [`ReadPageGuard`] and [`WritePageGuard`], which pin their frame for as
/// long as they live.
pub struct BufferPoolManager {
    num_frames: usize,
    next_page_id: AtomicU64,
    frames: Vec<FrameHeader>,
    inner: Mutex<PoolInner>,
    replacer: LRUKReplacer,
    disk_scheduler: DiskScheduler,
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    /// Create a pool of `num_frames` frames over the given disk manager,
    /// evicting by LRU-K with the given backward distance.
    pub fn new(num_frames: usize, disk_manager: DiskManager, k_dist: usize) -> Self {
        assert!(num_frames > 0, "buffer pool needs at least one frame");

        let frames = (0..num_frames).map(|i| FrameHeader::new(i as FrameId)).collect();
        let free_list = (0..num_frames).map(|i| i as FrameId).collect();

        Self {
            num_frames,
            next_page_id: AtomicU64::new(0),
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::with_capacity(num_frames),
                free_list,
            }),
            replacer: LRUKReplacer::new(num_frames, k_dist),
            disk_scheduler: DiskScheduler::new(Arc::new(disk_manager)),
            log_manager: None,
        }
    }

    /// Create a buffer pool that carries a WAL handle.
    ///
    /// The handle is held for upper layers; no pool operation drives it.
    pub fn new_with_wal(
        num_frames: usize,
        disk_manager: DiskManager,
        k_dist: usize,
        log_manager: Arc<LogManager>,
    ) -> Self {
        let mut pool = Self::new(num_frames, disk_manager, k_dist);
        pool.log_manager = Some(log_manager);
        pool
    }

    /// Number of frames in the pool
    pub fn size(&self) -> usize {
        self.num_frames
    }

    /// Allocate the next page ID and make sure its disk slot exists.
    ///
    /// The page is not brought into memory.
    pub fn new_page(&self) -> PageId {
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.disk_scheduler.increase_disk_space(page_id) {
            // Reads past EOF zero-fill and writes extend, so the pool stays
            // correct even without the eager extension.
            warn!("Could not grow disk space for page {}: {}", page_id, err);
        }
        page_id
    }

    /// Drop a page from the pool and hand its disk slot back.
    ///
    /// Returns `Ok(true)` when the page is gone from the pool afterwards,
    /// which includes the case where it never was resident. A pinned page
    /// is left untouched and reported as `Ok(false)`.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id as usize];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            self.flush_frame(frame, page_id)?;
        }

        inner.free_list.push(frame_id);
        self.disk_scheduler.deallocate_page(page_id);
        self.replacer.remove(frame_id)?;
        inner.page_table.remove(&page_id);
        frame.reset();

        debug!("Deleted page {} from frame {}", page_id, frame_id);
        Ok(true)
    }

    /// Get shared access to a page, bringing it in from disk if needed.
    ///
    /// `Ok(None)` means the pool is out of frames: everything is pinned
    /// and nothing can be evicted.
    pub fn checked_read_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> Result<Option<ReadPageGuard<'_>>, BufferPoolError> {
        let mut inner = self.inner.lock();

        let Some(frame_id) = self.obtain_frame(&mut inner, page_id, access_type, false)? else {
            return Ok(None);
        };

        // The frame latch must be taken before the pool latch is released,
        // or a concurrent caller could slip in between.
        let frame = &self.frames[frame_id as usize];
        let data = frame.data();
        Ok(Some(ReadPageGuard::new(self, frame_id, page_id, data)))
    }

    /// Get exclusive access to a page, bringing it in from disk if needed.
    ///
    /// The page is marked dirty up front. `Ok(None)` as for
    /// [`checked_read_page`](Self::checked_read_page).
    pub fn checked_write_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> Result<Option<WritePageGuard<'_>>, BufferPoolError> {
        let mut inner = self.inner.lock();

        let Some(frame_id) = self.obtain_frame(&mut inner, page_id, access_type, true)? else {
            return Ok(None);
        };

        let frame = &self.frames[frame_id as usize];
        let data = frame.data_mut();
        Ok(Some(WritePageGuard::new(self, frame_id, page_id, data)))
    }

    /// [`checked_read_page`](Self::checked_read_page) for callers that
    /// treat exhaustion as unrecoverable. Panics instead of returning
    /// `None` or an error.
    pub fn read_page_unchecked(&self, page_id: PageId) -> ReadPageGuard<'_> {
        match self.checked_read_page(page_id, AccessType::Unknown) {
            Ok(Some(guard)) => guard,
            Ok(None) => panic!("no frame available to bring in page {}", page_id),
            Err(err) => panic!("failed to bring in page {}: {}", page_id, err),
        }
    }

    /// [`checked_write_page`](Self::checked_write_page) for callers that
    /// treat exhaustion as unrecoverable. Panics instead of returning
    /// `None` or an error.
    pub fn write_page_unchecked(&self, page_id: PageId) -> WritePageGuard<'_> {
        match self.checked_write_page(page_id, AccessType::Unknown) {
            Ok(Some(guard)) => guard,
            Ok(None) => panic!("no frame available to bring in page {}", page_id),
            Err(err) => panic!("failed to bring in page {}: {}", page_id, err),
        }
    }

    /// Write a resident page's bytes out and clear its dirty flag.
    ///
    /// Returns `Ok(false)` when the page is not resident. Pin count and
    /// evictability are untouched.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id as usize];
        assert_eq!(
            frame.page_id(),
            Some(page_id),
            "page table maps page {} to frame {} which holds {:?}",
            page_id,
            frame_id,
            frame.page_id()
        );

        self.flush_frame(frame, page_id)?;
        Ok(true)
    }

    /// Flush every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let inner = self.inner.lock();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.frames[frame_id as usize];
            if frame.is_dirty() {
                self.flush_frame(frame, page_id)?;
            }
        }
        Ok(())
    }

    /// Pin count of a resident page, `None` otherwise
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        let &frame_id = inner.page_table.get(&page_id)?;
        Some(self.frames[frame_id as usize].pin_count())
    }

    /// The WAL handle this pool carries, if any
    pub fn log_manager(&self) -> Option<Arc<LogManager>> {
        self.log_manager.clone()
    }

    /// Called by guards on drop, after the frame latch is released.
    pub(crate) fn unpin_frame(&self, frame_id: FrameId) {
        let _inner = self.inner.lock();
        let frame = &self.frames[frame_id as usize];
        if frame.unpin() == 0 {
            self.replacer
                .set_evictable(frame_id, true)
                .expect("pool frame ids are always in range");
        }
    }

    /// Resolve `page_id` to a pinned frame, swapping the page in on a miss.
    ///
    /// `None` when no frame can be obtained.
    fn obtain_frame(
        &self,
        inner: &mut PoolInner,
        page_id: PageId,
        access_type: AccessType,
        is_write: bool,
    ) -> Result<Option<FrameId>, BufferPoolError> {
        // Cache hit: pin in place.
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            self.pin_frame(&self.frames[frame_id as usize], page_id, access_type, is_write)?;
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.acquire_frame(inner) else {
            return Ok(None);
        };

        // The frame is out of the free list and the replacer now; an I/O
        // failure must hand it back or it is stranded for good.
        let frame = &self.frames[frame_id as usize];
        if let Err(err) = self.load_frame(inner, page_id, frame) {
            self.release_frame(inner, frame_id);
            return Err(err);
        }

        self.pin_frame(frame, page_id, access_type, is_write)?;
        Ok(Some(frame_id))
    }

    /// Flush a dirty victim and swap the requested page into the frame.
    fn load_frame(
        &self,
        inner: &mut PoolInner,
        page_id: PageId,
        frame: &FrameHeader,
    ) -> Result<(), BufferPoolError> {
        // A repurposed frame may still hold another page's unwritten bytes.
        if frame.is_dirty() {
            if let Some(old_page_id) = frame.page_id() {
                debug!(
                    "Evicting dirty page {} from frame {}",
                    old_page_id,
                    frame.frame_id()
                );
                self.flush_frame(frame, old_page_id)?;
            }
        }
        self.swap_in(inner, page_id, frame)
    }

    /// Return a frame whose load failed to an allocation source.
    ///
    /// A failed load leaves the page table untouched, so a frame taken
    /// from the replacer still holds its old resident page and goes back
    /// under the replacer's control; a frame from the free list is empty
    /// and goes back there.
    fn release_frame(&self, inner: &mut PoolInner, frame_id: FrameId) {
        let frame = &self.frames[frame_id as usize];
        if frame.page_id().is_some() {
            self.replacer
                .record_access(frame_id, AccessType::Unknown)
                .and_then(|_| self.replacer.set_evictable(frame_id, true))
                .expect("pool frame ids are always in range");
        } else {
            inner.free_list.push(frame_id);
        }
    }

    /// A free frame if one exists, otherwise an eviction victim
    fn acquire_frame(&self, inner: &mut PoolInner) -> Option<FrameId> {
        if let Some(frame_id) = inner.free_list.pop() {
            return Some(frame_id);
        }
        self.replacer.evict()
    }

    /// Read `page_id` from disk into the frame and fix up the page table.
    fn swap_in(
        &self,
        inner: &mut PoolInner,
        page_id: PageId,
        frame: &FrameHeader,
    ) -> Result<(), BufferPoolError> {
        let (promise, future) = DiskScheduler::create_promise();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: false,
            page_id,
            data: None,
            callback: promise,
        })?;
        let bytes = future.recv().map_err(|_| DiskSchedulerError::WorkerStopped)??;
        frame.data_mut().copy_from_slice(&bytes);

        if let Some(old_page_id) = frame.page_id() {
            inner.page_table.remove(&old_page_id);
        }
        inner.page_table.insert(page_id, frame.frame_id());
        Ok(())
    }

    /// Pin a frame on behalf of a new guard and tell the replacer.
    fn pin_frame(
        &self,
        frame: &FrameHeader,
        page_id: PageId,
        access_type: AccessType,
        is_write: bool,
    ) -> Result<(), BufferPoolError> {
        frame.pin();
        frame.set_page_id(Some(page_id));
        if is_write {
            frame.mark_dirty();
        }
        self.replacer.set_evictable(frame.frame_id(), false)?;
        self.replacer.record_access(frame.frame_id(), access_type)?;
        Ok(())
    }

    /// Schedule a write of the frame's bytes, wait it out, clear dirty.
    fn flush_frame(&self, frame: &FrameHeader, page_id: PageId) -> Result<(), BufferPoolError> {
        let bytes = (*frame.data()).clone();
        let (promise, future) = DiskScheduler::create_promise();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: true,
            page_id,
            data: Some(bytes),
            callback: promise,
        })?;
        future.recv().map_err(|_| DiskSchedulerError::WorkerStopped)??;
        frame.clear_dirty();
        Ok(())
    }
}
