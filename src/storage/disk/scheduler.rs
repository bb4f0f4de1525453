use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use log::debug;
use thiserror::Error;

use crate::common::types::{PageId, PAGE_SIZE};
use crate::storage::disk::disk_manager::{DiskManager, DiskManagerError};

#[derive(Error, Debug)]
pub enum DiskSchedulerError {
    #[error("Disk worker is no longer running")]
    WorkerStopped,
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
}

/// Outcome of a completed disk request.
///
/// A read completes with the freshly filled page bytes; a write hands its
/// payload buffer back to the issuer.
pub type DiskResponse = Result<Box<[u8]>, DiskManagerError>;

/// Completion handle pair for a scheduled request
pub type DiskPromise = Sender<DiskResponse>;
pub type DiskFuture = Receiver<DiskResponse>;

/// A single page-granular I/O request.
pub struct DiskRequest {
    /// Whether the request writes to disk
    pub is_write: bool,
    /// ID of the page being read from / written to disk
    pub page_id: PageId,
    /// Payload for writes; `None` for reads
    pub data: Option<Box<[u8]>>,
    /// Fulfilled by the worker once the request has completed
    pub callback: DiskPromise,
}

/// Schedules page I/O onto a dedicated worker thread.
///
/// Requests are queued through a channel and processed in submission order.
/// Callers wait on the future half of the promise created alongside each
/// request. A request that has been scheduled always runs to completion.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_queue: Option<Sender<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (tx, rx) = mpsc::channel::<DiskRequest>();
        let worker_disk = Arc::clone(&disk_manager);

        let worker = std::thread::spawn(move || {
            while let Ok(request) = rx.recv() {
                let response = Self::process(&worker_disk, request.is_write, request.page_id, request.data);
                // The issuer may have given up waiting; nothing left to do then.
                let _ = request.callback.send(response);
            }
        });

        Self {
            disk_manager,
            request_queue: Some(tx),
            worker: Some(worker),
        }
    }

    /// Create a promise/future pair for tracking one request
    pub fn create_promise() -> (DiskPromise, DiskFuture) {
        mpsc::channel()
    }

    /// Queue a request for the worker thread
    pub fn schedule(&self, request: DiskRequest) -> Result<(), DiskSchedulerError> {
        self.request_queue
            .as_ref()
            .ok_or(DiskSchedulerError::WorkerStopped)?
            .send(request)
            .map_err(|_| DiskSchedulerError::WorkerStopped)
    }

    /// Ensure the on-disk slot for `page_id` exists
    pub fn increase_disk_space(&self, page_id: PageId) -> Result<(), DiskSchedulerError> {
        self.disk_manager.increase_disk_space(page_id)?;
        Ok(())
    }

    /// Forward a deallocation hint to the disk manager
    pub fn deallocate_page(&self, page_id: PageId) {
        self.disk_manager.deallocate_page(page_id);
    }

    fn process(
        disk: &DiskManager,
        is_write: bool,
        page_id: PageId,
        data: Option<Box<[u8]>>,
    ) -> DiskResponse {
        if is_write {
            let buf = data.unwrap_or_else(|| vec![0; PAGE_SIZE].into_boxed_slice());
            disk.write_page(page_id, &buf)?;
            Ok(buf)
        } else {
            let mut buf = vec![0u8; PAGE_SIZE].into_boxed_slice();
            disk.read_page(page_id, &mut buf)?;
            Ok(buf)
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.request_queue.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("Disk worker thread exited abnormally");
            }
        }
    }
}
