pub mod disk_manager;
pub mod scheduler;

pub use disk_manager::{DiskManager, DiskManagerError};
pub use scheduler::{DiskFuture, DiskPromise, DiskRequest, DiskScheduler, DiskSchedulerError};
