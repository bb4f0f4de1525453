// Export public modules
pub mod common;
pub mod storage;
pub mod wal;

// Re-export key items for convenient access
pub use storage::buffer::BufferPoolManager;
pub use storage::buffer::BufferPoolError;
pub use storage::buffer::LRUKReplacer;
pub use storage::buffer::{ReadPageGuard, WritePageGuard};
pub use storage::disk::{DiskManager, DiskScheduler};
pub use wal::LogManager;
