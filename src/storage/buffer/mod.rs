pub mod error;
pub mod frame;
pub mod guard;
pub mod manager;
pub mod replacer;

pub use error::BufferPoolError;
pub use frame::FrameHeader;
pub use guard::{ReadPageGuard, WritePageGuard};
pub use manager::BufferPoolManager;
pub use replacer::LRUKReplacer;
