use tempfile::NamedTempFile;
use tarndb::storage::buffer::BufferPoolManager;
use tarndb::storage::disk::DiskManager;
use anyhow::Result;

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<(NamedTempFile, String)> {
    let file = NamedTempFile::new()?;
    let path = file.path().to_str().unwrap().to_string();
    Ok((file, path))
}

// Create a buffer pool manager with a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize, k_dist: usize) -> Result<(BufferPoolManager, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = DiskManager::new(path)?;
    let buffer_pool = BufferPoolManager::new(pool_size, disk_manager, k_dist);
    Ok((buffer_pool, file))
}
