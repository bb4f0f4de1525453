use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

use tarndb::common::types::AccessType;
use tarndb::storage::buffer::BufferPoolManager;
use tarndb::storage::disk::DiskManager;

// Create temporary db for benchmarking
fn create_bench_buffer_pool(pool_size: usize) -> BufferPoolManager {
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    let disk_manager = DiskManager::new(temp_file.path()).unwrap();
    let buffer_pool = BufferPoolManager::new(pool_size, disk_manager, 2);

    // Keep the temp file alive
    std::mem::forget(temp_file);

    buffer_pool
}

fn populate_pages(buffer_pool: &BufferPoolManager, count: usize) -> Vec<u64> {
    let mut page_ids = Vec::with_capacity(count);
    for i in 0..count {
        let page_id = buffer_pool.new_page();
        {
            let mut guard = buffer_pool.write_page_unchecked(page_id);
            guard.data_mut()[0] = (i % 256) as u8;
        }
        page_ids.push(page_id);
    }
    page_ids
}

fn buffer_pool_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("BufferPool");

    // Test with different buffer pool sizes
    for size in [10usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("sequential_access", size), size, |b, &size| {
            let buffer_pool = create_bench_buffer_pool(size);
            let page_ids = populate_pages(&buffer_pool, size);

            b.iter(|| {
                for &page_id in &page_ids {
                    let guard = buffer_pool
                        .checked_read_page(page_id, AccessType::Scan)
                        .unwrap()
                        .unwrap();
                    let _ = guard.data()[0];
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("random_access", size), size, |b, &size| {
            let buffer_pool = create_bench_buffer_pool(size);
            let page_ids = populate_pages(&buffer_pool, size);

            let mut rng = rand::thread_rng();
            let random_indices: Vec<usize> =
                (0..size).map(|_| rng.gen_range(0..size)).collect();

            b.iter(|| {
                for &idx in &random_indices {
                    let guard = buffer_pool
                        .checked_read_page(page_ids[idx], AccessType::Lookup)
                        .unwrap()
                        .unwrap();
                    let _ = guard.data()[0];
                }
            });
        });

        // Half the working set fits; every other access churns the pool.
        group.bench_with_input(BenchmarkId::new("eviction_churn", size), size, |b, &size| {
            let buffer_pool = create_bench_buffer_pool(size);
            let page_ids = populate_pages(&buffer_pool, size * 2);

            b.iter(|| {
                for &page_id in &page_ids {
                    let guard = buffer_pool
                        .checked_read_page(page_id, AccessType::Scan)
                        .unwrap()
                        .unwrap();
                    let _ = guard.data()[0];
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, buffer_pool_benchmark);
criterion_main!(benches);
