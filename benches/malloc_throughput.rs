use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use numa_rr::{NodeSelector, NumaHeap, Topology};
use std::hint::black_box;

// Every numa-rr allocation is an mmap + mbind + page faults, so keep batches small.
const OPS: u64 = 256;

/// numa-rr alloc/free throughput (global heap, probed topology).
fn numa_rr_malloc_free(size: usize) {
  for _ in 0..OPS {
    unsafe {
      let ptr = numa_rr::numa_malloc(size);
      black_box(ptr);
      numa_rr::numa_free(ptr);
    }
  }
}

/// libc alloc/free throughput.
fn libc_malloc_free(size: usize) {
  for _ in 0..OPS {
    unsafe {
      let ptr = libc::malloc(size);
      black_box(ptr);
      libc::free(ptr);
    }
  }
}

fn benchmark_malloc_throughput(c: &mut Criterion) {
  let mut group = c.benchmark_group("malloc_throughput");

  for size in [64, 4096, 64 * 1024, 1024 * 1024] {
    group.throughput(Throughput::Elements(OPS));

    group.bench_with_input(BenchmarkId::new("numa-rr", size), &size, |b, &size| {
      b.iter(|| numa_rr_malloc_free(size))
    });

    group.bench_with_input(BenchmarkId::new("libc", size), &size, |b, &size| {
      b.iter(|| libc_malloc_free(size))
    });
  }

  group.finish();
}

/// Cursor cost, and allocation cost without mbind.
fn benchmark_node_selection(c: &mut Criterion) {
  let mut group = c.benchmark_group("node_selection");
  group.throughput(Throughput::Elements(1));

  let selector = NodeSelector::new(8);
  group.bench_function("next", |b| b.iter(|| black_box(selector.next())));

  // Mapping + first touch of one page, binding skipped.
  let heap = NumaHeap::new(Topology::new(false, 8));
  group.bench_function("unbound_page", |b| {
    b.iter(|| unsafe {
      let ptr = heap.allocate(black_box(64)).ok().flatten();
      heap.release(ptr.map_or(core::ptr::null_mut(), |p| p.as_ptr()));
    })
  });

  group.finish();
}

criterion_group!(benches, benchmark_malloc_throughput, benchmark_node_selection);
criterion_main!(benches);
