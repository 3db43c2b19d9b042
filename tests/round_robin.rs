use std::{sync::Arc, thread};

use numa_rr::{NumaHeap, Topology};

/// Pointers cross threads only as addresses.
fn allocate_many(heap: &NumaHeap, count: usize, size: usize) -> Vec<usize> {
  (0..count)
    .map(|_| {
      heap
        .allocate(size)
        .expect("allocation failed")
        .expect("null block")
        .as_ptr() as usize
    })
    .collect()
}

#[test]
fn sequential_allocations_continue_from_cursor() {
  let heap = NumaHeap::with_cursor(Topology::new(false, 4), 3);
  let ptrs = allocate_many(&heap, 6, 32);

  let nodes: Vec<usize> = ptrs
    .iter()
    .map(|&p| unsafe { heap.bound_node(p as *mut u8) })
    .collect();
  assert_eq!(nodes, [3, 0, 1, 2, 3, 0]);
  assert_eq!(heap.cursor(), 1);

  for p in ptrs {
    unsafe { heap.release(p as *mut u8) };
  }
  assert_eq!(heap.stats().live_regions, 0);
}

#[test]
fn concurrent_allocations_share_one_cycle() {
  const THREADS: usize = 4;
  const PER_THREAD: usize = 25;
  const NODES: usize = 3;
  const START: usize = 1;

  let heap = Arc::new(NumaHeap::with_cursor(Topology::new(false, NODES), START));

  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let heap = Arc::clone(&heap);
      thread::spawn(move || allocate_many(&heap, PER_THREAD, 128))
    })
    .collect();

  let ptrs: Vec<usize> = handles
    .into_iter()
    .flat_map(|h| h.join().expect("allocator thread panicked"))
    .collect();

  let total = THREADS * PER_THREAD;
  assert_eq!(ptrs.len(), total);
  assert_eq!(heap.cursor(), (START + total) % NODES);

  // The multiset of nodes equals `total` consecutive slots starting at START.
  let mut seen = [0usize; NODES];
  for &p in &ptrs {
    seen[unsafe { heap.bound_node(p as *mut u8) }] += 1;
  }
  let mut expected = [0usize; NODES];
  for i in 0..total {
    expected[(START + i) % NODES] += 1;
  }
  assert_eq!(seen, expected);

  let mut sorted = ptrs.clone();
  sorted.sort_unstable();
  sorted.dedup();
  assert_eq!(sorted.len(), total, "live blocks must not share addresses");

  for p in ptrs {
    unsafe { heap.release(p as *mut u8) };
  }
  let stats = heap.stats();
  assert_eq!(stats.allocations, total);
  assert_eq!(stats.releases, total);
  assert_eq!(stats.live_regions, 0);
  assert_eq!(stats.mapped_bytes, 0);
}

#[test]
fn concurrent_resizes_keep_their_data() {
  let heap = Arc::new(NumaHeap::new(Topology::new(false, 2)));

  let handles: Vec<_> = (0..4u8)
    .map(|tag| {
      let heap = Arc::clone(&heap);
      thread::spawn(move || {
        let mut ptr = heap.allocate(16).unwrap().unwrap().as_ptr();
        unsafe { ptr.write_bytes(tag, 16) };
        for size in [64, 1024, 8192, 32] {
          ptr = unsafe { heap.resize(ptr, size) }.unwrap().unwrap().as_ptr();
          assert!(unsafe { core::slice::from_raw_parts(ptr, 16) }
            .iter()
            .all(|&b| b == tag));
        }
        unsafe { heap.release(ptr) };
      })
    })
    .collect();

  for h in handles {
    h.join().expect("resize thread panicked");
  }
  assert_eq!(heap.stats().live_regions, 0);
}
