#![allow(clippy::missing_safety_doc)]

use core::{
  alloc::{GlobalAlloc, Layout},
  ffi::{c_int, c_ulong, c_void},
  fmt::{self, Write},
  mem::size_of,
  ptr::{self, NonNull, null_mut},
  sync::atomic::{AtomicUsize, Ordering},
};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Bytes reserved in front of every user pointer for the `BlockHeader`.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Alignment of pointers returned by the default-aligned entry points.
pub const MIN_ALIGN: usize = 16;

/// Largest node count we ever select from. Matches the kernel's default `MAX_NUMNODES`.
pub const MAX_NODES: usize = 1024;

const ULONG_BITS: usize = c_ulong::BITS as usize;
const NODEMASK_WORDS: usize = MAX_NODES / ULONG_BITS;

// Memory policy ABI (linux/mempolicy.h). Not exported by the libc crate.
const MPOL_BIND: c_int = 2;
const MPOL_F_NODE: c_ulong = 1 << 0;
const MPOL_F_ADDR: c_ulong = 1 << 1;

const NODE_ONLINE_PATH: &core::ffi::CStr = c"/sys/devices/system/node/online";

// =============================================================================
// Compile-Time Assertions
// =============================================================================

const _: () = assert!(HEADER_SIZE == 16);
const _: () = assert!(HEADER_SIZE % MIN_ALIGN == 0);
const _: () = assert!(MIN_ALIGN.is_power_of_two());
const _: () = assert!(MAX_NODES % ULONG_BITS == 0);
const _: () = assert!(MAX_NODES <= u32::MAX as usize);

// =============================================================================
// Types
// =============================================================================

/// Why an allocation did not produce a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  /// The kernel refused to map a fresh region.
  #[error("mmap of {size} bytes failed (errno {errno})")]
  OutOfMemory { size: usize, errno: i32 },

  /// `mbind` rejected the single-node policy. The region was already unmapped.
  #[error("mbind to node {node} failed (errno {errno})")]
  PolicyBind { node: usize, errno: i32 },

  /// `count * size` (or `size + header`) does not fit in `usize`.
  #[error("allocation of {count} x {size} bytes overflows the address space")]
  InvalidSize { count: usize, size: usize },

  /// Alignment is not a power of two, or is larger than a page.
  #[error("unsupported alignment {align}")]
  InvalidAlignment { align: usize },
}

/// `Ok(None)` is the defined null result: zero-sized requests and `resize(p, 0)`.
pub type AllocResult = Result<Option<NonNull<u8>>, AllocError>;

/// Metadata stored directly in front of each user pointer.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug)]
struct BlockHeader {
  /// Size the caller asked for.
  size: usize,
  /// Distance from the region start to the user pointer.
  offset: u32,
  /// Node the region was bound to.
  node: u32,
}

impl BlockHeader {
  #[inline]
  unsafe fn at(ptr: *mut u8) -> *mut BlockHeader {
    unsafe { ptr.sub(HEADER_SIZE).cast() }
  }

  #[inline]
  unsafe fn read(ptr: *mut u8) -> Self {
    unsafe { ptr::read(Self::at(ptr)) }
  }

  #[inline]
  unsafe fn write(self, ptr: *mut u8) {
    unsafe { ptr::write(Self::at(ptr), self) }
  }

  /// Start and length of the mapping that backs the block at `ptr`.
  #[inline]
  unsafe fn region(&self, ptr: *mut u8) -> (*mut u8, usize) {
    let offset = self.offset as usize;
    (unsafe { ptr.sub(offset) }, offset + self.size)
  }
}

// =============================================================================
// Platform
// =============================================================================

fn last_errno() -> i32 {
  std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

unsafe fn os_mmap(size: usize) -> Result<NonNull<u8>, i32> {
  let ptr = unsafe {
    libc::mmap(
      null_mut(),
      size,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if ptr == libc::MAP_FAILED {
    Err(last_errno())
  } else {
    NonNull::new(ptr.cast()).ok_or(libc::ENOMEM)
  }
}

unsafe fn os_munmap(ptr: *mut u8, size: usize) -> bool {
  unsafe { libc::munmap(ptr.cast(), size) == 0 }
}

fn os_page_size() -> usize {
  match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
    size if size > 0 => size as usize,
    _ => 4096,
  }
}

/// Same probe libnuma's `numa_available()` uses, but any failure counts as "no NUMA".
#[cfg(target_os = "linux")]
fn numa_supported() -> bool {
  let rc = unsafe {
    libc::syscall(
      libc::SYS_get_mempolicy,
      null_mut::<c_int>(),
      null_mut::<c_ulong>(),
      0 as c_ulong,
      null_mut::<c_void>(),
      0 as c_ulong,
    )
  };
  rc == 0
}

#[cfg(not(target_os = "linux"))]
fn numa_supported() -> bool {
  false
}

/// Reads the highest online node index without touching the heap.
#[cfg(target_os = "linux")]
fn read_max_node() -> Option<usize> {
  let mut buf = [0u8; 4096];
  let fd = unsafe { libc::open(NODE_ONLINE_PATH.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
  if fd < 0 {
    return None;
  }
  let len = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
  unsafe { libc::close(fd) };

  if len <= 0 {
    return None;
  }
  parse_max_node(&buf[..len as usize])
}

#[cfg(not(target_os = "linux"))]
fn read_max_node() -> Option<usize> {
  let _ = NODE_ONLINE_PATH;
  None
}

/// Largest index in a kernel node list such as `0`, `0-3` or `0,2-5`.
fn parse_max_node(list: &[u8]) -> Option<usize> {
  let mut max = None;
  let mut current: Option<usize> = None;

  for &byte in list {
    if byte.is_ascii_digit() {
      let digit = (byte - b'0') as usize;
      current = Some(
        current
          .unwrap_or(0)
          .saturating_mul(10)
          .saturating_add(digit),
      );
    } else if let Some(value) = current.take() {
      max = max.max(Some(value));
    }
  }

  max.max(current)
}

/// Installs a strict `MPOL_BIND` policy to `node` over `[region, region + len)`.
#[cfg(target_os = "linux")]
unsafe fn bind_to_node(region: NonNull<u8>, len: usize, node: usize) -> Result<(), i32> {
  let mut nodemask = [0 as c_ulong; NODEMASK_WORDS];
  nodemask[node / ULONG_BITS] |= 1 << (node % ULONG_BITS);

  // The kernel reads `maxnode - 1` bits.
  let rc = unsafe {
    libc::syscall(
      libc::SYS_mbind,
      region.as_ptr().cast::<c_void>(),
      len as c_ulong,
      MPOL_BIND,
      nodemask.as_ptr(),
      (MAX_NODES + 1) as c_ulong,
      0 as libc::c_uint,
    )
  };

  if rc == 0 { Ok(()) } else { Err(last_errno()) }
}

#[cfg(not(target_os = "linux"))]
unsafe fn bind_to_node(_region: NonNull<u8>, _len: usize, _node: usize) -> Result<(), i32> {
  let _ = (MPOL_BIND, NODEMASK_WORDS);
  Err(libc::ENOSYS)
}

#[cfg(target_os = "linux")]
unsafe fn node_of_address(addr: *mut u8) -> Option<usize> {
  let mut node: c_int = -1;
  let rc = unsafe {
    libc::syscall(
      libc::SYS_get_mempolicy,
      &mut node as *mut c_int,
      null_mut::<c_ulong>(),
      0 as c_ulong,
      addr.cast::<c_void>(),
      MPOL_F_NODE | MPOL_F_ADDR,
    )
  };
  (rc == 0 && node >= 0).then_some(node as usize)
}

#[cfg(not(target_os = "linux"))]
unsafe fn node_of_address(_addr: *mut u8) -> Option<usize> {
  let _ = (MPOL_F_NODE, MPOL_F_ADDR);
  None
}

/// Writes one byte per page, lowest address first, so every frame is faulted in
/// under the policy that was just installed.
unsafe fn first_touch(region: NonNull<u8>, len: usize, page_size: usize) {
  let base = region.as_ptr();
  for offset in (0..len).step_by(page_size) {
    unsafe { ptr::write_volatile(base.add(offset), 0) };
  }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Fixed-capacity line used to format reports without allocating.
struct LineBuffer {
  buf: [u8; 160],
  len: usize,
}

impl LineBuffer {
  const fn new() -> Self {
    Self {
      buf: [0; 160],
      len: 0,
    }
  }

  fn as_bytes(&self) -> &[u8] {
    &self.buf[..self.len]
  }
}

impl Write for LineBuffer {
  fn write_str(&mut self, s: &str) -> fmt::Result {
    let room = self.buf.len() - self.len;
    let n = s.len().min(room);
    self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
    self.len += n;
    Ok(())
  }
}

fn format_report(err: &AllocError) -> LineBuffer {
  let mut line = LineBuffer::new();
  let _ = writeln!(line, "numa-rr: {err}");
  line
}

// Must stay allocation-free: this runs inside malloc.
#[cfg(feature = "diagnostics")]
fn report(err: &AllocError) {
  let line = format_report(err);
  let bytes = line.as_bytes();
  unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
}

#[cfg(not(feature = "diagnostics"))]
fn report(err: &AllocError) {
  let _ = format_report;
  let _ = err;
}

// =============================================================================
// Topology
// =============================================================================

/// What the OS told us about the machine. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
  numa_available: bool,
  node_count: usize,
  page_size: usize,
}

impl Topology {
  /// Queries the running kernel. Never fails: without NUMA support the result
  /// is a single node with binding disabled.
  pub fn probe() -> Self {
    let numa_available = numa_supported();
    let node_count = if numa_available {
      read_max_node().map_or(1, |max| max.saturating_add(1))
    } else {
      1
    };
    Self::new(numa_available, node_count)
  }

  /// Explicit topology. `node_count` is clamped to `1..=MAX_NODES`.
  /// With `numa_available == false` nodes are still selected round-robin but no
  /// policy is installed.
  pub fn new(numa_available: bool, node_count: usize) -> Self {
    Self {
      numa_available,
      node_count: node_count.clamp(1, MAX_NODES),
      page_size: os_page_size(),
    }
  }

  pub fn numa_available(&self) -> bool {
    self.numa_available
  }

  pub fn node_count(&self) -> usize {
    self.node_count
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }
}

// =============================================================================
// Node Selector
// =============================================================================

/// Round-robin cursor over `0..node_count`.
pub struct NodeSelector {
  node_count: usize,
  cursor: Mutex<usize>,
}

impl NodeSelector {
  pub const fn new(node_count: usize) -> Self {
    Self::with_cursor(node_count, 0)
  }

  /// Selector whose first `next()` returns `cursor % node_count`.
  pub const fn with_cursor(node_count: usize, cursor: usize) -> Self {
    let node_count = if node_count == 0 { 1 } else { node_count };
    Self {
      node_count,
      cursor: Mutex::new(cursor % node_count),
    }
  }

  /// Returns the current node and advances the cursor.
  pub fn next(&self) -> usize {
    let mut cursor = self.lock();
    let node = *cursor;
    *cursor = (node + 1) % self.node_count;
    node
  }

  pub fn cursor(&self) -> usize {
    *self.lock()
  }

  pub fn node_count(&self) -> usize {
    self.node_count
  }

  // A panic cannot happen while the guard is held, but never propagate poison into malloc.
  fn lock(&self) -> MutexGuard<'_, usize> {
    self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Default)]
struct HeapStats {
  allocations: AtomicUsize,
  releases: AtomicUsize,
  bind_failures: AtomicUsize,
  live_regions: AtomicUsize,
  mapped_bytes: AtomicUsize,
}

impl HeapStats {
  fn record_map(&self, len: usize) {
    self.allocations.fetch_add(1, Ordering::Relaxed);
    self.live_regions.fetch_add(1, Ordering::Relaxed);
    self.mapped_bytes.fetch_add(len, Ordering::Relaxed);
  }

  // Gauges saturate at zero: a block may be released through a heap that did not map it.
  fn record_unmap(&self, len: usize) {
    self.releases.fetch_add(1, Ordering::Relaxed);
    saturating_sub(&self.live_regions, 1);
    saturating_sub(&self.mapped_bytes, len);
  }

  fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      allocations: self.allocations.load(Ordering::Relaxed),
      releases: self.releases.load(Ordering::Relaxed),
      bind_failures: self.bind_failures.load(Ordering::Relaxed),
      live_regions: self.live_regions.load(Ordering::Relaxed),
      mapped_bytes: self.mapped_bytes.load(Ordering::Relaxed),
    }
  }
}

fn saturating_sub(gauge: &AtomicUsize, amount: usize) {
  let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
    Some(v.saturating_sub(amount))
  });
}

/// Point-in-time copy of a heap's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  pub allocations: usize,
  pub releases: usize,
  pub bind_failures: usize,
  /// Regions currently mapped by this heap.
  pub live_regions: usize,
  /// Bytes currently mapped, headers included.
  pub mapped_bytes: usize,
}

// =============================================================================
// Heap
// =============================================================================

/// Allocator context: topology plus round-robin cursor.
///
/// Every allocation is its own anonymous mapping, bound to one node and
/// pre-faulted. Nothing is pooled, so a block must be released through a heap
/// (usually the same one, for accurate stats) and is unmapped immediately.
pub struct NumaHeap {
  topology: Topology,
  selector: NodeSelector,
  stats: HeapStats,
}

static HEAP: OnceLock<NumaHeap> = OnceLock::new();

impl NumaHeap {
  /// Process-wide heap, probed on first use. Initialization does not allocate.
  pub fn global() -> &'static Self {
    HEAP.get_or_init(|| Self::new(Topology::probe()))
  }

  pub fn new(topology: Topology) -> Self {
    Self::with_cursor(topology, 0)
  }

  pub fn with_cursor(topology: Topology, cursor: usize) -> Self {
    Self {
      selector: NodeSelector::with_cursor(topology.node_count, cursor),
      topology,
      stats: HeapStats::default(),
    }
  }

  pub fn topology(&self) -> &Topology {
    &self.topology
  }

  /// Node the next allocation will be bound to.
  pub fn cursor(&self) -> usize {
    self.selector.cursor()
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  /// Maps a block of `size` bytes, 16-byte aligned. `size == 0` yields `Ok(None)`.
  pub fn allocate(&self, size: usize) -> AllocResult {
    self.allocate_aligned(size, MIN_ALIGN)
  }

  /// Like `allocate`, with `align` up to the page size.
  pub fn allocate_aligned(&self, size: usize, align: usize) -> AllocResult {
    if size == 0 {
      return Ok(None);
    }
    self.map_block(size, align).map(Some)
  }

  /// Page-aligned block (`valloc`).
  pub fn allocate_page_aligned(&self, size: usize) -> AllocResult {
    self.allocate_aligned(size, self.topology.page_size)
  }

  /// Page-aligned block whose size is rounded up to whole pages (`pvalloc`).
  /// A zero size still gets one page.
  pub fn allocate_whole_pages(&self, size: usize) -> AllocResult {
    let page_size = self.topology.page_size;
    let pages = size
      .max(1)
      .checked_next_multiple_of(page_size)
      .ok_or(AllocError::InvalidSize { count: 1, size })?;
    self.allocate_aligned(pages, page_size)
  }

  /// `count * size` zeroed bytes. Anonymous mappings start zero-filled.
  pub fn zero_allocate(&self, count: usize, size: usize) -> AllocResult {
    let total = count
      .checked_mul(size)
      .ok_or(AllocError::InvalidSize { count, size })?;
    self.allocate(total)
  }

  /// Unmaps the block at `ptr`. Null is a no-op.
  ///
  /// Any `NumaHeap` can release any block, but only the heap that mapped it
  /// keeps exact gauges; the releasing heap's gauges stop at zero. A rejected
  /// `munmap` is not counted.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by a `NumaHeap`.
  pub unsafe fn release(&self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    let header = unsafe { BlockHeader::read(ptr) };
    let (region, len) = unsafe { header.region(ptr) };
    if unsafe { os_munmap(region, len) } {
      self.stats.record_unmap(len);
    }
  }

  /// Moves the block at `ptr` into a fresh block of `new_size` bytes.
  ///
  /// A null `ptr` allocates; `new_size == 0` releases and returns `Ok(None)`.
  /// Otherwise a new block is always mapped (on the next node), the common
  /// prefix is copied and the old block released. On error the old block is
  /// untouched.
  ///
  /// # Safety
  ///
  /// Same as `release`.
  pub unsafe fn resize(&self, ptr: *mut u8, new_size: usize) -> AllocResult {
    if ptr.is_null() {
      return self.allocate(new_size);
    }
    if new_size == 0 {
      unsafe { self.release(ptr) };
      return Ok(None);
    }

    let old_size = unsafe { BlockHeader::read(ptr) }.size;
    let new_ptr = self.map_block(new_size, MIN_ALIGN)?;
    unsafe {
      ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), old_size.min(new_size));
      self.release(ptr);
    }
    Ok(Some(new_ptr))
  }

  /// Size requested for the block at `ptr`, or 0 for null.
  ///
  /// # Safety
  ///
  /// Same as `release`.
  pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
    if ptr.is_null() {
      return 0;
    }
    unsafe { BlockHeader::read(ptr) }.size
  }

  /// Node the block at `ptr` was assigned by the selector.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live, non-null pointer returned by a `NumaHeap`.
  pub unsafe fn bound_node(&self, ptr: *mut u8) -> usize {
    unsafe { BlockHeader::read(ptr) }.node as usize
  }

  /// Node that physically backs the page holding `ptr`, as reported by the kernel.
  ///
  /// # Safety
  ///
  /// `ptr` must point into mapped memory.
  pub unsafe fn resident_node(&self, ptr: *mut u8) -> Option<usize> {
    if !self.topology.numa_available {
      return None;
    }
    unsafe { node_of_address(ptr) }
  }

  fn map_block(&self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
    let page_size = self.topology.page_size;
    if !align.is_power_of_two() || align > page_size {
      return Err(AllocError::InvalidAlignment { align });
    }

    // Regions are page-aligned, so `region + offset` is `align`-aligned.
    let offset = align.max(HEADER_SIZE);
    let total = size
      .checked_add(offset)
      .ok_or(AllocError::InvalidSize { count: 1, size })?;

    let node = self.selector.next();

    let region = unsafe { os_mmap(total) }.map_err(|errno| AllocError::OutOfMemory {
      size: total,
      errno,
    })?;

    if self.topology.numa_available
      && let Err(errno) = unsafe { bind_to_node(region, total, node) }
    {
      unsafe { os_munmap(region.as_ptr(), total) };
      self.stats.bind_failures.fetch_add(1, Ordering::Relaxed);
      let err = AllocError::PolicyBind { node, errno };
      report(&err);
      return Err(err);
    }

    // Placement happens at fault time, not at mbind time.
    unsafe { first_touch(region, total, page_size) };

    let user = unsafe { region.add(offset) };
    let header = BlockHeader {
      size,
      offset: offset as u32,
      node: node as u32,
    };
    unsafe { header.write(user.as_ptr()) };

    self.stats.record_map(total);
    Ok(user)
  }
}

// =============================================================================
// Entry points (global heap)
// =============================================================================

#[inline]
fn into_raw(result: AllocResult) -> *mut u8 {
  match result {
    Ok(Some(ptr)) => ptr.as_ptr(),
    Ok(None) | Err(_) => null_mut(),
  }
}

/// `malloc` on the global heap. Null for zero size or failure.
pub fn numa_malloc(size: usize) -> *mut u8 {
  into_raw(NumaHeap::global().allocate(size))
}

pub unsafe fn numa_free(ptr: *mut u8) {
  unsafe { NumaHeap::global().release(ptr) }
}

pub fn numa_calloc(count: usize, size: usize) -> *mut u8 {
  into_raw(NumaHeap::global().zero_allocate(count, size))
}

pub unsafe fn numa_realloc(ptr: *mut u8, new_size: usize) -> *mut u8 {
  into_raw(unsafe { NumaHeap::global().resize(ptr, new_size) })
}

// =============================================================================
// GlobalAlloc
// =============================================================================

/// Rust-side registration hook:
///
/// ```rust,ignore
/// #[global_allocator]
/// static GLOBAL: numa_rr::NumaRoundRobin = numa_rr::NumaRoundRobin;
/// ```
pub struct NumaRoundRobin;

unsafe impl GlobalAlloc for NumaRoundRobin {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    into_raw(NumaHeap::global().allocate_aligned(layout.size().max(1), layout.align()))
  }

  unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
    unsafe { NumaHeap::global().release(ptr) }
  }

  unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
    // Fresh anonymous mappings are already zero.
    unsafe { self.alloc(layout) }
  }

  unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
    let heap = NumaHeap::global();
    if layout.align() <= MIN_ALIGN {
      return into_raw(unsafe { heap.resize(ptr, new_size) });
    }

    let new_ptr = into_raw(heap.allocate_aligned(new_size, layout.align()));
    if !new_ptr.is_null() {
      unsafe {
        ptr::copy_nonoverlapping(ptr, new_ptr, layout.size().min(new_size));
        heap.release(ptr);
      }
    }
    new_ptr
  }
}

// =============================================================================
// C API (enabled with --features c_api)
// =============================================================================

#[cfg(feature = "c_api")]
fn set_errno(value: c_int) {
  #[cfg(target_os = "linux")]
  unsafe {
    *libc::__errno_location() = value
  };
  #[cfg(not(target_os = "linux"))]
  let _ = value;
}

#[cfg(feature = "c_api")]
fn c_result(result: AllocResult) -> *mut c_void {
  match result {
    Ok(ptr) => ptr.map_or(null_mut(), |p| p.as_ptr().cast()),
    Err(_) => {
      set_errno(libc::ENOMEM);
      null_mut()
    }
  }
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
  c_result(NumaHeap::global().allocate(size))
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  unsafe { NumaHeap::global().release(ptr.cast()) }
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
  c_result(NumaHeap::global().zero_allocate(nmemb, size))
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
  c_result(unsafe { NumaHeap::global().resize(ptr.cast(), size) })
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_memalign(
  memptr: *mut *mut c_void,
  alignment: usize,
  size: usize,
) -> c_int {
  if !alignment.is_power_of_two() || alignment % size_of::<*mut c_void>() != 0 {
    return libc::EINVAL;
  }

  match NumaHeap::global().allocate_aligned(size, alignment) {
    Ok(ptr) => {
      unsafe { *memptr = ptr.map_or(null_mut(), |p| p.as_ptr().cast()) };
      0
    }
    Err(_) => libc::ENOMEM,
  }
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aligned_alloc(alignment: usize, size: usize) -> *mut c_void {
  c_result(NumaHeap::global().allocate_aligned(size, alignment))
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn memalign(alignment: usize, size: usize) -> *mut c_void {
  // glibc rounds a non-power-of-two alignment up instead of rejecting it.
  match alignment.max(1).checked_next_power_of_two() {
    Some(align) => c_result(NumaHeap::global().allocate_aligned(size, align)),
    None => {
      set_errno(libc::EINVAL);
      null_mut()
    }
  }
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn valloc(size: usize) -> *mut c_void {
  c_result(NumaHeap::global().allocate_page_aligned(size))
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pvalloc(size: usize) -> *mut c_void {
  c_result(NumaHeap::global().allocate_whole_pages(size))
}

#[cfg(feature = "c_api")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
  unsafe { NumaHeap::global().usable_size(ptr.cast()) }
}

// =============================================================================
// Tests
// =============================================================================
