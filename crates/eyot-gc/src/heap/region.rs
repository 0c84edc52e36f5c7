//! The region: page list, stack-root table, mark-and-sweep collector.

use log::debug;
use parking_lot::Mutex;

use crate::alloc::{manual_alloc, manual_free, manual_realloc};
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::heap::page::{header_size, page_from_ptr, ptr_from_page, PageHeader};
use crate::stats::GcStats;
use crate::Finalizer;

const POINTER_ALIGNMENT: usize = 8;

struct StackPointer {
    in_use: bool,
    pointer_to_pointer: *const u8,
}

struct RegionInner {
    root_page: *mut PageHeader,
    stats: GcStats,
    pointers: Vec<StackPointer>,
    config: GcConfig,
}

unsafe impl Send for RegionInner {}

/// An independent garbage-collected arena.
///
/// Every public operation takes the region's single mutex, matching the
/// original runtime's one-lock-per-region design: allocation, collection
/// and root bookkeeping never run concurrently with each other.
pub struct GcRegion {
    inner: Mutex<RegionInner>,
}

impl GcRegion {
    /// Create a new, empty region using default configuration.
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create a new, empty region, resolving configuration from the
    /// process environment (`EyotDebug`).
    pub fn from_env() -> Self {
        Self::with_config(GcConfig::from_env())
    }

    pub fn with_config(config: GcConfig) -> Self {
        if header_size() % POINTER_ALIGNMENT != 0 {
            panic!("eyot-gc: bad page header size");
        }
        let capacity = config.initial_root_table_capacity;
        let mut pointers = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            pointers.push(StackPointer {
                in_use: false,
                pointer_to_pointer: std::ptr::null(),
            });
        }
        GcRegion {
            inner: Mutex::new(RegionInner {
                root_page: std::ptr::null_mut(),
                stats: GcStats::default(),
                pointers,
                config,
            }),
        }
    }

    /// Current allocation statistics.
    pub fn stats(&self) -> GcStats {
        self.inner.lock().stats
    }

    /// Allocate a zero-filled payload of `size` bytes, optionally with a
    /// finalizer that runs once, at sweep, just before the payload is
    /// freed.
    pub fn alloc(&self, size: usize, finalizer: Option<Finalizer>) -> *mut u8 {
        let page_size = header_size() + size;
        let page = manual_alloc(page_size) as *mut PageHeader;
        if page.is_null() {
            panic!("eyot-gc: failed to allocate a page of {size} bytes");
        }
        unsafe {
            std::ptr::write(
                page,
                PageHeader {
                    next: std::ptr::null_mut(),
                    prev: std::ptr::null_mut(),
                    finalizer,
                    size,
                    root_count: 0,
                    marked: false,
                },
            );
        }

        let mut inner = self.inner.lock();
        gc_check(&inner, "pre-alloc");

        unsafe {
            if !inner.root_page.is_null() {
                (*inner.root_page).prev = page;
                (*page).next = inner.root_page;
            }
        }
        inner.root_page = page;

        inner.stats.pages_allocated += 1;
        inner.stats.bytes_allocated += size;

        gc_check(&inner, "alloc");

        unsafe { ptr_from_page(page) }
    }

    /// Resize a payload in place, preserving its prefix and zero-filling
    /// any newly introduced bytes.
    pub fn realloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        let mut inner = self.inner.lock();
        let page = unsafe { page_from_ptr(ptr) };
        let old_size = unsafe { (*page).size };
        if old_size == new_size {
            return ptr;
        }

        inner.stats.bytes_allocated = inner
            .stats
            .bytes_allocated
            .wrapping_add(new_size)
            .wrapping_sub(old_size);

        unsafe {
            let next = (*page).next;
            let prev = (*page).prev;
            let old_page_size = header_size() + old_size;
            let new_page_size = header_size() + new_size;
            let raw = manual_realloc(page as *mut u8, old_page_size, new_page_size);
            let new_page = raw as *mut PageHeader;
            (*new_page).size = new_size;

            if !prev.is_null() {
                (*prev).next = new_page;
            } else {
                inner.root_page = new_page;
            }
            if !next.is_null() {
                (*next).prev = new_page;
            }

            gc_check(&inner, "realloc");

            ptr_from_page(new_page)
        }
    }

    /// Increment a payload's root count. While positive, the payload
    /// survives any collection regardless of reachability.
    pub fn remember_root_object(&self, ptr: *mut u8) {
        let inner = self.inner.lock();
        unsafe {
            (*page_from_ptr(ptr)).root_count += 1;
        }
        drop(inner);
    }

    /// Decrement a payload's root count.
    pub fn forget_root_object(&self, ptr: *mut u8) {
        let inner = self.inner.lock();
        unsafe {
            (*page_from_ptr(ptr)).root_count -= 1;
        }
        drop(inner);
    }

    /// Register a pointer-to-pointer as a stack root: at collection time
    /// its pointee is read and, if it names a live payload, that payload
    /// is marked reachable.
    pub fn remember_root_pointer(&self, ptr_to_ptr: *const u8) {
        let mut inner = self.inner.lock();
        let slot = inner.pointers.iter().position(|p| !p.in_use);
        let idx = match slot {
            Some(i) => i,
            None => {
                inner.pointers.push(StackPointer {
                    in_use: false,
                    pointer_to_pointer: std::ptr::null(),
                });
                inner.pointers.len() - 1
            }
        };
        inner.pointers[idx] = StackPointer {
            in_use: true,
            pointer_to_pointer: ptr_to_ptr,
        };
    }

    /// Unregister a stack root previously passed to
    /// [`GcRegion::remember_root_pointer`]. Fatal if the pointer was never
    /// registered (or was already forgotten).
    pub fn forget_root_pointer(&self, ptr_to_ptr: *const u8) -> Result<()> {
        let mut inner = self.inner.lock();
        for p in inner.pointers.iter_mut() {
            if p.in_use && p.pointer_to_pointer == ptr_to_ptr {
                p.in_use = false;
                return Ok(());
            }
        }
        Err(GcError::RootNotFound)
    }

    /// Run a full mark-and-sweep collection.
    pub fn collect(&self) {
        let mut inner = self.inner.lock();

        // unmark everything
        unsafe {
            let mut ph = inner.root_page;
            while !ph.is_null() {
                (*ph).marked = false;
                ph = (*ph).next;
            }
        }

        // mark all rooted pages
        unsafe {
            let mut ph = inner.root_page;
            while !ph.is_null() {
                if (*ph).root_count > 0 {
                    mark_page(&inner, ph);
                }
                ph = (*ph).next;
            }
        }

        // mark all stack roots
        unsafe {
            for i in 0..inner.pointers.len() {
                if !inner.pointers[i].in_use {
                    continue;
                }
                let ptr_to_ptr = inner.pointers[i].pointer_to_pointer as *const *mut u8;
                let candidate = *ptr_to_ptr;
                if owns_ptr(&inner, candidate) {
                    mark_page(&inner, page_from_ptr(candidate));
                }
            }
        }

        // sweep
        unsafe {
            let mut ph = inner.root_page;
            while !ph.is_null() {
                let this_page = ph;
                ph = (*ph).next;
                if !(*this_page).marked {
                    free_page(&mut inner, this_page);
                }
            }
        }
    }

    /// Run a final collection, then release the region. Any page still
    /// reachable at that point (the caller failed to forget all its
    /// roots) leaks deliberately rather than being force-freed while
    /// potentially still referenced.
    pub fn free(self) {
        self.collect();
    }
}

impl Default for GcRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RegionInner {
    fn drop(&mut self) {
        // The stack-root table itself is a plain Vec and drops normally;
        // nothing special is required here. Kept for symmetry with the
        // original's explicit `ey_runtime_manual_free(region->pointers)`.
    }
}

/// `gc_owns_ptr`: checked without ever dereferencing `ptr` until it is
/// confirmed to be one of our page payloads.
unsafe fn owns_ptr(inner: &RegionInner, ptr: *mut u8) -> bool {
    if (ptr as usize) < header_size() {
        return false;
    }
    let theoretical_page = page_from_ptr(ptr);
    let mut ph = inner.root_page;
    while !ph.is_null() {
        if ph == theoretical_page {
            return true;
        }
        ph = (*ph).next;
    }
    false
}

unsafe fn mark_page(inner: &RegionInner, ph: *mut PageHeader) {
    if (*ph).marked {
        return;
    }
    (*ph).marked = true;

    let base_ptr = ptr_from_page(ph);
    debug_assert_eq!(base_ptr as usize % POINTER_ALIGNMENT, 0);

    let size = (*ph).size;
    let mut offset = 0usize;
    while offset + POINTER_ALIGNMENT <= size {
        let candidate = std::ptr::read_unaligned(base_ptr.add(offset) as *const *mut u8);
        if owns_ptr(inner, candidate) {
            mark_page(inner, page_from_ptr(candidate));
        }
        offset += POINTER_ALIGNMENT;
    }
}

/// Called locked: finalize, unlink and free a single page.
unsafe fn free_page(inner: &mut RegionInner, ph: *mut PageHeader) {
    if let Some(finalizer) = (*ph).finalizer {
        finalizer(ptr_from_page(ph));
    }

    inner.stats.pages_allocated -= 1;
    inner.stats.bytes_allocated -= (*ph).size;

    let next = (*ph).next;
    let prev = (*ph).prev;
    if !prev.is_null() {
        (*prev).next = next;
    } else {
        inner.root_page = next;
    }
    if !next.is_null() {
        (*next).prev = prev;
    }

    gc_check(inner, "free");

    manual_free(ph as *mut u8, header_size() + (*ph).size);
}

/// `gc_check`: only runs the page-list walk when
/// [`GcConfig::consistency_check`] is set, matching `EyotDebug=y`.
fn gc_check(inner: &RegionInner, label: &str) {
    if !inner.config.consistency_check {
        return;
    }

    unsafe {
        let mut prev: *mut PageHeader = std::ptr::null_mut();
        let mut ph = inner.root_page;
        while !ph.is_null() {
            if (*ph).prev != prev {
                log_page_list(inner);
                panic!("eyot-gc: inconsistent gc list at {label}");
            }
            prev = ph;
            ph = (*ph).next;
        }
    }
}

fn log_page_list(inner: &RegionInner) {
    debug!("start gc_log {:p}", inner.root_page);
    unsafe {
        let mut ph = inner.root_page;
        while !ph.is_null() {
            debug!(
                " - {:p} ({}) follows {:p} (marked = {})",
                ph,
                (*ph).size,
                (*ph).prev,
                (*ph).marked
            );
            ph = (*ph).next;
        }
    }
}
