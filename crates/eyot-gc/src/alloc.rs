//! Manual allocation primitives.
//!
//! A thin facade over the system allocator, used both by the region
//! bootstrap (the region header and root table are not themselves GC
//! objects) and by any GC-hosted container whose payload must survive
//! independent of the GC-owned header (see `eyot-string`).

use std::alloc::{GlobalAlloc, Layout, System};

/// Allocate `size` bytes, zero-filled. Panics if the system allocator
/// returns null.
pub fn manual_alloc(size: usize) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }
    unsafe {
        let layout = layout_for(size);
        let ptr = System.alloc_zeroed(layout);
        if ptr.is_null() {
            panic!("eyot-gc: manual allocation of {size} bytes failed");
        }
        ptr
    }
}

/// Resize a manually-allocated block, preserving its prefix.
pub fn manual_realloc(ptr: *mut u8, old_size: usize, new_size: usize) -> *mut u8 {
    if new_size == 0 {
        if !ptr.is_null() {
            manual_free(ptr, old_size);
        }
        return std::ptr::null_mut();
    }
    if ptr.is_null() {
        return manual_alloc(new_size);
    }
    unsafe {
        let old_layout = layout_for(old_size);
        let new_ptr = System.realloc(ptr, old_layout, new_size);
        if new_ptr.is_null() {
            panic!("eyot-gc: manual reallocation to {new_size} bytes failed");
        }
        if new_size > old_size {
            std::ptr::write_bytes(new_ptr.add(old_size), 0, new_size - old_size);
        }
        new_ptr
    }
}

/// Free a manually-allocated block.
pub fn manual_free(ptr: *mut u8, size: usize) {
    if ptr.is_null() || size == 0 {
        return;
    }
    unsafe {
        System.dealloc(ptr, layout_for(size));
    }
}

fn layout_for(size: usize) -> Layout {
    Layout::from_size_align(size, 8).expect("layout size overflow")
}
