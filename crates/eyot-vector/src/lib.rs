//! Dynamic, GC-hosted vector of fixed-size elements.
//!
//! Both the vector header and its payload live on the GC heap — a vector
//! of pointers is therefore scanned like any other allocation and keeps
//! its elements alive for free, with no separate tracing logic needed
//! here.

use eyot_gc::GcRegion;

#[repr(C, align(8))]
struct VectorHeader {
    length: i32,
    unit_size: i32,
    ptr: *mut u8,
}

/// A handle to a GC-hosted vector. Cheap to copy; all methods take the
/// owning region explicitly, mirroring every other runtime call.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Vector(*mut u8);

// Vectors are moved between threads (worker -> caller) as plain handles;
// the owning region's mutex is what actually serializes access to a
// vector's backing allocation during resize/realloc.
unsafe impl Send for Vector {}

impl Vector {
    fn header(self) -> *mut VectorHeader {
        self.0 as *mut VectorHeader
    }

    /// Create an empty vector of elements `unit_size` bytes wide.
    pub fn create(region: &GcRegion, unit_size: i32) -> Vector {
        let ptr = region.alloc(std::mem::size_of::<VectorHeader>(), None);
        unsafe {
            std::ptr::write(
                ptr as *mut VectorHeader,
                VectorHeader {
                    length: 0,
                    unit_size,
                    ptr: std::ptr::null_mut(),
                },
            );
        }
        Vector(ptr)
    }

    pub fn length(self) -> i32 {
        unsafe { (*self.header()).length }
    }

    pub fn unit_size(self) -> i32 {
        unsafe { (*self.header()).unit_size }
    }

    /// Raw payload pointer; null for an empty vector.
    pub fn get_ptr(self) -> *mut u8 {
        unsafe { (*self.header()).ptr }
    }

    /// The vector's own GC-allocated header pointer — root this (not
    /// `get_ptr()`) to keep the vector, and transitively its element
    /// buffer, alive across a collection.
    pub fn root_ptr(self) -> *mut u8 {
        self.0
    }

    /// Grow or shrink the vector, zero-filling new elements and
    /// truncating dropped ones.
    pub fn resize(self, region: &GcRegion, new_length: i32) {
        let header = self.header();
        unsafe {
            (*header).length = new_length;
            if new_length == 0 {
                (*header).ptr = std::ptr::null_mut();
            } else {
                let new_bytes = (*header).unit_size as usize * new_length as usize;
                (*header).ptr = if (*header).ptr.is_null() {
                    region.alloc(new_bytes, None)
                } else {
                    region.realloc((*header).ptr, new_bytes)
                };
            }
        }
    }

    /// Bounds-checked element pointer. Fatal on out-of-range index.
    pub fn access(self, index: i32) -> *mut u8 {
        if index < 0 {
            panic!("eyot-vector: index out of range (-ve)");
        }
        if index >= self.length() {
            panic!("eyot-vector: index out of range (+ve)");
        }
        unsafe {
            let header = &*self.header();
            header.ptr.add(index as usize * header.unit_size as usize)
        }
    }

    /// Append one element, copied from `new_element`. A `None` element
    /// grows the vector by one slot without writing into it (matching a
    /// null `new_element` in the original API).
    pub fn append(self, region: &GcRegion, new_element: Option<&[u8]>) {
        let new_size = self.length() + 1;
        self.resize(region, new_size);
        if let Some(bytes) = new_element {
            let dst = self.access(new_size - 1);
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            }
        }
    }

    /// Append every element of `other`. Fatal if element sizes differ.
    pub fn append_vector(self, region: &GcRegion, other: Vector) {
        if self.unit_size() != other.unit_size() {
            panic!("eyot-vector: cannot append a vector of different pitch size");
        }
        let old_size = self.length();
        let incoming_size = other.length();
        if incoming_size == 0 {
            return;
        }
        let new_size = old_size + incoming_size;
        self.resize(region, new_size);
        unsafe {
            std::ptr::copy_nonoverlapping(
                other.access(0),
                self.access(old_size),
                self.unit_size() as usize * incoming_size as usize,
            );
        }
    }

    /// Remove `count` elements starting at `start`, shifting the tail
    /// down. Fatal if the range exceeds the vector's length. A `count`
    /// of zero is a no-op.
    pub fn erase(self, region: &GcRegion, start: i32, count: i32) {
        if count == 0 {
            return;
        }
        if start + count > self.length() {
            panic!("eyot-vector: deleting out of range of vector");
        }
        let unit_size = self.unit_size() as usize;
        let mut i = start;
        while i < self.length() - count {
            unsafe {
                std::ptr::copy_nonoverlapping(self.access(i + count), self.access(i), unit_size);
            }
            i += 1;
        }
        self.resize(region, self.length() - count);
    }
}

/// Python-style `range(start, end, step)`, materialized eagerly as a
/// vector of `i32` elements.
pub fn range(region: &GcRegion, start: i32, end: i32, step: i32) -> Vector {
    let r = Vector::create(region, std::mem::size_of::<i32>() as i32);

    if step == 0 {
        return r;
    }

    let mut val = start;
    if step < 0 {
        if end > start {
            return r;
        }
        while val > end {
            r.append(region, Some(&val.to_ne_bytes()));
            val += step;
        }
    } else {
        if end < start {
            return r;
        }
        while val < end {
            r.append(region, Some(&val.to_ne_bytes()));
            val += step;
        }
    }

    r
}
