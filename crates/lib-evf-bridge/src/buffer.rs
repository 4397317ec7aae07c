//! Frame buffers handed to the caller.
//!
//! Each buffer is one allocation: a length header followed by the frame
//! bytes. The caller only ever sees the pointer to the bytes, and
//! [`free_frame_buffer`] recovers the allocation from that pointer alone.

use lib_edsdk_ffi::{EdsdkError, EdsdkResult};
use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};

/// Header holding the payload length; keeps the payload 16-byte aligned.
const HEADER: usize = 16;
const ALIGN: usize = 16;

fn layout_for(len: usize) -> Option<Layout> {
    let total = len.checked_add(HEADER)?;
    Layout::from_size_align(total, ALIGN).ok()
}

/// Copy `bytes` into a fresh caller-owned buffer.
///
/// Returns the payload pointer; release it with [`free_frame_buffer`].
pub fn alloc_frame_buffer(bytes: &[u8]) -> EdsdkResult<NonNull<u8>> {
    let failed = || EdsdkError::AllocationFailed {
        len: bytes.len() as u64,
    };
    let layout = layout_for(bytes.len()).ok_or_else(failed)?;

    // SAFETY: layout has non-zero size (HEADER > 0).
    let base = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or_else(failed)?;
    unsafe {
        base.as_ptr().cast::<usize>().write(bytes.len());
        let payload = base.as_ptr().add(HEADER);
        ptr::copy_nonoverlapping(bytes.as_ptr(), payload, bytes.len());
        Ok(NonNull::new_unchecked(payload))
    }
}

/// Release a buffer from [`alloc_frame_buffer`]. Null is a no-op.
///
/// # Safety
///
/// `payload` must be null or a pointer returned by [`alloc_frame_buffer`]
/// that has not been freed yet.
pub unsafe fn free_frame_buffer(payload: *mut u8) {
    if payload.is_null() {
        return;
    }
    unsafe {
        let base = payload.sub(HEADER);
        let len = base.cast::<usize>().read();
        if let Some(layout) = layout_for(len) {
            alloc::dealloc(base, layout);
        }
    }
}

/// Payload length recorded in a buffer's header.
///
/// # Safety
///
/// Same contract as [`free_frame_buffer`], and `payload` must be non-null.
pub unsafe fn frame_buffer_len(payload: *const u8) -> usize {
    unsafe { payload.sub(HEADER).cast::<usize>().read() }
}

const _: () = assert!(HEADER >= mem::size_of::<usize>() && HEADER % ALIGN == 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_and_free() {
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let buf = alloc_frame_buffer(&bytes).unwrap();
        let copied = unsafe { std::slice::from_raw_parts(buf.as_ptr(), bytes.len()) };
        assert_eq!(copied, bytes.as_slice());
        assert_eq!(unsafe { frame_buffer_len(buf.as_ptr()) }, 1000);
        assert_eq!(buf.as_ptr() as usize % ALIGN, 0);
        unsafe { free_frame_buffer(buf.as_ptr()) };
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { free_frame_buffer(ptr::null_mut()) };
    }
}
