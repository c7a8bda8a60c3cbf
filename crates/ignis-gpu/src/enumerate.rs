//! Two-call enumeration shared by every driver query.
//!
//! Vulkan reports variable-length data (extensions, layers, adapters, queue
//! families, surface formats, present modes, swapchain images) by first
//! writing a count and then filling a caller-provided array. [`enumerate`]
//! performs that dance once for all of them.

use ash::vk;

use crate::error::{GpuError, Result};

/// Run a Vulkan count-then-fetch query pair and collect the results.
///
/// `query` is called with a null pointer to learn the element count, then
/// again with a buffer of that capacity. `VK_INCOMPLETE` on the second call
/// restarts the pair, since the count may change in between.
///
/// # Safety
/// `query` must behave like a Vulkan enumeration entry point: when the
/// pointer is non-null it writes at most `*count` elements to it and stores
/// the number written back into `*count`.
pub unsafe fn enumerate<T>(
    call: &'static str,
    mut query: impl FnMut(&mut u32, *mut T) -> vk::Result,
) -> Result<Vec<T>> {
    loop {
        let mut count = 0u32;
        query(&mut count, std::ptr::null_mut())
            .result()
            .map_err(GpuError::vulkan(call))?;

        let mut data = Vec::with_capacity(count as usize);
        let result = query(&mut count, data.as_mut_ptr());
        if result == vk::Result::INCOMPLETE {
            tracing::trace!("{call} returned VK_INCOMPLETE, retrying");
            continue;
        }
        result.result().map_err(GpuError::vulkan(call))?;

        debug_assert!(count as usize <= data.capacity());
        // SAFETY: the query initialised the first `count` elements
        unsafe { data.set_len(count as usize) };
        return Ok(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Behaves like a driver entry point over `source`.
    fn fake_query(source: &RefCell<Vec<u32>>, count: &mut u32, out: *mut u32) -> vk::Result {
        let source = source.borrow();
        if out.is_null() {
            *count = source.len() as u32;
            return vk::Result::SUCCESS;
        }
        let written = (*count as usize).min(source.len());
        for (i, value) in source.iter().take(written).enumerate() {
            unsafe { out.add(i).write(*value) };
        }
        *count = written as u32;
        if written < source.len() {
            vk::Result::INCOMPLETE
        } else {
            vk::Result::SUCCESS
        }
    }

    #[test]
    fn collects_every_element() {
        let source = RefCell::new(vec![3, 1, 4, 1, 5]);
        let values = unsafe {
            enumerate("vkFake", |count, out| fake_query(&source, count, out))
        }
        .unwrap();
        assert_eq!(values, vec![3, 1, 4, 1, 5]);
    }

    #[test]
    fn empty_query_yields_empty_vec() {
        let source = RefCell::new(Vec::new());
        let values = unsafe {
            enumerate("vkFake", |count, out| fake_query(&source, count, out))
        }
        .unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn retries_when_the_count_grows_between_calls() {
        let source = RefCell::new(vec![1, 2]);
        let mut calls = 0;
        let values = unsafe {
            enumerate("vkFake", |count, out| {
                calls += 1;
                // An element appears after the count query.
                if calls == 2 {
                    source.borrow_mut().push(3);
                }
                fake_query(&source, count, out)
            })
        }
        .unwrap();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(calls, 4);
    }

    #[test]
    fn failures_carry_the_call_name() {
        let err = unsafe {
            enumerate::<u32>("vkEnumerateSomething", |_, _| {
                vk::Result::ERROR_OUT_OF_HOST_MEMORY
            })
        }
        .unwrap_err();
        match err {
            GpuError::Vulkan { call, result } => {
                assert_eq!(call, "vkEnumerateSomething");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_HOST_MEMORY);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
