//! Vulkan synchronization primitives
//!
//! RAII wrappers for semaphores and fences, the per-frame set a swap chain
//! cycles through, and the table that remembers which frame last rendered to
//! each swap chain image.

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};

/// GPU-GPU synchronization primitive with automatic cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> RenderResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> RenderResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait up to `timeout` nanoseconds for the fence to signal
    pub fn wait(&self, timeout: u64) -> RenderResult<()> {
        wait_for_fence(&self.device, self.fence, timeout, "in-flight fence")
    }

    /// Reset fence to unsignaled
    pub fn reset(&self) -> RenderResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(RenderError::from)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Wait on a raw fence handle, reporting expiry as [`RenderError::Timeout`]
pub fn wait_for_fence(
    device: &Device,
    fence: vk::Fence,
    timeout: u64,
    operation: &'static str,
) -> RenderResult<()> {
    match unsafe { device.wait_for_fences(&[fence], true, timeout) } {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => {
            log::error!("Timed out after {} ns waiting for {}", timeout, operation);
            Err(RenderError::Timeout { operation })
        }
        Err(e) => Err(e.into()),
    }
}

/// Synchronization objects for one frame in flight
pub struct FrameSync {
    /// Signalled when the acquired image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signalled when rendering finished and the image may be presented
    pub render_finished: Semaphore,
    /// Signalled when the frame's command buffers completed
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects; the fence starts signalled
    pub fn new(device: Device) -> RenderResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Which frame fence last used each swap chain image
///
/// Image acquisition order is up to the presentation engine, so an image can
/// come back while the frame that rendered to it is still in flight under a
/// different frame slot. Waiting on the recorded fence before reuse closes
/// that gap.
#[derive(Debug, Clone)]
pub struct ImageFenceTable {
    fences: Vec<vk::Fence>,
}

impl ImageFenceTable {
    /// One empty slot per swap chain image
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Record `fence` as the owner of `image_index`
    ///
    /// Returns the fence that previously owned the image, if any; the caller
    /// must wait on it before submitting.
    pub fn claim(&mut self, image_index: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let previous = std::mem::replace(&mut self.fences[image_index], fence);
        (previous != vk::Fence::null()).then_some(previous)
    }

    /// Number of tracked images
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether no images are tracked
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    /// First use of an image has nothing to wait for
    #[test]
    fn test_first_claim_is_free() {
        let mut table = ImageFenceTable::new(3);
        assert_eq!(table.len(), 3);
        assert_eq!(table.claim(1, vk::Fence::from_raw(7)), None);
    }

    /// Reusing an image reports the fence of the frame that last used it
    #[test]
    fn test_reuse_returns_previous_owner() {
        let frame_a = vk::Fence::from_raw(1);
        let frame_b = vk::Fence::from_raw(2);
        let mut table = ImageFenceTable::new(3);

        assert_eq!(table.claim(0, frame_a), None);
        assert_eq!(table.claim(1, frame_b), None);
        assert_eq!(table.claim(0, frame_b), Some(frame_a));
        assert_eq!(table.claim(0, frame_a), Some(frame_b));
        assert_eq!(table.claim(2, frame_a), None);
    }

    /// Tables for different swap chains are independent
    #[test]
    fn test_new_table_starts_empty() {
        let mut old = ImageFenceTable::new(2);
        old.claim(0, vk::Fence::from_raw(5));
        let mut fresh = ImageFenceTable::new(4);
        assert!(!fresh.is_empty());
        assert_eq!(fresh.claim(0, vk::Fence::from_raw(6)), None);
    }
}
