// Synchronization primitives
//
// Timeline semaphore that tracks GPU progress on one queue. Every submit
// signals it with the batch's submission ID; polling reads the counter.

use ash::prelude::VkResult;
use ash::vk;

/// Timeline semaphore counting completed submissions on one queue.
pub struct TrackingSemaphore {
    device: ash::Device,
    semaphore: vk::Semaphore,
}

impl TrackingSemaphore {
    pub fn new(device: &ash::Device) -> VkResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.create_semaphore(&create_info, None) }?;
        Ok(Self {
            device: device.clone(),
            semaphore,
        })
    }

    pub fn raw(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Highest value the GPU has signalled. Never blocks.
    pub fn completed_value(&self) -> VkResult<u64> {
        unsafe { self.device.get_semaphore_counter_value(self.semaphore) }
    }
}

impl Drop for TrackingSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
