// ash-backed driver
//
// AshDevice / AshQueue forward the native seam to a real Vulkan device.
// Instance, physical device and logical device stay owned by whoever created
// them and must outlive these wrappers.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::ffi::CStr;

use super::capabilities::Capabilities;
use super::chain::{FeatureChain, PropertyChain};
use super::ext;
use super::native::{DebugNaming, NativeDevice, NativeQueue, SparseImageInfo};
use super::sync::TrackingSemaphore;

const COOP_VEC_PROPERTIES_FN: &CStr = c"vkGetPhysicalDeviceCooperativeVectorPropertiesNV";

pub struct AshDevice {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    debug_marker: Option<ash::ext::debug_marker::Device>,
    get_coop_vec_properties: Option<ext::PfnGetPhysicalDeviceCooperativeVectorPropertiesNV>,
}

impl AshDevice {
    /// Wraps existing handles. Extension loaders are created for the debug
    /// naming and cooperative-vector capabilities present in `enabled`.
    pub fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        enabled: Capabilities,
    ) -> Self {
        let debug_utils = enabled
            .contains(Capabilities::DEBUG_UTILS)
            .then(|| ash::ext::debug_utils::Device::new(instance, device));
        let debug_marker = enabled
            .contains(Capabilities::DEBUG_MARKER)
            .then(|| ash::ext::debug_marker::Device::new(instance, device));

        let get_coop_vec_properties = if enabled.contains(Capabilities::COOPERATIVE_VECTOR) {
            let raw = unsafe { entry.get_instance_proc_addr(instance.handle(), COOP_VEC_PROPERTIES_FN.as_ptr()) };
            // SAFETY: the loader returned this entry point for exactly this signature.
            raw.map(|f| unsafe {
                std::mem::transmute::<unsafe extern "system" fn(), ext::PfnGetPhysicalDeviceCooperativeVectorPropertiesNV>(f)
            })
        } else {
            None
        };

        Self {
            instance: instance.clone(),
            physical_device,
            device: device.clone(),
            debug_utils,
            debug_marker,
            get_coop_vec_properties,
        }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

impl NativeDevice for AshDevice {
    fn physical_device_properties2(&self, chain: &mut PropertyChain) -> vk::PhysicalDeviceProperties {
        let mut properties2 = vk::PhysicalDeviceProperties2::default();
        properties2.p_next = chain.link();
        unsafe {
            self.instance
                .get_physical_device_properties2(self.physical_device, &mut properties2);
        }
        chain.unlink();
        properties2.properties
    }

    fn physical_device_features2(&self, chain: &mut FeatureChain) {
        let mut features2 = vk::PhysicalDeviceFeatures2::default();
        features2.p_next = chain.link();
        unsafe {
            self.instance
                .get_physical_device_features2(self.physical_device, &mut features2);
        }
        chain.unlink();
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        }
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    fn sparse_image_format_properties(&self, info: &SparseImageInfo) -> Vec<vk::SparseImageFormatProperties> {
        unsafe {
            self.instance.get_physical_device_sparse_image_format_properties(
                self.physical_device,
                info.format,
                info.image_type,
                info.samples,
                info.usage,
                info.tiling,
            )
        }
    }

    fn image_sparse_memory_requirements(&self, image: vk::Image) -> Vec<vk::SparseImageMemoryRequirements> {
        unsafe { self.device.get_image_sparse_memory_requirements(image) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn cooperative_vector_properties(&self) -> VkResult<Vec<ext::CooperativeVectorPropertiesNV>> {
        let Some(get_properties) = self.get_coop_vec_properties else {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        };

        let mut count = 0u32;
        unsafe { get_properties(self.physical_device, &mut count, std::ptr::null_mut()) }.result()?;

        let mut properties = vec![ext::CooperativeVectorPropertiesNV::default(); count as usize];
        unsafe { get_properties(self.physical_device, &mut count, properties.as_mut_ptr()) }.result()?;
        properties.truncate(count as usize);
        Ok(properties)
    }

    fn create_pipeline_cache(&self) -> VkResult<vk::PipelineCache> {
        let create_info = vk::PipelineCacheCreateInfo::default();
        unsafe { self.device.create_pipeline_cache(&create_info, None) }
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        unsafe { self.device.destroy_pipeline_cache(cache, None) }
    }

    fn create_empty_descriptor_set_layout(&self) -> VkResult<vk::DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default();
        unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_timestamp_query_pool(&self, query_count: u32) -> VkResult<vk::QueryPool> {
        let create_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(query_count);
        unsafe { self.device.create_query_pool(&create_info, None) }
    }

    fn destroy_query_pool(&self, pool: vk::QueryPool) {
        unsafe { self.device.destroy_query_pool(pool, None) }
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32, device_address: bool) -> VkResult<vk::DeviceMemory> {
        let mut flags_info = vk::MemoryAllocateFlagsInfo::default().flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
        let mut allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        if device_address {
            allocate_info = allocate_info.push_next(&mut flags_info);
        }
        unsafe { self.device.allocate_memory(&allocate_info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, offset) }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    fn name_memory(&self, memory: vk::DeviceMemory, name: &CStr, naming: DebugNaming) {
        let result = match (naming, &self.debug_utils, &self.debug_marker) {
            (DebugNaming::Utils, Some(utils), _) => {
                let name_info = vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_handle(memory)
                    .object_name(name);
                unsafe { utils.set_debug_utils_object_name(&name_info) }
            }
            (DebugNaming::Marker, _, Some(marker)) => {
                let name_info = vk::DebugMarkerObjectNameInfoEXT::default()
                    .object_type(vk::DebugReportObjectTypeEXT::DEVICE_MEMORY)
                    .object(memory.as_raw())
                    .object_name(name);
                unsafe { marker.debug_marker_set_object_name(&name_info) }
            }
            _ => return,
        };

        if let Err(e) = result {
            log::debug!("Failed to name memory {:?}: {}", name, e);
        }
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

/// One hardware queue with its own command pool and timeline semaphore.
pub struct AshQueue {
    device: ash::Device,
    queue: vk::Queue,
    family_index: u32,
    command_pool: vk::CommandPool,
    tracking: TrackingSemaphore,
}

impl AshQueue {
    pub fn new(device: &ash::Device, family_index: u32, queue_index: u32) -> VkResult<Self> {
        let queue = unsafe { device.get_device_queue(family_index, queue_index) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family_index);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }?;

        let tracking = match TrackingSemaphore::new(device) {
            Ok(tracking) => tracking,
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device: device.clone(),
            queue,
            family_index,
            command_pool,
            tracking,
        })
    }
}

impl NativeQueue for AshQueue {
    fn raw(&self) -> vk::Queue {
        self.queue
    }

    fn family_index(&self) -> u32 {
        self.family_index
    }

    fn allocate_command_buffer(&self) -> VkResult<vk::CommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }?;
        buffers
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(command_buffer) }
    }

    fn submit(&self, command_buffers: &[vk::CommandBuffer], submission_id: u64) -> VkResult<()> {
        let signal_semaphores = [self.tracking.raw()];
        let signal_values = [submission_id];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .queue_submit(self.queue, std::slice::from_ref(&submit_info), vk::Fence::null())
        }
    }

    fn completed_submission_id(&self) -> VkResult<u64> {
        self.tracking.completed_value()
    }
}

impl Drop for AshQueue {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.queue_wait_idle(self.queue);
            // Frees every command buffer allocated from the pool
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
