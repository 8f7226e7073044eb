// Native driver seam
//
// Everything the core asks of the Vulkan driver goes through these two traits.
// AshDevice / AshQueue implement them on top of ash; tests implement them with
// an in-memory fake.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CStr;

use super::chain::{FeatureChain, PropertyChain};
use super::ext;

/// How a debug name is attached to a native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugNaming {
    /// `VK_EXT_debug_utils`
    Utils,
    /// `VK_EXT_debug_marker`
    Marker,
}

/// Image creation parameters needed to query sparse format properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparseImageInfo {
    pub format: vk::Format,
    pub image_type: vk::ImageType,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    pub tiling: vk::ImageTiling,
}

/// Physical and logical device calls.
pub trait NativeDevice: Send + Sync {
    /// Runs one `vkGetPhysicalDeviceProperties2` over `chain`.
    fn physical_device_properties2(&self, chain: &mut PropertyChain) -> vk::PhysicalDeviceProperties;

    /// Runs one `vkGetPhysicalDeviceFeatures2` over `chain`.
    fn physical_device_features2(&self, chain: &mut FeatureChain);

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties;

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    fn sparse_image_format_properties(&self, info: &SparseImageInfo) -> Vec<vk::SparseImageFormatProperties>;

    fn image_sparse_memory_requirements(&self, image: vk::Image) -> Vec<vk::SparseImageMemoryRequirements>;

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    fn cooperative_vector_properties(&self) -> VkResult<Vec<ext::CooperativeVectorPropertiesNV>>;

    fn create_pipeline_cache(&self) -> VkResult<vk::PipelineCache>;

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache);

    /// Creates a descriptor set layout with zero bindings.
    fn create_empty_descriptor_set_layout(&self) -> VkResult<vk::DescriptorSetLayout>;

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_timestamp_query_pool(&self, query_count: u32) -> VkResult<vk::QueryPool>;

    fn destroy_query_pool(&self, pool: vk::QueryPool);

    /// Allocates `size` bytes from `memory_type_index`, with
    /// `VK_MEMORY_ALLOCATE_DEVICE_ADDRESS_BIT` when `device_address` is set.
    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32, device_address: bool) -> VkResult<vk::DeviceMemory>;

    fn free_memory(&self, memory: vk::DeviceMemory);

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()>;

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()>;

    fn name_memory(&self, memory: vk::DeviceMemory, name: &CStr, naming: DebugNaming);

    /// `vkDeviceWaitIdle`
    fn wait_idle(&self) -> VkResult<()>;
}

/// One hardware queue plus the command buffer pool and completion counter
/// that go with it.
///
/// Implementations need no internal locking: the core serializes every call
/// on a given queue.
pub trait NativeQueue: Send + Sync {
    fn raw(&self) -> vk::Queue;

    fn family_index(&self) -> u32;

    fn allocate_command_buffer(&self) -> VkResult<vk::CommandBuffer>;

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    /// Submits `command_buffers` and signals completion value `submission_id`.
    fn submit(&self, command_buffers: &[vk::CommandBuffer], submission_id: u64) -> VkResult<()>;

    /// Highest submission ID the GPU has finished. Never blocks.
    fn completed_submission_id(&self) -> VkResult<u64>;
}
