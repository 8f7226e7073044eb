//! In-memory driver for integration tests
//!
//! `FakeDevice` / `FakeQueue` implement the native seam without a GPU. Handles
//! are counters, completion is a number the test moves forward, and every
//! failure path can be switched on.

#![allow(dead_code)]

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use vk_rhi_core::backend::chain::{FeatureBlock, FeatureChain, PropertyBlock, PropertyChain};
use vk_rhi_core::backend::ext;
use vk_rhi_core::backend::{
    DebugNaming, Device, DeviceDesc, MessageCallback, MessageSeverity, NativeDevice, NativeQueue, QueueKind,
    SparseImageInfo,
};

// ============================================================================
// Message capture
// ============================================================================

#[derive(Default)]
pub struct RecordingCallback {
    messages: Mutex<Vec<(MessageSeverity, String)>>,
}

impl RecordingCallback {
    pub fn messages(&self) -> Vec<(MessageSeverity, String)> {
        self.messages.lock().clone()
    }

    pub fn count(&self, severity: MessageSeverity) -> usize {
        self.messages.lock().iter().filter(|(s, _)| *s == severity).count()
    }
}

impl MessageCallback for RecordingCallback {
    fn message(&self, severity: MessageSeverity, text: &str) {
        self.messages.lock().push((severity, text.to_string()));
    }
}

// ============================================================================
// Fake device
// ============================================================================

/// Everything the fake device did, for assertions.
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub property_queries: u32,
    pub property_blocks: usize,
    pub feature_queries: u32,
    pub feature_blocks: usize,
    /// (size, memory type, device address)
    pub allocations: Vec<(vk::DeviceSize, u32, bool)>,
    pub freed: Vec<vk::DeviceMemory>,
    pub names: Vec<(vk::DeviceMemory, String, DebugNaming)>,
    pub buffer_binds: Vec<(vk::Buffer, vk::DeviceMemory, vk::DeviceSize)>,
    pub image_binds: Vec<(vk::Image, vk::DeviceMemory, vk::DeviceSize)>,
    pub pipeline_caches_created: u32,
    pub pipeline_caches_destroyed: u32,
    pub layouts_created: u32,
    pub layouts_destroyed: u32,
    /// Query counts of every pool created
    pub query_pools_created: Vec<u32>,
    pub query_pools_destroyed: u32,
}

#[derive(Default)]
pub struct FakeDevice {
    pub memory_types: Vec<vk::MemoryPropertyFlags>,
    pub subgroup_size: u32,
    pub shading_rate_texel_size: vk::Extent2D,
    pub attachment_shading_rate: bool,
    pub cooperative_vector: bool,
    pub cooperative_vector_training: bool,
    pub coop_vec_properties: Vec<ext::CooperativeVectorPropertiesNV>,
    pub format_properties: HashMap<vk::Format, vk::FormatProperties>,
    pub sparse_requirements: Vec<vk::SparseImageMemoryRequirements>,
    pub sparse_format_properties: Vec<vk::SparseImageFormatProperties>,
    pub image_requirements: vk::MemoryRequirements,

    pub fail_pipeline_cache: bool,
    pub fail_descriptor_set_layout: bool,
    pub fail_allocation: AtomicBool,
    pub device_lost: AtomicBool,

    pub log: Mutex<DeviceLog>,
    pub next_handle: AtomicU64,
}

impl FakeDevice {
    /// A desktop-like GPU: device-local, upload and readback memory types,
    /// 32-wide subgroups and 16x8 shading-rate tiles.
    pub fn standard() -> Self {
        Self {
            memory_types: vec![
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT
                    | vk::MemoryPropertyFlags::HOST_CACHED,
            ],
            subgroup_size: 32,
            shading_rate_texel_size: vk::Extent2D { width: 16, height: 8 },
            attachment_shading_rate: true,
            ..Default::default()
        }
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl NativeDevice for FakeDevice {
    fn physical_device_properties2(&self, chain: &mut PropertyChain) -> vk::PhysicalDeviceProperties {
        {
            let mut log = self.log.lock();
            log.property_queries += 1;
            log.property_blocks = chain.len();
        }

        for block in chain.blocks_mut() {
            match block {
                PropertyBlock::Subgroup(p) => p.subgroup_size = self.subgroup_size,
                PropertyBlock::FragmentShadingRate(p) => {
                    p.min_fragment_shading_rate_attachment_texel_size = self.shading_rate_texel_size;
                    p.max_fragment_shading_rate_attachment_texel_size = self.shading_rate_texel_size;
                }
                PropertyBlock::CooperativeVector(p) => {
                    p.cooperative_vector_training_float16_accumulation = vk::Bool32::from(self.cooperative_vector_training);
                    p.cooperative_vector_training_float32_accumulation = vk::FALSE;
                }
                _ => {}
            }
        }

        vk::PhysicalDeviceProperties {
            api_version: vk::API_VERSION_1_3,
            ..Default::default()
        }
    }

    fn physical_device_features2(&self, chain: &mut FeatureChain) {
        {
            let mut log = self.log.lock();
            log.feature_queries += 1;
            log.feature_blocks = chain.len();
        }

        for block in chain.blocks_mut() {
            match block {
                FeatureBlock::FragmentShadingRate(f) => {
                    f.attachment_fragment_shading_rate = vk::Bool32::from(self.attachment_shading_rate);
                }
                FeatureBlock::CooperativeVector(f) => {
                    f.cooperative_vector = vk::Bool32::from(self.cooperative_vector);
                    f.cooperative_vector_training = vk::Bool32::from(self.cooperative_vector_training);
                }
            }
        }
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: self.memory_types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in self.memory_types.iter().enumerate() {
            props.memory_types[i].property_flags = *flags;
        }
        props
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        self.format_properties.get(&format).copied().unwrap_or_default()
    }

    fn sparse_image_format_properties(&self, _info: &SparseImageInfo) -> Vec<vk::SparseImageFormatProperties> {
        self.sparse_format_properties.clone()
    }

    fn image_sparse_memory_requirements(&self, _image: vk::Image) -> Vec<vk::SparseImageMemoryRequirements> {
        self.sparse_requirements.clone()
    }

    fn image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        self.image_requirements
    }

    fn cooperative_vector_properties(&self) -> VkResult<Vec<ext::CooperativeVectorPropertiesNV>> {
        Ok(self.coop_vec_properties.clone())
    }

    fn create_pipeline_cache(&self) -> VkResult<vk::PipelineCache> {
        if self.fail_pipeline_cache {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        self.log.lock().pipeline_caches_created += 1;
        Ok(vk::PipelineCache::from_raw(self.next_raw()))
    }

    fn destroy_pipeline_cache(&self, _cache: vk::PipelineCache) {
        self.log.lock().pipeline_caches_destroyed += 1;
    }

    fn create_empty_descriptor_set_layout(&self) -> VkResult<vk::DescriptorSetLayout> {
        if self.fail_descriptor_set_layout {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.log.lock().layouts_created += 1;
        Ok(vk::DescriptorSetLayout::from_raw(self.next_raw()))
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.log.lock().layouts_destroyed += 1;
    }

    fn create_timestamp_query_pool(&self, query_count: u32) -> VkResult<vk::QueryPool> {
        self.log.lock().query_pools_created.push(query_count);
        Ok(vk::QueryPool::from_raw(self.next_raw()))
    }

    fn destroy_query_pool(&self, _pool: vk::QueryPool) {
        self.log.lock().query_pools_destroyed += 1;
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32, device_address: bool) -> VkResult<vk::DeviceMemory> {
        if self.fail_allocation.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.log
            .lock()
            .allocations
            .push((size, memory_type_index, device_address));
        Ok(vk::DeviceMemory::from_raw(self.next_raw()))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.log.lock().freed.push(memory);
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        self.log.lock().buffer_binds.push((buffer, memory, offset));
        Ok(())
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        self.log.lock().image_binds.push((image, memory, offset));
        Ok(())
    }

    fn name_memory(&self, memory: vk::DeviceMemory, name: &CStr, naming: DebugNaming) {
        self.log
            .lock()
            .names
            .push((memory, name.to_string_lossy().into_owned(), naming));
    }

    fn wait_idle(&self) -> VkResult<()> {
        if self.device_lost.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        Ok(())
    }
}

// ============================================================================
// Fake queue
// ============================================================================

#[derive(Debug, Default)]
pub struct QueueLog {
    pub allocated: Vec<vk::CommandBuffer>,
    pub begun: Vec<vk::CommandBuffer>,
    pub ended: Vec<vk::CommandBuffer>,
    pub submits: Vec<(Vec<vk::CommandBuffer>, u64)>,
}

pub struct FakeQueue {
    family_index: u32,
    raw: vk::Queue,
    /// Highest submission ID the "GPU" has finished
    pub completed: AtomicU64,
    pub fail_submit: AtomicBool,
    pub fail_poll: AtomicBool,
    pub log: Mutex<QueueLog>,
    next_command_buffer: AtomicU64,
}

impl FakeQueue {
    pub fn new(family_index: u32) -> Arc<Self> {
        Arc::new(Self {
            family_index,
            raw: vk::Queue::from_raw(0x1000 + family_index as u64),
            completed: AtomicU64::new(0),
            fail_submit: AtomicBool::new(false),
            fail_poll: AtomicBool::new(false),
            log: Mutex::new(QueueLog::default()),
            next_command_buffer: AtomicU64::new(0),
        })
    }

    pub fn complete_up_to(&self, submission_id: u64) {
        self.completed.store(submission_id, Ordering::Relaxed);
    }

    pub fn submitted_ids(&self) -> Vec<u64> {
        self.log.lock().submits.iter().map(|(_, id)| *id).collect()
    }
}

impl NativeQueue for FakeQueue {
    fn raw(&self) -> vk::Queue {
        self.raw
    }

    fn family_index(&self) -> u32 {
        self.family_index
    }

    fn allocate_command_buffer(&self) -> VkResult<vk::CommandBuffer> {
        let serial = self.next_command_buffer.fetch_add(1, Ordering::Relaxed) + 1;
        let raw = ((self.family_index as u64 + 1) << 32) | serial;
        let command_buffer = vk::CommandBuffer::from_raw(raw);
        self.log.lock().allocated.push(command_buffer);
        Ok(command_buffer)
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.log.lock().begun.push(command_buffer);
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.log.lock().ended.push(command_buffer);
        Ok(())
    }

    fn submit(&self, command_buffers: &[vk::CommandBuffer], submission_id: u64) -> VkResult<()> {
        if self.fail_submit.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        self.log
            .lock()
            .submits
            .push((command_buffers.to_vec(), submission_id));
        Ok(())
    }

    fn completed_submission_id(&self) -> VkResult<u64> {
        if self.fail_poll.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        Ok(self.completed.load(Ordering::Relaxed))
    }
}

// ============================================================================
// Test device
// ============================================================================

/// A core device on top of the fakes, with all three queues present.
pub struct TestDevice {
    pub device: Arc<Device>,
    pub native: Arc<FakeDevice>,
    pub queues: [Arc<FakeQueue>; QueueKind::COUNT],
    pub messages: Arc<RecordingCallback>,
}

impl TestDevice {
    pub fn new(native: FakeDevice, device_extensions: &[&str]) -> Self {
        Self::with(native, |desc| {
            desc.device_extensions = device_extensions.iter().map(|s| s.to_string()).collect();
        })
    }

    pub fn with(native: FakeDevice, configure: impl FnOnce(&mut DeviceDesc)) -> Self {
        let native = Arc::new(native);
        let messages = Arc::new(RecordingCallback::default());
        let queues = [FakeQueue::new(0), FakeQueue::new(1), FakeQueue::new(2)];

        let mut desc = desc_for(native.clone(), messages.clone());
        desc.graphics_queue = Some(queues[0].clone());
        desc.compute_queue = Some(queues[1].clone());
        desc.transfer_queue = Some(queues[2].clone());
        configure(&mut desc);

        let device = match Device::new(desc) {
            Ok(device) => device,
            Err(e) => panic!("device construction failed: {}", e),
        };

        Self {
            device,
            native,
            queues,
            messages,
        }
    }

    pub fn queue(&self, kind: QueueKind) -> &Arc<FakeQueue> {
        &self.queues[kind.index()]
    }
}

/// A queue-less desc with no extensions that reports through `messages`.
pub fn desc_for(native: Arc<FakeDevice>, messages: Arc<RecordingCallback>) -> DeviceDesc {
    let mut desc = DeviceDesc::new(native);
    desc.message_callback = messages;
    desc
}
