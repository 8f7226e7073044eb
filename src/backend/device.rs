// Device - the hardware abstraction core
//
// Responsibilities:
// - Capability negotiation (once, at construction)
// - Required native objects: pipeline cache, empty descriptor set layout
// - Heap creation and binding
// - Command submission and retirement on up to three queues
// - Feature, format, tiling and cooperative-vector queries
// - Timer query pool (created on first use)

use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::DeviceConfig;
use crate::errors::{Result, RhiError};

use super::capabilities::Capabilities;
use super::coopvec::{CoopVecDeviceFeatures, MatMulFormatCombo};
use super::heap::{Heap, HeapAllocator, HeapDesc};
use super::message::{LogMessageCallback, MessageCallback};
use super::native::{NativeDevice, NativeQueue};
use super::negotiate::{negotiate, DeviceContext, DeviceFeatures, DeviceProperties, NegotiationInput};
use super::query::{self, Feature, Format, FormatSupport};
use super::queue::{CommandList, Queue, QueueKind, QueueTracker};
use super::tiling::{self, SparseTexture, TextureTiling, TilingInputs};
use super::timer::{BitSetAllocator, TimerQuery};

/// Everything needed to build a [`Device`].
pub struct DeviceDesc {
    pub native: Arc<dyn NativeDevice>,
    pub instance_extensions: Vec<String>,
    pub device_extensions: Vec<String>,
    /// Device addresses enabled as a Vulkan 1.2 core feature.
    pub buffer_device_address_supported: bool,
    pub message_callback: Arc<dyn MessageCallback>,
    pub graphics_queue: Option<Arc<dyn NativeQueue>>,
    pub compute_queue: Option<Arc<dyn NativeQueue>>,
    pub transfer_queue: Option<Arc<dyn NativeQueue>>,
    pub max_timer_queries: u32,
}

impl DeviceDesc {
    pub fn new(native: Arc<dyn NativeDevice>) -> Self {
        Self {
            native,
            instance_extensions: Vec::new(),
            device_extensions: Vec::new(),
            buffer_device_address_supported: false,
            message_callback: Arc::new(LogMessageCallback),
            graphics_queue: None,
            compute_queue: None,
            transfer_queue: None,
            max_timer_queries: 256,
        }
    }

    /// Takes the override flag and timer query capacity from config.
    pub fn with_config(mut self, config: &DeviceConfig) -> Self {
        self.buffer_device_address_supported = config.buffer_device_address;
        self.max_timer_queries = config.max_timer_queries;
        self
    }
}

struct TimerQueries {
    pool: vk::QueryPool,
    slots: BitSetAllocator,
}

/// A device instance with its negotiated capabilities.
pub struct Device {
    context: Arc<DeviceContext>,
    heap_allocator: HeapAllocator,
    queues: QueueTracker,
    pipeline_cache: vk::PipelineCache,
    empty_descriptor_set_layout: vk::DescriptorSetLayout,
    timer_queries: Mutex<TimerQueries>,
}

impl Device {
    /// Negotiates capabilities and creates the required native objects.
    ///
    /// A failure to create the pipeline cache or the empty descriptor set
    /// layout is fatal: it is reported through the message callback and the
    /// device is not returned.
    pub fn new(desc: DeviceDesc) -> Result<Arc<Self>> {
        log::info!(
            "Creating device: {} instance extensions, {} device extensions",
            desc.instance_extensions.len(),
            desc.device_extensions.len()
        );

        let queues = QueueTracker::new([desc.graphics_queue, desc.compute_queue, desc.transfer_queue]);

        let context = Arc::new(negotiate(
            desc.native,
            &NegotiationInput {
                instance_extensions: &desc.instance_extensions,
                device_extensions: &desc.device_extensions,
                buffer_device_address: desc.buffer_device_address_supported,
            },
            desc.message_callback,
        ));

        let pipeline_cache = match context.native.create_pipeline_cache() {
            Ok(cache) => cache,
            Err(result) => {
                context.error("Failed to create the pipeline cache");
                return Err(RhiError::Construction {
                    object: "pipeline cache",
                    result,
                });
            }
        };

        let empty_descriptor_set_layout = match context.native.create_empty_descriptor_set_layout() {
            Ok(layout) => layout,
            Err(result) => {
                context.error("Failed to create an empty descriptor set layout");
                context.native.destroy_pipeline_cache(pipeline_cache);
                return Err(RhiError::Construction {
                    object: "empty descriptor set layout",
                    result,
                });
            }
        };

        let heap_allocator = HeapAllocator::new(context.clone());

        for kind in QueueKind::ALL {
            if let Some(queue) = queues.get(kind) {
                log::info!("{:?} queue on family {}", kind, queue.family_index());
            }
        }

        Ok(Arc::new(Self {
            context,
            heap_allocator,
            queues,
            pipeline_cache,
            empty_descriptor_set_layout,
            timer_queries: Mutex::new(TimerQueries {
                pool: vk::QueryPool::null(),
                slots: BitSetAllocator::new(desc.max_timer_queries as usize),
            }),
        }))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.context.capabilities
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.context.properties
    }

    pub fn features(&self) -> &DeviceFeatures {
        &self.context.features
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn empty_descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.empty_descriptor_set_layout
    }

    // =========================================================================
    // HEAPS
    // =========================================================================

    pub fn create_heap(&self, desc: &HeapDesc) -> Result<Heap> {
        self.heap_allocator.create_heap(desc)
    }

    pub fn destroy_heap(&self, heap: &mut Heap) {
        self.heap_allocator.destroy_heap(heap);
    }

    pub fn bind_buffer_memory(&self, buffer: vk::Buffer, heap: &Heap, offset: u64) -> Result<()> {
        check_heap_offset(heap, offset)?;
        self.context
            .native
            .bind_buffer_memory(buffer, heap.memory(), offset)
            .map_err(RhiError::vulkan("bind buffer memory"))
    }

    pub fn bind_image_memory(&self, image: vk::Image, heap: &Heap, offset: u64) -> Result<()> {
        check_heap_offset(heap, offset)?;
        self.context
            .native
            .bind_image_memory(image, heap.memory(), offset)
            .map_err(RhiError::vulkan("bind image memory"))
    }

    // =========================================================================
    // QUEUES & SUBMISSION
    // =========================================================================

    pub fn queue(&self, kind: QueueKind) -> Option<&Arc<Queue>> {
        self.queues.get(kind)
    }

    pub fn native_queue(&self, kind: QueueKind) -> Option<vk::Queue> {
        self.queues.get(kind).map(|queue| queue.raw())
    }

    pub fn queue_family_index(&self, kind: QueueKind) -> Option<u32> {
        self.queues.get(kind).map(|queue| queue.family_index())
    }

    /// A new command list for `kind`, or `None` if the device has no such queue.
    pub fn create_command_list(&self, kind: QueueKind) -> Option<CommandList> {
        self.queues.get(kind).map(|queue| CommandList::new(queue.clone()))
    }

    /// Submits the lists as one batch on `kind` and returns the batch's submission ID.
    pub fn execute_command_lists(&self, command_lists: &mut [&mut CommandList], kind: QueueKind) -> Result<u64> {
        self.queues.submit(command_lists, kind)
    }

    /// Retires every batch the GPU has finished, on every queue. Never blocks.
    pub fn run_garbage_collection(&self) -> Result<usize> {
        self.queues.retire()
    }

    /// Blocks until the whole device is idle.
    ///
    /// Returns `false` if the device was lost (or the wait failed otherwise);
    /// recovering a lost device is up to the caller.
    pub fn wait_for_idle(&self) -> bool {
        match self.context.native.wait_idle() {
            Ok(()) => true,
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                log::warn!("Device lost while waiting for idle");
                false
            }
            Err(result) => {
                log::warn!("Waiting for device idle failed: {}", result);
                false
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// See [`query::query_feature_support`] for the `info` contract.
    pub fn query_feature_support(&self, feature: Feature, info: Option<&mut [u8]>) -> Result<bool> {
        query::query_feature_support(&self.context, &self.queues, feature, info)
    }

    pub fn query_format_support(&self, format: Format) -> FormatSupport {
        let props = self.context.native.format_properties(format.to_vk());
        query::format_support_from_properties(format, &props)
    }

    /// Sparse tiling of `texture`, with at most `max_subresource_tilings` per-mip entries.
    pub fn get_texture_tiling(&self, texture: &SparseTexture, max_subresource_tilings: u32) -> TextureTiling {
        let native = &self.context.native;

        let sparse_requirements = native
            .image_sparse_memory_requirements(texture.image)
            .first()
            .copied();
        let granularity = native
            .sparse_image_format_properties(&texture.info)
            .first()
            .map(|props| props.image_granularity);
        let memory = native.image_memory_requirements(texture.image);

        let inputs = TilingInputs {
            width: texture.width,
            height: texture.height,
            depth: texture.depth,
            mip_levels: texture.mip_levels,
            sparse_requirements,
            granularity,
            memory_size: memory.size,
            tile_byte_size: memory.alignment,
        };
        tiling::compute_tiling(&inputs, max_subresource_tilings)
    }

    pub fn query_coop_vec_features(&self) -> CoopVecDeviceFeatures {
        let mut result = CoopVecDeviceFeatures::default();
        if !self.context.has(Capabilities::COOPERATIVE_VECTOR) {
            return result;
        }

        let properties = match self.context.native.cooperative_vector_properties() {
            Ok(properties) => properties,
            Err(result_code) => {
                log::debug!("Cooperative vector property query failed: {}", result_code);
                return result;
            }
        };

        result.mat_mul_formats = properties.iter().filter_map(MatMulFormatCombo::from_vk).collect();

        let coop = &self.context.properties.cooperative_vector;
        result.training_float16 = coop.cooperative_vector_training_float16_accumulation == vk::TRUE;
        result.training_float32 = coop.cooperative_vector_training_float32_accumulation == vk::TRUE;
        result
    }

    /// Sampler feedback has no Vulkan equivalent.
    pub fn create_sampler_feedback_texture(&self, _paired_texture: vk::Image) -> Result<SamplerFeedbackTexture> {
        Err(RhiError::Unsupported("sampler feedback textures"))
    }

    // =========================================================================
    // TIMER QUERIES
    // =========================================================================

    pub fn create_timer_query(&self) -> Result<TimerQuery> {
        let mut timers = self.timer_queries.lock();

        // A query pool cannot be empty.
        if timers.slots.capacity() == 0 {
            return Err(self.timer_queries_exhausted());
        }

        if timers.pool == vk::QueryPool::null() {
            let query_count = (timers.slots.capacity() * 2) as u32;
            timers.pool = self
                .context
                .native
                .create_timestamp_query_pool(query_count)
                .map_err(RhiError::vulkan("timer query pool creation"))?;
        }

        match timers.slots.allocate() {
            Some(slot) => Ok(TimerQuery::new(slot as u32)),
            None => Err(self.timer_queries_exhausted()),
        }
    }

    fn timer_queries_exhausted(&self) -> RhiError {
        self.context
            .error("Insufficient query pool space, increase max_timer_queries");
        RhiError::Exhausted("timer queries")
    }

    pub fn destroy_timer_query(&self, query: TimerQuery) {
        self.timer_queries.lock().slots.release(query.slot() as usize);
    }

    /// The timestamp pool, or null before the first timer query.
    pub fn timer_query_pool(&self) -> vk::QueryPool {
        self.timer_queries.lock().pool
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::info!("Destroying device...");

        let native = &self.context.native;
        let timers = self.timer_queries.get_mut();
        if timers.pool != vk::QueryPool::null() {
            native.destroy_query_pool(timers.pool);
            timers.pool = vk::QueryPool::null();
        }

        native.destroy_pipeline_cache(self.pipeline_cache);
        native.destroy_descriptor_set_layout(self.empty_descriptor_set_layout);
    }
}

/// Never constructed: sampler feedback is unsupported on this backend.
#[derive(Debug)]
pub struct SamplerFeedbackTexture {
    _private: (),
}

fn check_heap_offset(heap: &Heap, offset: u64) -> Result<()> {
    if offset >= heap.capacity() {
        return Err(RhiError::InvalidArgument(format!(
            "offset {} is outside heap of {} bytes",
            offset,
            heap.capacity()
        )));
    }
    Ok(())
}
