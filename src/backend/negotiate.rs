// Capability negotiation
//
// Runs once per device: turns the enabled extension lists into a Capabilities
// set, issues one chained property query and, when needed, one chained feature
// query, and caches the results in a DeviceContext that every other part of
// the device reads from.

use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use super::capabilities::Capabilities;
use super::chain::{FeatureBlock, FeatureChain, PropertyBlock, PropertyChain};
use super::ext;
use super::message::{MessageCallback, MessageSeverity};
use super::native::{DebugNaming, NativeDevice};

/// Property blocks returned by the chained query.
///
/// Blocks whose capability is off keep their default (zeroed) contents.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceProperties {
    pub core: vk::PhysicalDeviceProperties,
    pub subgroup: vk::PhysicalDeviceSubgroupProperties<'static>,
    pub acceleration_structure: vk::PhysicalDeviceAccelerationStructurePropertiesKHR<'static>,
    pub ray_tracing_pipeline: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static>,
    pub shading_rate: vk::PhysicalDeviceFragmentShadingRatePropertiesKHR<'static>,
    pub conservative_rasterization: vk::PhysicalDeviceConservativeRasterizationPropertiesEXT<'static>,
    pub opacity_micromap: vk::PhysicalDeviceOpacityMicromapPropertiesEXT<'static>,
    pub invocation_reorder: vk::PhysicalDeviceRayTracingInvocationReorderPropertiesNV<'static>,
    pub cluster_acceleration_structure: ext::PhysicalDeviceClusterAccelerationStructurePropertiesNV,
    pub cooperative_vector: ext::PhysicalDeviceCooperativeVectorPropertiesNV,
}

/// Feature blocks returned by the chained feature query.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceFeatures {
    pub shading_rate: vk::PhysicalDeviceFragmentShadingRateFeaturesKHR<'static>,
    pub cooperative_vector: ext::PhysicalDeviceCooperativeVectorFeaturesNV,
}

// Cached blocks are copied out of an unlinked chain; every p_next is null.
unsafe impl Send for DeviceProperties {}
unsafe impl Sync for DeviceProperties {}
unsafe impl Send for DeviceFeatures {}
unsafe impl Sync for DeviceFeatures {}

impl DeviceProperties {
    fn absorb(core: vk::PhysicalDeviceProperties, chain: &PropertyChain) -> Self {
        let mut props = DeviceProperties { core, ..Default::default() };
        for block in chain.blocks() {
            match *block {
                PropertyBlock::Subgroup(p) => props.subgroup = p,
                PropertyBlock::AccelerationStructure(p) => props.acceleration_structure = p,
                PropertyBlock::RayTracingPipeline(p) => props.ray_tracing_pipeline = p,
                PropertyBlock::FragmentShadingRate(p) => props.shading_rate = p,
                PropertyBlock::ConservativeRasterization(p) => props.conservative_rasterization = p,
                PropertyBlock::OpacityMicromap(p) => props.opacity_micromap = p,
                PropertyBlock::InvocationReorder(p) => props.invocation_reorder = p,
                PropertyBlock::ClusterAccelerationStructure(p) => props.cluster_acceleration_structure = p,
                PropertyBlock::CooperativeVector(p) => props.cooperative_vector = p,
            }
        }
        props
    }
}

impl DeviceFeatures {
    fn absorb(chain: &FeatureChain) -> Self {
        let mut features = DeviceFeatures::default();
        for block in chain.blocks() {
            match *block {
                FeatureBlock::FragmentShadingRate(f) => features.shading_rate = f,
                FeatureBlock::CooperativeVector(f) => features.cooperative_vector = f,
            }
        }
        features
    }
}

/// Inputs of the negotiation.
pub struct NegotiationInput<'a> {
    pub instance_extensions: &'a [String],
    pub device_extensions: &'a [String],
    /// Forces device addresses on regardless of the extension lists.
    pub buffer_device_address: bool,
}

/// Device-wide state shared by the heap allocator, queries and the device.
///
/// Immutable after [`negotiate`] returns.
pub struct DeviceContext {
    pub native: Arc<dyn NativeDevice>,
    pub capabilities: Capabilities,
    pub properties: DeviceProperties,
    pub features: DeviceFeatures,
    message_callback: Arc<dyn MessageCallback>,
}

impl DeviceContext {
    pub fn error(&self, message: &str) {
        self.message_callback.message(MessageSeverity::Error, message);
    }

    pub fn warning(&self, message: &str) {
        self.message_callback.message(MessageSeverity::Warning, message);
    }

    pub fn info(&self, message: &str) {
        self.message_callback.message(MessageSeverity::Info, message);
    }

    pub fn has(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }

    /// Attaches a debug name to device memory when a naming extension is active.
    pub fn name_memory(&self, memory: vk::DeviceMemory, name: &str) {
        if name.is_empty() || memory == vk::DeviceMemory::null() {
            return;
        }

        let naming = if self.has(Capabilities::DEBUG_UTILS) {
            DebugNaming::Utils
        } else if self.has(Capabilities::DEBUG_MARKER) {
            DebugNaming::Marker
        } else {
            return;
        };

        // Names with interior NULs cannot cross the C boundary; skip them.
        if let Ok(name) = CString::new(name) {
            self.native.name_memory(memory, &name, naming);
        }
    }
}

/// Fixes the capability set and queries every property and feature block it unlocks.
pub fn negotiate(
    native: Arc<dyn NativeDevice>,
    input: &NegotiationInput<'_>,
    message_callback: Arc<dyn MessageCallback>,
) -> DeviceContext {
    let capabilities = Capabilities::from_extensions(
        input.instance_extensions,
        input.device_extensions,
        input.buffer_device_address,
    );
    log::info!("Negotiated capabilities: {:?}", capabilities);

    let mut chain = PropertyChain::for_capabilities(capabilities);
    let core = native.physical_device_properties2(&mut chain);
    chain.unlink();
    let properties = DeviceProperties::absorb(core, &chain);

    let mut feature_chain = FeatureChain::for_capabilities(capabilities);
    if !feature_chain.is_empty() {
        native.physical_device_features2(&mut feature_chain);
        feature_chain.unlink();
    }
    let features = DeviceFeatures::absorb(&feature_chain);

    let context = DeviceContext {
        native,
        capabilities,
        properties,
        features,
        message_callback,
    };

    if context.has(Capabilities::OPACITY_MICROMAP) && !context.has(Capabilities::SYNCHRONIZATION2) {
        context.warning(
            "EXT_opacity_micromap is used without KHR_synchronization2 which is necessary for OMM Array state transitions. Feature::RayTracingOpacityMicromap will be disabled.",
        );
    }

    context
}
