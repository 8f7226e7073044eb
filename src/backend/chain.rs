// Chained property/feature queries
//
// vkGetPhysicalDeviceProperties2 and vkGetPhysicalDeviceFeatures2 fill a
// linked list of output structures threaded through their p_next fields. The
// chain here is a vector of tagged slots, sized once from the active
// capabilities, that is linked right before the native call and unlinked right
// after. The vector is never resized while linked, so every slot keeps its
// address for the duration of the call.

use ash::vk;
use std::ffi::c_void;
use std::ptr;

use super::capabilities::Capabilities;
use super::ext;

/// One property block of a `vkGetPhysicalDeviceProperties2` chain.
#[derive(Clone, Copy, Debug)]
pub enum PropertyBlock {
    Subgroup(vk::PhysicalDeviceSubgroupProperties<'static>),
    AccelerationStructure(vk::PhysicalDeviceAccelerationStructurePropertiesKHR<'static>),
    RayTracingPipeline(vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static>),
    FragmentShadingRate(vk::PhysicalDeviceFragmentShadingRatePropertiesKHR<'static>),
    ConservativeRasterization(vk::PhysicalDeviceConservativeRasterizationPropertiesEXT<'static>),
    OpacityMicromap(vk::PhysicalDeviceOpacityMicromapPropertiesEXT<'static>),
    InvocationReorder(vk::PhysicalDeviceRayTracingInvocationReorderPropertiesNV<'static>),
    ClusterAccelerationStructure(ext::PhysicalDeviceClusterAccelerationStructurePropertiesNV),
    CooperativeVector(ext::PhysicalDeviceCooperativeVectorPropertiesNV),
}

/// Which capability governs each property block, in chain order.
///
/// An empty governing set means the block is always queried (core Vulkan 1.1).
const PROPERTY_BLOCKS: &[(Capabilities, fn() -> PropertyBlock)] = &[
    (Capabilities::empty(), || PropertyBlock::Subgroup(Default::default())),
    (Capabilities::ACCELERATION_STRUCTURE, || PropertyBlock::AccelerationStructure(Default::default())),
    (Capabilities::RAY_TRACING_PIPELINE, || PropertyBlock::RayTracingPipeline(Default::default())),
    (Capabilities::FRAGMENT_SHADING_RATE, || PropertyBlock::FragmentShadingRate(Default::default())),
    (Capabilities::CONSERVATIVE_RASTERIZATION, || PropertyBlock::ConservativeRasterization(Default::default())),
    (Capabilities::OPACITY_MICROMAP, || PropertyBlock::OpacityMicromap(Default::default())),
    (Capabilities::RAY_TRACING_INVOCATION_REORDER, || PropertyBlock::InvocationReorder(Default::default())),
    (Capabilities::CLUSTER_ACCELERATION_STRUCTURE, || PropertyBlock::ClusterAccelerationStructure(Default::default())),
    (Capabilities::COOPERATIVE_VECTOR, || PropertyBlock::CooperativeVector(Default::default())),
];

impl ChainLink for PropertyBlock {
    fn link_header(&mut self) -> *mut vk::BaseOutStructure<'static> {
        let raw: *mut c_void = match self {
            Self::Subgroup(p) => ptr::from_mut(p).cast(),
            Self::AccelerationStructure(p) => ptr::from_mut(p).cast(),
            Self::RayTracingPipeline(p) => ptr::from_mut(p).cast(),
            Self::FragmentShadingRate(p) => ptr::from_mut(p).cast(),
            Self::ConservativeRasterization(p) => ptr::from_mut(p).cast(),
            Self::OpacityMicromap(p) => ptr::from_mut(p).cast(),
            Self::InvocationReorder(p) => ptr::from_mut(p).cast(),
            Self::ClusterAccelerationStructure(p) => ptr::from_mut(p).cast(),
            Self::CooperativeVector(p) => ptr::from_mut(p).cast(),
        };
        raw.cast()
    }
}

/// One feature block of a `vkGetPhysicalDeviceFeatures2` chain.
#[derive(Clone, Copy, Debug)]
pub enum FeatureBlock {
    FragmentShadingRate(vk::PhysicalDeviceFragmentShadingRateFeaturesKHR<'static>),
    CooperativeVector(ext::PhysicalDeviceCooperativeVectorFeaturesNV),
}

const FEATURE_BLOCKS: &[(Capabilities, fn() -> FeatureBlock)] = &[
    (Capabilities::FRAGMENT_SHADING_RATE, || FeatureBlock::FragmentShadingRate(Default::default())),
    (Capabilities::COOPERATIVE_VECTOR, || FeatureBlock::CooperativeVector(Default::default())),
];

impl ChainLink for FeatureBlock {
    fn link_header(&mut self) -> *mut vk::BaseOutStructure<'static> {
        let raw: *mut c_void = match self {
            Self::FragmentShadingRate(f) => ptr::from_mut(f).cast(),
            Self::CooperativeVector(f) => ptr::from_mut(f).cast(),
        };
        raw.cast()
    }
}

/// Ordered storage for one chained query.
#[derive(Debug)]
pub struct QueryChain<B> {
    blocks: Vec<B>,
}

pub type PropertyChain = QueryChain<PropertyBlock>;
pub type FeatureChain = QueryChain<FeatureBlock>;

impl PropertyChain {
    /// Slots for every property block whose governing capability is active.
    pub fn for_capabilities(caps: Capabilities) -> Self {
        Self::build(caps, PROPERTY_BLOCKS)
    }
}

impl FeatureChain {
    /// Slots for every feature block whose governing capability is active.
    pub fn for_capabilities(caps: Capabilities) -> Self {
        Self::build(caps, FEATURE_BLOCKS)
    }
}

/// Gives the chain access to the `sType`/`pNext` header of a slot.
pub trait ChainLink {
    fn link_header(&mut self) -> *mut vk::BaseOutStructure<'static>;
}

impl<B: ChainLink> QueryChain<B> {
    fn build(caps: Capabilities, table: &[(Capabilities, fn() -> B)]) -> Self {
        let count = table.iter().filter(|(gate, _)| caps.contains(*gate)).count();
        let mut blocks = Vec::with_capacity(count);
        blocks.extend(
            table
                .iter()
                .filter(|(gate, _)| caps.contains(*gate))
                .map(|(_, make)| make()),
        );
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[B] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [B] {
        &mut self.blocks
    }

    /// Threads the slots into a p_next list and returns its head.
    ///
    /// The returned pointer is valid until [`unlink`](Self::unlink) or until
    /// the chain is moved or dropped. Slots keep their order: the first block
    /// is the head.
    pub fn link(&mut self) -> *mut c_void {
        let mut next: *mut vk::BaseOutStructure<'static> = ptr::null_mut();
        for block in self.blocks.iter_mut().rev() {
            let header = block.link_header();
            // SAFETY: every slot variant is a Vulkan output struct starting with sType/pNext.
            unsafe { (*header).p_next = next };
            next = header;
        }
        next.cast()
    }

    /// Clears every p_next so the blocks can be copied out freely.
    pub fn unlink(&mut self) {
        for block in self.blocks.iter_mut() {
            let header = block.link_header();
            // SAFETY: see `link`.
            unsafe { (*header).p_next = ptr::null_mut() };
        }
    }
}
