// Feature and format queries
//
// Answers "is X supported" from the negotiated capability set and cached
// property blocks, and translates per-format Vulkan feature bits into
// FormatSupport.

use ash::vk;
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

use crate::errors::{Result, RhiError};

use super::capabilities::Capabilities;
use super::negotiate::DeviceContext;
use super::queue::{QueueKind, QueueTracker};

/// Optional features a renderer can ask about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    DeferredCommandLists,
    RayTracingAccelStruct,
    RayTracingPipeline,
    RayTracingOpacityMicromap,
    RayQuery,
    ShaderExecutionReordering,
    RayTracingClusters,
    ShaderSpecializations,
    Meshlets,
    VariableRateShading,
    ConservativeRasterization,
    VirtualResources,
    ComputeQueue,
    CopyQueue,
    ConstantBufferRanges,
    WaveLaneCountMinMax,
    HeapDirectlyIndexed,
    CooperativeVectorInferencing,
    CooperativeVectorTraining,
    SamplerFeedback,
    FastGeometryShader,
    SinglePassStereo,
    HlslExtensionUav,
}

/// Extra data for [`Feature::VariableRateShading`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VariableRateShadingFeatureInfo {
    pub shading_rate_image_tile_size: u32,
}

/// Extra data for [`Feature::WaveLaneCountMinMax`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WaveLaneCountMinMaxFeatureInfo {
    pub min_wave_lane_count: u32,
    pub max_wave_lane_count: u32,
}

/// Copies `value` into `out` if the sizes match exactly; leaves `out` untouched otherwise.
fn write_info<T: Pod>(out: &mut [u8], value: &T) -> Result<()> {
    let bytes = bytemuck::bytes_of(value);
    if out.len() != bytes.len() {
        return Err(RhiError::Unsupported("feature info size mismatch"));
    }
    out.copy_from_slice(bytes);
    Ok(())
}

/// Whether `feature` is supported, optionally filling its info structure.
///
/// `info` must be exactly the size of the feature's info structure
/// ([`VariableRateShadingFeatureInfo`] or [`WaveLaneCountMinMaxFeatureInfo`]);
/// any other size fails with [`RhiError::Unsupported`] without writing.
/// Features without an info structure ignore `info`.
pub fn query_feature_support(
    context: &DeviceContext,
    queues: &QueueTracker,
    feature: Feature,
    info: Option<&mut [u8]>,
) -> Result<bool> {
    let caps = context.capabilities;
    let props = &context.properties;
    let features = &context.features;

    let supported = match feature {
        Feature::DeferredCommandLists
        | Feature::ShaderSpecializations
        | Feature::VirtualResources
        | Feature::ConstantBufferRanges => true,
        Feature::RayTracingAccelStruct => caps.contains(Capabilities::ACCELERATION_STRUCTURE),
        Feature::RayTracingPipeline => caps.contains(Capabilities::RAY_TRACING_PIPELINE),
        Feature::RayTracingOpacityMicromap => {
            caps.contains(Capabilities::OPACITY_MICROMAP | Capabilities::SYNCHRONIZATION2)
        }
        Feature::RayQuery => caps.contains(Capabilities::RAY_QUERY),
        Feature::ShaderExecutionReordering => {
            caps.contains(Capabilities::RAY_TRACING_INVOCATION_REORDER)
                && props.invocation_reorder.ray_tracing_invocation_reorder_reordering_hint
                    == vk::RayTracingInvocationReorderModeNV::REORDER
        }
        Feature::RayTracingClusters => caps.contains(Capabilities::CLUSTER_ACCELERATION_STRUCTURE),
        Feature::Meshlets => caps.contains(Capabilities::MESH_SHADER),
        Feature::VariableRateShading => {
            if let Some(out) = info {
                let tile = props.shading_rate.min_fragment_shading_rate_attachment_texel_size;
                write_info(
                    out,
                    &VariableRateShadingFeatureInfo {
                        shading_rate_image_tile_size: tile.width.max(tile.height),
                    },
                )?;
            }
            caps.contains(Capabilities::FRAGMENT_SHADING_RATE)
                && features.shading_rate.attachment_fragment_shading_rate == vk::TRUE
        }
        Feature::ConservativeRasterization => caps.contains(Capabilities::CONSERVATIVE_RASTERIZATION),
        Feature::ComputeQueue => queues.has(QueueKind::Compute),
        Feature::CopyQueue => queues.has(QueueKind::Copy),
        Feature::WaveLaneCountMinMax => {
            let lanes = props.subgroup.subgroup_size;
            if lanes == 0 {
                return Ok(false);
            }
            if let Some(out) = info {
                // Vulkan exposes a single subgroup size.
                write_info(
                    out,
                    &WaveLaneCountMinMaxFeatureInfo {
                        min_wave_lane_count: lanes,
                        max_wave_lane_count: lanes,
                    },
                )?;
            }
            true
        }
        Feature::HeapDirectlyIndexed => caps.contains(Capabilities::MUTABLE_DESCRIPTOR_TYPE),
        Feature::CooperativeVectorInferencing => {
            caps.contains(Capabilities::COOPERATIVE_VECTOR)
                && features.cooperative_vector.cooperative_vector == vk::TRUE
        }
        Feature::CooperativeVectorTraining => {
            caps.contains(Capabilities::COOPERATIVE_VECTOR)
                && features.cooperative_vector.cooperative_vector_training == vk::TRUE
        }
        Feature::SamplerFeedback
        | Feature::FastGeometryShader
        | Feature::SinglePassStereo
        | Feature::HlslExtensionUav => false,
    };

    Ok(supported)
}

bitflags! {
    /// What a format can be used for.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FormatSupport: u32 {
        const BUFFER           = 1 << 0;
        const INDEX_BUFFER     = 1 << 1;
        const VERTEX_BUFFER    = 1 << 2;
        const TEXTURE          = 1 << 3;
        const DEPTH_STENCIL    = 1 << 4;
        const RENDER_TARGET    = 1 << 5;
        const BLENDABLE        = 1 << 6;
        const SHADER_LOAD      = 1 << 7;
        const SHADER_SAMPLE    = 1 << 8;
        const SHADER_UAV_LOAD  = 1 << 9;
        const SHADER_UAV_STORE = 1 << 10;
        const SHADER_ATOMIC    = 1 << 11;
    }
}

/// Texel formats understood by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    Unknown,
    R8Uint,
    R8Unorm,
    Rg8Unorm,
    R16Uint,
    R16Float,
    R32Uint,
    R32Float,
    Rgba8Unorm,
    Srgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rg32Float,
    Rgb32Float,
    Rgba32Float,
    R11G11B10Float,
    D16,
    D24S8,
    D32,
    D32S8,
    Bc1Unorm,
    Bc3Unorm,
    Bc7Unorm,
}

impl Format {
    pub fn to_vk(self) -> vk::Format {
        match self {
            Format::Unknown => vk::Format::UNDEFINED,
            Format::R8Uint => vk::Format::R8_UINT,
            Format::R8Unorm => vk::Format::R8_UNORM,
            Format::Rg8Unorm => vk::Format::R8G8_UNORM,
            Format::R16Uint => vk::Format::R16_UINT,
            Format::R16Float => vk::Format::R16_SFLOAT,
            Format::R32Uint => vk::Format::R32_UINT,
            Format::R32Float => vk::Format::R32_SFLOAT,
            Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            Format::Srgba8Unorm => vk::Format::R8G8B8A8_SRGB,
            Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
            Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
            Format::Rg32Float => vk::Format::R32G32_SFLOAT,
            Format::Rgb32Float => vk::Format::R32G32B32_SFLOAT,
            Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
            Format::R11G11B10Float => vk::Format::B10G11R11_UFLOAT_PACK32,
            Format::D16 => vk::Format::D16_UNORM,
            Format::D24S8 => vk::Format::D24_UNORM_S8_UINT,
            Format::D32 => vk::Format::D32_SFLOAT,
            Format::D32S8 => vk::Format::D32_SFLOAT_S8_UINT,
            Format::Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
            Format::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
            Format::Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
        }
    }
}

/// Translates Vulkan format feature bits into [`FormatSupport`].
pub fn format_support_from_properties(format: Format, props: &vk::FormatProperties) -> FormatSupport {
    type F = vk::FormatFeatureFlags;

    let buffer = props.buffer_features;
    let optimal = props.optimal_tiling_features;
    let mut result = FormatSupport::empty();

    if !buffer.is_empty() {
        result |= FormatSupport::BUFFER;
    }

    // Vulkan has no feature bit for index buffers.
    if matches!(format, Format::R32Uint | Format::R16Uint) {
        result |= FormatSupport::INDEX_BUFFER;
    }

    if buffer.contains(F::VERTEX_BUFFER) {
        result |= FormatSupport::VERTEX_BUFFER;
    }

    if !optimal.is_empty() {
        result |= FormatSupport::TEXTURE;
    }

    if optimal.contains(F::DEPTH_STENCIL_ATTACHMENT) {
        result |= FormatSupport::DEPTH_STENCIL;
    }

    if optimal.contains(F::COLOR_ATTACHMENT) {
        result |= FormatSupport::RENDER_TARGET;
    }

    if optimal.contains(F::COLOR_ATTACHMENT_BLEND) {
        result |= FormatSupport::BLENDABLE;
    }

    // Texel-buffer bits only widen shader access for formats usable as images.
    let texel_buffer = if optimal.is_empty() { F::empty() } else { buffer };

    if optimal.contains(F::SAMPLED_IMAGE) || texel_buffer.contains(F::UNIFORM_TEXEL_BUFFER) {
        result |= FormatSupport::SHADER_LOAD;
    }

    if optimal.contains(F::SAMPLED_IMAGE_FILTER_LINEAR) {
        result |= FormatSupport::SHADER_SAMPLE;
    }

    if optimal.contains(F::STORAGE_IMAGE) || texel_buffer.contains(F::STORAGE_TEXEL_BUFFER) {
        result |= FormatSupport::SHADER_UAV_LOAD | FormatSupport::SHADER_UAV_STORE;
    }

    if optimal.contains(F::STORAGE_IMAGE_ATOMIC) || buffer.contains(F::STORAGE_TEXEL_BUFFER_ATOMIC) {
        result |= FormatSupport::SHADER_ATOMIC;
    }

    result
}
