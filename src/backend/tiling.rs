// Sparse texture tiling
//
// Describes how a sparse (partially resident) texture is cut into tiles:
// which mips are addressed tile by tile, which are packed into the shared mip
// tail, and where each mip's tiles start in the resource. Recomputed on every
// query from the driver's sparse memory requirements.

use ash::vk;

use super::native::SparseImageInfo;

/// A texture created with sparse residency.
///
/// Creating the image is the caller's business; the core only needs its
/// handle and creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparseTexture {
    pub image: vk::Image,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub info: SparseImageInfo,
}

/// The mips packed into the mip tail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackedMipDesc {
    pub num_standard_mips: u32,
    pub num_packed_mips: u32,
    pub num_tiles_for_packed_mips: u32,
    pub start_tile_index_in_overall_resource: u32,
}

/// Size of one tile in texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileShape {
    pub width_in_texels: u32,
    pub height_in_texels: u32,
    pub depth_in_texels: u32,
}

impl Default for TileShape {
    fn default() -> Self {
        Self {
            width_in_texels: 1,
            height_in_texels: 1,
            depth_in_texels: 1,
        }
    }
}

/// Tile grid of one mip level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubresourceTiling {
    pub width_in_tiles: u32,
    pub height_in_tiles: u32,
    pub depth_in_tiles: u32,
    /// `u32::MAX` for mips in the packed tail.
    pub start_tile_index_in_overall_resource: u32,
}

impl SubresourceTiling {
    /// Marks a mip that lives in the packed tail.
    pub const PACKED: SubresourceTiling = SubresourceTiling {
        width_in_tiles: 0,
        height_in_tiles: 0,
        depth_in_tiles: 0,
        start_tile_index_in_overall_resource: u32::MAX,
    };

    /// Tiles in this mip, saturating at `u32::MAX`.
    pub fn tile_count(&self) -> u32 {
        self.width_in_tiles
            .saturating_mul(self.height_in_tiles)
            .saturating_mul(self.depth_in_tiles)
    }
}

/// Everything [`get_texture_tiling`](crate::backend::Device::get_texture_tiling) reports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureTiling {
    /// Tiles in the whole resource.
    pub num_tiles: u32,
    pub packed_mip_desc: PackedMipDesc,
    pub tile_shape: TileShape,
    /// One entry per requested mip, clamped to the texture's mip count.
    pub subresource_tilings: Vec<SubresourceTiling>,
}

/// Driver-reported inputs of a tiling computation.
#[derive(Clone, Copy, Debug)]
pub struct TilingInputs {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    /// First entry of `vkGetImageSparseMemoryRequirements`, if any.
    pub sparse_requirements: Option<vk::SparseImageMemoryRequirements>,
    /// Granularity of the first sparse format property, if any.
    pub granularity: Option<vk::Extent3D>,
    /// Size of the whole resource from `vkGetImageMemoryRequirements`.
    pub memory_size: vk::DeviceSize,
    /// Bytes per tile (the image's memory alignment for sparse images).
    pub tile_byte_size: vk::DeviceSize,
}

fn tiles_in(size: vk::DeviceSize, tile_byte_size: vk::DeviceSize) -> u32 {
    size.checked_div(tile_byte_size)
        .map_or(0, |tiles| u32::try_from(tiles).unwrap_or(u32::MAX))
}

fn div_ceil(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor.max(1))
}

/// Computes the tiling of a texture, reporting at most `max_subresource_tilings` mips.
pub fn compute_tiling(inputs: &TilingInputs, max_subresource_tilings: u32) -> TextureTiling {
    let num_standard_mips = inputs
        .sparse_requirements
        .map_or(0, |req| req.image_mip_tail_first_lod);

    let packed_mip_desc = match inputs.sparse_requirements {
        Some(req) => PackedMipDesc {
            num_standard_mips,
            num_packed_mips: inputs.mip_levels.saturating_sub(req.image_mip_tail_first_lod),
            num_tiles_for_packed_mips: tiles_in(req.image_mip_tail_size, inputs.tile_byte_size),
            start_tile_index_in_overall_resource: tiles_in(req.image_mip_tail_offset, inputs.tile_byte_size),
        },
        None => PackedMipDesc::default(),
    };

    let tile_shape = inputs.granularity.map_or_else(TileShape::default, |g| TileShape {
        width_in_texels: g.width,
        height_in_texels: g.height,
        depth_in_texels: g.depth,
    });

    let count = max_subresource_tilings.min(inputs.mip_levels);
    let mut subresource_tilings = Vec::with_capacity(count as usize);

    let (tile_width, tile_height, tile_depth) = (
        tile_shape.width_in_texels,
        tile_shape.height_in_texels,
        tile_shape.depth_in_texels,
    );
    let (mut width, mut height, mut depth) = (inputs.width, inputs.height, inputs.depth);
    let mut start_tile_index = 0u32;

    for mip in 0..count {
        let tiling = if mip < num_standard_mips {
            SubresourceTiling {
                width_in_tiles: div_ceil(width, tile_width),
                height_in_tiles: div_ceil(height, tile_height),
                depth_in_tiles: div_ceil(depth, tile_depth),
                start_tile_index_in_overall_resource: start_tile_index,
            }
        } else {
            SubresourceTiling::PACKED
        };

        width = (width / 2).max(tile_width);
        height = (height / 2).max(tile_height);
        depth = (depth / 2).max(tile_depth);

        start_tile_index = start_tile_index.saturating_add(tiling.tile_count());
        subresource_tilings.push(tiling);
    }

    TextureTiling {
        num_tiles: tiles_in(inputs.memory_size, inputs.tile_byte_size),
        packed_mip_desc,
        tile_shape,
        subresource_tilings,
    }
}
