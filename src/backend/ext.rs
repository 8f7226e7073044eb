// Vendor extension structures missing from the ash bindings
//
// VK_NV_cooperative_vector and VK_NV_cluster_acceleration_structure are newer
// than the headers ash was generated from. Layouts follow vulkan_core.h.

use ash::vk;
use std::ffi::c_void;
use std::ptr;

pub const STRUCTURE_TYPE_PHYSICAL_DEVICE_COOPERATIVE_VECTOR_FEATURES_NV: vk::StructureType =
    vk::StructureType::from_raw(1_000_491_000);
pub const STRUCTURE_TYPE_PHYSICAL_DEVICE_COOPERATIVE_VECTOR_PROPERTIES_NV: vk::StructureType =
    vk::StructureType::from_raw(1_000_491_001);
pub const STRUCTURE_TYPE_COOPERATIVE_VECTOR_PROPERTIES_NV: vk::StructureType =
    vk::StructureType::from_raw(1_000_491_002);
pub const STRUCTURE_TYPE_PHYSICAL_DEVICE_CLUSTER_ACCELERATION_STRUCTURE_PROPERTIES_NV: vk::StructureType =
    vk::StructureType::from_raw(1_000_569_001);

/// `vkGetPhysicalDeviceCooperativeVectorPropertiesNV`
pub type PfnGetPhysicalDeviceCooperativeVectorPropertiesNV = unsafe extern "system" fn(
    physical_device: vk::PhysicalDevice,
    property_count: *mut u32,
    properties: *mut CooperativeVectorPropertiesNV,
) -> vk::Result;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PhysicalDeviceCooperativeVectorPropertiesNV {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub cooperative_vector_supported_stages: vk::ShaderStageFlags,
    pub cooperative_vector_training_float16_accumulation: vk::Bool32,
    pub cooperative_vector_training_float32_accumulation: vk::Bool32,
    pub max_cooperative_vector_components: u32,
}

impl Default for PhysicalDeviceCooperativeVectorPropertiesNV {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PHYSICAL_DEVICE_COOPERATIVE_VECTOR_PROPERTIES_NV,
            p_next: ptr::null_mut(),
            cooperative_vector_supported_stages: vk::ShaderStageFlags::empty(),
            cooperative_vector_training_float16_accumulation: vk::FALSE,
            cooperative_vector_training_float32_accumulation: vk::FALSE,
            max_cooperative_vector_components: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PhysicalDeviceCooperativeVectorFeaturesNV {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub cooperative_vector: vk::Bool32,
    pub cooperative_vector_training: vk::Bool32,
}

impl Default for PhysicalDeviceCooperativeVectorFeaturesNV {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PHYSICAL_DEVICE_COOPERATIVE_VECTOR_FEATURES_NV,
            p_next: ptr::null_mut(),
            cooperative_vector: vk::FALSE,
            cooperative_vector_training: vk::FALSE,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CooperativeVectorPropertiesNV {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub input_type: vk::ComponentTypeKHR,
    pub input_interpretation: vk::ComponentTypeKHR,
    pub matrix_interpretation: vk::ComponentTypeKHR,
    pub bias_interpretation: vk::ComponentTypeKHR,
    pub result_type: vk::ComponentTypeKHR,
    pub transpose: vk::Bool32,
}

impl Default for CooperativeVectorPropertiesNV {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_COOPERATIVE_VECTOR_PROPERTIES_NV,
            p_next: ptr::null_mut(),
            input_type: vk::ComponentTypeKHR::FLOAT16,
            input_interpretation: vk::ComponentTypeKHR::FLOAT16,
            matrix_interpretation: vk::ComponentTypeKHR::FLOAT16,
            bias_interpretation: vk::ComponentTypeKHR::FLOAT16,
            result_type: vk::ComponentTypeKHR::FLOAT16,
            transpose: vk::FALSE,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PhysicalDeviceClusterAccelerationStructurePropertiesNV {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub max_vertices_per_cluster: u32,
    pub max_triangles_per_cluster: u32,
    pub cluster_scratch_byte_alignment: u32,
    pub cluster_byte_alignment: u32,
    pub cluster_template_byte_alignment: u32,
    pub cluster_bottom_level_byte_alignment: u32,
    pub cluster_template_bounds_byte_alignment: u32,
    pub max_cluster_geometry_index: u32,
}

impl Default for PhysicalDeviceClusterAccelerationStructurePropertiesNV {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PHYSICAL_DEVICE_CLUSTER_ACCELERATION_STRUCTURE_PROPERTIES_NV,
            p_next: ptr::null_mut(),
            max_vertices_per_cluster: 0,
            max_triangles_per_cluster: 0,
            cluster_scratch_byte_alignment: 0,
            cluster_byte_alignment: 0,
            cluster_template_byte_alignment: 0,
            cluster_bottom_level_byte_alignment: 0,
            cluster_template_bounds_byte_alignment: 0,
            max_cluster_geometry_index: 0,
        }
    }
}

// Raw pointers are only ever set while a query is in flight.
unsafe impl Send for PhysicalDeviceCooperativeVectorPropertiesNV {}
unsafe impl Sync for PhysicalDeviceCooperativeVectorPropertiesNV {}
unsafe impl Send for PhysicalDeviceCooperativeVectorFeaturesNV {}
unsafe impl Sync for PhysicalDeviceCooperativeVectorFeaturesNV {}
unsafe impl Send for CooperativeVectorPropertiesNV {}
unsafe impl Sync for CooperativeVectorPropertiesNV {}
unsafe impl Send for PhysicalDeviceClusterAccelerationStructurePropertiesNV {}
unsafe impl Sync for PhysicalDeviceClusterAccelerationStructurePropertiesNV {}
