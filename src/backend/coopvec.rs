// Cooperative vector capabilities (VK_NV_cooperative_vector)

use ash::vk;

use super::ext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoopVecDataType {
    UInt8,
    SInt8,
    UInt8Packed,
    SInt8Packed,
    UInt16,
    SInt16,
    UInt32,
    SInt32,
    UInt64,
    SInt64,
    FloatE4M3,
    FloatE5M2,
    Float16,
    Float32,
    Float64,
}

impl CoopVecDataType {
    /// Maps a Vulkan component type; `None` for types this core does not model.
    pub fn from_vk(component: vk::ComponentTypeKHR) -> Option<Self> {
        let ty = match component.as_raw() {
            0 => Self::Float16,
            1 => Self::Float32,
            2 => Self::Float64,
            3 => Self::SInt8,
            4 => Self::SInt16,
            5 => Self::SInt32,
            6 => Self::SInt64,
            7 => Self::UInt8,
            8 => Self::UInt16,
            9 => Self::UInt32,
            10 => Self::UInt64,
            1_000_491_000 => Self::SInt8Packed,
            1_000_491_001 => Self::UInt8Packed,
            1_000_491_002 => Self::FloatE4M3,
            1_000_491_003 => Self::FloatE5M2,
            _ => return None,
        };
        Some(ty)
    }
}

/// One matrix-multiply type combination the driver accelerates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatMulFormatCombo {
    pub input_type: CoopVecDataType,
    pub input_interpretation: CoopVecDataType,
    pub matrix_interpretation: CoopVecDataType,
    pub bias_interpretation: CoopVecDataType,
    pub output_type: CoopVecDataType,
    pub transpose_supported: bool,
}

impl MatMulFormatCombo {
    pub fn from_vk(props: &ext::CooperativeVectorPropertiesNV) -> Option<Self> {
        Some(Self {
            input_type: CoopVecDataType::from_vk(props.input_type)?,
            input_interpretation: CoopVecDataType::from_vk(props.input_interpretation)?,
            matrix_interpretation: CoopVecDataType::from_vk(props.matrix_interpretation)?,
            bias_interpretation: CoopVecDataType::from_vk(props.bias_interpretation)?,
            output_type: CoopVecDataType::from_vk(props.result_type)?,
            transpose_supported: props.transpose != vk::FALSE,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoopVecDeviceFeatures {
    pub mat_mul_formats: Vec<MatMulFormatCombo>,
    pub training_float16: bool,
    pub training_float32: bool,
}
