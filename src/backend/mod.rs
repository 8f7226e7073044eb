// Backend module - Vulkan abstraction layer
//
// Design: the core logic talks to the driver only through `native`; `ash_native`
// is the production driver, tests bring their own.

pub mod ash_native;
pub mod capabilities;
pub mod chain;
pub mod coopvec;
pub mod device;
pub mod ext;
pub mod heap;
pub mod message;
pub mod native;
pub mod negotiate;
pub mod query;
pub mod queue;
pub mod sync;
pub mod tiling;
pub mod timer;

pub use ash_native::{AshDevice, AshQueue};
pub use capabilities::Capabilities;
pub use coopvec::{CoopVecDataType, CoopVecDeviceFeatures, MatMulFormatCombo};
pub use device::{Device, DeviceDesc, SamplerFeedbackTexture};
pub use heap::{Heap, HeapDesc, HeapType};
pub use message::{LogMessageCallback, MessageCallback, MessageSeverity};
pub use native::{DebugNaming, NativeDevice, NativeQueue, SparseImageInfo};
pub use negotiate::{DeviceContext, DeviceFeatures, DeviceProperties};
pub use query::{Feature, Format, FormatSupport, VariableRateShadingFeatureInfo, WaveLaneCountMinMaxFeatureInfo};
pub use queue::{CommandList, Queue, QueueKind, SubmissionRecord};
pub use sync::TrackingSemaphore;
pub use tiling::{PackedMipDesc, SparseTexture, SubresourceTiling, TextureTiling, TileShape};
pub use timer::TimerQuery;
