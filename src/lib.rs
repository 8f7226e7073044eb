// vk-rhi-core - Vulkan hardware abstraction core
//
// Capability negotiation, typed memory heaps, per-queue submission tracking,
// sparse tiling and feature/format queries for a renderer sitting on top.

pub mod backend;
pub mod config;
pub mod errors;

pub use backend::{Device, DeviceDesc};
pub use errors::{Result, RhiError};
