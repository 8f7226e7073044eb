//! Error Types
//!
//! Every fallible operation of the core returns [`Result<T>`]. Construction
//! failures are fatal for the device being built; everything else is handed
//! back to the caller, who keeps control.
//!
//! Device loss during [`Device::wait_for_idle`](crate::backend::Device::wait_for_idle)
//! is deliberately *not* an error: it is reported as `false`.

use ash::vk;
use thiserror::Error;

use crate::backend::queue::QueueKind;

/// The error type of the hardware abstraction core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RhiError {
    // ========================================================================
    // Fatal
    // ========================================================================
    /// A native object the device cannot live without failed to create.
    #[error("Failed to create {object}: {result}")]
    Construction {
        /// What was being created
        object: &'static str,
        /// The driver's result code
        result: vk::Result,
    },

    // ========================================================================
    // Recoverable
    // ========================================================================
    /// Heap memory could not be allocated.
    #[error("Failed to allocate memory for Heap {name}, VkResult = {result}")]
    Allocation {
        /// Debug name of the heap
        name: String,
        /// The driver's result code
        result: vk::Result,
    },

    /// The feature or operation is not available on this device.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// No native queue of this kind was supplied at construction.
    #[error("No {0:?} queue on this device")]
    QueueUnavailable(QueueKind),

    /// A raw heap type discriminant that names no heap type.
    #[error("Invalid heap type: {0}")]
    InvalidHeapType(u32),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A command list was used in the wrong recording state.
    #[error("Command list state: {0}")]
    CommandListState(&'static str),

    /// A fixed-size pool ran out of slots.
    #[error("Out of {0}")]
    Exhausted(&'static str),

    /// Any other native call that failed.
    #[error("{context} failed: {result}")]
    Vulkan {
        context: &'static str,
        result: vk::Result,
    },
}

impl RhiError {
    /// Wraps a native result code with the name of the call that produced it.
    pub fn vulkan(context: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Vulkan { context, result }
    }
}

/// Alias for `std::result::Result<T, RhiError>`.
pub type Result<T> = std::result::Result<T, RhiError>;
