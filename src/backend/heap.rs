// Heap allocator - typed memory heaps that resources are bound into
//
// A heap is one native allocation of exactly the requested capacity. The
// memory type is picked from the physical device's memory types by property
// flags only: any type with the required flags is accepted.

use ash::vk;
use std::sync::Arc;

use crate::errors::{Result, RhiError};

use super::capabilities::Capabilities;
use super::negotiate::DeviceContext;

/// Kind of memory backing a heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeapType {
    DeviceLocal,
    Upload,
    Readback,
}

impl HeapType {
    /// Memory property flags a memory type must have to back this heap.
    pub fn required_memory_properties(self) -> vk::MemoryPropertyFlags {
        match self {
            HeapType::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HeapType::Upload => vk::MemoryPropertyFlags::HOST_VISIBLE,
            HeapType::Readback => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
        }
    }
}

impl TryFrom<u32> for HeapType {
    type Error = RhiError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(HeapType::DeviceLocal),
            1 => Ok(HeapType::Upload),
            2 => Ok(HeapType::Readback),
            other => Err(RhiError::InvalidHeapType(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapDesc {
    pub heap_type: HeapType,
    pub capacity: u64,
    pub debug_name: String,
}

impl HeapDesc {
    pub fn new(heap_type: HeapType, capacity: u64) -> Self {
        Self {
            heap_type,
            capacity,
            debug_name: String::new(),
        }
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }
}

/// A typed region of GPU-visible memory.
///
/// A managed heap frees its memory when destroyed or dropped; an external
/// heap never does.
pub struct Heap {
    desc: HeapDesc,
    memory: vk::DeviceMemory,
    property_flags: vk::MemoryPropertyFlags,
    managed: bool,
    context: Option<Arc<DeviceContext>>,
}

impl Heap {
    /// Wraps memory allocated outside the core. It is never freed here.
    pub fn from_external(desc: HeapDesc, memory: vk::DeviceMemory) -> Self {
        Self {
            desc,
            memory,
            property_flags: vk::MemoryPropertyFlags::empty(),
            managed: false,
            context: None,
        }
    }

    pub fn desc(&self) -> &HeapDesc {
        &self.desc
    }

    pub fn capacity(&self) -> u64 {
        self.desc.capacity
    }

    pub fn heap_type(&self) -> HeapType {
        self.desc.heap_type
    }

    /// Property flags of the memory type the heap was allocated from.
    pub fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.property_flags
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Frees the backing allocation if the heap owns it. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.memory == vk::DeviceMemory::null() {
            return;
        }

        if self.managed {
            if let Some(context) = &self.context {
                context.native.free_memory(self.memory);
            }
        }
        self.memory = vk::DeviceMemory::null();
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("desc", &self.desc)
            .field("memory", &self.memory)
            .field("property_flags", &self.property_flags)
            .field("managed", &self.managed)
            .finish()
    }
}

/// Find the first memory type allowed by `type_filter` that has `properties`.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        let has_type = (type_filter & (1 << i)) != 0;
        let has_properties = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        has_type && has_properties
    })
}

/// Creates and destroys heaps for one device.
///
/// Not internally synchronized: allocate/free on one allocator must be
/// serialized by the caller.
pub struct HeapAllocator {
    context: Arc<DeviceContext>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl HeapAllocator {
    pub fn new(context: Arc<DeviceContext>) -> Self {
        let memory_properties = context.native.memory_properties();
        Self {
            context,
            memory_properties,
        }
    }

    pub fn create_heap(&self, desc: &HeapDesc) -> Result<Heap> {
        if desc.capacity == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "Heap {} has zero capacity",
                display_name(&desc.debug_name)
            )));
        }

        let required = desc.heap_type.required_memory_properties();

        // Heaps may hold acceleration structures, which need device addresses.
        let device_address = self.context.has(Capabilities::BUFFER_DEVICE_ADDRESS);

        let allocation = find_memory_type(&self.memory_properties, !0u32, required)
            .ok_or(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            .and_then(|type_index| {
                self.context
                    .native
                    .allocate_memory(desc.capacity, type_index, device_address)
                    .map(|memory| (memory, type_index))
            });

        let (memory, type_index) = match allocation {
            Ok(allocated) => allocated,
            Err(result) => {
                let error = RhiError::Allocation {
                    name: display_name(&desc.debug_name).to_string(),
                    result,
                };
                self.context.error(&error.to_string());
                return Err(error);
            }
        };

        self.context.name_memory(memory, &desc.debug_name);

        log::debug!(
            "Created {:?} heap {} ({} bytes, memory type {})",
            desc.heap_type,
            display_name(&desc.debug_name),
            desc.capacity,
            type_index
        );

        Ok(Heap {
            desc: desc.clone(),
            memory,
            property_flags: self.memory_properties.memory_types[type_index as usize].property_flags,
            managed: true,
            context: Some(self.context.clone()),
        })
    }

    /// Destroys `heap`, freeing its memory if the heap is managed.
    pub fn destroy_heap(&self, heap: &mut Heap) {
        heap.destroy();
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "<UNNAMED>"
    } else {
        name
    }
}
