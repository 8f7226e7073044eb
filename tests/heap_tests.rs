//! Heap allocator tests
//!
//! Tests for:
//! - Heap type to memory property mapping
//! - Exact-capacity allocation and device-address allocation
//! - Allocation failure reporting (debug name + VkResult)
//! - Destroy semantics: managed vs external, idempotence
//! - Debug naming and memory binding

mod common;

use ash::vk::{self, Handle};
use std::sync::atomic::Ordering;

use common::{FakeDevice, TestDevice};
use vk_rhi_core::backend::{DebugNaming, Heap, HeapDesc, HeapType, MessageSeverity};
use vk_rhi_core::RhiError;

const MIB: u64 = 1_048_576;

// ============================================================================
// Creation
// ============================================================================

#[test]
fn upload_heap_is_host_visible_with_exact_capacity() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);

    let heap = test
        .device
        .create_heap(&HeapDesc::new(HeapType::Upload, MIB))
        .unwrap();

    assert_eq!(heap.capacity(), MIB);
    assert!(heap.is_managed());
    assert!(heap
        .memory_properties()
        .contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
    assert_eq!(test.native.log.lock().allocations, vec![(MIB, 1, false)]);
}

#[test]
fn heap_types_pick_matching_memory() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);

    let device_local = test
        .device
        .create_heap(&HeapDesc::new(HeapType::DeviceLocal, 4096))
        .unwrap();
    let readback = test
        .device
        .create_heap(&HeapDesc::new(HeapType::Readback, 4096))
        .unwrap();

    assert!(device_local
        .memory_properties()
        .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
    assert!(readback
        .memory_properties()
        .contains(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED));
}

#[test]
fn invalid_heap_type_never_allocates() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);

    let result = HeapType::try_from(42u32).and_then(|heap_type| test.device.create_heap(&HeapDesc::new(heap_type, MIB)));

    assert_eq!(result.err(), Some(RhiError::InvalidHeapType(42)));
    assert!(test.native.log.lock().allocations.is_empty());
}

#[test]
fn zero_capacity_is_rejected() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);
    assert!(matches!(
        test.device.create_heap(&HeapDesc::new(HeapType::Upload, 0)),
        Err(RhiError::InvalidArgument(_))
    ));
    assert!(test.native.log.lock().allocations.is_empty());
}

#[test]
fn device_address_follows_the_capability() {
    let test = TestDevice::with(FakeDevice::standard(), |desc| {
        desc.buffer_device_address_supported = true;
    });

    test.device
        .create_heap(&HeapDesc::new(HeapType::DeviceLocal, MIB))
        .unwrap();
    assert_eq!(test.native.log.lock().allocations, vec![(MIB, 0, true)]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn allocation_failure_reports_name_and_code() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);
    test.native.fail_allocation.store(true, Ordering::Relaxed);

    let result = test
        .device
        .create_heap(&HeapDesc::new(HeapType::DeviceLocal, MIB).with_debug_name("shadow atlas"));

    assert_eq!(
        result.err(),
        Some(RhiError::Allocation {
            name: "shadow atlas".to_string(),
            result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        })
    );

    let errors: Vec<String> = test
        .messages
        .messages()
        .into_iter()
        .filter(|(severity, _)| *severity == MessageSeverity::Error)
        .map(|(_, text)| text)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("shadow atlas"));
    assert!(errors[0].contains("ERROR_OUT_OF_DEVICE_MEMORY"));
}

#[test]
fn missing_memory_type_is_an_allocation_failure() {
    let test = TestDevice::new(
        FakeDevice {
            memory_types: vec![vk::MemoryPropertyFlags::DEVICE_LOCAL],
            ..FakeDevice::standard()
        },
        &[],
    );

    let result = test.device.create_heap(&HeapDesc::new(HeapType::Readback, MIB));

    assert!(matches!(result, Err(RhiError::Allocation { .. })));
    assert!(test.native.log.lock().allocations.is_empty());
}

// ============================================================================
// Destruction
// ============================================================================

#[test]
fn destroy_frees_managed_memory_once() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);
    let mut heap = test
        .device
        .create_heap(&HeapDesc::new(HeapType::Upload, MIB))
        .unwrap();
    let memory = heap.memory();

    test.device.destroy_heap(&mut heap);
    test.device.destroy_heap(&mut heap);
    drop(heap);

    assert_eq!(test.native.log.lock().freed, vec![memory]);
}

#[test]
fn dropping_a_heap_frees_it() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);
    let heap = test
        .device
        .create_heap(&HeapDesc::new(HeapType::Upload, MIB))
        .unwrap();
    let memory = heap.memory();
    drop(heap);

    assert_eq!(test.native.log.lock().freed, vec![memory]);
}

#[test]
fn external_memory_is_never_freed() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);
    let mut heap = Heap::from_external(
        HeapDesc::new(HeapType::DeviceLocal, MIB),
        vk::DeviceMemory::from_raw(0xBEEF),
    );

    test.device
        .bind_buffer_memory(vk::Buffer::from_raw(7), &heap, 0)
        .unwrap();
    test.device.destroy_heap(&mut heap);

    assert!(test.native.log.lock().freed.is_empty());
}

// ============================================================================
// Naming and binding
// ============================================================================

#[test]
fn debug_names_prefer_debug_utils() {
    let utils = TestDevice::with(FakeDevice::standard(), |desc| {
        desc.instance_extensions = vec!["VK_EXT_debug_utils".to_string()];
        desc.device_extensions = vec!["VK_EXT_debug_marker".to_string()];
    });
    let heap = utils
        .device
        .create_heap(&HeapDesc::new(HeapType::Upload, MIB).with_debug_name("staging"))
        .unwrap();
    assert_eq!(
        utils.native.log.lock().names,
        vec![(heap.memory(), "staging".to_string(), DebugNaming::Utils)]
    );

    let marker = TestDevice::new(FakeDevice::standard(), &["VK_EXT_debug_marker"]);
    marker
        .device
        .create_heap(&HeapDesc::new(HeapType::Upload, MIB).with_debug_name("staging"))
        .unwrap();
    assert_eq!(marker.native.log.lock().names[0].2, DebugNaming::Marker);

    let none = TestDevice::new(FakeDevice::standard(), &[]);
    none.device
        .create_heap(&HeapDesc::new(HeapType::Upload, MIB).with_debug_name("staging"))
        .unwrap();
    assert!(none.native.log.lock().names.is_empty());
}

#[test]
fn bind_offsets_must_fall_inside_the_heap() {
    let test = TestDevice::new(FakeDevice::standard(), &[]);
    let heap = test
        .device
        .create_heap(&HeapDesc::new(HeapType::DeviceLocal, 4096))
        .unwrap();

    test.device
        .bind_image_memory(vk::Image::from_raw(3), &heap, 1024)
        .unwrap();
    assert!(matches!(
        test.device.bind_image_memory(vk::Image::from_raw(4), &heap, 4096),
        Err(RhiError::InvalidArgument(_))
    ));
    assert_eq!(
        test.native.log.lock().image_binds,
        vec![(vk::Image::from_raw(3), heap.memory(), 1024)]
    );
}
