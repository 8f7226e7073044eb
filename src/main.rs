// =============================================================================
// RHI PROBE - Boot a real Vulkan device and report what the core negotiated
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  rhi-probe                                                      │
// │    └── VulkanBootstrap (instance, GPU choice, logical device)   │
// │          └── vk_rhi_core::Device (through AshDevice/AshQueue)   │
// │                ├── Capability negotiation                       │
// │                ├── Heaps                                        │
// │                └── Queue submission / retirement                │
// └─────────────────────────────────────────────────────────────────┘
//
// PROBE FLOW:
// 1. Load config, init logging
// 2. Bootstrap Vulkan
// 3. Build the core device
// 4. Report capabilities, features, formats, queues
// 5. Create and destroy an upload heap
// 6. Submit an empty batch per queue, retire, wait for idle
//
// =============================================================================

mod bootstrap;

use anyhow::{Context, Result};
use std::sync::Arc;

use bootstrap::VulkanBootstrap;
use vk_rhi_core::backend::{Device, Feature, HeapDesc, HeapType, QueueKind};
use vk_rhi_core::config::Config;

/// Features reported by the probe, in display order
const REPORTED_FEATURES: &[Feature] = &[
    Feature::DeferredCommandLists,
    Feature::ComputeQueue,
    Feature::CopyQueue,
    Feature::RayTracingAccelStruct,
    Feature::RayTracingPipeline,
    Feature::RayTracingOpacityMicromap,
    Feature::RayQuery,
    Feature::ShaderExecutionReordering,
    Feature::RayTracingClusters,
    Feature::Meshlets,
    Feature::VariableRateShading,
    Feature::ConservativeRasterization,
    Feature::VirtualResources,
    Feature::WaveLaneCountMinMax,
    Feature::CooperativeVectorInferencing,
    Feature::CooperativeVectorTraining,
    Feature::SamplerFeedback,
];

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from rhi.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config);
    log::info!("Starting rhi-probe");

    // Native objects must outlive everything the core builds on them,
    // so the probe runs in its own scope.
    let bootstrap = VulkanBootstrap::new(&config)?;
    run_probe(&bootstrap, &config)?;
    bootstrap.wait_idle()?;

    log::info!("Probe finished");
    Ok(())
}

/// Initialize logging; RUST_LOG overrides the configured level
fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::new();
    builder.filter_level(config.log_level());
    builder.parse_default_env();
    builder.init();
}

// =============================================================================
// PROBE
// =============================================================================

fn run_probe(bootstrap: &VulkanBootstrap, config: &Config) -> Result<()> {
    let desc = bootstrap.device_desc(config)?;
    let device = Device::new(desc).context("Failed to create the RHI device")?;

    report_capabilities(&device);
    report_formats(&device, config);
    report_queues(&device);

    exercise_heaps(&device, config)?;
    exercise_queues(&device)?;

    if !device.wait_for_idle() {
        anyhow::bail!("Device lost while waiting for idle");
    }
    Ok(())
}

fn report_capabilities(device: &Arc<Device>) {
    log::info!("Capabilities: {:?}", device.capabilities());

    let properties = device.properties();
    log::info!(
        "Subgroup size: {}, max memory allocations: {}",
        properties.subgroup.subgroup_size,
        properties.core.limits.max_memory_allocation_count
    );

    for &feature in REPORTED_FEATURES {
        match device.query_feature_support(feature, None) {
            Ok(supported) => log::info!("  {:<32} {}", format!("{:?}", feature), supported),
            Err(e) => log::warn!("  {:<32} query failed: {}", format!("{:?}", feature), e),
        }
    }

    let coop_vec = device.query_coop_vec_features();
    if !coop_vec.mat_mul_formats.is_empty() {
        log::info!(
            "Cooperative vector: {} matmul combos, training fp16={} fp32={}",
            coop_vec.mat_mul_formats.len(),
            coop_vec.training_float16,
            coop_vec.training_float32
        );
    }
}

fn report_formats(device: &Arc<Device>, config: &Config) {
    for &format in &config.probe.formats {
        log::info!("  {:<16} {:?}", format!("{:?}", format), device.query_format_support(format));
    }
}

fn report_queues(device: &Arc<Device>) {
    for kind in QueueKind::ALL {
        match device.queue_family_index(kind) {
            Some(family) => log::info!("{:?} queue: family {}", kind, family),
            None => log::info!("{:?} queue: not present", kind),
        }
    }
}

fn exercise_heaps(device: &Arc<Device>, config: &Config) -> Result<()> {
    let desc = HeapDesc::new(HeapType::Upload, config.probe.upload_heap_size).with_debug_name("probe upload heap");
    let mut heap = device.create_heap(&desc).context("Failed to create the probe heap")?;
    log::info!(
        "Upload heap: {} bytes, memory properties {:?}",
        heap.capacity(),
        heap.memory_properties()
    );
    device.destroy_heap(&mut heap);
    Ok(())
}

fn exercise_queues(device: &Arc<Device>) -> Result<()> {
    for kind in QueueKind::ALL {
        let Some(mut list) = device.create_command_list(kind) else {
            continue;
        };

        list.open()?;
        list.close()?;
        let submission_id = device.execute_command_lists(&mut [&mut list], kind)?;
        log::info!("{:?} queue: submitted batch {}", kind, submission_id);
    }

    if !device.wait_for_idle() {
        anyhow::bail!("Device lost while waiting for idle");
    }
    let retired = device.run_garbage_collection()?;
    log::info!("Retired {} batches", retired);
    Ok(())
}
