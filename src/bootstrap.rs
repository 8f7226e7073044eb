// Vulkan bootstrap - instance, physical device and logical device
//
// Responsibilities:
// - Instance creation with validation layers
// - Physical device selection (prefer discrete GPU)
// - Logical device with every known extension the GPU offers
// - Graphics + dedicated compute/transfer queues
//
// The core never loads Vulkan itself; this is the one place that does.

use anyhow::{Context, Result};
use ash::{vk, Entry};
use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use vk_rhi_core::backend::{AshDevice, AshQueue, Capabilities, DeviceDesc, NativeQueue};
use vk_rhi_core::config::Config;

/// Extensions the known ones depend on, enabled when available.
const SUPPORT_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::deferred_host_operations::NAME];

#[derive(Clone, Copy, Debug)]
struct QueueFamilies {
    graphics: u32,
    compute: Option<u32>,
    transfer: Option<u32>,
}

/// Owns the native Vulkan objects the core runs on.
///
/// Must outlive every core object built from [`VulkanBootstrap::device_desc`].
pub struct VulkanBootstrap {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    entry: Entry,

    families: QueueFamilies,
    instance_extensions: Vec<String>,
    device_extensions: Vec<String>,
    buffer_device_address: bool,

    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanBootstrap {
    pub fn new(config: &Config) -> Result<Self> {
        log::info!("Bootstrapping Vulkan: {}", config.probe.app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Create instance with every known instance extension available
        let instance_extensions = Self::available_known_instance_extensions(&entry)?;
        let instance = Self::create_instance(
            &entry,
            &config.probe.app_name,
            &instance_extensions,
            config.debug.validation_layers,
        )?;

        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if config.debug.validation_layers
            && instance_extensions.iter().any(|e| e.as_str() == "VK_EXT_debug_utils")
        {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        // Step 4: Pick physical device (GPU)
        let (physical_device, families) = Self::pick_physical_device(&instance, config)?;

        // Step 5: Create logical device
        let device_extensions = Self::available_known_device_extensions(&instance, physical_device)?;
        let (device, buffer_device_address) = Self::create_logical_device(
            &instance,
            physical_device,
            families,
            &device_extensions,
            config.device.buffer_device_address,
        )?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::info!("Queue families: {:?}", families);

        Ok(Self {
            device,
            physical_device,
            instance,
            entry,
            families,
            instance_extensions,
            device_extensions,
            buffer_device_address,
            debug_utils,
        })
    }

    /// Native driver and queues, ready for `Device::new`.
    pub fn device_desc(&self, config: &Config) -> Result<DeviceDesc> {
        let enabled = Capabilities::from_extensions(
            &self.instance_extensions,
            &self.device_extensions,
            self.buffer_device_address,
        );
        let native = AshDevice::new(&self.entry, &self.instance, self.physical_device, &self.device, enabled);

        let mut desc = DeviceDesc::new(Arc::new(native)).with_config(&config.device);
        desc.instance_extensions = self.instance_extensions.clone();
        desc.device_extensions = self.device_extensions.clone();
        desc.buffer_device_address_supported = self.buffer_device_address;

        desc.graphics_queue = Some(self.queue(self.families.graphics)?);
        desc.compute_queue = self.families.compute.map(|f| self.queue(f)).transpose()?;
        desc.transfer_queue = self.families.transfer.map(|f| self.queue(f)).transpose()?;

        Ok(desc)
    }

    fn queue(&self, family_index: u32) -> Result<Arc<dyn NativeQueue>> {
        let queue = AshQueue::new(&self.device, family_index, 0)
            .with_context(|| format!("Failed to set up queue on family {}", family_index))?;
        Ok(Arc::new(queue))
    }

    fn available_known_instance_extensions(entry: &Entry) -> Result<Vec<String>> {
        let available = unsafe { entry.enumerate_instance_extension_properties(None) }
            .context("Failed to enumerate instance extensions")?;
        Ok(Self::filter_known(&available))
    }

    fn available_known_device_extensions(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<String>> {
        let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .context("Failed to enumerate device extensions")?;
        Ok(Self::filter_known(&available))
    }

    fn filter_known(available: &[vk::ExtensionProperties]) -> Vec<String> {
        let available: HashSet<String> = available
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        Capabilities::known_extension_names()
            .filter(|name| available.contains(*name))
            .map(str::to_string)
            .collect()
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        extensions: &[String],
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("vk-rhi-core")?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extension_names = to_cstrings(extensions)?;
        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|n| n.as_ptr()).collect();

        // Validation layers
        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        // Score each device
        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let props = unsafe { instance.get_physical_device_properties(device) };

            // Timeline semaphores need Vulkan 1.2
            if props.api_version < vk::API_VERSION_1_2 {
                continue;
            }

            let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };
            let Some(families) = Self::find_queue_families(&queue_families, config) else {
                continue;
            };

            // Score device (prefer discrete GPU)
            let score = match props.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                _ => 1,
            };

            if score > best_score {
                best_score = score;
                best_device = Some((device, families));
            }
        }

        best_device.ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
    }

    fn find_queue_families(families: &[vk::QueueFamilyProperties], config: &Config) -> Option<QueueFamilies> {
        let find = |wanted: vk::QueueFlags, excluded: vk::QueueFlags| {
            families
                .iter()
                .position(|f| f.queue_count > 0 && f.queue_flags.contains(wanted) && !f.queue_flags.intersects(excluded))
                .map(|i| i as u32)
        };

        let graphics = find(vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty())?;
        let compute = config
            .device
            .enable_compute_queue
            .then(|| find(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS))
            .flatten();
        let transfer = config
            .device
            .enable_copy_queue
            .then(|| find(vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE))
            .flatten();

        Some(QueueFamilies {
            graphics,
            compute,
            transfer,
        })
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        families: QueueFamilies,
        extensions: &[String],
        want_buffer_device_address: bool,
    ) -> Result<(ash::Device, bool)> {
        let queue_priorities = [1.0];
        let mut family_indices = vec![families.graphics];
        family_indices.extend(families.compute);
        family_indices.extend(families.transfer);

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = family_indices
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        // Known extensions plus whatever they depend on
        let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }?;
        let mut extension_names = to_cstrings(extensions)?;
        for support in SUPPORT_DEVICE_EXTENSIONS {
            if available
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *support)) {
                extension_names.push((*support).to_owned());
            }
        }
        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|n| n.as_ptr()).collect();

        // Check which Vulkan 1.2 features the GPU has
        let mut supported12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut supported = vk::PhysicalDeviceFeatures2::default().push_next(&mut supported12);
        unsafe { instance.get_physical_device_features2(physical_device, &mut supported) };
        let timeline_semaphore = supported12.timeline_semaphore == vk::TRUE;
        let buffer_device_address = want_buffer_device_address && supported12.buffer_device_address == vk::TRUE;

        if !timeline_semaphore {
            anyhow::bail!("GPU does not support timeline semaphores");
        }

        let mut enabled12 = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true)
            .buffer_device_address(buffer_device_address);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .push_next(&mut enabled12);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        Ok((device, buffer_device_address))
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanBootstrap {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn to_cstrings(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).with_context(|| format!("Invalid extension name {:?}", name)))
        .collect()
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
