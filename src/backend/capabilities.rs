// Capability table - extension names to capability flags
//
// Pure data. The negotiator walks the enabled extension lists once and ORs in
// whatever flag the table associates with each name. Names the table does not
// know are dropped.

use bitflags::bitflags;

bitflags! {
    /// Optional hardware capabilities active for one device instance.
    ///
    /// Fixed at device construction and never modified afterwards.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const CONSERVATIVE_RASTERIZATION       = 1 << 0;
        const DEBUG_MARKER                     = 1 << 1;
        const DEBUG_REPORT                     = 1 << 2;
        const DEBUG_UTILS                      = 1 << 3;
        const OPACITY_MICROMAP                 = 1 << 4;
        const ACCELERATION_STRUCTURE           = 1 << 5;
        const BUFFER_DEVICE_ADDRESS            = 1 << 6;
        const FRAGMENT_SHADING_RATE            = 1 << 7;
        const MAINTENANCE1                     = 1 << 8;
        const RAY_QUERY                        = 1 << 9;
        const RAY_TRACING_PIPELINE             = 1 << 10;
        const SYNCHRONIZATION2                 = 1 << 11;
        const MESH_SHADER                      = 1 << 12;
        const RAY_TRACING_INVOCATION_REORDER   = 1 << 13;
        const CLUSTER_ACCELERATION_STRUCTURE   = 1 << 14;
        const MUTABLE_DESCRIPTOR_TYPE          = 1 << 15;
        const COOPERATIVE_VECTOR               = 1 << 16;
        const DEVICE_DIAGNOSTIC_CHECKPOINTS    = 1 << 17;
        const DEVICE_DIAGNOSTICS_CONFIG        = 1 << 18;
    }
}

/// Extension name to capability flag.
pub const CAPABILITY_TABLE: &[(&str, Capabilities)] = &[
    ("VK_EXT_conservative_rasterization", Capabilities::CONSERVATIVE_RASTERIZATION),
    ("VK_EXT_debug_marker", Capabilities::DEBUG_MARKER),
    ("VK_EXT_debug_report", Capabilities::DEBUG_REPORT),
    ("VK_EXT_debug_utils", Capabilities::DEBUG_UTILS),
    ("VK_EXT_opacity_micromap", Capabilities::OPACITY_MICROMAP),
    ("VK_KHR_acceleration_structure", Capabilities::ACCELERATION_STRUCTURE),
    ("VK_KHR_buffer_device_address", Capabilities::BUFFER_DEVICE_ADDRESS),
    ("VK_KHR_fragment_shading_rate", Capabilities::FRAGMENT_SHADING_RATE),
    ("VK_KHR_maintenance1", Capabilities::MAINTENANCE1),
    ("VK_KHR_ray_query", Capabilities::RAY_QUERY),
    ("VK_KHR_ray_tracing_pipeline", Capabilities::RAY_TRACING_PIPELINE),
    ("VK_KHR_synchronization2", Capabilities::SYNCHRONIZATION2),
    ("VK_NV_mesh_shader", Capabilities::MESH_SHADER),
    ("VK_NV_ray_tracing_invocation_reorder", Capabilities::RAY_TRACING_INVOCATION_REORDER),
    ("VK_NV_cluster_acceleration_structure", Capabilities::CLUSTER_ACCELERATION_STRUCTURE),
    ("VK_EXT_mutable_descriptor_type", Capabilities::MUTABLE_DESCRIPTOR_TYPE),
    ("VK_NV_cooperative_vector", Capabilities::COOPERATIVE_VECTOR),
    ("VK_NV_device_diagnostic_checkpoints", Capabilities::DEVICE_DIAGNOSTIC_CHECKPOINTS),
    ("VK_NV_device_diagnostics_config", Capabilities::DEVICE_DIAGNOSTICS_CONFIG),
];

/// Looks up a single extension name.
pub fn capability_for(name: &str) -> Option<Capabilities> {
    CAPABILITY_TABLE
        .iter()
        .find(|(known, _)| *known == name)
        .map(|&(_, flag)| flag)
}

impl Capabilities {
    /// Builds the capability set from the enabled instance and device extension lists.
    ///
    /// `buffer_device_address` forces [`Capabilities::BUFFER_DEVICE_ADDRESS`]
    /// on: Vulkan 1.2 enables device addresses as a core feature rather than
    /// through the extension string.
    pub fn from_extensions<I, D>(instance_extensions: I, device_extensions: D, buffer_device_address: bool) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let mut caps = Capabilities::empty();
        let mut enable = |name: &str| match capability_for(name) {
            Some(flag) => caps |= flag,
            None => log::debug!("Ignoring unrecognized extension '{}'", name),
        };

        for name in instance_extensions {
            enable(name.as_ref());
        }
        for name in device_extensions {
            enable(name.as_ref());
        }

        if buffer_device_address {
            caps |= Capabilities::BUFFER_DEVICE_ADDRESS;
        }

        caps
    }

    /// Every extension name the table knows about.
    pub fn known_extension_names() -> impl Iterator<Item = &'static str> {
        CAPABILITY_TABLE.iter().map(|&(name, _)| name)
    }
}
