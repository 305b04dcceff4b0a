use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::Error;

/// Backend family a device runs on.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BackendKind {
    #[default]
    Unknown = 0,
    Null = 1,
    Metal = 2,
    Vulkan = 3,
    D3d12 = 4,
    D3d11 = 5,
    OpenGl = 6,
    WebGpu = 7,
}

impl BackendKind {
    pub const ALL: [BackendKind; 8] = [
        BackendKind::Unknown,
        BackendKind::Null,
        BackendKind::Metal,
        BackendKind::Vulkan,
        BackendKind::D3d12,
        BackendKind::D3d11,
        BackendKind::OpenGl,
        BackendKind::WebGpu,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Unknown => "unknown",
            BackendKind::Null => "null",
            BackendKind::Metal => "metal",
            BackendKind::Vulkan => "vulkan",
            BackendKind::D3d12 => "d3d12",
            BackendKind::D3d11 => "d3d11",
            BackendKind::OpenGl => "opengl",
            BackendKind::WebGpu => "webgpu",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "null" | "headless" => BackendKind::Null,
            "metal" => BackendKind::Metal,
            "vulkan" | "vk" => BackendKind::Vulkan,
            "d3d12" | "dx12" => BackendKind::D3d12,
            "d3d11" | "dx11" => BackendKind::D3d11,
            "opengl" | "gl" => BackendKind::OpenGl,
            "webgpu" | "wgpu" => BackendKind::WebGpu,
            other => {
                return Err(Error::invalid_parameter(format!("unknown backend '{other}'")));
            }
        };
        Ok(kind)
    }
}

bitflags! {
    /// Device creation flags, also reported per adapter.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct DeviceFlags: u32 {
        const VALIDATION    = 1 << 0;
        const DEBUG_MARKERS = 1 << 1;
        const DIAGNOSTICS   = 1 << 2;
        const HEADLESS      = 1 << 3;
    }
}

bitflags! {
    /// Optional rendering features a backend may expose.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct FeatureFlags: u32 {
        const RASTER_ORDERING         = 1 << 0;
        const ATOMIC_PATH_RENDERING   = 1 << 1;
        const CLOCKWISE_FILL          = 1 << 2;
        const ADVANCED_BLEND          = 1 << 3;
        const ADVANCED_BLEND_COHERENT = 1 << 4;
        const CLIP_PLANES             = 1 << 5;
        const BOTTOM_UP_FRAMEBUFFER   = 1 << 6;
        const HEADLESS_SUPPORTED      = 1 << 7;
    }
}

/// Capability record of an opened device. Queried once and cached.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Capabilities {
    pub backend: BackendKind,
    pub features: FeatureFlags,
    pub max_buffer_size: u64,
    pub max_texture_dimension: u32,
    pub max_texture_array_layers: u32,
    pub max_sampler_anisotropy: f32,
    pub supports_hdr: bool,
    pub supports_presentation: bool,
}

impl Capabilities {
    #[inline]
    pub fn supports(&self, features: FeatureFlags) -> bool {
        self.features.contains(features)
    }
}

/// One physical or virtual adapter as reported by a backend provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterInfo {
    pub backend: BackendKind,
    pub vendor_id: u32,
    pub device_id: u32,
    pub subsys_id: u32,
    pub revision: u32,
    pub dedicated_video_memory: u64,
    pub shared_system_memory: u64,
    pub flags: DeviceFlags,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse_back() {
        for kind in BackendKind::ALL.into_iter().skip(1) {
            assert_eq!(kind.name().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!("WGPU".parse::<BackendKind>().unwrap(), BackendKind::WebGpu);
        assert!("glide".parse::<BackendKind>().is_err());
    }

    #[test]
    fn feature_bits_match_native_layout() {
        assert_eq!(FeatureFlags::CLOCKWISE_FILL.bits(), 4);
        assert_eq!(FeatureFlags::HEADLESS_SUPPORTED.bits(), 128);
        assert_eq!(DeviceFlags::HEADLESS.bits(), 8);
    }
}
