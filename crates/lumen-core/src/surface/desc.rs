use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        const ENABLE_VSYNC = 1 << 0;
        /// Allows `PresentFlags::ALLOW_TEARING` on later presents.
        const ALLOW_TEARING = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct PresentFlags: u32 {
        const ALLOW_TEARING = 1 << 0;
    }
}

/// Requested swapchain parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceDesc {
    /// Zero uses the context width.
    pub width: u32,
    /// Zero uses the context height.
    pub height: u32,
    /// Zero selects double buffering.
    pub buffer_count: u32,
    pub flags: SurfaceFlags,
    pub present_interval: u32,
    /// Backend-specific present mode, passed through untouched.
    pub present_mode: u32,
}

impl Default for SurfaceDesc {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            buffer_count: 0,
            flags: SurfaceFlags::ENABLE_VSYNC,
            present_interval: 1,
            present_mode: 0,
        }
    }
}

pub(crate) const DEFAULT_BUFFER_COUNT: u32 = 2;

/// Swapchain parameters after defaults are applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
    pub flags: SurfaceFlags,
    pub present_interval: u32,
    pub present_mode: u32,
}

impl SurfaceConfig {
    pub(crate) fn resolve(desc: &SurfaceDesc, context_size: (u32, u32)) -> Self {
        let pick = |v: u32, fallback: u32| if v == 0 { fallback } else { v };
        Self {
            width: pick(desc.width, context_size.0),
            height: pick(desc.height, context_size.1),
            buffer_count: pick(desc.buffer_count, DEFAULT_BUFFER_COUNT),
            flags: desc.flags,
            present_interval: desc.present_interval,
            present_mode: desc.present_mode,
        }
    }

    #[inline]
    pub fn allows_tearing(&self) -> bool {
        self.flags.contains(SurfaceFlags::ALLOW_TEARING)
    }
}
