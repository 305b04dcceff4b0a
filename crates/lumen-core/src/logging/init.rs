use std::sync::Once;

use crate::backend::FeatureFlags;
use crate::device::Device;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "warn",
/// "lumen_core=debug,wgpu=warn"). Without it, `RUST_LOG` is consulted and
/// then `default_level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture.
    pub is_test: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Debug output from this crate, captured per test.
    pub fn for_tests() -> Self {
        Self {
            default_level: log::LevelFilter::Debug,
            is_test: true,
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(config.default_level);
        }

        builder.write_style(config.write_style);
        builder.is_test(config.is_test);

        // Another logger may already be installed by the host.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

/// Logs the adapter and capability record of `device` at info level.
pub fn log_device_summary(device: &Device) {
    let adapter = device.adapter();
    let caps = device.capabilities();
    log::info!(
        "{} adapter '{}' (vendor {:#06x}, device {:#06x}, rev {})",
        adapter.backend,
        adapter.name,
        adapter.vendor_id,
        adapter.device_id,
        adapter.revision
    );
    log::info!(
        "  buffers up to {} bytes, textures up to {}px x {} layers, anisotropy {}",
        caps.max_buffer_size,
        caps.max_texture_dimension,
        caps.max_texture_array_layers,
        caps.max_sampler_anisotropy
    );
    for (name, flag) in FeatureFlags::all().iter_names() {
        log::debug!("  {name}: {}", caps.supports(flag));
    }
    log::info!(
        "  presentation {}, hdr {}",
        caps.supports_presentation,
        caps.supports_hdr
    );
}
