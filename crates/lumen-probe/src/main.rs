use anyhow::{Context, Result};
use lumen_core::logging::{LoggingConfig, init_logging, log_device_summary};
use lumen_core::{AdapterInfo, Device, DeviceDesc, enumerate_adapters, run_self_test};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let adapters = enumerate_adapters().context("failed to enumerate adapters")?;
    println!("{} adapter(s)", adapters.len());
    for (i, adapter) in adapters.iter().enumerate() {
        print_adapter(i, adapter);
    }

    let desc = DeviceDesc::from_env()
        .with_context(|| format!("invalid {}/{}", DeviceDesc::BACKEND_VAR, DeviceDesc::ADAPTER_VAR))?;
    log::debug!("opening {desc:?}");
    let device = Device::create(desc.clone())
        .with_context(|| format!("failed to open {} adapter {}", desc.backend, desc.adapter_index))?;
    log_device_summary(&device);

    let caps = device.capabilities();
    println!();
    println!("{} device on '{}'", caps.backend, device.adapter().name);
    println!("  features          {:?}", caps.features);
    println!("  max buffer        {} bytes", caps.max_buffer_size);
    println!("  max texture       {}px", caps.max_texture_dimension);
    println!("  presentation      {}", caps.supports_presentation);
    println!("  hdr               {}", caps.supports_hdr);
    drop(device);

    let report = run_self_test().context("self test failed")?;
    println!();
    for (adapter, reason) in &report.skipped {
        println!("skipped '{adapter}': {reason}");
    }
    match report.covered_pixels {
        Some(pixels) => println!(
            "self test passed on {} '{}' ({pixels} pixels covered)",
            report.backend, report.adapter
        ),
        None => println!(
            "self test passed on {} '{}'",
            report.backend, report.adapter
        ),
    }
    Ok(())
}

fn print_adapter(index: usize, adapter: &AdapterInfo) {
    println!(
        "  [{index}] {:<8} {} (vendor {:#06x}, device {:#06x}, flags {:?})",
        adapter.backend.name(),
        adapter.name,
        adapter.vendor_id,
        adapter.device_id,
        adapter.flags
    );
    if adapter.dedicated_video_memory > 0 {
        println!(
            "        {} MiB dedicated",
            adapter.dedicated_video_memory / (1024 * 1024)
        );
    }
}
