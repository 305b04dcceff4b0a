//! End-to-end smoke run.
//!
//! Renders a gradient triangle on each hardware adapter in turn and stops at
//! the first that works. When none does, the run falls back to the null
//! device and checks the rasterized pixels.

use std::time::Duration;

use crate::backend::{AdapterInfo, BackendKind, null_adapter};
use crate::context::{Context, FrameOptions};
use crate::coords::Vec2;
use crate::device::{Device, DeviceDesc, enumerate_adapters};
use crate::error::{Error, Recorded, Result};
use crate::paint::FillRule;

const SIZE: u32 = 128;
const FENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a successful self test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub backend: BackendKind,
    pub adapter: String,
    /// Pixels covered by the triangle; only known on the null backend.
    pub covered_pixels: Option<usize>,
    /// Adapters tried before this one, with their failure.
    pub skipped: Vec<(String, String)>,
}

pub fn run_self_test() -> Result<SelfTestReport> {
    run().recorded()
}

fn run() -> Result<SelfTestReport> {
    let mut skipped = Vec::new();
    for (info, desc) in hardware_candidates(&enumerate_adapters()?) {
        match exercise(desc) {
            Ok(covered_pixels) => {
                log::info!("self test passed on {} '{}'", info.backend, info.name);
                return Ok(SelfTestReport {
                    backend: info.backend,
                    adapter: info.name,
                    covered_pixels,
                    skipped,
                });
            }
            Err(e) => {
                log::warn!("self test failed on {} '{}': {e}", info.backend, info.name);
                skipped.push((info.name, e.to_string()));
            }
        }
    }

    let covered_pixels = exercise(DeviceDesc::default())?;
    log::info!("self test passed on the null device");
    Ok(SelfTestReport {
        backend: BackendKind::Null,
        adapter: null_adapter().name,
        covered_pixels,
        skipped,
    })
}

/// Non-null adapters with the per-backend index that opens them.
fn hardware_candidates(adapters: &[AdapterInfo]) -> Vec<(AdapterInfo, DeviceDesc)> {
    let mut out: Vec<(AdapterInfo, DeviceDesc)> = Vec::new();
    for info in adapters.iter().filter(|a| a.backend != BackendKind::Null) {
        let index = out.iter().filter(|(a, _)| a.backend == info.backend).count();
        out.push((info.clone(), DeviceDesc::new(info.backend).with_adapter(index)));
    }
    out
}

fn exercise(desc: DeviceDesc) -> Result<Option<usize>> {
    let device = Device::create(desc)?;
    let ctx = device.create_context(SIZE, SIZE)?;
    let fence = device.create_fence()?;
    draw_triangle(&ctx)?;
    let value = ctx.signal(&fence, 0)?;
    fence.wait(value, Some(FENCE_TIMEOUT))?;

    if device.backend_kind() != BackendKind::Null {
        return Ok(None);
    }
    let mut pixels = vec![0u8; (SIZE * SIZE * 4) as usize];
    ctx.copy_cpu_framebuffer(&mut pixels)?;
    let covered = pixels.chunks_exact(4).filter(|px| px[3] != 0).count();
    if covered == 0 {
        return Err(Error::internal("self test triangle rendered no pixels"));
    }
    Ok(Some(covered))
}

fn draw_triangle(ctx: &Context) -> Result<()> {
    let size = SIZE as f32;
    let mut path = ctx.create_path(FillRule::NonZero)?;
    path.move_to(size * 0.5, size * 0.1)?;
    path.line_to(size * 0.9, size * 0.9)?;
    path.line_to(size * 0.1, size * 0.9)?;
    path.close();

    let shader = ctx.linear_gradient(
        Vec2::new(0.0, 0.0),
        Vec2::new(size, size),
        &[0xFFFF_0000, 0xFF00_00FF],
        &[0.0, 1.0],
    )?;
    let mut paint = ctx.create_paint()?;
    paint.set_shader(&shader)?;

    let mut renderer = ctx.create_renderer()?;
    ctx.begin_frame(FrameOptions::default())?;
    renderer.draw_path(&path, &paint)?;
    ctx.end_frame()?;
    ctx.submit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_number_adapters_per_backend() {
        let adapter = |backend, name: &str| AdapterInfo {
            backend,
            name: name.into(),
            ..AdapterInfo::default()
        };
        let list = [
            adapter(BackendKind::Null, "null"),
            adapter(BackendKind::WebGpu, "a"),
            adapter(BackendKind::Vulkan, "b"),
            adapter(BackendKind::WebGpu, "c"),
        ];
        let got: Vec<(String, usize)> = hardware_candidates(&list)
            .into_iter()
            .map(|(a, d)| (a.name, d.adapter_index))
            .collect();
        assert_eq!(got, vec![("a".into(), 0), ("b".into(), 0), ("c".into(), 1)]);
    }

    #[test]
    fn null_run_covers_the_triangle() {
        let covered = exercise(DeviceDesc::default()).unwrap().unwrap();
        // Roughly half of the 102x102 triangle box.
        assert!(covered > 4000 && covered < 6500, "covered {covered}");
    }
}
