//! Lumen core.
//!
//! Resource and frame lifecycle of a retained 2D vector renderer: devices and
//! adapters, contexts and their frame state machine, presentation surfaces,
//! draw recording, render buffers and fences, over pluggable backends.
//!
//! Ownership runs as a DAG. Every object holds a counted reference to what it
//! was created from, so teardown always proceeds
//! surface → renderer/resources → context → fence → device.
//!
//! ```no_run
//! use lumen_core::{Device, DeviceDesc, FillRule, FrameOptions};
//!
//! # fn main() -> lumen_core::Result<()> {
//! let device = Device::create(DeviceDesc::default())?;
//! let ctx = device.create_context(64, 64)?;
//! let mut renderer = ctx.create_renderer()?;
//! let mut path = ctx.create_path(FillRule::NonZero)?;
//! path.move_to(8.0, 8.0)?;
//! path.line_to(56.0, 8.0)?;
//! path.line_to(32.0, 56.0)?;
//! path.close();
//! let paint = ctx.create_paint()?;
//!
//! ctx.begin_frame(FrameOptions::default())?;
//! renderer.draw_path(&path, &paint)?;
//! ctx.end_frame()?;
//! ctx.submit()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod context;
pub mod coords;
pub mod device;
pub mod error;
pub mod fence;
pub mod handle;
pub mod logging;
pub mod paint;
pub mod render;
pub mod resource;
pub mod selftest;
pub mod surface;
pub mod time;

mod raster;

pub use backend::{AdapterInfo, BackendKind, Capabilities, DeviceFlags, FeatureFlags};
pub use context::{Context, FrameOptions, FramePhase};
pub use coords::{Mat2D, Rect, Vec2};
pub use device::{Device, DeviceDesc, adapter_count, enumerate_adapters};
pub use error::{Error, ErrorClass, Result, Status, clear_last_error, last_error_message};
pub use fence::Fence;
pub use paint::{BlendMode, FillRule, PaintStyle, StrokeCap, StrokeJoin};
pub use render::Renderer;
pub use resource::{
    BufferFlags, BufferType, Font, Image, ImageData, ImageSampler, MapFlags, Mapping, Paint,
    Path, RenderBuffer, Shader, TextStyle,
};
pub use selftest::{SelfTestReport, run_self_test};
pub use surface::{PresentFlags, Surface, SurfaceDesc, SurfaceFlags, SurfaceTarget};
