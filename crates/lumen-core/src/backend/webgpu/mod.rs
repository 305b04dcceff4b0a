//! wgpu backend.
//!
//! Adapters, devices, buffers, images and fence completion are real wgpu
//! objects. Frames are rasterized on the CPU and uploaded into the context's
//! GPU target texture at submit. This backend does not present.

mod backend;
mod provider;

pub use backend::WgpuBackend;
pub use provider::WgpuProvider;
