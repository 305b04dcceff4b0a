//! Backend contract enforcement, driven through a provider that misbehaves on purpose.

use std::sync::Arc;
use std::time::Duration;

use lumen_core::backend::{
    AdapterInfo, Backend, BackendKind, BackendProvider, Capabilities, DeviceFlags, FrameBatch,
    FrameInfo, NullBackend, RawHandle, null_adapter,
};
use lumen_core::handle::ResourceKind;
use lumen_core::paint::Gradient;
use lumen_core::resource::ImageData;
use lumen_core::{
    BufferFlags, BufferType, Device, DeviceDesc, FillRule, FrameOptions, MapFlags, Result,
    Status, Vec2,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Fault {
    NullHandles,
    DropSignals,
    LoseOnSubmit,
    PollFails,
}

struct FaultyProvider(Fault);

impl BackendProvider for FaultyProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Vulkan
    }

    fn enumerate_adapters(&self, out: &mut [AdapterInfo]) -> Result<usize> {
        if let Some(slot) = out.first_mut() {
            *slot = AdapterInfo {
                backend: BackendKind::Vulkan,
                name: "Faulty Adapter".to_owned(),
                ..null_adapter()
            };
        }
        Ok(1)
    }

    fn open(&self, _adapter_index: usize, _flags: DeviceFlags) -> Result<Arc<dyn Backend>> {
        Ok(Arc::new(FaultyBackend {
            fault: self.0,
            inner: NullBackend::new()?,
        }))
    }
}

struct FaultyBackend {
    fault: Fault,
    inner: NullBackend,
}

impl FaultyBackend {
    fn created(&self, create: impl FnOnce(&NullBackend) -> Result<RawHandle>) -> Result<RawHandle> {
        if self.fault == Fault::NullHandles {
            return Ok(RawHandle::NULL);
        }
        create(&self.inner)
    }
}

impl Backend for FaultyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vulkan
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BackendKind::Vulkan,
            ..self.inner.capabilities()
        }
    }

    fn create_context(&self, width: u32, height: u32) -> Result<RawHandle> {
        self.inner.create_context(width, height)
    }

    fn resize_context(&self, context: RawHandle, width: u32, height: u32) -> Result<()> {
        self.inner.resize_context(context, width, height)
    }

    fn release_context(&self, context: RawHandle) {
        self.inner.release_context(context)
    }

    fn begin_frame(&self, context: RawHandle, frame: &FrameInfo) -> Result<()> {
        self.inner.begin_frame(context, frame)
    }

    fn end_frame(&self, context: RawHandle) -> Result<()> {
        self.inner.end_frame(context)
    }

    fn submit(&self, context: RawHandle, batch: FrameBatch) -> Result<()> {
        if self.fault == Fault::LoseOnSubmit {
            return Err(lumen_core::Error::DeviceLost("gpu reset".to_owned()));
        }
        self.inner.submit(context, batch)
    }

    fn read_framebuffer(&self, context: RawHandle, dst: &mut [u8]) -> Result<()> {
        self.inner.read_framebuffer(context, dst)
    }

    fn create_fence(&self) -> Result<RawHandle> {
        if self.fault == Fault::NullHandles {
            return Ok(RawHandle::NULL);
        }
        self.inner.create_fence()
    }

    fn release_fence(&self, fence: RawHandle) {
        self.inner.release_fence(fence)
    }

    fn signal_fence(&self, context: RawHandle, fence: RawHandle, value: u64) -> Result<()> {
        if self.fault == Fault::DropSignals {
            return Ok(());
        }
        self.inner.signal_fence(context, fence, value)
    }

    fn fence_completed_value(&self, fence: RawHandle) -> Result<u64> {
        self.inner.fence_completed_value(fence)
    }

    fn wait_fence(&self, fence: RawHandle, value: u64, timeout: Option<Duration>) -> Result<bool> {
        self.inner.wait_fence(fence, value, timeout)
    }

    fn create_buffer(
        &self,
        context: RawHandle,
        ty: BufferType,
        flags: BufferFlags,
        size: usize,
    ) -> Result<RawHandle> {
        if self.fault == Fault::NullHandles {
            return Ok(RawHandle::NULL);
        }
        self.inner.create_buffer(context, ty, flags, size)
    }

    fn release_buffer(&self, buffer: RawHandle) {
        self.inner.release_buffer(buffer)
    }

    fn write_buffer(&self, buffer: RawHandle, offset: usize, data: &[u8]) -> Result<()> {
        self.inner.write_buffer(buffer, offset, data)
    }

    fn map_buffer(&self, buffer: RawHandle, flags: MapFlags) -> Result<Vec<u8>> {
        self.inner.map_buffer(buffer, flags)
    }

    fn unmap_buffer(&self, buffer: RawHandle, staging: &[u8], written: usize) -> Result<()> {
        self.inner.unmap_buffer(buffer, staging, written)
    }

    fn create_image(&self, context: RawHandle, image: &Arc<ImageData>) -> Result<RawHandle> {
        self.inner.create_image(context, image)
    }

    fn release_image(&self, image: RawHandle) {
        self.inner.release_image(image)
    }

    fn poll(&self) -> Result<()> {
        if self.fault == Fault::PollFails {
            return Err(lumen_core::Error::Unsupported("poll".to_owned()));
        }
        self.inner.poll()
    }

    fn create_renderer(&self, context: RawHandle) -> Result<RawHandle> {
        self.created(|b| b.create_renderer(context))
    }

    fn release_renderer(&self, renderer: RawHandle) {
        self.inner.release_renderer(renderer)
    }

    fn create_path(&self, context: RawHandle) -> Result<RawHandle> {
        self.created(|b| b.create_path(context))
    }

    fn release_path(&self, path: RawHandle) {
        self.inner.release_path(path)
    }

    fn create_paint(&self, context: RawHandle) -> Result<RawHandle> {
        self.created(|b| b.create_paint(context))
    }

    fn release_paint(&self, paint: RawHandle) {
        self.inner.release_paint(paint)
    }

    fn create_shader(&self, context: RawHandle, gradient: &Gradient) -> Result<RawHandle> {
        self.created(|b| b.create_shader(context, gradient))
    }

    fn release_shader(&self, shader: RawHandle) {
        self.inner.release_shader(shader)
    }

    fn create_font(&self, context: RawHandle, data: &[u8]) -> Result<RawHandle> {
        self.created(|b| b.create_font(context, data))
    }

    fn release_font(&self, font: RawHandle) {
        self.inner.release_font(font)
    }
}

fn open(fault: Fault) -> Device {
    Device::with_provider(
        Arc::new(FaultyProvider(fault)),
        DeviceDesc::new(BackendKind::Vulkan),
    )
    .unwrap()
}

#[test]
fn plugged_provider_reports_its_own_backend() {
    let device = open(Fault::DropSignals);
    assert_eq!(device.backend_kind(), BackendKind::Vulkan);
    assert_eq!(device.adapter().name, "Faulty Adapter");
}

#[test]
fn provider_kind_must_match_request() {
    let err = Device::with_provider(
        Arc::new(FaultyProvider(Fault::NullHandles)),
        DeviceDesc::new(BackendKind::Metal),
    )
    .unwrap_err();
    assert_eq!(err.status(), Status::InvalidParameter);
}

#[test]
fn null_handle_on_success_is_an_internal_error() {
    let device = open(Fault::NullHandles);
    assert_eq!(
        device.create_fence().unwrap_err().status(),
        Status::InternalError
    );
    let ctx = device.create_context(8, 8).unwrap();
    assert_eq!(
        ctx.create_buffer(BufferType::Vertex, BufferFlags::empty(), 8)
            .unwrap_err()
            .status(),
        Status::InternalError
    );
    assert_eq!(device.live_resources(ResourceKind::Fence), 0);
    assert_eq!(device.live_resources(ResourceKind::Buffer), 0);
}

#[test]
fn every_context_factory_rejects_a_null_handle() {
    let device = open(Fault::NullHandles);
    let ctx = device.create_context(8, 8).unwrap();

    let statuses = [
        (ResourceKind::Renderer, ctx.create_renderer().map(drop)),
        (ResourceKind::Path, ctx.create_path(FillRule::NonZero).map(drop)),
        (ResourceKind::Paint, ctx.create_paint().map(drop)),
        (
            ResourceKind::Shader,
            ctx.linear_gradient(
                Vec2::new(0.0, 0.0),
                Vec2::new(8.0, 0.0),
                &[0xFF00_0000, 0xFFFF_FFFF],
                &[0.0, 1.0],
            )
            .map(drop),
        ),
    ];
    for (kind, result) in statuses {
        assert_eq!(result.unwrap_err().status(), Status::InternalError, "{kind:?}");
        assert_eq!(device.live_resources(kind), 0, "{kind:?}");
    }
    assert!(
        lumen_core::last_error_message()
            .is_some_and(|m| m.contains("null shader handle"))
    );
}

#[test]
fn host_objects_get_real_handles_and_release_on_drop() {
    let device = open(Fault::DropSignals);
    let ctx = device.create_context(8, 8).unwrap();
    let renderer = ctx.create_renderer().unwrap();
    let path = ctx.create_path(FillRule::NonZero).unwrap();
    let paint = ctx.create_paint().unwrap();
    for id in [renderer.id(), path.id(), paint.id()] {
        assert_eq!(device.registry().raw(id).map(|raw| raw.is_null()), Some(false));
    }
    assert_eq!(device.live_resources(ResourceKind::Renderer), 1);

    drop((renderer, path, paint));
    for kind in [ResourceKind::Renderer, ResourceKind::Path, ResourceKind::Paint] {
        assert_eq!(device.live_resources(kind), 0, "{kind:?}");
    }
}

#[test]
fn failed_poll_does_not_mark_the_device_lost() {
    let device = open(Fault::PollFails);
    assert!(!device.is_lost());
    assert!(!device.is_lost());
    device.create_fence().unwrap();
}
