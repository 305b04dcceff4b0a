use lumen_core::handle::ResourceKind;
use lumen_core::{Device, DeviceDesc, FillRule, FrameOptions, FramePhase, Status};

fn device() -> Device {
    Device::create(DeviceDesc::default()).unwrap()
}

#[test]
fn resources_keep_their_context_alive() {
    let device = device();
    let ctx = device.create_context(32, 32).unwrap();
    let mut path = ctx.create_path(FillRule::EvenOdd).unwrap();
    let paint = ctx.create_paint().unwrap();
    assert_eq!(device.live_resources(ResourceKind::Context), 1);

    drop(ctx);
    assert_eq!(device.live_resources(ResourceKind::Context), 1);
    path.move_to(1.0, 1.0).unwrap();
    path.line_to(4.0, 4.0).unwrap();

    drop(path);
    assert_eq!(device.live_resources(ResourceKind::Context), 1);
    drop(paint);
    assert_eq!(device.live_resources(ResourceKind::Context), 0);
    assert_eq!(device.live_resources(ResourceKind::Path), 0);
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
#[test]
fn surface_keeps_its_context_alive() {
    use lumen_core::{PresentFlags, Surface, SurfaceDesc, SurfaceTarget};

    let device = device();
    let ctx = device.create_context(32, 32).unwrap();
    let surface = Surface::create(
        &ctx,
        SurfaceTarget::Vulkan { surface: 0x5eed },
        SurfaceDesc::default(),
    )
    .unwrap();

    ctx.begin_frame(FrameOptions::default()).unwrap();
    ctx.end_frame().unwrap();
    ctx.submit().unwrap();
    surface.present(1, PresentFlags::empty()).unwrap();

    drop(ctx);
    assert_eq!(device.live_resources(ResourceKind::Context), 1);
    assert_eq!(device.live_resources(ResourceKind::Surface), 1);
    assert_eq!(surface.present_count(), 1);

    drop(surface);
    assert_eq!(device.live_resources(ResourceKind::Surface), 0);
    assert_eq!(device.live_resources(ResourceKind::Context), 0);
}

#[test]
fn dropping_a_recording_context_discards_the_frame() {
    let device = device();
    let ctx = device.create_context(16, 16).unwrap();
    let mut renderer = ctx.create_renderer().unwrap();
    let mut path = ctx.create_path(FillRule::NonZero).unwrap();
    path.move_to(0.0, 0.0).unwrap();
    path.line_to(16.0, 0.0).unwrap();
    path.line_to(0.0, 16.0).unwrap();
    path.close();
    let paint = ctx.create_paint().unwrap();

    ctx.begin_frame(FrameOptions::default()).unwrap();
    renderer.draw_path(&path, &paint).unwrap();
    drop(ctx);

    // The renderer outlives the public handle but the frame it recorded into is gone.
    let err = renderer.draw_path(&path, &paint).unwrap_err();
    assert_eq!(err.status(), Status::InvalidParameter);
    drop((renderer, path, paint));
    assert_eq!(device.live_resources(ResourceKind::Context), 0);
}

#[test]
fn device_handle_may_drop_first() {
    let device = device();
    let ctx = device.create_context(8, 8).unwrap();
    let fence = device.create_fence().unwrap();
    drop(device);

    ctx.begin_frame(FrameOptions::default()).unwrap();
    ctx.end_frame().unwrap();
    ctx.submit().unwrap();
    let value = ctx.signal(&fence, 0).unwrap();
    fence.wait(value, None).unwrap();
    assert!(fence.is_complete(value).unwrap());
    assert_eq!(ctx.device().live_resources(ResourceKind::Device), 1);
}

#[test]
fn device_loss_reaches_every_dependent() {
    let device = device();
    let ctx = device.create_context(8, 8).unwrap();
    let fence = device.create_fence().unwrap();
    let buffer = ctx
        .create_buffer(
            lumen_core::BufferType::Vertex,
            lumen_core::BufferFlags::empty(),
            16,
        )
        .unwrap();

    device.notify_lost("unplugged");
    assert!(device.is_lost());

    for status in [
        ctx.begin_frame(FrameOptions::default()).unwrap_err().status(),
        ctx.create_path(FillRule::NonZero).unwrap_err().status(),
        device.create_context(8, 8).unwrap_err().status(),
        device.create_fence().unwrap_err().status(),
        buffer.upload(&[0; 4], 0).unwrap_err().status(),
        fence.completed_value().unwrap_err().status(),
    ] {
        assert_eq!(status, Status::DeviceLost);
    }
    assert_eq!(ctx.phase(), FramePhase::Idle);
    assert!(
        lumen_core::last_error_message()
            .is_some_and(|m| m.contains("unplugged"))
    );

    drop((buffer, fence, ctx));
    assert_eq!(device.live_resources(ResourceKind::Buffer), 0);
    assert_eq!(device.live_resources(ResourceKind::Context), 0);
}

#[test]
fn wait_blocks_until_another_thread_signals() {
    use std::time::Duration;

    let device = device();
    let ctx = device.create_context(8, 8).unwrap();
    let fence = device.create_fence().unwrap();

    let producer = {
        let ctx = ctx.clone();
        let fence = fence.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            ctx.signal(&fence, 1).unwrap()
        })
    };
    fence.wait(1, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(producer.join().unwrap(), 1);
    assert!(fence.completed_value().unwrap() >= 1);

    let err = fence.wait(5, Some(Duration::from_millis(10))).unwrap_err();
    assert!(err.is_timeout());
}
