//! Timeline fences: completion of submitted work observed by polling or waiting.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::RawHandle;
use crate::context::Context;
use crate::device::{Device, DeviceShared};
use crate::error::{Error, Recorded, Result};
use crate::handle::{Registration, ResourceId, ResourceKind};

struct FenceInner {
    reg: Registration,
    raw: RawHandle,
    device: Arc<DeviceShared>,
    last_signaled: Mutex<u64>,
}

impl Drop for FenceInner {
    fn drop(&mut self) {
        self.device.backend().release_fence(self.raw);
        log::debug!("fence #{} released", self.reg.id().get());
    }
}

/// A monotonically increasing completion counter owned by a device.
///
/// Values are scheduled with [`Context::signal`] and complete once every
/// frame submitted before the signal has executed.
#[derive(Clone)]
pub struct Fence {
    inner: Arc<FenceInner>,
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("id", &self.inner.reg.id().get())
            .field("last_signaled", &self.last_signaled_value())
            .finish()
    }
}

impl Fence {
    pub fn create(device: &Device) -> Result<Fence> {
        Self::create_inner(device.shared()).recorded()
    }

    fn create_inner(device: &Arc<DeviceShared>) -> Result<Fence> {
        let raw = device.create("fence", |b| b.create_fence())?;
        let reg = match device.register(ResourceKind::Fence, device.id(), raw) {
            Ok(reg) => reg,
            Err(e) => {
                device.backend().release_fence(raw);
                return Err(e);
            }
        };
        log::debug!("fence #{} created", reg.id().get());
        Ok(Fence {
            inner: Arc::new(FenceInner {
                reg,
                raw,
                device: Arc::clone(device),
                last_signaled: Mutex::new(0),
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.inner.reg.id()
    }

    pub fn device(&self) -> Device {
        Device::from_shared(Arc::clone(&self.inner.device))
    }

    /// Highest value scheduled through [`Context::signal`].
    pub fn last_signaled_value(&self) -> u64 {
        *self
            .inner
            .last_signaled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn completed_value(&self) -> Result<u64> {
        let raw = self.inner.raw;
        self.inner
            .device
            .call(|b| b.fence_completed_value(raw))
            .recorded()
    }

    pub fn is_complete(&self, value: u64) -> Result<bool> {
        Ok(self.completed_value()? >= value)
    }

    /// Blocks until the fence reaches `value`.
    ///
    /// The value may be signaled later from another thread. `None` waits
    /// without limit. An expired timeout fails with [`Error::Timeout`]; a
    /// zero timeout only polls.
    pub fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<()> {
        self.wait_inner(value, timeout).recorded()
    }

    fn wait_inner(&self, value: u64, timeout: Option<Duration>) -> Result<()> {
        let raw = self.inner.raw;
        if self.inner.device.call(|b| b.wait_fence(raw, value, timeout))? {
            Ok(())
        } else {
            let timeout_ms = timeout.map_or(u64::MAX, |t| t.as_millis() as u64);
            Err(Error::Timeout { value, timeout_ms })
        }
    }

    pub(crate) fn signal_from(&self, ctx: &Context, value: u64) -> Result<u64> {
        let ctx = ctx.inner();
        if !Arc::ptr_eq(ctx.device(), &self.inner.device) {
            return Err(Error::invalid_parameter(
                "fence and context belong to different devices",
            ));
        }
        let mut last = self
            .inner
            .last_signaled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let value = if value == 0 { *last + 1 } else { value };
        if value < *last {
            return Err(Error::invalid_parameter(format!(
                "fence value {value} is below the last signaled value {}",
                *last
            )));
        }
        let (ctx_raw, fence_raw) = (ctx.raw(), self.inner.raw);
        self.inner
            .device
            .call(|b| b.signal_fence(ctx_raw, fence_raw, value))?;
        *last = value;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FrameOptions;
    use crate::device::DeviceDesc;
    use crate::error::Status;

    fn setup() -> (Device, Context, Fence) {
        let device = Device::create(DeviceDesc::default()).unwrap();
        let ctx = device.create_context(8, 8).unwrap();
        let fence = device.create_fence().unwrap();
        (device, ctx, fence)
    }

    #[test]
    fn signal_after_submit_completes() {
        let (_device, ctx, fence) = setup();
        ctx.begin_frame(FrameOptions::default()).unwrap();
        ctx.end_frame().unwrap();
        ctx.submit().unwrap();
        assert_eq!(ctx.signal(&fence, 3).unwrap(), 3);
        fence.wait(3, None).unwrap();
        assert!(fence.completed_value().unwrap() >= 3);
        assert!(fence.is_complete(3).unwrap());
    }

    #[test]
    fn zero_means_next_value() {
        let (_device, ctx, fence) = setup();
        assert_eq!(ctx.signal(&fence, 0).unwrap(), 1);
        assert_eq!(ctx.signal(&fence, 0).unwrap(), 2);
        assert_eq!(ctx.signal(&fence, 2).unwrap(), 2);
        assert_eq!(
            ctx.signal(&fence, 1).unwrap_err().status(),
            Status::InvalidParameter
        );
        assert_eq!(fence.last_signaled_value(), 2);
    }

    #[test]
    fn waiting_on_an_unreached_value_times_out() {
        let (_device, _ctx, fence) = setup();
        let err = fence.wait(1, Some(Duration::ZERO)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.status(), Status::InvalidParameter);

        let err = fence.wait(5, Some(Duration::from_millis(10))).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err, Error::Timeout { value: 5, timeout_ms: 10 });
        fence.wait(0, Some(Duration::ZERO)).unwrap();
    }

    #[test]
    fn fence_from_other_device_is_rejected() {
        let (_device, ctx, _fence) = setup();
        let other = Device::create(DeviceDesc::default()).unwrap();
        let foreign = other.create_fence().unwrap();
        assert_eq!(
            ctx.signal(&foreign, 1).unwrap_err().status(),
            Status::InvalidParameter
        );
    }

    #[test]
    fn fence_survives_its_device_handle() {
        let (device, ctx, fence) = setup();
        drop(device);
        ctx.signal(&fence, 1).unwrap();
        fence.wait(1, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(fence.device().live_resources(ResourceKind::Fence), 1);
    }
}
