use std::time::{Duration, Instant};

/// Timing snapshot of one frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time since the previous tick, clamped.
    pub dt: Duration,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Number of ticks before this one.
    pub frame_index: u64,
}

impl FrameTime {
    #[inline]
    pub fn dt_ms(&self) -> f32 {
        self.dt.as_secs_f32() * 1000.0
    }
}

/// Produces clamped frame deltas.
///
/// The first tick after creation or [`reset`](Self::reset) measures from that
/// point. Deltas are clamped so a stalled or debugger-paused host does not feed
/// pathological values into animation.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub const DEFAULT_MIN: Duration = Duration::from_micros(100);
    pub const DEFAULT_MAX: Duration = Duration::from_millis(250);

    pub fn new() -> Self {
        Self::with_clamps(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
    }

    /// Creates a clock with custom delta clamps. Swapped bounds are reordered.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min: dt_min.min(dt_max),
            dt_max: dt_max.max(dt_min),
        }
    }

    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt,
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_are_clamped() {
        let mut clock = FrameClock::new();
        let start = clock.last;

        let t0 = clock.tick_at(start);
        assert_eq!(t0.dt, FrameClock::DEFAULT_MIN);
        assert_eq!(t0.frame_index, 0);

        let t1 = clock.tick_at(start + Duration::from_secs(3));
        assert_eq!(t1.dt, FrameClock::DEFAULT_MAX);
        assert_eq!(t1.frame_index, 1);

        let t2 = clock.tick_at(start + Duration::from_secs(3) + Duration::from_millis(16));
        assert_eq!(t2.dt, Duration::from_millis(16));
        assert!((t2.dt_ms() - 16.0).abs() < 1e-3);
    }

    #[test]
    fn swapped_clamps_are_reordered() {
        let clock = FrameClock::with_clamps(Duration::from_millis(50), Duration::from_millis(5));
        assert!(clock.dt_min <= clock.dt_max);
    }
}
