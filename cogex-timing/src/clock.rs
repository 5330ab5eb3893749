use crate::timer::Timer;
use std::time::Duration;

/// One scheduling tick as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub index: u64,
    /// Scaled time since the previous frame. Waits consume this.
    pub delta: Duration,
    /// Sum of all scaled deltas so far.
    pub render_time: Duration,
    /// Unscaled time since the session clock started.
    pub wall_time: Duration,
}

/// Turns a [`Timer`] into a sequence of frames at a fixed target rate.
///
/// `time_scale` stretches or compresses render time relative to the wall
/// clock; every wait in the engine runs on render time.
pub struct FrameClock<T: Timer> {
    timer: T,
    period: Duration,
    time_scale: f64,
    next_index: u64,
    last_wall: Duration,
    render_time: Duration,
}

impl<T: Timer> FrameClock<T> {
    pub fn new(timer: T, frame_rate_hz: f64) -> Self {
        let last_wall = timer.now();
        Self {
            timer,
            period: Duration::from_nanos((1e9 / frame_rate_hz).round() as u64),
            time_scale: 1.0,
            next_index: 0,
            last_wall,
            render_time: Duration::ZERO,
        }
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Measures the time since the previous frame and produces the next one.
    pub fn next_frame(&mut self) -> Frame {
        let wall = self.timer.now();
        let wall_delta = wall.saturating_sub(self.last_wall);
        if self.next_index > 0 {
            self.timer.record_frame(wall_delta);
        }
        self.last_wall = wall;

        let delta = if self.time_scale == 1.0 {
            wall_delta
        } else {
            Duration::from_nanos((wall_delta.as_nanos() as f64 * self.time_scale).round() as u64)
        };
        self.render_time += delta;

        let frame = Frame {
            index: self.next_index,
            delta,
            render_time: self.render_time,
            wall_time: wall,
        };
        self.next_index += 1;
        frame
    }

    /// Sleeps out whatever remains of the current frame period.
    pub fn pace(&self) {
        let spent = self.timer.now().saturating_sub(self.last_wall);
        if let Some(remaining) = self.period.checked_sub(spent) {
            self.timer.sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SimulatedTimer;

    #[test]
    fn paced_simulated_frames_have_exact_deltas() {
        let mut clock = FrameClock::new(SimulatedTimer::new(), 10.0);
        let first = clock.next_frame();
        assert_eq!(first.index, 0);
        assert_eq!(first.delta, Duration::ZERO);

        clock.pace();
        let second = clock.next_frame();
        clock.pace();
        let third = clock.next_frame();
        assert_eq!(second.delta, Duration::from_millis(100));
        assert_eq!(third.render_time, Duration::from_millis(200));
        assert_eq!(third.wall_time, Duration::from_millis(200));
        assert_eq!(clock.timer().frame_stats().frames, 2);
    }

    #[test]
    fn time_scale_stretches_render_time_only() {
        let mut clock = FrameClock::new(SimulatedTimer::new(), 10.0).with_time_scale(0.5);
        clock.next_frame();
        clock.pace();
        let frame = clock.next_frame();
        assert_eq!(frame.delta, Duration::from_millis(50));
        assert_eq!(frame.render_time, Duration::from_millis(50));
        assert_eq!(frame.wall_time, Duration::from_millis(100));
    }
}
