use std::time::Instant;

const SMOOTHING: f32 = 0.1;

/// Exponentially smoothed frame time of the render loop.
#[derive(Debug, Default)]
pub struct FrameTimer {
    last: Option<Instant>,
    frame_time: Option<f32>,
}

impl FrameTimer {
    pub fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            self.frame_time = Some(match self.frame_time {
                Some(prev) => prev + (dt - prev) * SMOOTHING,
                None => dt,
            });
        }
        self.last = Some(now);
    }

    pub fn frame_time_ms(&self) -> Option<f32> {
        self.frame_time.map(|t| t * 1000.0)
    }

    pub fn fps(&self) -> Option<f32> {
        self.frame_time.filter(|t| *t > 0.0).map(|t| 1.0 / t)
    }
}
