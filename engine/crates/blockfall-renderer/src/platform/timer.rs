use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Timer {
    last_tick: Instant,

    delta_time: Duration,
    total_time: Duration,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            last_tick: Instant::now(),
            delta_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }
}

impl Timer {
    /// 每帧开始的时候调用
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.total_time += self.delta_time;
    }

    pub fn elapsed_since_tick(&self) -> Duration {
        self.last_tick.elapsed()
    }

    /// 距离上一帧的时间是否已经达到帧率上限对应的间隔
    ///
    /// `frame_limit` 为 0 表示不限帧
    pub fn frame_due(&self, frame_limit: f32) -> bool {
        if frame_limit <= 0.0 {
            return true;
        }
        let limit_elapsed_us = 1000.0 * 1000.0 / frame_limit;
        limit_elapsed_us < self.elapsed_since_tick().as_micros() as f32
    }

    #[inline]
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    /// 上一帧的时间（秒）
    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.delta_time.as_secs_f32()
    }

    /// 总运行时间
    #[inline]
    pub fn total_time_s(&self) -> f32 {
        self.total_time.as_secs_f32()
    }
}
