// render_loop.rs - 帧时钟与视口尺寸

use std::time::{Duration, Instant};

/// Output surface size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns false for zero sizes and for the size already applied.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width == self.width && height == self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }
}

/// Per-frame delta time plus a once-per-second FPS estimate.
pub struct FrameClock {
    last_frame: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    fps: f32,
}

impl FrameClock {
    const MAX_DT: f32 = 0.1;

    pub fn new(now: Instant) -> Self {
        Self {
            last_frame: None,
            last_fps_time: now,
            frame_count: 0,
            fps: 0.0,
        }
    }

    /// 返回本帧 dt（秒）；窗口拖动等长停顿后限制在 MAX_DT 内
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last_frame {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame = Some(now);

        self.frame_count += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_time).as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.last_fps_time = now;
        }

        dt.as_secs_f32().min(Self::MAX_DT)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_is_idempotent() {
        let mut viewport = Viewport::new(800, 600);
        assert!(viewport.resize(1024, 768));
        assert!(!viewport.resize(1024, 768));
        assert_eq!(viewport, Viewport::new(1024, 768));
    }

    #[test]
    fn minimized_window_keeps_size() {
        let mut viewport = Viewport::new(800, 600);
        assert!(!viewport.resize(0, 0));
        assert!(!viewport.resize(800, 0));
        assert_eq!(viewport, Viewport::new(800, 600));
    }

    #[test]
    fn clock_measures_and_clamps_dt() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start);
        assert!((clock.tick(start) - 0.016).abs() < 1e-6);
        assert!((clock.tick(start + Duration::from_millis(20)) - 0.020).abs() < 1e-4);
        assert_eq!(clock.tick(start + Duration::from_secs(5)), 0.1);
        assert!(clock.fps() > 0.0);
    }
}
