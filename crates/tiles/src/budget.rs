use std::fmt;
use std::time::Duration;

/// Rolling window of recent frame times.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    history: Vec<Duration>,
    next: usize,
    len: usize,
    total_frames: u64,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame timer needs a non-empty window");
        Self {
            history: vec![Duration::ZERO; capacity],
            next: 0,
            len: 0,
            total_frames: 0,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.next] = dt;
        self.next = (self.next + 1) % self.history.len();
        self.len = (self.len + 1).min(self.history.len());
        self.total_frames += 1;
    }

    fn window(&self) -> &[Duration] {
        &self.history[..self.len]
    }

    /// Frames currently in the window.
    pub fn count(&self) -> usize {
        self.len
    }

    /// Frames recorded since creation.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn last(&self) -> Option<Duration> {
        if self.len == 0 {
            return None;
        }
        let i = (self.next + self.history.len() - 1) % self.history.len();
        Some(self.history[i])
    }

    pub fn average(&self) -> Duration {
        if self.len == 0 {
            return Duration::ZERO;
        }
        self.window().iter().sum::<Duration>() / self.len as u32
    }

    pub fn max(&self) -> Duration {
        self.window().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.window().iter().copied().min().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for FrameTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} avg={:?} min={:?} max={:?}",
            self.total_frames,
            self.average(),
            self.min(),
            self.max()
        )
    }
}
