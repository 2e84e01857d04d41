use std::time::Duration;

/// Frame timing passed to processor update and draw stages.
#[derive(Debug, Clone, Default)]
pub struct GameTime {
    total: Duration,
    elapsed: Duration,
    frame: u64,
}

impl GameTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to the next frame with the given frame delta.
    pub fn advance(&mut self, delta: Duration) {
        self.total += delta;
        self.elapsed = delta;
        self.frame += 1;
    }

    /// Time since the clock started.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Duration of the last frame.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn total_seconds(&self) -> f32 {
        self.total.as_secs_f32()
    }

    pub fn delta_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let mut time = GameTime::new();
        time.advance(Duration::from_millis(16));
        time.advance(Duration::from_millis(16));
        assert_eq!(time.frame_count(), 2);
        assert_eq!(time.elapsed(), Duration::from_millis(16));
        assert_eq!(time.total(), Duration::from_millis(32));
    }
}
