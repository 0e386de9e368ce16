/// Upper bound of the progress counter; 0..=200 gives half-percent resolution.
pub const PROGRESS_MAX: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced,
    /// Progress reached `PROGRESS_MAX`; playback should stop.
    Finished,
}

/// Maps progress onto a sample index: `min(floor(progress / 200 * len), len - 1)`.
pub fn sample_index(progress: u16, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let progress = usize::from(progress.min(PROGRESS_MAX));
    Some((progress * len / usize::from(PROGRESS_MAX)).min(len - 1))
}

/// Discrete animation position, independent of the tick rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackClock {
    progress: u16,
}

impl PlaybackClock {
    pub fn progress(&self) -> u16 {
        self.progress
    }

    /// Fractional distance along the path, for marker placement.
    pub fn fraction(&self) -> f64 {
        f64::from(self.progress) / f64::from(PROGRESS_MAX)
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= PROGRESS_MAX
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.progress = (self.progress + 1) % (PROGRESS_MAX + 1);
        if self.progress == PROGRESS_MAX {
            TickOutcome::Finished
        } else {
            TickOutcome::Advanced
        }
    }

    pub fn step(&mut self, delta: i32) {
        let target = i32::from(self.progress).saturating_add(delta);
        self.progress = target.clamp(0, i32::from(PROGRESS_MAX)) as u16;
    }

    pub fn seek(&mut self, progress: u16) {
        self.progress = progress.min(PROGRESS_MAX);
    }

    pub fn reset(&mut self) {
        self.progress = 0;
    }

    pub fn sample_index(&self, len: usize) -> Option<usize> {
        sample_index(self.progress, len)
    }
}
