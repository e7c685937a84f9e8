//! Backing-track playback control, implemented by the host.
//!
//! The session decides *when* playback starts, pauses and resumes; producing
//! samples is the host's job. Starting playback happens exactly once, on the
//! frame where logical time crosses zero, with an explicit seek so the device
//! stays phase-locked to the logical clock even when that frame arrives late.

pub trait AudioControl {
    /// Start the backing track at `seek_seconds` into the stream. Hosts
    /// should seek sample-accurately (`seek_seconds * sample_rate` samples)
    /// to absorb frame-delivery jitter.
    fn play(&mut self, seek_seconds: f32);

    fn pause(&mut self);

    fn resume(&mut self);
}

/// Records control calls instead of touching a device. Used by tests and
/// headless simulation.
#[derive(Clone, Debug, Default)]
pub struct NullAudio {
    pub play_calls: Vec<f32>,
    pub paused: bool,
}

impl AudioControl for NullAudio {
    fn play(&mut self, seek_seconds: f32) {
        self.play_calls.push(seek_seconds);
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }
}
