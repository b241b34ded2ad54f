//! The single audio playback slot.
//!
//! At most one utterance plays at a time. Starting a new one stops and drops
//! the previous handle before the new one is stored.

use crate::error::Result;

/// Sample rate of synthesized speech (mono, signed 16-bit).
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

pub trait PlaybackHandle {
    fn stop(&mut self);
    fn is_finished(&self) -> bool;
}

/// An audio device able to start playing a mono sample buffer.
pub trait AudioOutput {
    type Handle: PlaybackHandle;

    fn play(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<Self::Handle>;
}

/// Owns the one live playback handle, tagged with its utterance number.
pub struct PlaybackSlot<H: PlaybackHandle> {
    current: Option<(u64, H)>,
}

impl<H: PlaybackHandle> PlaybackSlot<H> {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub fn utterance(&self) -> Option<u64> {
        self.current.as_ref().map(|(u, _)| *u)
    }

    pub fn replace(&mut self, utterance: u64, handle: H) {
        self.clear();
        self.current = Some((utterance, handle));
    }

    pub fn clear(&mut self) {
        if let Some((_, mut handle)) = self.current.take() {
            handle.stop();
        }
    }

    /// Release a handle that finished on its own and report its utterance.
    pub fn take_finished(&mut self) -> Option<u64> {
        let finished = matches!(&self.current, Some((_, h)) if h.is_finished());
        if !finished {
            return None;
        }
        self.current.take().map(|(utterance, _)| utterance)
    }
}

impl<H: PlaybackHandle> Default for PlaybackSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    pub struct FakeHandle {
        pub stopped: Arc<AtomicBool>,
        pub finished: Arc<AtomicBool>,
    }

    impl PlaybackHandle for FakeHandle {
        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }
    }
}
