//! Default-device audio output backed by rodio.

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use saheli_core::{AudioOutput, PlaybackHandle, SaheliError};

/// Opens the output device lazily, on the first utterance.
#[derive(Default)]
pub struct RodioOutput {
    stream: Option<OutputStream>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> saheli_core::Result<&OutputStream> {
        if self.stream.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| SaheliError::Speech(format!("Failed to open audio output: {}", e)))?;
            stream.log_on_drop(false);
            tracing::info!("Opened default audio output");
            self.stream = Some(stream);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| SaheliError::Speech("audio output unavailable".to_string()))
    }
}

impl AudioOutput for RodioOutput {
    type Handle = RodioHandle;

    fn play(&mut self, samples: Vec<f32>, sample_rate: u32) -> saheli_core::Result<RodioHandle> {
        let stream = self.stream()?;
        let sink = Sink::connect_new(stream.mixer());
        tracing::debug!("Playing {} samples at {} Hz", samples.len(), sample_rate);
        sink.append(SamplesBuffer::new(1, sample_rate, samples));
        Ok(RodioHandle { sink })
    }
}

pub struct RodioHandle {
    sink: Sink,
}

impl PlaybackHandle for RodioHandle {
    fn stop(&mut self) {
        self.sink.stop();
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
