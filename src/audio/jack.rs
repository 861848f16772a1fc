use anyhow::{Context, Result};
use assert_no_alloc::assert_no_alloc;
use jack::Client;
use log::{debug, error, warn};

use crate::audio::engine::Engine;
use crate::audio::ports::Ports;

pub struct NotificationHandler;

pub struct ProcessHandler {
    ports: Ports,
    audio_engine: Engine,
    buffer: Vec<f32>,
}

impl jack::NotificationHandler for NotificationHandler {
    fn sample_rate(&mut self, _: &Client, sample_rate: jack::Frames) -> jack::Control {
        warn!(">> JACK sample_rate changed to {sample_rate}, restart to apply");

        jack::Control::Continue
    }

    fn xrun(&mut self, _: &Client) -> jack::Control {
        debug!(">> JACK xrun");

        jack::Control::Continue
    }
}

impl ProcessHandler {
    pub fn new(client: &Client, audio_engine: Engine) -> Result<Self> {
        let ports = Ports::new(client).context("failed to create audio ports")?;
        let buffer_size = client.buffer_size() as usize;

        Ok(Self {
            ports,
            audio_engine,
            buffer: vec![0.0; buffer_size],
        })
    }
}

impl jack::ProcessHandler for ProcessHandler {
    fn process(&mut self, _client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
        let input = self.ports.get_input(ps);
        let frames = input.len().min(self.buffer.len());
        let engine = &mut self.audio_engine;
        let buffer = &mut self.buffer[..frames];

        let result = assert_no_alloc(|| engine.render(&input[..frames], buffer));

        // render() has already silenced the block on failure.
        if let Err(e) = result {
            error!("Audio processing error: {e:#}");
        }

        self.ports.write_output(ps, &self.buffer[..frames]);
        jack::Control::Continue
    }

    fn buffer_size(&mut self, _client: &jack::Client, frames: jack::Frames) -> jack::Control {
        debug!(">> JACK buffer_size changed to {frames} frames");

        let new_size = frames as usize;
        self.buffer.resize(new_size, 0.0);

        if let Err(e) = self.audio_engine.update_buffer_size(new_size) {
            error!("Failed to update buffer size: {e}");
        }

        jack::Control::Continue
    }
}
