use anyhow::{Context, Result};
use jack::{AsyncClient, Client, ClientOptions};
use log::{info, warn};

use crate::audio::engine::{Engine, EngineHandle};
use crate::audio::jack::{NotificationHandler, ProcessHandler};
use crate::audio::ports::{CLIENT_NAME, IN_PORT, OUT_LEFT_PORT, OUT_RIGHT_PORT, full_name};
use crate::settings::AudioSettings;
use crate::tuner::{Tuner, TunerHandle};

/// Owns the running JACK client. Dropping it deactivates the client once
/// the current block has finished.
pub struct Manager {
    active_client: AsyncClient<NotificationHandler, ProcessHandler>,
    tuner_handle: TunerHandle,
    engine_handle: EngineHandle,
}

impl Manager {
    /// Opens the audio device. Any failure here is fatal for the caller.
    pub fn new(settings: AudioSettings) -> Result<Self> {
        let (client, _) = Client::new(CLIENT_NAME, ClientOptions::NO_START_SERVER)
            .context("failed to create JACK client, is the JACK server running?")?;

        let sample_rate = client.sample_rate() as usize;
        let buffer_size = client.buffer_size() as usize;

        if sample_rate != settings.sample_rate as usize || buffer_size != settings.buffer_size as usize
        {
            warn!(
                "Server runs at {sample_rate} Hz / {buffer_size} frames, settings ask for {} Hz / {} frames",
                settings.sample_rate, settings.buffer_size
            );
        }
        info!("Stream: {sample_rate} Hz, {buffer_size} frames per block");

        let (tuner, tuner_handle) = Tuner::new(sample_rate);
        let (engine, engine_handle) =
            Engine::new(tuner, sample_rate, buffer_size).context("failed to create engine")?;
        let jack_handler =
            ProcessHandler::new(&client, engine).context("failed to create process handler")?;

        let active_client = client
            .activate_async(NotificationHandler, jack_handler)
            .context("failed to activate async client")?;

        let manager = Self {
            active_client,
            tuner_handle,
            engine_handle,
        };

        if settings.auto_connect {
            manager.connect_ports(&settings);
        }

        Ok(manager)
    }

    /// Connect audio ports based on settings
    fn connect_ports(&self, settings: &AudioSettings) {
        let client = self.active_client.as_client();
        let connections = [
            (settings.input_port.clone(), full_name(IN_PORT)),
            (full_name(OUT_LEFT_PORT), settings.output_left_port.clone()),
            (full_name(OUT_RIGHT_PORT), settings.output_right_port.clone()),
        ];

        for (source, destination) in &connections {
            if let Err(e) = client.connect_ports_by_name(source, destination) {
                warn!("Failed to connect '{source}' -> '{destination}': {e}");
            } else {
                info!("Connected {source} -> {destination}");
            }
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine_handle
    }

    pub fn tuner(&self) -> &TunerHandle {
        &self.tuner_handle
    }
}
