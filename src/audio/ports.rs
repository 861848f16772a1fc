use anyhow::{Context, Result};
use jack::{AudioIn, AudioOut, Client, Port, ProcessScope};

pub const CLIENT_NAME: &str = "mtfx";
pub const IN_PORT: &str = "in_port";
pub const OUT_LEFT_PORT: &str = "out_port_left";
pub const OUT_RIGHT_PORT: &str = "out_port_right";

/// Mono guitar input, processed signal duplicated to both outputs.
pub struct Ports {
    input: Port<AudioIn>,
    output_left: Port<AudioOut>,
    output_right: Port<AudioOut>,
}

impl Ports {
    pub fn new(client: &Client) -> Result<Self> {
        Ok(Self {
            input: client
                .register_port(IN_PORT, AudioIn::default())
                .context("failed to register in port")?,
            output_left: client
                .register_port(OUT_LEFT_PORT, AudioOut::default())
                .context("failed to register out port left")?,
            output_right: client
                .register_port(OUT_RIGHT_PORT, AudioOut::default())
                .context("failed to register out port right")?,
        })
    }

    pub fn get_input<'a>(&'a self, ps: &'a ProcessScope) -> &'a [f32] {
        self.input.as_slice(ps)
    }

    pub fn write_output(&mut self, ps: &ProcessScope, samples: &[f32]) {
        let output_size = ps.n_frames() as usize;
        let frame_count = samples.len().min(output_size);
        let out_left = self.output_left.as_mut_slice(ps);
        let out_right = self.output_right.as_mut_slice(ps);

        out_left[..frame_count].copy_from_slice(&samples[..frame_count]);
        out_right[..frame_count].copy_from_slice(&samples[..frame_count]);

        out_left[frame_count..output_size].fill(0.0);
        out_right[frame_count..output_size].fill(0.0);
    }
}

/// Fully qualified JACK name of one of our ports, e.g. `mtfx:in_port`.
pub fn full_name(port: &str) -> String {
    format!("{CLIENT_NAME}:{port}")
}
