use anyhow::Result;
use mtfx::audio::engine::{DEFAULT_MASTER_VOLUME, Engine, EngineHandle};
use mtfx::preset::{DriveMode, ModType, PresetState};
use mtfx::tuner::{Tuner, TunerHandle};

const SAMPLE_RATE: usize = 44_100;
const BUFFER_SIZE: usize = 1024;

fn build_engine() -> Result<(Engine, EngineHandle, TunerHandle)> {
    let (tuner, tuner_handle) = Tuner::new(SAMPLE_RATE);
    let (engine, handle) = Engine::new(tuner, SAMPLE_RATE, BUFFER_SIZE)?;
    Ok((engine, handle, tuner_handle))
}

fn guitar_like(len: usize, offset: usize) -> Vec<f32> {
    (offset..offset + len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.4 * (2.0 * std::f32::consts::PI * 196.0 * t).sin()
                + 0.2 * (2.0 * std::f32::consts::PI * 392.0 * t).sin()
        })
        .collect()
}

fn everything_on() -> PresetState {
    let mut preset = PresetState::default();
    preset.gate = true;
    preset.amp = true;
    preset.modulation = true;
    preset.delay = true;
    preset.reverb = true;
    preset.amp_params.vol = 100.0;
    preset.amp_params.gain = 100.0;
    preset.amp_params.bass = 100.0;
    preset.amp_params.mid = 100.0;
    preset.amp_params.treble = 100.0;
    preset.amp_params.warmth = 100.0;
    preset.dly_params.feedback_pct = 90.0;
    preset.dly_params.mix_pct = 100.0;
    preset.rev_params.size_pct = 95.0;
    preset.rev_params.mix_pct = 100.0;
    preset
}

#[test]
fn engine_starts_bypassed() -> Result<()> {
    let (mut engine, _, _) = build_engine()?;

    let input = guitar_like(BUFFER_SIZE, 0);
    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.process(&input, &mut output)?;

    assert!(engine.is_bypassed());
    for (out, inp) in output.iter().zip(&input) {
        assert!((out - inp * DEFAULT_MASTER_VOLUME).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn bypass_ignores_enabled_effects() -> Result<()> {
    let (mut engine, handle, _) = build_engine()?;
    handle.set_preset(&everything_on());
    handle.set_master_volume(0.5);

    let input = guitar_like(BUFFER_SIZE, 0);
    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.process(&input, &mut output)?;

    for (out, inp) in output.iter().zip(&input) {
        assert!((out - inp * 0.5).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn every_drive_mode_stays_within_full_scale() -> Result<()> {
    let modes = [
        DriveMode::Clean,
        DriveMode::Overdrive1,
        DriveMode::Overdrive2,
        DriveMode::Distortion,
        DriveMode::Fuzz,
    ];
    let mod_types = [ModType::Chorus, ModType::Tremolo, ModType::Flanger];

    for (i, &mode) in modes.iter().enumerate() {
        let (mut engine, handle, _) = build_engine()?;
        let mut preset = everything_on();
        preset.amp_params.drive_mode = mode;
        preset.mod_params.mod_type = mod_types[i % mod_types.len()];
        handle.set_preset(&preset);
        handle.set_master_volume(1.0);
        handle.set_bypass(false);

        let mut output = vec![0.0f32; BUFFER_SIZE];
        for block in 0..40 {
            let input: Vec<f32> = guitar_like(BUFFER_SIZE, block * BUFFER_SIZE)
                .into_iter()
                .map(|s| s * 2.0)
                .collect();
            engine.process(&input, &mut output)?;
            assert!(
                output.iter().all(|s| s.is_finite() && s.abs() <= 1.0),
                "{mode} produced an out-of-range sample"
            );
        }
    }
    Ok(())
}

#[test]
fn tuner_mode_silences_output_and_publishes_reading() -> Result<()> {
    let (mut engine, handle, tuner) = build_engine()?;
    handle.set_bypass(false);
    handle.set_tuner_enabled(true);

    let input: Vec<f32> = (0..BUFFER_SIZE)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.5 * (2.0 * std::f32::consts::PI * 110.0 * t + 0.3).sin()
        })
        .collect();
    let mut output = vec![1.0f32; BUFFER_SIZE];
    engine.process(&input, &mut output)?;

    assert!(output.iter().all(|&s| s == 0.0));
    assert!(tuner.is_enabled());
    assert_eq!(tuner.get_tuner_info().note, Some("A2"));

    handle.set_tuner_enabled(false);
    engine.process(&input, &mut output)?;
    assert!(output.iter().any(|&s| s != 0.0));
    Ok(())
}

#[test]
fn mismatched_buffers_are_rejected_and_silenced() -> Result<()> {
    let (mut engine, _, _) = build_engine()?;

    let input = vec![0.5f32; BUFFER_SIZE];
    let mut output = vec![1.0f32; BUFFER_SIZE / 2];

    assert!(engine.render(&input, &mut output).is_err());
    assert!(output.iter().all(|&s| s == 0.0));

    // The next well-formed block is processed normally.
    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.render(&input, &mut output)?;
    assert!(output.iter().all(|&s| s != 0.0));
    Ok(())
}

#[test]
fn preset_switch_applies_on_next_block() -> Result<()> {
    let (mut engine, handle, _) = build_engine()?;
    handle.set_bypass(false);
    handle.set_master_volume(1.0);

    let input = vec![0.25f32; BUFFER_SIZE];
    let mut output = vec![0.0f32; BUFFER_SIZE];

    engine.process(&input, &mut output)?;
    assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));

    let mut quiet = PresetState::default();
    quiet.amp = true;
    quiet.amp_params.vol = 0.0;
    handle.set_preset(&quiet);
    assert_eq!(handle.snapshot().preset.amp_params.vol, 0.0);

    engine.process(&input, &mut output)?;
    assert!(output.iter().all(|&s| s == 0.0));
    Ok(())
}

#[test]
fn leaving_idle_plays_the_new_preset_from_the_first_block() -> Result<()> {
    let (mut engine, handle, _) = build_engine()?;
    handle.set_master_volume(1.0);

    let mut muted = PresetState::default();
    muted.amp = true;
    muted.amp_params.drive_mode = DriveMode::Distortion;
    muted.amp_params.vol = 0.0;
    handle.publish(&muted, true);

    let input = vec![0.25f32; BUFFER_SIZE];
    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.process(&input, &mut output)?;
    assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));

    let clean = PresetState::default();
    handle.publish(&clean, false);
    let snapshot = handle.snapshot();
    assert!(!snapshot.bypass);
    assert_eq!(snapshot.preset.id, clean.id);

    engine.process(&input, &mut output)?;
    assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));

    // Back to idle on the muted slot: dry signal, never the muted amp.
    handle.publish(&muted, true);
    engine.process(&input, &mut output)?;
    assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    Ok(())
}

fn long_delay() -> PresetState {
    let mut preset = PresetState::default();
    preset.delay = true;
    preset.dly_params.time_ms = 1000.0;
    preset.dly_params.feedback_pct = 0.0;
    preset.dly_params.mix_pct = 100.0;
    preset
}

fn peak_of_silent_blocks(engine: &mut Engine, blocks: usize) -> Result<f32> {
    let silence = vec![0.0f32; BUFFER_SIZE];
    let mut output = vec![0.0f32; BUFFER_SIZE];
    let mut peak = 0.0f32;
    for _ in 0..blocks {
        engine.process(&silence, &mut output)?;
        peak = output.iter().fold(peak, |acc, s| acc.max(s.abs()));
    }
    Ok(peak)
}

#[test]
fn bypass_does_not_leave_stale_echoes() -> Result<()> {
    let (mut engine, handle, _) = build_engine()?;
    handle.publish(&long_delay(), false);
    handle.set_master_volume(1.0);

    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.process(&vec![0.5f32; BUFFER_SIZE], &mut output)?;

    handle.set_bypass(true);
    peak_of_silent_blocks(&mut engine, 200)?;

    handle.set_bypass(false);
    assert_eq!(peak_of_silent_blocks(&mut engine, 60)?, 0.0);
    Ok(())
}

#[test]
fn tuner_mode_does_not_leave_stale_echoes() -> Result<()> {
    let (mut engine, handle, _) = build_engine()?;
    handle.publish(&long_delay(), false);
    handle.set_master_volume(1.0);

    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.process(&vec![0.5f32; BUFFER_SIZE], &mut output)?;

    handle.set_tuner_enabled(true);
    peak_of_silent_blocks(&mut engine, 200)?;

    handle.set_tuner_enabled(false);
    assert_eq!(peak_of_silent_blocks(&mut engine, 60)?, 0.0);
    Ok(())
}

#[test]
fn delay_echo_through_engine() -> Result<()> {
    let (mut engine, handle, _) = build_engine()?;
    let mut preset = PresetState::default();
    preset.delay = true;
    preset.dly_params.time_ms = 100.0;
    preset.dly_params.feedback_pct = 0.0;
    preset.dly_params.mix_pct = 50.0;
    handle.set_preset(&preset);
    handle.set_bypass(false);
    handle.set_master_volume(1.0);

    let tap = (100.0 * SAMPLE_RATE as f32 / 1000.0) as usize;
    let blocks = tap / BUFFER_SIZE + 2;

    let mut rendered = Vec::with_capacity(blocks * BUFFER_SIZE);
    let mut output = vec![0.0f32; BUFFER_SIZE];
    for block in 0..blocks {
        let mut input = vec![0.0f32; BUFFER_SIZE];
        if block == 0 {
            input[0] = 1.0;
        }
        engine.process(&input, &mut output)?;
        rendered.extend_from_slice(&output);
    }

    assert!((rendered[0] - 0.5).abs() < 1e-6);
    assert!((rendered[tap] - 0.5).abs() < 1e-6);
    assert!(rendered[1..tap].iter().all(|&s| s.abs() < 1e-6));
    Ok(())
}

#[test]
fn engine_handles_buffer_size_change() -> Result<()> {
    const NEW_BUFFER_SIZE: usize = 256;

    let (mut engine, handle, _) = build_engine()?;
    let mut preset = everything_on();
    preset.amp_params.gain = 40.0;
    handle.set_preset(&preset);
    handle.set_bypass(false);

    let input = guitar_like(BUFFER_SIZE, 0);
    let mut output = vec![0.0f32; BUFFER_SIZE];
    engine.process(&input, &mut output)?;

    engine.update_buffer_size(NEW_BUFFER_SIZE)?;

    let input = guitar_like(NEW_BUFFER_SIZE, BUFFER_SIZE);
    let mut output = vec![0.0f32; NEW_BUFFER_SIZE];
    engine.process(&input, &mut output)?;

    assert_eq!(output.len(), NEW_BUFFER_SIZE);
    assert!(output.iter().all(|s| s.is_finite()));
    assert!(engine.update_buffer_size(0).is_err());
    Ok(())
}

#[test]
fn zero_sized_stream_is_rejected() {
    let (tuner, _) = Tuner::new(SAMPLE_RATE);
    assert!(Engine::new(tuner, SAMPLE_RATE, 0).is_err());
}
