use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{RecvTimeoutError, Sender, bounded};
use log::{error, info, warn};
use mtfx::audio::manager::Manager as AudioManager;
use mtfx::control::command::HELP;
use mtfx::control::{Command, Controller};
use mtfx::preset::{self, Slot, SlotId};
use mtfx::settings::Settings;
use mtfx::tuner::TunerInfo;
use std::io::{BufRead, Write};
use std::{thread, time::Duration};

#[cfg(debug_assertions)]
#[global_allocator]
static ALLOCATOR: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

const TUNER_POLL: Duration = Duration::from_millis(100);
const NEEDLE_WIDTH: usize = 21;

#[derive(Parser, Debug)]
#[command(name = "mtfx")]
#[command(version)]
#[command(about = "A JACK guitar multi-effects processor with a built-in tuner.")]
struct Args {
    #[arg(
        long,
        env = "MTFX_PRESET_FILE",
        help = "Bank file to load and save presets"
    )]
    preset_file: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=9), help = "Bank to start on")]
    bank: Option<u8>,
    #[arg(long, value_enum, help = "Slot to start on")]
    slot: Option<Slot>,
    #[arg(long, help = "Start idle (bypassed)")]
    idle: bool,
    #[arg(long, help = "Start in tuner mode")]
    tuner: bool,
    #[arg(long, help = "Master volume, 0.0 to 1.0")]
    master_volume: Option<f32>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    info!("mtfx v{}", env!("CARGO_PKG_VERSION"));
    info!(
        r#"
           _    __
 _ __ ___ | |_ / _|_  __
| '_ ` _ \| __| |_\ \/ /
| | | | | | |_|  _|>  <
|_| |_| |_|\__|_| /_/\_\
    "#
    );
    info!("Args: {args:?}");

    let mut settings = Settings::load().context("failed to load settings")?;
    if let Some(path) = &args.preset_file {
        settings.preset_file.clone_from(path);
    }
    if let Some(volume) = args.master_volume {
        settings.master_volume = volume;
    }
    settings.apply_to_environment();
    info!("{settings}");

    for key in ["RUST_LOG", "PIPEWIRE_LATENCY", "JACK_PROMISCUOUS_SERVER"] {
        match std::env::var(key) {
            Ok(val) => info!("{key} = {val}"),
            Err(_) => warn!("environment variable '{key}' is not set"),
        }
    }

    let presets = preset::Manager::new(&settings.preset_file)
        .with_context(|| format!("failed to load presets from '{}'", settings.preset_file))?;
    info!("Presets: {}", presets.path().display());

    let audio = AudioManager::new(settings.audio.clone()).context("failed to start audio")?;

    let start = SlotId::new(
        args.bank.unwrap_or(settings.selected_bank),
        args.slot.unwrap_or(settings.selected_slot),
    );
    let mut controller = Controller::new(
        presets,
        audio.engine().clone(),
        audio.tuner().clone(),
        start,
    );
    controller.set_master_volume(settings.master_volume);
    if !args.idle {
        controller.set_idle(false);
    }
    if args.tuner {
        controller.toggle_tuner();
    }

    let (tx_commands, rx_commands) = bounded::<Command>(16);

    let ctrlc_tx = tx_commands.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let _ = ctrlc_tx.try_send(Command::Quit);
    })
    .context("error setting Ctrl+C handler")?;

    spawn_stdin_reader(tx_commands);

    println!("{HELP}");
    println!("{}", controller.status_line());

    loop {
        match rx_commands.recv_timeout(TUNER_POLL) {
            Ok(Command::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => {
                let show_help = command == Command::Help;
                let show_list = command == Command::List;

                if let Err(e) = command.apply(&mut controller) {
                    error!("{e:#}");
                }

                if show_help {
                    println!("{HELP}");
                } else if show_list {
                    print_bank(&controller);
                } else {
                    print_status(&controller);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(reading) = controller.tuner_reading() {
                    print_tuner(&reading);
                }
            }
        }
    }

    settings.selected_bank = controller.current().bank;
    settings.selected_slot = controller.current().slot;
    settings.master_volume = controller.master_volume();
    if let Err(e) = settings.save() {
        warn!("Failed to save settings: {e:#}");
    }

    drop(audio);
    info!("Shut down");
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<Command>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{e:#}"),
            }
        }
        let _ = tx.send(Command::Quit);
    });
}

fn print_status(controller: &Controller) {
    let indicator = controller
        .active_preset()
        .map(preset::PresetState::indicator)
        .unwrap_or_default();
    println!(
        "{}  [{indicator}]  vol {:.2}{}",
        controller.status_line(),
        controller.master_volume(),
        if controller.is_tuner_enabled() {
            "  TUNER"
        } else {
            ""
        }
    );
}

fn print_bank(controller: &Controller) {
    let current = controller.current();
    for preset in controller.presets().bank(current.bank) {
        let marker = if preset.id == current { '>' } else { ' ' };
        println!(
            "{marker} {} [{}] {}",
            preset.id,
            preset.indicator(),
            preset.name
        );
    }
}

fn print_tuner(reading: &TunerInfo) {
    let mut needle = [b'-'; NEEDLE_WIDTH];
    needle[NEEDLE_WIDTH / 2] = b'|';
    if reading.note.is_some() {
        let pos = (reading.needle() * (NEEDLE_WIDTH - 1) as f32).round() as usize;
        needle[pos.min(NEEDLE_WIDTH - 1)] = b'^';
    }

    let mut stdout = std::io::stdout();
    let _ = write!(
        stdout,
        "\r{:<16} {} {}",
        reading.to_string(),
        String::from_utf8_lossy(&needle),
        if reading.in_tune() { "IN TUNE " } else { "        " }
    );
    let _ = stdout.flush();
}
