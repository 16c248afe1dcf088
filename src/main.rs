//! Analog Keys - prints the key pressures of attached analog keyboards

use analog_keys::device::KeyboardSession;
use analog_keys::{AnalogKeyboardListener, AnalogKeyboardManager, Config, KeyStates, SessionError};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Analog Keys - print the key pressures of analog keyboards
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print one JSON object per line
    #[arg(long)]
    json: bool,

    /// List recognized keyboards and exit
    #[arg(long)]
    list: bool,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    time: String,
    event: &'static str,
    keyboard: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys: Option<&'a KeyStates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

/// Opens every keyboard it hears about and prints what happens
struct Printer {
    json: bool,
}

impl Printer {
    fn print(
        &self,
        event: &'static str,
        keyboard: &KeyboardSession,
        keys: Option<&KeyStates>,
        message: Option<&str>,
    ) {
        if self.json {
            let line = JsonLine {
                time: Utc::now().to_rfc3339(),
                event,
                keyboard: keyboard.name(),
                path: keyboard.path(),
                keys,
                message,
            };
            match serde_json::to_string(&line) {
                Ok(json) => println!("{}", json),
                Err(e) => log::error!("Failed to encode event: {}", e),
            }
            return;
        }

        match (keys, message) {
            (Some(keys), _) => {
                for state in keys {
                    let key = state
                        .key
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| format!("{:#04x}", state.code));
                    println!("{}: {} {:.3}", keyboard.name(), key, state.value);
                }
            }
            (None, Some(message)) => println!("{}: {} ({})", keyboard.name(), event, message),
            (None, None) => println!("{}: {}", keyboard.name(), event),
        }
    }
}

impl AnalogKeyboardListener for Printer {
    fn key_pressed(&self, keyboard: &Arc<KeyboardSession>, states: &KeyStates) {
        self.print("key pressed", keyboard, Some(states), None);
    }

    fn keyboard_added(&self, keyboard: &Arc<KeyboardSession>) {
        self.print("added", keyboard, None, None);
        match keyboard.open() {
            // Already opened by auto_open, or the manager is shutting down
            Ok(()) | Err(SessionError::AlreadyOpen) | Err(SessionError::Spent) => {}
            Err(e) => log::warn!("Cannot open {}: {}", keyboard.name(), e),
        }
    }

    fn keyboard_removed(&self, keyboard: &Arc<KeyboardSession>) {
        self.print("removed", keyboard, None, None);
    }

    fn keyboard_opened(&self, keyboard: &Arc<KeyboardSession>) {
        self.print("opened", keyboard, None, None);
    }

    fn keyboard_closed(&self, keyboard: &Arc<KeyboardSession>) {
        self.print("closed", keyboard, None, None);
    }

    fn keyboard_error(&self, keyboard: &Arc<KeyboardSession>, message: &str) {
        self.print("error", keyboard, None, Some(message));
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

fn list(manager: &AnalogKeyboardManager, json: bool) -> Result<()> {
    manager.start()?;
    for keyboard in manager.keyboards() {
        if json {
            println!("{}", serde_json::to_string(keyboard.info())?);
        } else {
            let info = keyboard.info();
            println!(
                "{}\t{}\t{}\t{}",
                info.name,
                info.identity,
                info.serial_number.as_deref().unwrap_or("-"),
                info.path
            );
        }
    }
    manager.stop()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let manager = AnalogKeyboardManager::with_hidapi(&config)?;

    if cli.list {
        return list(&manager, cli.json);
    }

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    manager.add_listener(Arc::new(Printer { json: cli.json }));
    manager.start()?;
    if manager.keyboards().is_empty() {
        log::info!("No analog keyboard found, waiting for one to be plugged in");
    }

    stop_rx.recv().context("Ctrl-C handler went away")?;
    log::info!("Shutting down");
    manager.stop()?;
    Ok(())
}
