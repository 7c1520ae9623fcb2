// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Remote Monitor client (rmon-client)
//!
//! Usage:
//!   rmon-client                        - Connect to 127.0.0.1:65432
//!   rmon-client --host 10.0.0.5        - Connect to another host
//!   rmon-client --no-color             - Plain output

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "rmon-client")]
#[command(about = "Remote Monitor: interactive client", long_about = None)]
#[command(version)]
struct Cli {
    /// Server host
    #[arg(long, default_value = rmonlib::config::DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = rmonlib::config::DEFAULT_PORT)]
    port: u16,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[cfg(feature = "cli")]
fn main() {
    use colored::Colorize;
    use env_logger::Env;
    use rmonlib::client::{ClientSession, InputEvent, LoopEnd};
    use rmonlib::config::ClientConfig;
    use rmonlib::render::Renderer;
    use std::io::BufRead;
    use std::sync::mpsc;

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = ClientConfig {
        host: cli.host,
        port: cli.port,
    };
    let mut session = match ClientSession::connect(&config) {
        Ok(session) => {
            println!("{} Connected to {}", "[+]".green().bold(), session.address());
            session
        }
        Err(e) => {
            eprintln!("{} {}", "[!]".red().bold(), e);
            std::process::exit(1);
        }
    };

    // Typed lines and Ctrl+C arrive on one channel
    let (tx, rx) = mpsc::channel();
    let interrupt_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(InputEvent::Interrupted);
    }) {
        log::warn!("Could not install Ctrl+C handler: {}", e);
    }
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(InputEvent::Line(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(InputEvent::EndOfInput);
    });

    let renderer = Renderer::new(!cli.no_color);
    let mut stdout = std::io::stdout();
    match session.run(rx.iter(), &renderer, &mut stdout) {
        Ok(LoopEnd::Failed(reason)) => {
            eprintln!("{} {}", "[!]".red().bold(), reason);
            std::process::exit(1);
        }
        Ok(end) => log::debug!("client loop ended: {:?}", end),
        Err(e) => {
            eprintln!("{} {}", "[!]".red().bold(), e);
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
