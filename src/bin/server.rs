// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Remote Monitor server (rmon-server)
//!
//! Usage:
//!   rmon-server                        - Serve one client on 127.0.0.1:65432
//!   rmon-server --port 9000            - Override the port
//!   rmon-server --config rmon.toml     - Load settings from a TOML file
//!   rmon-server --print-config         - Print a sample configuration

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "rmon-server")]
#[command(about = "Remote Monitor: single-client system monitoring server", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    print_config: bool,
}

#[cfg(feature = "cli")]
fn main() {
    use colored::Colorize;
    use env_logger::Env;
    use rmonlib::config::ServerConfig;
    use rmonlib::server::MonitorServer;

    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", ServerConfig::sample_toml());
        return;
    }

    let mut config = match &cli.config {
        Some(path) => match ServerConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{} {}", "[!]".red().bold(), e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_filter()))
        .init();

    let server = match MonitorServer::from_config(&config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Server error: {}", e);
            eprintln!("{} {}", "[!]".red().bold(), e);
            std::process::exit(1);
        }
    };

    match server.serve_once() {
        Ok(outcome) => log::info!("Session finished: {}", outcome),
        Err(e) => {
            log::error!("Server error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
