// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clubhouse - computer club session and reservation manager.
//!
//! This is the binary entry point: `serve` runs the scheduler, every other
//! subcommand performs one operation against the club database and exits.

mod commands;
mod serve;
mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clubhouse_config::{ClubhouseConfig, ConfigError};
use clubhouse_core::{ClubError, PaymentType, ReservationStatus, SystemClock};
use clubhouse_engine::Club;

use crate::commands::{ClientCommand, ComputerCommand, TariffCommand};

/// Clubhouse - computer club session and reservation manager.
#[derive(Parser, Debug)]
#[command(name = "clubhouse", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the club: activation sweeps, overtime tracking, live board.
    Serve,
    /// Show computers, active sessions, and upcoming reservations.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Manage clients and their balances.
    #[command(subcommand)]
    Client(ClientCommand),
    /// Manage computers.
    #[command(subcommand)]
    Computer(ComputerCommand),
    /// Manage tariffs.
    #[command(subcommand)]
    Tariff(TariffCommand),
    /// Open a walk-in session.
    Open {
        client: i64,
        computer: i64,
        /// Planned length in minutes.
        #[arg(long)]
        minutes: u32,
        /// Tariff to bill; defaults to the tariff for the computer's type.
        #[arg(long)]
        tariff: Option<i64>,
    },
    /// Close an active session and refund unused time.
    Close { session: i64 },
    /// Book a computer for a future window.
    Reserve {
        client: i64,
        computer: i64,
        /// Window start, RFC 3339 (e.g. 2026-03-01T18:00:00Z).
        #[arg(long)]
        start: DateTime<Utc>,
        /// Window length in minutes.
        #[arg(long)]
        minutes: u32,
        #[arg(long)]
        tariff: Option<i64>,
    },
    /// Cancel a pending reservation and refund it.
    CancelReservation { reservation: i64 },
    /// List reservations starting in a range (default: the next 7 days).
    Reservations {
        #[arg(long)]
        status: Option<ReservationStatus>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Run one activation sweep now.
    Activate,
    /// List ledger entries.
    Payments {
        #[arg(long)]
        client: Option<i64>,
        #[arg(long = "type")]
        payment_type: Option<PaymentType>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Check every client balance against the ledger.
    Reconcile,
}

fn load_config(path: Option<&Path>) -> Result<ClubhouseConfig, Vec<ConfigError>> {
    match path {
        Some(path) => clubhouse_config::load_and_validate_path(path),
        None => clubhouse_config::load_and_validate(),
    }
}

async fn run(config: ClubhouseConfig, command: Commands) -> Result<(), ClubError> {
    if let Commands::Serve = command {
        return serve::run_serve(config).await;
    }
    let club = Club::open(&config, Arc::new(SystemClock)).await?;
    match command {
        Commands::Status { json, plain } => status::run_status(&club, json, plain).await,
        other => commands::run(&club, other).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            clubhouse_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let Some(command) = cli.command else {
        println!("clubhouse: use --help for available commands");
        return;
    };

    if let Err(e) = run(config, command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
