// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `clubhouse serve` command implementation.
//!
//! Opens the club database, loads the session board, and runs the tick
//! scheduler until SIGTERM or Ctrl+C. Each tick refreshes the board; every
//! activation interval the sweep starts due reservations, cancels missed
//! ones, and applies the overtime policy.

use std::sync::Arc;

use clubhouse_config::ClubhouseConfig;
use clubhouse_core::{ClubError, SystemClock};
use clubhouse_engine::shutdown;
use clubhouse_engine::{Club, SessionBoard};
use tracing::info;

/// Run the `clubhouse serve` command.
pub async fn run_serve(config: ClubhouseConfig) -> Result<(), ClubError> {
    init_tracing(&config.club.log_level);

    info!(club = %config.club.name, "starting clubhouse");

    let club = Club::open(&config, Arc::new(SystemClock)).await?;

    let board = Arc::new(SessionBoard::new(club.db.clone()));
    let active = board.reload().await?;
    info!(active_sessions = active, "session board loaded");

    let sweep = club.sweep().with_board(Arc::clone(&board));
    let scheduler = club.scheduler(Arc::new(sweep));
    scheduler.register(board);

    let cancel = shutdown::install_signal_handler();
    scheduler.start(&cancel)?;
    info!(
        tick_ms = config.scheduler.tick_interval_ms,
        activation_secs = config.scheduler.activation_interval_secs,
        overtime_policy = ?config.scheduler.overtime_policy,
        "clubhouse ready"
    );

    cancel.cancelled().await;

    scheduler.stop().await;
    club.db.close().await?;
    info!("clubhouse stopped");
    Ok(())
}

/// Initialize the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clubhouse={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
