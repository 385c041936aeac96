// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `clubhouse status` command implementation.
//!
//! Reads the club database directly and shows every computer with its
//! displayed status, the live session board, and reservations that have
//! not yet started or ended.

use std::io::IsTerminal;

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_core::{Clock, ClubError, ComputerStatus, Reservation, ReservationStatus};
use clubhouse_engine::{BoardRow, Club, ComputerAvailability, SessionBoard, TickObserver};
use serde::Serialize;

/// How far back and ahead pending reservations are listed, in hours.
const UPCOMING_WINDOW_HOURS: i64 = 24;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub club: String,
    pub generated_at: DateTime<Utc>,
    pub computers: Vec<ComputerAvailability>,
    pub sessions: Vec<BoardRow>,
    pub upcoming: Vec<Reservation>,
}

/// Format a duration as `1d 2h 3m`, dropping leading zero units.
/// Negative durations render as `0m`.
pub fn format_duration(duration: TimeDelta) -> String {
    let secs = u64::try_from(duration.num_seconds()).unwrap_or(0);
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

async fn collect(club: &Club) -> Result<StatusReport, ClubError> {
    let now = club.clock.now();
    let window = TimeDelta::hours(UPCOMING_WINDOW_HOURS);

    let board = SessionBoard::new(club.db.clone());
    board.reload().await?;
    board.on_tick(now);

    let mut upcoming = club
        .reservations
        .reservations_in_range(
            Some(ReservationStatus::Pending),
            now - window,
            now + window,
        )
        .await?;
    upcoming.retain(|r| !r.has_elapsed(now));

    Ok(StatusReport {
        club: club.config().club.name.clone(),
        generated_at: now,
        computers: club.registry.snapshot().await?,
        sessions: board.rows(),
        upcoming,
    })
}

/// Run the `clubhouse status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(club: &Club, json: bool, plain: bool) -> Result<(), ClubError> {
    let report = collect(club).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| ClubError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }
    Ok(())
}

fn status_label(status: ComputerStatus, use_color: bool) -> String {
    if !use_color {
        return status.to_string();
    }
    use colored::Colorize;
    let label = status.to_string();
    match status {
        ComputerStatus::Available => label.green().to_string(),
        ComputerStatus::Occupied => label.yellow().to_string(),
        ComputerStatus::Reserved => label.cyan().to_string(),
        ComputerStatus::OutOfService => label.red().to_string(),
    }
}

fn print_report(report: &StatusReport, use_color: bool) {
    println!();
    println!("  {} status at {}", report.club, format_time(report.generated_at));
    println!("  {}", "-".repeat(45));

    println!("  Computers:");
    if report.computers.is_empty() {
        println!("    none registered");
    }
    for a in &report.computers {
        println!(
            "    #{:<4} {:<10} {}",
            a.computer.id,
            a.computer.computer_type,
            status_label(a.displayed_status, use_color)
        );
    }

    println!();
    println!("  Sessions:");
    if report.sessions.is_empty() {
        println!("    no active sessions");
    }
    for row in &report.sessions {
        let remaining = match row.overtime {
            Some(over) => {
                let text = format!("overtime {}", format_duration(over));
                if use_color {
                    use colored::Colorize;
                    text.red().to_string()
                } else {
                    format!("[OVER] {text}")
                }
            }
            None => format!("{} left", format_duration(row.remaining)),
        };
        println!(
            "    session {:<5} computer {:<4} client {:<5} {:>8} used, {}, cost {}",
            row.session_id,
            row.computer_id,
            row.client_id,
            format_duration(row.elapsed),
            remaining,
            row.running_cost
        );
    }

    println!();
    println!("  Upcoming reservations:");
    if report.upcoming.is_empty() {
        println!("    none");
    }
    for r in &report.upcoming {
        println!(
            "    #{:<5} computer {:<4} client {:<5} {} to {}",
            r.id,
            r.computer_id,
            r.client_id,
            format_time(r.starts_at),
            format_time(r.ends_at)
        );
    }
    println!();
}
