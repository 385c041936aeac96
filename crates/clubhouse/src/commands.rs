// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot operator commands run against the club database.

use chrono::{DateTime, TimeDelta, Utc};
use clap::Subcommand;
use clubhouse_core::{
    ClientId, Clock, ClubError, ComputerId, ComputerType, Money, ReservationId, ReservationStatus,
    SessionId, TariffId,
};
use clubhouse_engine::{CashSummary, Club};
use clubhouse_storage::PaymentFilter;

use crate::Commands;
use crate::status::{format_duration, format_time};

/// Default look-ahead for `clubhouse reservations`.
const RESERVATION_WINDOW_DAYS: i64 = 7;

#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Register a client.
    Add {
        full_name: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    /// List clients with their balances.
    List,
    /// Show a client's balance, history, and ledger check.
    Show { client: i64 },
    /// Credit money to a client's balance.
    TopUp { client: i64, amount: Money },
}

#[derive(Subcommand, Debug)]
pub enum ComputerCommand {
    /// Register a computer.
    Add {
        #[arg(long = "type", default_value = "Unassigned")]
        computer_type: ComputerType,
    },
    /// List computers with their displayed status.
    List,
    /// Show a computer's availability.
    Show { computer: i64 },
    /// Remove an idle computer.
    Remove { computer: i64 },
    /// Take a computer out of service, or return it with `--clear`.
    OutOfService {
        computer: i64,
        #[arg(long)]
        clear: bool,
    },
    /// Change a computer's hardware class.
    SetType {
        computer: i64,
        computer_type: ComputerType,
    },
}

#[derive(Subcommand, Debug)]
pub enum TariffCommand {
    /// Create the tariff for a computer type.
    Add {
        name: String,
        price_per_hour: Money,
        #[arg(long = "type")]
        computer_type: ComputerType,
    },
    /// Rename or reprice a tariff.
    Update {
        tariff: i64,
        name: String,
        price_per_hour: Money,
    },
    Remove { tariff: i64 },
    List,
}

fn minutes(value: u32) -> TimeDelta {
    TimeDelta::minutes(i64::from(value))
}

/// The explicit tariff, or the one configured for the computer's type.
async fn resolve_tariff(
    club: &Club,
    computer: ComputerId,
    tariff: Option<i64>,
) -> Result<TariffId, ClubError> {
    if let Some(id) = tariff {
        return Ok(TariffId(id));
    }
    let computer = club.registry.availability(computer).await?.computer;
    club.catalog
        .tariff_for_type(computer.computer_type)
        .await?
        .map(|tariff| tariff.id)
        .ok_or_else(|| {
            ClubError::Validation(format!(
                "no tariff for {} computers; pass --tariff",
                computer.computer_type
            ))
        })
}

/// Run every subcommand except `serve` and `status`.
pub async fn run(club: &Club, command: Commands) -> Result<(), ClubError> {
    match command {
        Commands::Client(command) => run_client(club, command).await,
        Commands::Computer(command) => run_computer(club, command).await,
        Commands::Tariff(command) => run_tariff(club, command).await,
        Commands::Open {
            client,
            computer,
            minutes: length,
            tariff,
        } => {
            let computer = ComputerId(computer);
            let tariff = resolve_tariff(club, computer, tariff).await?;
            let session = club
                .sessions
                .open_session(ClientId(client), computer, tariff, minutes(length))
                .await?;
            let balance = club.catalog.client(session.client_id).await?.balance;
            println!(
                "session {} open on computer {} until {} (balance {balance})",
                session.id,
                session.computer_id,
                format_time(session.planned_end_at())
            );
            Ok(())
        }
        Commands::Close { session } => {
            let session = club.sessions.close_session(SessionId(session)).await?;
            let balance = club.catalog.client(session.client_id).await?.balance;
            let used = session
                .ended_at
                .map(|ended| ended - session.started_at)
                .unwrap_or_default();
            println!(
                "session {} closed after {}, cost {} (balance {balance})",
                session.id,
                format_duration(used),
                session.total_cost.unwrap_or_default()
            );
            Ok(())
        }
        Commands::Reserve {
            client,
            computer,
            start,
            minutes: length,
            tariff,
        } => {
            let computer = ComputerId(computer);
            let tariff = resolve_tariff(club, computer, tariff).await?;
            let reservation = club
                .reservations
                .reserve(ClientId(client), computer, tariff, start, minutes(length))
                .await?;
            println!(
                "reservation {} on computer {}: {} to {}",
                reservation.id,
                reservation.computer_id,
                format_time(reservation.starts_at),
                format_time(reservation.ends_at)
            );
            Ok(())
        }
        Commands::CancelReservation { reservation } => {
            let reservation = club
                .reservations
                .cancel_reservation(ReservationId(reservation))
                .await?;
            let balance = club.catalog.client(reservation.client_id).await?.balance;
            println!("reservation {} cancelled (balance {balance})", reservation.id);
            Ok(())
        }
        Commands::Reservations { status, from, to } => {
            let from = from.unwrap_or_else(|| club.clock.now());
            let to = to.unwrap_or(from + TimeDelta::days(RESERVATION_WINDOW_DAYS));
            let reservations = club.reservations.reservations_in_range(status, from, to).await?;
            if reservations.is_empty() {
                println!("no reservations");
            }
            for r in reservations {
                println!(
                    "{:>5}  {:<10} client {:<5} computer {:<4} {} to {}",
                    r.id,
                    r.status,
                    r.client_id,
                    r.computer_id,
                    format_time(r.starts_at),
                    format_time(r.ends_at)
                );
            }
            Ok(())
        }
        Commands::Activate => {
            let report = club.reservations.activate_reservations().await?;
            println!(
                "activated {}, cancelled {}, deferred {}, failed {}",
                report.activated, report.cancelled, report.deferred, report.failed
            );
            Ok(())
        }
        Commands::Payments {
            client,
            payment_type,
            from,
            to,
        } => {
            let filter = PaymentFilter {
                client_id: client.map(ClientId),
                payment_type,
                from,
                to,
            };
            for p in club.ledger.payments(filter).await? {
                println!(
                    "{:>5}  {}  client {:<5} {:<7} {:>10}",
                    p.id,
                    format_time(p.created_at),
                    p.client_id,
                    p.payment_type,
                    p.amount
                );
            }
            print_cash_summary(&cash_summary(club, from, to).await?);
            Ok(())
        }
        Commands::Reconcile => {
            let mut mismatches = 0;
            for r in club.ledger.reconcile_all().await? {
                if !r.is_consistent() {
                    mismatches += 1;
                    println!(
                        "client {}: balance {} but ledger sums to {}",
                        r.client_id, r.balance, r.ledger_total
                    );
                }
            }
            if mismatches > 0 {
                return Err(ClubError::InvalidState(format!(
                    "{mismatches} client balance(s) disagree with the ledger"
                )));
            }
            println!("all balances match the ledger");
            Ok(())
        }
        Commands::Serve | Commands::Status { .. } => Err(ClubError::InvalidState(
            "serve and status are not one-shot commands".to_string(),
        )),
    }
}

/// Club-wide totals for the `payments` range. With no bounds this is the
/// current UTC day; an open end runs to now, an open start one day back.
async fn cash_summary(
    club: &Club,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<CashSummary, ClubError> {
    match (from, to) {
        (None, None) => club.ledger.summary_today().await,
        (from, to) => {
            let to = to.unwrap_or_else(|| club.clock.now());
            let from = from.unwrap_or(to - TimeDelta::days(1));
            club.ledger.summary(from, to).await
        }
    }
}

fn print_cash_summary(summary: &CashSummary) {
    println!();
    println!(
        "cash {} to {}",
        format_time(summary.from),
        format_time(summary.to)
    );
    println!("  top-ups  {:>10}", summary.top_up);
    println!("  charges  {:>10}", summary.charge);
    println!("  refunds  {:>10}", summary.refund);
    println!("  net      {:>10}", summary.net);
}

async fn run_client(club: &Club, command: ClientCommand) -> Result<(), ClubError> {
    match command {
        ClientCommand::Add { full_name, phone } => {
            let client = club.catalog.add_client(&full_name, &phone).await?;
            println!("client {} registered: {}", client.id, client.full_name);
        }
        ClientCommand::List => {
            for c in club.catalog.clients().await? {
                println!("{:>5}  {:<24} {:<16} {:>10}", c.id, c.full_name, c.phone, c.balance);
            }
        }
        ClientCommand::Show { client } => {
            let id = ClientId(client);
            let client = club.catalog.client(id).await?;
            let check = club.ledger.reconcile(id).await?;
            println!("{} ({})", client.full_name, client.phone);
            println!("  balance:   {}", client.balance);
            println!("  topped up: {}", club.ledger.total_top_up(id).await?);
            println!("  spent:     {}", club.ledger.total_spent(id).await?);
            if !check.is_consistent() {
                println!("  ledger:    {} (MISMATCH)", check.ledger_total);
            }
            for s in club.sessions.sessions_for_client(id).await? {
                println!(
                    "  session {:>5}  computer {:<4} {}  {:<10} {}",
                    s.id,
                    s.computer_id,
                    format_time(s.started_at),
                    s.status,
                    s.total_cost.map(|c| c.to_string()).unwrap_or_default()
                );
            }
        }
        ClientCommand::TopUp { client, amount } => {
            let payment = club.ledger.top_up(ClientId(client), amount).await?;
            let balance = club.catalog.client(payment.client_id).await?.balance;
            println!("credited {} to client {} (balance {balance})", payment.amount, payment.client_id);
        }
    }
    Ok(())
}

async fn run_computer(club: &Club, command: ComputerCommand) -> Result<(), ClubError> {
    match command {
        ComputerCommand::Add { computer_type } => {
            let computer = club.catalog.add_computer(computer_type).await?;
            println!("computer {} registered ({})", computer.id, computer.computer_type);
        }
        ComputerCommand::List => {
            for a in club.registry.snapshot().await? {
                println!(
                    "{:>4}  {:<10} {}",
                    a.computer.id, a.computer.computer_type, a.displayed_status
                );
            }
        }
        ComputerCommand::Show { computer } => {
            let a = club.registry.availability(ComputerId(computer)).await?;
            println!(
                "computer {} ({}): {}",
                a.computer.id, a.computer.computer_type, a.displayed_status
            );
            if let Some(s) = a.current_session {
                println!(
                    "  session {} for client {} until {}",
                    s.id,
                    s.client_id,
                    format_time(s.planned_end_at())
                );
            }
            if let Some(r) = a.next_reservation {
                println!(
                    "  next reservation {} for client {} at {}",
                    r.id,
                    r.client_id,
                    format_time(r.starts_at)
                );
            }
        }
        ComputerCommand::Remove { computer } => {
            club.catalog.remove_computer(ComputerId(computer)).await?;
            println!("computer {computer} removed");
        }
        ComputerCommand::OutOfService { computer, clear } => {
            let id = ComputerId(computer);
            let computer = if clear {
                club.registry.clear_out_of_service(id).await?
            } else {
                club.registry.set_out_of_service(id).await?
            };
            println!("computer {} is now {}", computer.id, computer.status);
        }
        ComputerCommand::SetType {
            computer,
            computer_type,
        } => {
            let computer = club
                .catalog
                .set_computer_type(ComputerId(computer), computer_type)
                .await?;
            println!("computer {} is now {}", computer.id, computer.computer_type);
        }
    }
    Ok(())
}

async fn run_tariff(club: &Club, command: TariffCommand) -> Result<(), ClubError> {
    match command {
        TariffCommand::Add {
            name,
            price_per_hour,
            computer_type,
        } => {
            let tariff = club
                .catalog
                .add_tariff(&name, price_per_hour, computer_type)
                .await?;
            println!("tariff {} created: {} at {}/h", tariff.id, tariff.name, tariff.price_per_hour);
        }
        TariffCommand::Update {
            tariff,
            name,
            price_per_hour,
        } => {
            let tariff = club
                .catalog
                .update_tariff(TariffId(tariff), &name, price_per_hour)
                .await?;
            println!("tariff {} is now {} at {}/h", tariff.id, tariff.name, tariff.price_per_hour);
        }
        TariffCommand::Remove { tariff } => {
            club.catalog.remove_tariff(TariffId(tariff)).await?;
            println!("tariff {tariff} removed");
        }
        TariffCommand::List => {
            for t in club.catalog.tariffs().await? {
                println!(
                    "{:>4}  {:<16} {:<10} {:>8}/h",
                    t.id, t.name, t.computer_type, t.price_per_hour
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use clubhouse_config::ClubhouseConfig;
    use clubhouse_core::{ComputerStatus, FakeClock, PaymentType};
    use clubhouse_storage::Database;
    use rust_decimal_macros::dec;

    use super::*;

    async fn club() -> (Club, FakeClock) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = FakeClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
        let club = Club::new(db, Arc::new(clock.clone()), &ClubhouseConfig::default());
        (club, clock)
    }

    async fn seed(club: &Club) {
        run(
            club,
            Commands::Client(ClientCommand::Add {
                full_name: "Ada".to_string(),
                phone: "+100".to_string(),
            }),
        )
        .await
        .unwrap();
        run(
            club,
            Commands::Client(ClientCommand::TopUp {
                client: 1,
                amount: dec!(500),
            }),
        )
        .await
        .unwrap();
        run(
            club,
            Commands::Computer(ComputerCommand::Add {
                computer_type: ComputerType::Premium,
            }),
        )
        .await
        .unwrap();
        run(
            club,
            Commands::Tariff(TariffCommand::Add {
                name: "Premium".to_string(),
                price_per_hour: dec!(120),
                computer_type: ComputerType::Premium,
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn open_uses_tariff_for_computer_type() {
        let (club, _clock) = club().await;
        seed(&club).await;

        run(
            &club,
            Commands::Open {
                client: 1,
                computer: 1,
                minutes: 30,
                tariff: None,
            },
        )
        .await
        .unwrap();

        let client = club.catalog.client(ClientId(1)).await.unwrap();
        assert_eq!(client.balance, dec!(440));
        let computer = club.registry.availability(ComputerId(1)).await.unwrap();
        assert_eq!(computer.computer.status, ComputerStatus::Occupied);
    }

    #[tokio::test]
    async fn open_without_matching_tariff_is_rejected() {
        let (club, _clock) = club().await;
        seed(&club).await;
        run(
            &club,
            Commands::Computer(ComputerCommand::Add {
                computer_type: ComputerType::Economy,
            }),
        )
        .await
        .unwrap();

        let err = run(
            &club,
            Commands::Open {
                client: 1,
                computer: 2,
                minutes: 30,
                tariff: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClubError::Validation(_)));
    }

    #[tokio::test]
    async fn close_refunds_unused_time() {
        let (club, clock) = club().await;
        seed(&club).await;
        run(
            &club,
            Commands::Open {
                client: 1,
                computer: 1,
                minutes: 60,
                tariff: None,
            },
        )
        .await
        .unwrap();

        clock.advance(TimeDelta::minutes(30));
        run(&club, Commands::Close { session: 1 }).await.unwrap();

        let client = club.catalog.client(ClientId(1)).await.unwrap();
        assert_eq!(client.balance, dec!(440));
        run(&club, Commands::Reconcile).await.unwrap();
    }

    #[tokio::test]
    async fn reserve_then_cancel_restores_balance() {
        let (club, clock) = club().await;
        seed(&club).await;
        let start = clock.now() + TimeDelta::hours(2);
        run(
            &club,
            Commands::Reserve {
                client: 1,
                computer: 1,
                start,
                minutes: 60,
                tariff: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(club.catalog.client(ClientId(1)).await.unwrap().balance, dec!(380));

        run(&club, Commands::CancelReservation { reservation: 1 })
            .await
            .unwrap();
        assert_eq!(club.catalog.client(ClientId(1)).await.unwrap().balance, dec!(500));

        let refunds = club
            .ledger
            .payments(PaymentFilter {
                payment_type: Some(PaymentType::Refund),
                ..PaymentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(refunds.len(), 1);
        let cancelled = club
            .reservations
            .reservations_in_range(
                Some(ReservationStatus::Cancelled),
                clock.now(),
                clock.now() + TimeDelta::days(1),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
    }

    #[tokio::test]
    async fn activate_starts_due_reservation() {
        let (club, clock) = club().await;
        seed(&club).await;
        let start = clock.now() + TimeDelta::minutes(15);
        run(
            &club,
            Commands::Reserve {
                client: 1,
                computer: 1,
                start,
                minutes: 60,
                tariff: None,
            },
        )
        .await
        .unwrap();

        clock.advance(TimeDelta::minutes(20));
        run(&club, Commands::Activate).await.unwrap();

        let sessions = club.sessions.active_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].reservation_id, Some(ReservationId(1)));
    }

    #[tokio::test]
    async fn out_of_service_round_trip() {
        let (club, _clock) = club().await;
        seed(&club).await;

        run(
            &club,
            Commands::Computer(ComputerCommand::OutOfService {
                computer: 1,
                clear: false,
            }),
        )
        .await
        .unwrap();
        let err = run(
            &club,
            Commands::Open {
                client: 1,
                computer: 1,
                minutes: 30,
                tariff: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClubError::Conflict(_)));

        run(
            &club,
            Commands::Computer(ComputerCommand::OutOfService {
                computer: 1,
                clear: true,
            }),
        )
        .await
        .unwrap();
        let a = club.registry.availability(ComputerId(1)).await.unwrap();
        assert_eq!(a.displayed_status, ComputerStatus::Available);
    }

    #[tokio::test]
    async fn tariff_in_use_cannot_be_removed() {
        let (club, _clock) = club().await;
        seed(&club).await;
        run(
            &club,
            Commands::Open {
                client: 1,
                computer: 1,
                minutes: 30,
                tariff: None,
            },
        )
        .await
        .unwrap();

        let err = run(&club, Commands::Tariff(TariffCommand::Remove { tariff: 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::Conflict(_)));
    }

    #[tokio::test]
    async fn payments_footer_sums_the_day() {
        let (club, clock) = club().await;
        seed(&club).await;
        run(
            &club,
            Commands::Open {
                client: 1,
                computer: 1,
                minutes: 60,
                tariff: None,
            },
        )
        .await
        .unwrap();
        clock.advance(TimeDelta::minutes(30));
        run(&club, Commands::Close { session: 1 }).await.unwrap();

        let today = cash_summary(&club, None, None).await.unwrap();
        assert_eq!(today.top_up, dec!(500));
        assert_eq!(today.charge, dec!(-120));
        assert_eq!(today.refund, dec!(60));
        assert_eq!(today.net, dec!(440));

        // Before the top-up nothing had moved.
        let early = cash_summary(&club, None, Some(clock.now() - TimeDelta::hours(1)))
            .await
            .unwrap();
        assert_eq!(early.net, dec!(0));

        run(
            &club,
            Commands::Payments {
                client: None,
                payment_type: Some(PaymentType::Refund),
                from: None,
                to: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn serve_is_not_a_one_shot_command() {
        let (club, _clock) = club().await;
        assert!(run(&club, Commands::Serve).await.is_err());
    }
}
