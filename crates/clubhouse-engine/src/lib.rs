// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session and reservation lifecycle engine for Clubhouse.
//!
//! The [`Club`] bundles the engines that share one [`Database`] and one
//! [`Clock`]:
//! - [`SessionEngine`] opens and closes walk-in sessions
//! - [`ReservationEngine`] books windows and turns due ones into sessions
//! - [`ComputerRegistry`] guards computer status and reports availability
//! - [`Catalog`] administers clients, computers, and tariffs
//! - [`TickScheduler`] drives display observers and the periodic sweep
//!
//! Every write runs as one unit of work on the storage writer thread, so
//! balance, ledger, computer, and session changes commit together or not
//! at all.

pub mod board;
pub mod catalog;
pub mod registry;
pub mod reservation;
pub mod session;
pub mod shutdown;
pub mod sweep;
pub mod tick;

use std::sync::Arc;

use clubhouse_config::ClubhouseConfig;
use clubhouse_core::{Clock, ClubError};
use clubhouse_storage::Database;

pub use board::{BoardRow, SessionBoard};
pub use catalog::Catalog;
pub use clubhouse_billing::{CashSummary, Ledger, Reconciliation};
pub use registry::{ComputerAvailability, ComputerRegistry};
pub use reservation::{ActivationReport, ReservationEngine};
pub use session::SessionEngine;
pub use sweep::{ActivationSweep, EngineSweep, SweepReport};
pub use tick::{ObserverToken, TickObserver, TickScheduler, TickSettings};

/// All engines wired to one database and clock.
#[derive(Clone)]
pub struct Club {
    pub db: Database,
    pub clock: Arc<dyn Clock>,
    pub catalog: Catalog,
    pub registry: ComputerRegistry,
    pub sessions: SessionEngine,
    pub reservations: ReservationEngine,
    pub ledger: Ledger,
    config: ClubhouseConfig,
}

impl Club {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: &ClubhouseConfig) -> Self {
        Self {
            catalog: Catalog::new(db.clone(), Arc::clone(&clock)),
            registry: ComputerRegistry::new(db.clone(), Arc::clone(&clock)),
            sessions: SessionEngine::from_config(db.clone(), Arc::clone(&clock), &config.session),
            reservations: ReservationEngine::from_config(
                db.clone(),
                Arc::clone(&clock),
                &config.session,
            ),
            ledger: Ledger::new(db.clone(), Arc::clone(&clock)),
            config: config.clone(),
            db,
            clock,
        }
    }

    /// Open the configured database and wire the engines to it.
    pub async fn open(config: &ClubhouseConfig, clock: Arc<dyn Clock>) -> Result<Self, ClubError> {
        let db = Database::from_config(&config.storage).await?;
        Ok(Self::new(db, clock, config))
    }

    /// The periodic sweep under the configured overtime policy.
    pub fn sweep(&self) -> EngineSweep {
        EngineSweep::new(
            self.reservations.clone(),
            self.sessions.clone(),
            self.config.scheduler.overtime_policy,
        )
    }

    /// A stopped scheduler with the configured cadence running `sweep`.
    pub fn scheduler(&self, sweep: Arc<dyn ActivationSweep>) -> TickScheduler {
        TickScheduler::with_sweep(
            Arc::clone(&self.clock),
            TickSettings::from(&self.config.scheduler),
            sweep,
        )
    }

    pub fn config(&self) -> &ClubhouseConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use clubhouse_billing::ledger::{PaymentLink, credit};
    use clubhouse_core::{
        ClientId, Clock, ComputerId, ComputerStatus, ComputerType, FakeClock, Money, PaymentType,
        Reservation, TariffId,
    };
    use clubhouse_storage::queries::{clients, computers, reservations, tariffs};
    use clubhouse_storage::{Database, NewReservation};
    use rust_decimal::Decimal;

    pub fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    /// One client, one Standard computer, and a 100/h Standard tariff.
    /// The clock starts at 10:00.
    pub struct Fixture {
        pub db: Database,
        pub clock: FakeClock,
        pub client: ClientId,
        pub computer: ComputerId,
        pub tariff: TariffId,
    }

    impl Fixture {
        pub async fn new(balance: i64) -> Self {
            let db = Database::open_in_memory().await.unwrap();
            let clock = FakeClock::new(at(10, 0));
            let (client, computer, tariff) = db
                .unit_of_work(move |tx| {
                    let client = clients::insert_client(tx, "Ada", "+100", at(9, 0))?.id;
                    let computer =
                        computers::insert_computer(tx, ComputerType::Standard, at(9, 0))?.id;
                    let tariff =
                        tariffs::insert_tariff(tx, "Standard", Decimal::from(100), ComputerType::Standard)?
                            .id;
                    if balance > 0 {
                        credit(
                            tx,
                            client,
                            PaymentType::TopUp,
                            Decimal::from(balance),
                            PaymentLink::none(),
                            at(9, 0),
                        )?;
                    }
                    Ok((client, computer, tariff))
                })
                .await
                .unwrap();
            Self {
                db,
                clock,
                client,
                computer,
                tariff,
            }
        }

        pub fn clock(&self) -> Arc<dyn Clock> {
            Arc::new(self.clock.clone())
        }

        pub async fn balance(&self) -> Money {
            let id = self.client;
            self.db
                .call(move |conn| clients::require_client(conn, id))
                .await
                .unwrap()
                .balance
        }

        pub async fn computer_status(&self) -> ComputerStatus {
            let id = self.computer;
            self.db
                .call(move |conn| computers::require_computer(conn, id))
                .await
                .unwrap()
                .status
        }

        /// Insert a Pending reservation directly, without charging.
        pub async fn insert_pending(&self, starts_at: DateTime<Utc>, length: TimeDelta) -> Reservation {
            let new = NewReservation {
                client_id: self.client,
                computer_id: self.computer,
                tariff_id: self.tariff,
                starts_at,
                ends_at: starts_at + length,
                created_at: at(9, 30),
            };
            self.db
                .call(move |conn| reservations::insert_reservation(conn, &new))
                .await
                .unwrap()
        }
    }
}
