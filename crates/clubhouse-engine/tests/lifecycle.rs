// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end session and reservation scenarios against an in-memory store.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use clubhouse_config::{ClubhouseConfig, OvertimePolicy};
use clubhouse_core::{
    ClientId, ClubError, ComputerId, ComputerStatus, ComputerType, FakeClock, PaymentType,
    ReservationStatus, SessionStatus, TariffId,
};
use clubhouse_engine::{ActivationReport, ActivationSweep, Club};
use clubhouse_storage::{sql_err, Database, PaymentFilter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
}

struct Harness {
    club: Club,
    clock: FakeClock,
    client: ClientId,
    computer: ComputerId,
    tariff: TariffId,
}

impl Harness {
    async fn new(price: Decimal, balance: Decimal) -> Self {
        Self::with_config(price, balance, ClubhouseConfig::default()).await
    }

    async fn with_config(price: Decimal, balance: Decimal, config: ClubhouseConfig) -> Self {
        let clock = FakeClock::new(at(10, 0));
        let db = Database::open_in_memory().await.unwrap();
        let club = Club::new(db, Arc::new(clock.clone()), &config);

        let client = club.catalog.add_client("Ada Lovelace", "+44").await.unwrap().id;
        let computer = club.catalog.add_computer(ComputerType::Standard).await.unwrap().id;
        let tariff = club
            .catalog
            .add_tariff("Standard", price, ComputerType::Standard)
            .await
            .unwrap()
            .id;
        club.ledger.top_up(client, balance).await.unwrap();

        Self {
            club,
            clock,
            client,
            computer,
            tariff,
        }
    }

    async fn balance(&self) -> Decimal {
        self.club.catalog.client(self.client).await.unwrap().balance
    }

    async fn computer_status(&self) -> ComputerStatus {
        self.club
            .registry
            .availability(self.computer)
            .await
            .unwrap()
            .computer
            .status
    }

    async fn payments(&self, kind: PaymentType) -> Vec<Decimal> {
        self.club
            .ledger
            .payments(PaymentFilter::for_client(self.client).with_type(kind))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.amount)
            .collect()
    }

    async fn assert_reconciled(&self) {
        for rec in self.club.ledger.reconcile_all().await.unwrap() {
            assert!(rec.is_consistent(), "ledger drifted: {rec:?}");
        }
    }
}

#[tokio::test]
async fn walk_in_session_with_early_close() {
    let h = Harness::new(dec!(100), dec!(1000)).await;

    let session = h
        .club
        .sessions
        .open_session(h.client, h.computer, h.tariff, TimeDelta::hours(2))
        .await
        .unwrap();
    assert_eq!(h.balance().await, dec!(800));
    assert_eq!(h.payments(PaymentType::Charge).await, vec![dec!(-200)]);
    assert_eq!(h.computer_status().await, ComputerStatus::Occupied);

    h.clock.advance(TimeDelta::hours(1));
    let closed = h.club.sessions.close_session(session.id).await.unwrap();
    assert_eq!(closed.total_cost, Some(dec!(100)));
    assert_eq!(closed.status, SessionStatus::Completed);
    assert_eq!(h.balance().await, dec!(900));
    assert_eq!(h.payments(PaymentType::Refund).await, vec![dec!(100)]);
    assert_eq!(h.computer_status().await, ComputerStatus::Available);

    assert_eq!(h.club.ledger.total_top_up(h.client).await.unwrap(), dec!(1000));
    assert_eq!(h.club.ledger.total_spent(h.client).await.unwrap(), dec!(200));
    h.assert_reconciled().await;
}

#[tokio::test]
async fn reservation_activated_mid_window() {
    let h = Harness::new(dec!(50), dec!(200)).await;

    let reservation = h
        .club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(11, 0), TimeDelta::hours(1))
        .await
        .unwrap();
    assert_eq!(h.balance().await, dec!(150));
    assert_eq!(h.payments(PaymentType::Charge).await, vec![dec!(-50)]);

    let snapshot = h.club.registry.snapshot().await.unwrap();
    assert_eq!(snapshot[0].displayed_status, ComputerStatus::Reserved);

    h.clock.set(at(11, 30));
    let report = h.club.sweep().sweep().await.unwrap();
    assert_eq!(report.activation.activated, 1);

    let reservation = h.club.reservations.reservation(reservation.id).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Active);

    let active = h.club.sessions.active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].planned_duration, TimeDelta::minutes(30));
    assert_eq!(active[0].reservation_id, Some(reservation.id));

    assert_eq!(h.payments(PaymentType::Refund).await, vec![dec!(25)]);
    assert_eq!(h.balance().await, dec!(175));
    h.assert_reconciled().await;
}

#[tokio::test]
async fn missed_reservation_is_cancelled_and_refunded() {
    let h = Harness::new(dec!(50), dec!(200)).await;
    let reservation = h
        .club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(11, 0), TimeDelta::hours(1))
        .await
        .unwrap();

    h.clock.set(at(12, 5));
    let report = h.club.reservations.activate_reservations().await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(
        h.club.reservations.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Cancelled
    );
    assert_eq!(h.balance().await, dec!(200));
    assert!(h.club.sessions.active_sessions().await.unwrap().is_empty());
    h.assert_reconciled().await;
}

#[tokio::test]
async fn sweep_is_idempotent_without_time_passing() {
    let h = Harness::new(dec!(60), dec!(500)).await;
    h.club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(10, 30), TimeDelta::hours(2))
        .await
        .unwrap();

    h.clock.set(at(10, 40));
    let sweep = h.club.sweep();
    let first = sweep.sweep().await.unwrap();
    let balance = h.balance().await;
    let second = sweep.sweep().await.unwrap();

    assert_eq!(first.activation.activated, 1);
    assert!(second.activation.is_empty());
    assert_eq!(h.balance().await, balance);
    assert_eq!(h.club.sessions.active_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn deferred_activation_proceeds_after_manual_session_ends() {
    let h = Harness::new(dec!(100), dec!(1000)).await;
    let walk_in = h
        .club
        .sessions
        .open_session(h.client, h.computer, h.tariff, TimeDelta::hours(1))
        .await
        .unwrap();
    let reservation = h
        .club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(10, 30), TimeDelta::hours(1))
        .await
        .unwrap();

    h.clock.set(at(10, 30));
    let report = h.club.reservations.activate_reservations().await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(
        h.club.reservations.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Pending
    );

    h.clock.set(at(10, 45));
    h.club.sessions.close_session(walk_in.id).await.unwrap();
    let report = h.club.reservations.activate_reservations().await.unwrap();
    assert_eq!(report.activated, 1);

    let active = h.club.sessions.active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].reservation_id, Some(reservation.id));
    assert_eq!(active[0].planned_duration, TimeDelta::minutes(45));
    h.assert_reconciled().await;
}

#[tokio::test]
async fn deferred_activation_cancels_once_window_passes() {
    let h = Harness::new(dec!(100), dec!(1000)).await;
    h.club
        .sessions
        .open_session(h.client, h.computer, h.tariff, TimeDelta::hours(3))
        .await
        .unwrap();
    let reservation = h
        .club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(11, 0), TimeDelta::minutes(30))
        .await
        .unwrap();
    let balance = h.balance().await;

    h.clock.set(at(11, 10));
    assert_eq!(h.club.reservations.activate_reservations().await.unwrap().deferred, 1);

    h.clock.set(at(11, 30));
    assert_eq!(h.club.reservations.activate_reservations().await.unwrap().cancelled, 1);
    assert_eq!(
        h.club.reservations.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Cancelled
    );
    assert_eq!(h.balance().await, balance + dec!(50));
    h.assert_reconciled().await;
}

#[tokio::test]
async fn overlapping_reservations_conflict() {
    let h = Harness::new(dec!(100), dec!(1000)).await;
    let reserve = |start: DateTime<Utc>, minutes: i64| {
        h.club.reservations.reserve(
            h.client,
            h.computer,
            h.tariff,
            start,
            TimeDelta::minutes(minutes),
        )
    };

    reserve(at(12, 0), 60).await.unwrap();
    assert!(matches!(reserve(at(11, 30), 60).await, Err(ClubError::Conflict(_))));
    assert!(matches!(reserve(at(12, 59), 10).await, Err(ClubError::Conflict(_))));
    reserve(at(13, 0), 30).await.unwrap();
    reserve(at(11, 0), 60).await.unwrap();
    assert_eq!(h.balance().await, dec!(750));
}

#[tokio::test]
async fn concurrent_opens_yield_one_session() {
    let h = Harness::new(dec!(100), dec!(1000)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sessions = h.club.sessions.clone();
        let (client, computer, tariff) = (h.client, h.computer, h.tariff);
        handles.push(tokio::spawn(async move {
            sessions
                .open_session(client, computer, tariff, TimeDelta::hours(1))
                .await
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(ClubError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(h.balance().await, dec!(900));
    assert_eq!(h.club.sessions.active_sessions().await.unwrap().len(), 1);
    h.assert_reconciled().await;
}

#[tokio::test]
async fn auto_close_policy_closes_overtime_sessions() {
    let mut config = ClubhouseConfig::default();
    config.scheduler.overtime_policy = OvertimePolicy::AutoClose;
    let h = Harness::with_config(dec!(100), dec!(1000), config).await;

    let session = h
        .club
        .sessions
        .open_session(h.client, h.computer, h.tariff, TimeDelta::minutes(30))
        .await
        .unwrap();

    h.clock.set(at(11, 0));
    let report = h.club.sweep().sweep().await.unwrap();
    assert_eq!(report.auto_closed, 1);

    let closed = h.club.sessions.session(session.id).await.unwrap();
    assert_eq!(closed.ended_at, Some(at(10, 30)));
    assert_eq!(closed.total_cost, Some(dec!(50)));
    assert_eq!(h.balance().await, dec!(950));
    assert_eq!(h.computer_status().await, ComputerStatus::Available);
    h.assert_reconciled().await;
}

#[tokio::test]
async fn broken_reservation_does_not_block_the_rest_of_the_sweep() {
    let h = Harness::new(dec!(100), dec!(1000)).await;
    let second = h.club.catalog.add_computer(ComputerType::Standard).await.unwrap().id;

    let broken = h
        .club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(11, 0), TimeDelta::hours(1))
        .await
        .unwrap();
    let healthy = h
        .club
        .reservations
        .reserve(h.client, second, h.tariff, at(11, 0), TimeDelta::hours(1))
        .await
        .unwrap();
    assert_eq!(h.balance().await, dec!(800));

    // Tariffs are historical references without a foreign key, so a row
    // can point at one that no longer exists.
    let broken_id = broken.id.0;
    h.club
        .db
        .call(move |conn| {
            conn.execute(
                "UPDATE reservations SET tariff_id = 999 WHERE id = ?1",
                [broken_id],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
        .unwrap();

    h.clock.set(at(11, 0));
    let report = h.club.reservations.activate_reservations().await.unwrap();
    assert_eq!(
        report,
        ActivationReport {
            activated: 1,
            failed: 1,
            ..Default::default()
        }
    );

    let broken = h.club.reservations.reservation(broken.id).await.unwrap();
    assert_eq!(broken.status, ReservationStatus::Pending);
    assert_eq!(h.computer_status().await, ComputerStatus::Available);

    let healthy = h.club.reservations.reservation(healthy.id).await.unwrap();
    assert_eq!(healthy.status, ReservationStatus::Active);
    let second_status = h
        .club
        .registry
        .availability(second)
        .await
        .unwrap()
        .computer
        .status;
    assert_eq!(second_status, ComputerStatus::Occupied);

    assert_eq!(h.balance().await, dec!(800));
    assert!(h.payments(PaymentType::Refund).await.is_empty());
    h.assert_reconciled().await;
}

#[tokio::test]
async fn out_of_service_blocks_sessions_and_reservations() {
    let h = Harness::new(dec!(100), dec!(1000)).await;
    h.club.registry.set_out_of_service(h.computer).await.unwrap();

    let err = h
        .club
        .sessions
        .open_session(h.client, h.computer, h.tariff, TimeDelta::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClubError::Conflict(_)));

    let err = h
        .club
        .reservations
        .reserve(h.client, h.computer, h.tariff, at(12, 0), TimeDelta::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClubError::Conflict(_)));
    assert_eq!(h.balance().await, dec!(1000));

    h.club.registry.clear_out_of_service(h.computer).await.unwrap();
    h.club
        .sessions
        .open_session(h.client, h.computer, h.tariff, TimeDelta::hours(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn state_survives_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ClubhouseConfig::default();
    config.storage.database_path = dir.path().join("club.db").display().to_string();
    let clock = FakeClock::new(at(10, 0));

    let club = Club::open(&config, Arc::new(clock.clone())).await.unwrap();
    let client = club.catalog.add_client("Grace", "+1").await.unwrap().id;
    let computer = club.catalog.add_computer(ComputerType::Premium).await.unwrap().id;
    let tariff = club
        .catalog
        .add_tariff("Premium", dec!(90), ComputerType::Premium)
        .await
        .unwrap()
        .id;
    club.ledger.top_up(client, dec!(300)).await.unwrap();
    let session = club
        .sessions
        .open_session(client, computer, tariff, TimeDelta::hours(2))
        .await
        .unwrap();
    club.db.close().await.unwrap();

    clock.set(at(10, 30));
    let reopened = Club::open(&config, Arc::new(clock.clone())).await.unwrap();
    assert_eq!(reopened.catalog.client(client).await.unwrap().balance, dec!(120));
    let active = reopened.sessions.active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, session.id);

    let closed = reopened.sessions.close_session(session.id).await.unwrap();
    assert_eq!(closed.total_cost, Some(dec!(45.00)));
    assert_eq!(reopened.catalog.client(client).await.unwrap().balance, dec!(255.00));
    assert!(reopened.ledger.reconcile(client).await.unwrap().is_consistent());
}
