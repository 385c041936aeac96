// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The periodic maintenance sweep run by the tick scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use clubhouse_config::OvertimePolicy;
use clubhouse_core::ClubError;
use tracing::{debug, warn};

use crate::board::SessionBoard;
use crate::reservation::{ActivationReport, ReservationEngine};
use crate::session::SessionEngine;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub activation: ActivationReport,
    /// Overtime sessions closed under [`OvertimePolicy::AutoClose`].
    pub auto_closed: usize,
}

/// Work the scheduler runs every few ticks, outside the observer lock.
///
/// Storage errors make the scheduler back off before the next run.
#[async_trait]
pub trait ActivationSweep: Send + Sync + 'static {
    async fn sweep(&self) -> Result<SweepReport, ClubError>;
}

/// Activates due reservations and applies the overtime policy.
#[derive(Clone)]
pub struct EngineSweep {
    reservations: ReservationEngine,
    sessions: SessionEngine,
    policy: OvertimePolicy,
    board: Option<Arc<SessionBoard>>,
}

impl EngineSweep {
    pub fn new(
        reservations: ReservationEngine,
        sessions: SessionEngine,
        policy: OvertimePolicy,
    ) -> Self {
        Self {
            reservations,
            sessions,
            policy,
            board: None,
        }
    }

    /// Reload `board` after every sweep.
    pub fn with_board(mut self, board: Arc<SessionBoard>) -> Self {
        self.board = Some(board);
        self
    }
}

#[async_trait]
impl ActivationSweep for EngineSweep {
    async fn sweep(&self) -> Result<SweepReport, ClubError> {
        // Close overtime sessions first so their computers can take a due
        // reservation in this same sweep.
        let auto_closed = match self.policy {
            OvertimePolicy::AutoClose => self.sessions.close_overtime().await?.len(),
            OvertimePolicy::Indicate => 0,
        };
        let activation = self.reservations.activate_reservations().await?;
        if let Some(board) = &self.board {
            if let Err(e) = board.reload().await {
                warn!(error = %e, "session board reload failed");
            }
        }
        let report = SweepReport {
            activation,
            auto_closed,
        };
        debug!(?report, "sweep finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Fixture, at};
    use crate::tick::TickObserver;
    use chrono::TimeDelta;
    use clubhouse_core::SessionStatus;

    fn engines(fx: &Fixture) -> (ReservationEngine, SessionEngine) {
        (
            ReservationEngine::new(fx.db.clone(), fx.clock(), TimeDelta::hours(24)),
            SessionEngine::new(fx.db.clone(), fx.clock(), TimeDelta::hours(24)),
        )
    }

    #[tokio::test]
    async fn indicate_policy_leaves_overtime_sessions_running() {
        let fx = Fixture::new(1000).await;
        let (reservations, sessions) = engines(&fx);
        let session = sessions
            .open_session(fx.client, fx.computer, fx.tariff, TimeDelta::minutes(30))
            .await
            .unwrap();
        let sweep = EngineSweep::new(reservations, sessions.clone(), OvertimePolicy::Indicate);

        fx.clock.set(at(11, 0));
        let report = sweep.sweep().await.unwrap();
        assert_eq!(report.auto_closed, 0);
        assert!(sessions.session(session.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn auto_close_frees_computer_for_due_reservation_in_one_sweep() {
        let fx = Fixture::new(1000).await;
        let (reservations, sessions) = engines(&fx);
        let walk_in = sessions
            .open_session(fx.client, fx.computer, fx.tariff, TimeDelta::minutes(30))
            .await
            .unwrap();
        reservations
            .reserve(fx.client, fx.computer, fx.tariff, at(10, 45), TimeDelta::hours(1))
            .await
            .unwrap();

        let board = Arc::new(SessionBoard::new(fx.db.clone()));
        let sweep = EngineSweep::new(reservations, sessions.clone(), OvertimePolicy::AutoClose)
            .with_board(Arc::clone(&board));

        // The walk-in overran; closing it frees the computer for the
        // reservation in the same sweep.
        fx.clock.set(at(10, 50));
        let report = sweep.sweep().await.unwrap();
        assert_eq!(report.auto_closed, 1);
        assert_eq!(report.activation.activated, 1);
        assert_eq!(report.activation.deferred, 0);
        assert_eq!(
            sessions.session(walk_in.id).await.unwrap().status,
            SessionStatus::Completed
        );

        let again = sweep.sweep().await.unwrap();
        assert_eq!(again, SweepReport::default());
        board.on_tick(at(10, 51));
        assert_eq!(board.rows().len(), 1);
    }
}
