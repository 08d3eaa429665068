use crate::error::StorageError;
use crate::storage::{self, Storage, duration_between};
use crate::types::{OutageInterval, OutageStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Situação atual derivada do ledger (não do estado em memória).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CurrentStatus {
    PowerOn,
    PowerCut {
        outage_start: DateTime<Utc>,
        duration_so_far_seconds: i64,
    },
}

/// Estatísticas calculadas apenas sobre quedas concluídas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total_completed_count: usize,
    pub total_downtime_seconds: i64,
    pub average_duration_seconds: i64,
}

impl HistoryStats {
    pub fn from_intervals(cuts: &[OutageInterval]) -> Self {
        let completed: Vec<i64> = cuts
            .iter()
            .filter(|c| c.status == OutageStatus::Completed)
            .map(|c| c.duration_seconds.unwrap_or(0))
            .collect();
        let total_completed_count = completed.len();
        let total_downtime_seconds: i64 = completed.iter().sum();
        let average_duration_seconds = if total_completed_count > 0 {
            ((total_downtime_seconds as f64) / (total_completed_count as f64)).round() as i64
        } else {
            0
        };
        Self {
            total_completed_count,
            total_downtime_seconds,
            average_duration_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryReport {
    pub window_days: i64,
    pub intervals: Vec<OutageInterval>,
    pub stats: HistoryStats,
}

/// Consultas somente leitura sobre o ledger.
#[derive(Clone)]
pub struct QueryService {
    storage: Arc<Storage>,
}

impl QueryService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn current_status(&self, now: DateTime<Utc>) -> storage::Result<CurrentStatus> {
        let status = match self.storage.current_ongoing().await? {
            Some(ongoing) => CurrentStatus::PowerCut {
                outage_start: ongoing.start_time,
                duration_so_far_seconds: duration_between(ongoing.start_time, now),
            },
            None => CurrentStatus::PowerOn,
        };
        Ok(status)
    }

    pub async fn recent_history(
        &self,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> storage::Result<HistoryReport> {
        let window = Duration::try_days(window_days).ok_or_else(|| {
            StorageError::InvalidWindow(format!("{window_days} dias"))
        })?;
        let intervals = self.storage.history(window, now).await?;
        let stats = HistoryStats::from_intervals(&intervals);
        Ok(HistoryReport {
            window_days,
            intervals,
            stats,
        })
    }
}
