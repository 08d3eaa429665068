//! storage.rs — Ledger durável de quedas de energia (SQLite via sqlx)
//!
//! Cada queda é uma linha em `power_cuts`. Linhas nascem `ongoing` e passam para
//! `completed` exatamente uma vez; `start_time` nunca é alterado.

use crate::error::StorageError;
use crate::types::{OutageInterval, OutageStatus};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

pub type Result<T> = std::result::Result<T, StorageError>;

pub struct Storage {
    pool: SqlitePool,
}

/// Duração arredondada para o segundo mais próximo, nunca negativa.
pub fn duration_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    ((millis as f64) / 1000.0).round().max(0.0) as i64
}

impl Storage {
    /// Abre (ou cria) o banco e garante o schema.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Criação idempotente da tabela e índices.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS power_cuts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration_seconds INTEGER,
                status TEXT NOT NULL DEFAULT 'ongoing'
                    CHECK(status IN ('ongoing', 'completed'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_power_cuts_status ON power_cuts(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_power_cuts_start ON power_cuts(start_time)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Registra o início de uma queda. O chamador garante que não há outra em andamento.
    pub async fn open_outage(&self, start_time: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO power_cuts (start_time, status) VALUES (?, ?)")
            .bind(start_time)
            .bind(OutageStatus::Ongoing.as_str())
            .execute(&self.pool)
            .await?;
        let id = result.last_insert_rowid();
        debug!("[LEDGER] Queda {} aberta em {}.", id, start_time);
        Ok(id)
    }

    /// Encerra a queda em andamento mais recente (maior id).
    ///
    /// Retorna `(start_time, duration_seconds)` ou `None` se não havia queda aberta.
    pub async fn close_outage(
        &self,
        end_time: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, i64)>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT id, start_time FROM power_cuts WHERE status = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(OutageStatus::Ongoing.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;
        let start_time: DateTime<Utc> = row.try_get("start_time")?;
        let duration = duration_between(start_time, end_time);

        complete(&mut tx, id, end_time, duration).await?;
        tx.commit().await?;
        debug!("[LEDGER] Queda {} encerrada ({}s).", id, duration);
        Ok(Some((start_time, duration)))
    }

    /// Encerra uma queda já conhecida pelo chamador, sem consultá-la antes.
    ///
    /// Retorna a duração gravada, ou `None` se a linha não está mais em andamento.
    pub async fn close_outage_by_id(
        &self,
        id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let duration = duration_between(start_time, end_time);
        let mut tx = self.pool.begin().await?;
        let updated = complete(&mut tx, id, end_time, duration).await?;
        tx.commit().await?;
        if updated == 0 {
            return Ok(None);
        }
        debug!("[LEDGER] Queda {} encerrada ({}s).", id, duration);
        Ok(Some(duration))
    }

    /// Encerra todas as quedas em andamento, cada uma com sua própria duração.
    pub async fn close_all_ongoing(&self, at_time: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query("SELECT id, start_time FROM power_cuts WHERE status = ?")
            .bind(OutageStatus::Ongoing.as_str())
            .fetch_all(&mut *tx)
            .await?;

        let mut closed = 0;
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let start_time: DateTime<Utc> = row.try_get("start_time")?;
            complete(&mut tx, id, at_time, duration_between(start_time, at_time)).await?;
            closed += 1;
        }
        tx.commit().await?;
        Ok(closed)
    }

    /// Queda em andamento mais recente, se houver.
    pub async fn current_ongoing(&self) -> Result<Option<OutageInterval>> {
        let row = sqlx::query(
            r#"
            SELECT id, start_time, end_time, duration_seconds, status
            FROM power_cuts
            WHERE status = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(OutageStatus::Ongoing.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OutageInterval::try_from).transpose()?)
    }

    /// Quedas iniciadas depois de `now - since`, da mais nova para a mais antiga.
    pub async fn history(&self, since: Duration, now: DateTime<Utc>) -> Result<Vec<OutageInterval>> {
        let since_date = now
            .checked_sub_signed(since)
            .ok_or_else(|| StorageError::InvalidWindow(format!("{now} - {since}")))?;
        let rows = sqlx::query(
            r#"
            SELECT id, start_time, end_time, duration_seconds, status
            FROM power_cuts
            WHERE start_time > ?
            ORDER BY start_time DESC, id DESC
            "#,
        )
        .bind(since_date)
        .fetch_all(&self.pool)
        .await?;
        let cuts = rows
            .into_iter()
            .map(OutageInterval::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cuts)
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) {
        sqlx::query(sql).execute(&self.pool).await.unwrap();
    }
}

async fn complete(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: i64,
    end_time: DateTime<Utc>,
    duration_seconds: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE power_cuts
        SET end_time = ?, duration_seconds = ?, status = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(end_time)
    .bind(duration_seconds)
    .bind(OutageStatus::Completed.as_str())
    .bind(id)
    .bind(OutageStatus::Ongoing.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}
