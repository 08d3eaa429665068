use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::fmt;
use std::str::FromStr;

/// Dispositivo monitorado (sem nobreak: cai junto com a energia).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(alias = "ip")]
    pub address: String,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Status de uma queda no banco (coluna `status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutageStatus {
    Ongoing,
    Completed,
}

impl OutageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutageStatus::Ongoing => "ongoing",
            OutageStatus::Completed => "completed",
        }
    }
}

impl FromStr for OutageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(OutageStatus::Ongoing),
            "completed" => Ok(OutageStatus::Completed),
            other => Err(format!("status de queda desconhecido: {other}")),
        }
    }
}

/// Uma linha da tabela `power_cuts`.
///
/// `end_time` e `duration_seconds` ficam nulos enquanto a queda está em andamento
/// e são gravados uma única vez, no encerramento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageInterval {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub status: OutageStatus,
}

impl OutageInterval {
    pub fn is_ongoing(&self) -> bool {
        self.status == OutageStatus::Ongoing
    }
}

impl TryFrom<SqliteRow> for OutageInterval {
    type Error = sqlx::Error;

    fn try_from(row: SqliteRow) -> Result<Self, Self::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<OutageStatus>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".into(),
            source: e.into(),
        })?;
        Ok(Self {
            id: row.try_get("id")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            duration_seconds: row.try_get("duration_seconds")?,
            status,
        })
    }
}

/// Estado agregado da energia, mantido só em memória.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Unknown,
    PowerOn,
    PowerCut,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Unknown => "UNKNOWN",
            PowerState::PowerOn => "POWER_ON",
            PowerState::PowerCut => "POWER_CUT",
        };
        f.write_str(s)
    }
}

/// Eventos de domínio emitidos para o notificador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerEvent {
    MonitoringStarted {
        at: DateTime<Utc>,
    },
    OutageStarted {
        start_time: DateTime<Utc>,
    },
    OutageEnded {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_seconds: i64,
    },
}

/// Resultado de um ping a um dispositivo em um ciclo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub device: Device,
    pub reachable: bool,
}
