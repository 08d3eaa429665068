use crate::error::ConfigError;
use crate::types::Device;
use config as config_crate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Arquivo legado com a lista de dispositivos (`{"monitored_devices": [...]}`).
const DEVICES_FILE: &str = "/etc/power-monitor/devices.json";

/// Limites superiores aceitos na configuração.
pub const MAX_HISTORY_DAYS: i64 = 36_500;
pub const MAX_PING_COUNT: u32 = 100;
pub const MAX_PING_TIMEOUT_SECS: u64 = 60;
pub const MAX_CHECK_INTERVAL_SECS: u64 = 86_400;

/// Configuração operacional do sistema. Lida uma vez na inicialização e
/// repassada aos construtores (nunca global).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Dispositivos sem nobreak cuja queda indica falta de energia.
    #[serde(default = "default_devices")]
    pub monitored_devices: Vec<Device>,
    /// Intervalo entre ciclos em segundos.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Timeout em segundos para cada ping.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
    /// Quantidade de pings por dispositivo por ciclo.
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    /// Caminho do arquivo SQLite com o histórico de quedas.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Janela (em dias) usada pelo comando `history`.
    #[serde(default = "default_history_days")]
    pub history_days: i64,
    /// Máximo de quedas listadas pelo comando `history`.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_devices() -> Vec<Device> {
    vec![
        Device::new("WiproPlug", "10.10.10.61"),
        Device::new("WiproBulb", "10.10.10.62"),
    ]
}

fn default_check_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    5
}

fn default_ping_count() -> u32 {
    5
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/power_monitor/power_cuts.db")
}

fn default_history_days() -> i64 {
    30
}

fn default_history_limit() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitored_devices: default_devices(),
            check_interval_secs: default_check_interval(),
            ping_timeout_secs: default_ping_timeout(),
            ping_count: default_ping_count(),
            db_path: default_db_path(),
            history_days: default_history_days(),
            history_limit: default_history_limit(),
        }
    }
}

impl Config {
    /// Carrega a configuração. Nunca falha: qualquer erro cai nos padrões embutidos.
    pub fn load() -> Self {
        let local = std::env::var("POWER_MONITOR_CONFIG").unwrap_or_else(|_| "config".into());
        Self::load_or_default(DEVICES_FILE, &local)
    }

    fn load_or_default(devices_file: &str, local_file: &str) -> Self {
        match Self::load_from(devices_file, local_file) {
            Ok(config) => {
                info!(
                    "[CONFIG] {} dispositivos monitorados, ciclo de {}s.",
                    config.monitored_devices.len(),
                    config.check_interval_secs
                );
                config
            }
            Err(e) => {
                warn!("[CONFIG] Não foi possível carregar a configuração ({e}); usando padrões.");
                Self::default()
            }
        }
    }

    /// Monta a configuração a partir dos arquivos (opcionais) e do ambiente.
    pub fn load_from(devices_file: &str, local_file: &str) -> anyhow::Result<Self> {
        let settings = config_crate::Config::builder()
            .add_source(config_crate::File::with_name(devices_file).required(false))
            .add_source(config_crate::File::with_name(local_file).required(false))
            .add_source(config_crate::Environment::with_prefix("POWER_MONITOR"))
            .build()?;
        let mut config: Config = settings.try_deserialize()?;
        if config.monitored_devices.is_empty() {
            warn!("[CONFIG] Lista de dispositivos vazia; usando a lista padrão.");
            config.monitored_devices = default_devices();
        }
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Validação dos limites operacionais.
    pub fn validate(&self) -> Result<(), String> {
        if self.ping_count == 0 || self.ping_count > MAX_PING_COUNT {
            return Err(format!("ping_count deve estar entre 1 e {MAX_PING_COUNT}"));
        }
        if self.ping_timeout_secs == 0 || self.ping_timeout_secs > MAX_PING_TIMEOUT_SECS {
            return Err(format!(
                "ping_timeout_secs deve estar entre 1 e {MAX_PING_TIMEOUT_SECS}"
            ));
        }
        if self.check_interval_secs == 0 || self.check_interval_secs > MAX_CHECK_INTERVAL_SECS {
            return Err(format!(
                "check_interval_secs deve estar entre 1 e {MAX_CHECK_INTERVAL_SECS}"
            ));
        }
        if self.history_days <= 0 || self.history_days > MAX_HISTORY_DAYS {
            return Err(format!("history_days deve estar entre 1 e {MAX_HISTORY_DAYS}"));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Credenciais do bot do Telegram. Sem elas o processo não deve subir.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
        )
    }

    fn from_vars(token: Option<String>, chat_id: Option<String>) -> Result<Self, ConfigError> {
        let bot_token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("TELEGRAM_BOT_TOKEN"))?;
        let chat_id = chat_id
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("TELEGRAM_CHAT_ID"))?;
        let chat_id = chat_id
            .trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::Invalid {
                name: "TELEGRAM_CHAT_ID",
                reason: e.to_string(),
            })?;
        Ok(Self { bot_token, chat_id })
    }
}
