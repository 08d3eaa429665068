mod commands;
mod config;
mod consensus;
mod error;
mod format;
mod notifier;
mod outage;
mod ping;
mod query;
mod recovery;
mod scheduler;
mod storage;
mod telegram;
mod types;

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializa o sistema de logging (tracing); RUST_LOG sobrescreve o nível
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuração imutável compartilhada (cai nos padrões se não carregar)
    let config: Arc<config::Config> = Arc::new(config::Config::load());

    // Sem canal de notificação o monitor não tem razão de existir
    let telegram_config = config::TelegramConfig::from_env()
        .context("credenciais do Telegram ausentes ou inválidas")?;
    let bot_client = telegram::TelegramClient::new(&telegram_config)?;

    let storage: Arc<storage::Storage> = Arc::new(
        storage::Storage::connect(&config.db_path)
            .await
            .with_context(|| format!("não foi possível abrir {}", config.db_path.display()))?,
    );
    info!("Banco de dados aberto em {}", config.db_path.display());

    recovery::recover_on_startup(&storage, Utc::now())
        .await
        .context("falha na recuperação de quedas pendentes")?;

    let (events_tx, events_rx) = mpsc::channel(32);
    let notifier: Arc<dyn notifier::Notifier> =
        Arc::new(notifier::TelegramNotifier::new(bot_client.clone()));
    let dispatcher = tokio::spawn(notifier::run_dispatcher(events_rx, notifier));
    events_tx
        .send(types::PowerEvent::MonitoringStarted { at: Utc::now() })
        .await?;

    let manager = Arc::new(Mutex::new(outage::OutageManager::new(Arc::clone(&storage))));
    let prober: Arc<dyn ping::Prober> = Arc::new(ping::PingProber::new(
        config.ping_count,
        config.ping_timeout_secs,
    ));
    let handler = commands::CommandHandler::new(
        query::QueryService::new(Arc::clone(&storage)),
        Arc::clone(&manager),
        config.history_days,
        config.history_limit,
    );

    let scheduler = tokio::spawn(scheduler::run_scheduler(
        Arc::clone(&config),
        manager,
        prober,
        events_tx,
    ));
    let bot = tokio::spawn(telegram::run_bot(bot_client, handler));

    tokio::select! {
        res = scheduler => anyhow::bail!("scheduler encerrou inesperadamente: {:?}", res),
        res = bot => anyhow::bail!("bot encerrou inesperadamente: {:?}", res),
        _ = tokio::signal::ctrl_c() => info!("Sinal de encerramento recebido."),
    }

    dispatcher.abort();
    Ok(())
}
