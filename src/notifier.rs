//! notifier.rs — Entrega best-effort dos eventos de energia
//!
//! A máquina de estados só publica `PowerEvent` num canal; este módulo
//! renderiza e entrega. Falhas são logadas e descartadas.

use crate::error::NotifyError;
use crate::format;
use crate::telegram::TelegramClient;
use crate::types::PowerEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &PowerEvent) -> Result<(), NotifyError>;
}

/// Envia os eventos para o chat configurado do Telegram.
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &PowerEvent) -> Result<(), NotifyError> {
        let text = format::event_message(event);
        self.client
            .send_message(self.client.chat_id(), &text, false)
            .await?;
        info!("Mensagem do Telegram enviada: {}", text);
        Ok(())
    }
}

/// Consome eventos até o canal fechar.
pub async fn run_dispatcher(mut events: mpsc::Receiver<PowerEvent>, notifier: Arc<dyn Notifier>) {
    while let Some(event) = events.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            error!("Falha ao enviar notificação {:?}: {}", event, e);
        }
    }
}
