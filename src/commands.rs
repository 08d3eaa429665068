use crate::format;
use crate::outage::OutageManager;
use crate::query::QueryService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// Comandos do operador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    History,
    Fix,
    Help,
    Start,
}

impl Command {
    /// Aceita `/status`, `status` e `/status@nome_do_bot`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let word = word.strip_prefix('/').unwrap_or(word);
        let name = word.split('@').next()?;
        match name.to_ascii_lowercase().as_str() {
            "status" => Some(Command::Status),
            "history" => Some(Command::History),
            "fix" => Some(Command::Fix),
            "help" => Some(Command::Help),
            "start" => Some(Command::Start),
            _ => None,
        }
    }
}

/// Traduz comandos em respostas, usando o `QueryService` e a correção manual.
#[derive(Clone)]
pub struct CommandHandler {
    query: QueryService,
    manager: Arc<Mutex<OutageManager>>,
    history_days: i64,
    history_limit: usize,
}

impl CommandHandler {
    pub fn new(
        query: QueryService,
        manager: Arc<Mutex<OutageManager>>,
        history_days: i64,
        history_limit: usize,
    ) -> Self {
        Self {
            query,
            manager,
            history_days,
            history_limit,
        }
    }

    /// Sempre devolve texto; falhas do ledger viram mensagem de erro para o operador.
    pub async fn handle(&self, command: Command, now: DateTime<Utc>) -> String {
        match command {
            Command::Status => match self.query.current_status(now).await {
                Ok(status) => format::status_message(&status),
                Err(e) => {
                    error!("[COMANDO] Erro ao consultar status: {:?}", e);
                    "⚠️ Não foi possível consultar o status agora.".to_string()
                }
            },
            Command::History => match self.query.recent_history(self.history_days, now).await {
                Ok(report) => format::history_message(&report, self.history_limit),
                Err(e) => {
                    error!("[COMANDO] Erro ao consultar histórico: {:?}", e);
                    "⚠️ Não foi possível consultar o histórico agora.".to_string()
                }
            },
            Command::Fix => {
                let result = self.manager.lock().await.fix(now).await;
                match result {
                    Ok(closed) => format::fix_message(closed),
                    Err(e) => {
                        error!("[COMANDO] Erro ao aplicar correção: {:?}", e);
                        "⚠️ Não foi possível aplicar a correção; tente novamente.".to_string()
                    }
                }
            }
            Command::Help => format::help_message(self.history_days),
            Command::Start => format::welcome_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::temp_storage;
    use crate::types::PowerState;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn parses_command_variants() {
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("history"), Some(Command::History));
        assert_eq!(Command::parse("/fix@power_bot"), Some(Command::Fix));
        assert_eq!(Command::parse("  /HELP agora"), Some(Command::Help));
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/reboot"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn fix_command_resets_manager() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let manager = Arc::new(Mutex::new(OutageManager::new(Arc::clone(&storage))));
        manager.lock().await.handle_sample(false, at(0)).await.unwrap();

        let handler = CommandHandler::new(
            QueryService::new(Arc::clone(&storage)),
            Arc::clone(&manager),
            30,
            10,
        );

        let status = handler.handle(Command::Status, at(90)).await;
        assert!(status.contains("SEM ENERGIA"));
        assert!(status.contains("1m 30s"));

        let reply = handler.handle(Command::Fix, at(100)).await;
        assert!(reply.contains("Encerrada(s) 1 queda(s)"));
        assert_eq!(manager.lock().await.state(), PowerState::Unknown);

        let status = handler.handle(Command::Status, at(110)).await;
        assert!(status.contains("ENERGIA PRESENTE"));

        let history = handler.handle(Command::History, at(120)).await;
        assert!(history.contains("Duração: 1m 40s"));
        assert!(history.contains("Total de quedas: 1"));
    }

    #[tokio::test]
    async fn help_lists_every_command() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let handler = CommandHandler::new(
            QueryService::new(Arc::clone(&storage)),
            Arc::new(Mutex::new(OutageManager::new(storage))),
            30,
            10,
        );
        let help = handler.handle(Command::Help, at(0)).await;
        for cmd in ["/status", "/history", "/fix", "/help"] {
            assert!(help.contains(cmd), "faltando {cmd}");
        }
    }
}
