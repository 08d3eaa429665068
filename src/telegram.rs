//! telegram.rs — Cliente mínimo da Bot API do Telegram e loop de comandos

use crate::commands::{Command, CommandHandler};
use crate::config::TelegramConfig;
use crate::error::NotifyError;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const API_BASE: &str = "https://api.telegram.org";
/// Timeout do long polling do `getUpdates`, em segundos.
const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

/// Teclado inline com os comandos disponíveis.
fn keyboard(full: bool) -> Value {
    let mut rows = vec![json!([
        {"text": "📊 Status", "callback_data": "status"},
        {"text": "📈 Histórico", "callback_data": "history"},
    ])];
    if full {
        rows.push(json!([
            {"text": "🔧 Corrigir", "callback_data": "fix"},
            {"text": "❓ Ajuda", "callback_data": "help"},
        ]));
    }
    json!({ "inline_keyboard": rows })
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    chat_id: i64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", API_BASE, config.bot_token),
            chat_id: config.chat_id,
        })
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, NotifyError> {
        let url = format!("{}/{}", self.base_url, method);
        let response: ApiResponse<T> = self.client.post(url).json(&body).send().await?.json().await?;
        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(NotifyError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{method} falhou sem descrição")),
            )),
        }
    }

    /// Envia uma mensagem em Markdown com o teclado de comandos.
    pub async fn send_message(&self, chat_id: i64, text: &str, full_keyboard: bool) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "reply_markup": keyboard(full_keyboard),
        });
        let _: Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, NotifyError> {
        let body = json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", body).await
    }

    pub async fn answer_callback_query(&self, id: &str) -> Result<(), NotifyError> {
        let _: Value = self
            .call("answerCallbackQuery", json!({ "callback_query_id": id }))
            .await?;
        Ok(())
    }
}

/// Extrai chat e comando de uma atualização (mensagem de texto ou botão).
fn extract_command(update: &Update) -> Option<(i64, Command)> {
    if let Some(message) = &update.message {
        let command = Command::parse(message.text.as_deref()?)?;
        return Some((message.chat.id, command));
    }
    let query = update.callback_query.as_ref()?;
    let chat_id = query.message.as_ref()?.chat.id;
    let command = Command::parse(query.data.as_deref()?)?;
    Some((chat_id, command))
}

/// Loop de long polling: responde aos comandos vindos do chat configurado.
pub async fn run_bot(client: TelegramClient, handler: CommandHandler) {
    info!("[BOT] Aguardando comandos do chat {}.", client.chat_id());
    let mut offset = 0;

    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("[BOT] Falha no getUpdates: {}. Nova tentativa em {:?}.", e, RETRY_DELAY);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            if let Some(query) = &update.callback_query {
                if let Err(e) = client.answer_callback_query(&query.id).await {
                    debug!("[BOT] answerCallbackQuery falhou: {}", e);
                }
            }

            let Some((chat_id, command)) = extract_command(&update) else {
                continue;
            };
            if chat_id != client.chat_id() {
                debug!("[BOT] Ignorando comando do chat {}.", chat_id);
                continue;
            }

            info!("[BOT] Comando recebido: {:?}", command);
            let reply = handler.handle(command, Utc::now()).await;
            if let Err(e) = client.send_message(chat_id, &reply, true).await {
                error!("[BOT] Falha ao responder comando {:?}: {}", command, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Update {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn text_command_is_extracted() {
        let update = parse(r#"{"update_id": 7, "message": {"chat": {"id": 42}, "text": "/status"}}"#);
        assert_eq!(extract_command(&update), Some((42, Command::Status)));
    }

    #[test]
    fn callback_button_is_extracted() {
        let update = parse(
            r#"{"update_id": 8, "callback_query": {"id": "abc", "data": "history",
                "message": {"chat": {"id": 42}, "text": "..."}}}"#,
        );
        assert_eq!(extract_command(&update), Some((42, Command::History)));
    }

    #[test]
    fn plain_text_is_ignored() {
        let update = parse(r#"{"update_id": 9, "message": {"chat": {"id": 42}, "text": "oi"}}"#);
        assert_eq!(extract_command(&update), None);
        let update = parse(r#"{"update_id": 10, "message": {"chat": {"id": 42}}}"#);
        assert_eq!(extract_command(&update), None);
    }

    #[test]
    fn api_error_keeps_description() {
        let response: ApiResponse<Value> =
            serde_json::from_str(r#"{"ok": false, "description": "Unauthorized"}"#).unwrap();
        assert!(!response.ok);
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn keyboard_layouts() {
        assert_eq!(keyboard(false)["inline_keyboard"].as_array().unwrap().len(), 1);
        assert_eq!(keyboard(true)["inline_keyboard"].as_array().unwrap().len(), 2);
    }
}
