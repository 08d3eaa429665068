use thiserror::Error;

/// Falhas de acesso ao ledger de quedas.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("erro de banco de dados: {0}")]
    Database(#[from] sqlx::Error),

    #[error("não foi possível criar o diretório do banco: {0}")]
    Io(#[from] std::io::Error),

    #[error("janela de histórico fora do intervalo suportado: {0}")]
    InvalidWindow(String),
}

/// Falhas na entrega de notificações (sempre engolidas pelo chamador).
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("falha de transporte HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API do Telegram recusou a requisição: {0}")]
    Api(String),
}

/// Falhas de configuração que impedem a inicialização.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("variável de ambiente {0} não definida")]
    MissingEnv(&'static str),

    #[error("valor inválido para {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
