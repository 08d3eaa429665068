use crate::storage::{self, Storage};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Executada uma vez antes do loop de monitoramento: fecha toda queda deixada
/// aberta por um desligamento inesperado.
///
/// A duração atribuída cobre também o tempo em que o processo esteve fora do ar.
pub async fn recover_on_startup(storage: &Storage, now: DateTime<Utc>) -> storage::Result<u64> {
    let closed = storage.close_all_ongoing(now).await?;
    match closed {
        0 => debug!("[RECUPERAÇÃO] Nenhuma queda em andamento encontrada."),
        1 => info!("[RECUPERAÇÃO] 1 queda em andamento encerrada após desligamento inesperado."),
        n => warn!(
            "[RECUPERAÇÃO] {} quedas em andamento encontradas na inicialização; todas encerradas.",
            n
        ),
    }
    Ok(closed)
}
