//! ping.rs — Verificação de alcançabilidade dos dispositivos monitorados
//!
//! O núcleo depende apenas do trait `Prober`; `PingProber` usa o `ping` do sistema.
//! Falhas individuais viram "inalcançável" e nunca sobem como erro.

use crate::types::{Device, ProbeResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

#[async_trait]
pub trait Prober: Send + Sync {
    /// `true` se o dispositivo respondeu dentro do timeout.
    async fn is_reachable(&self, device: &Device) -> bool;
}

/// Prober baseado em `ping -c <count> -W <timeout>`.
#[derive(Debug, Clone)]
pub struct PingProber {
    ping_count: u32,
    timeout_secs: u64,
}

impl PingProber {
    pub fn new(ping_count: u32, timeout_secs: u64) -> Self {
        Self {
            ping_count,
            timeout_secs,
        }
    }

    /// Limite total para uma chamada: todos os pings mais uma folga.
    fn deadline(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .saturating_mul(u64::from(self.ping_count))
                .saturating_add(1),
        )
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn is_reachable(&self, device: &Device) -> bool {
        let mut cmd = Command::new("ping");
        cmd.arg("-c")
            .arg(self.ping_count.to_string())
            .arg("-W")
            .arg(self.timeout_secs.to_string())
            .arg(&device.address)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match timeout(self.deadline(), cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                warn!("Erro ao executar ping para {}: {}", device.address, e);
                false
            }
            Err(_) => {
                debug!(
                    "Ping para {} excedeu {:?}",
                    device.address,
                    self.deadline()
                );
                false
            }
        }
    }
}

/// Executa os probes de todos os dispositivos em paralelo e só retorna
/// depois que todos terminaram.
pub async fn probe_devices(prober: Arc<dyn Prober>, devices: &[Device]) -> Vec<ProbeResult> {
    let mut tasks = JoinSet::new();
    for (index, device) in devices.iter().cloned().enumerate() {
        let prober = Arc::clone(&prober);
        tasks.spawn(async move {
            let reachable = prober.is_reachable(&device).await;
            (index, ProbeResult { device, reachable })
        });
    }

    let mut results: Vec<Option<ProbeResult>> = vec![None; devices.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if result.reachable {
                    debug!("{} ({}) está alcançável", result.device.name, result.device.address);
                } else {
                    debug!("{} ({}) NÃO está alcançável", result.device.name, result.device.address);
                }
                results[index] = Some(result);
            }
            Err(e) => warn!("Task de ping abortada: {:?}", e),
        }
    }

    // Task que entrou em pânico conta como inalcançável.
    results
        .into_iter()
        .zip(devices)
        .map(|(result, device)| {
            result.unwrap_or_else(|| ProbeResult {
                device: device.clone(),
                reachable: false,
            })
        })
        .collect()
}
