// src/scheduler.rs

use crate::config::Config;
use crate::consensus::any_device_reachable;
use crate::outage::OutageManager;
use crate::ping::{self, Prober};
use crate::types::{Device, PowerEvent};
use chrono::Utc;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// Um ciclo completo: pinga todos os dispositivos, agrega e aplica a transição.
///
/// Só avança a máquina de estados depois de coletar todos os resultados.
pub async fn run_cycle(
    cycle_number: u64,
    devices: &[Device],
    prober: Arc<dyn Prober>,
    manager: &Mutex<OutageManager>,
    events: &mpsc::Sender<PowerEvent>,
) {
    let ping_start = Instant::now();
    let results = ping::probe_devices(prober, devices).await;
    let reachable = results.iter().filter(|r| r.reachable).count();
    let power_on = any_device_reachable(&results);
    debug!(
        "[CICLO {}] {}/{} dispositivos alcançáveis em {:?}.",
        cycle_number,
        reachable,
        results.len(),
        ping_start.elapsed()
    );

    let now = Utc::now();
    let outcome = manager.lock().await.handle_sample(power_on, now).await;
    match outcome {
        // Notificação é best-effort: fila cheia não pode segurar o ciclo.
        Ok(Some(event)) => match events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(
                "[CICLO {}] Fila de notificações cheia; evento descartado: {:?}",
                cycle_number, event
            ),
            Err(TrySendError::Closed(event)) => warn!(
                "[CICLO {}] Canal de notificações fechado; evento descartado: {:?}",
                cycle_number, event
            ),
        },
        Ok(None) => {}
        Err(e) => error!(
            "[CICLO {}] Erro ao gravar no ledger; ciclo descartado, nova tentativa no próximo: {:?}",
            cycle_number, e
        ),
    }
}

/// Loop principal. Ciclos nunca se sobrepõem: o próximo só começa quando o
/// anterior termina, e ticks perdidos são pulados.
pub async fn run_scheduler(
    config: Arc<Config>,
    manager: Arc<Mutex<OutageManager>>,
    prober: Arc<dyn Prober>,
    events: mpsc::Sender<PowerEvent>,
) {
    info!(
        "Iniciando monitoramento de energia: {} dispositivos a cada {}s.",
        config.monitored_devices.len(),
        config.check_interval_secs
    );
    let mut ticker = interval(config.check_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle_number: u64 = 0;

    loop {
        ticker.tick().await;
        cycle_number += 1;
        run_cycle(
            cycle_number,
            &config.monitored_devices,
            Arc::clone(&prober),
            &manager,
            &events,
        )
        .await;
    }
}
