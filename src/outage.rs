use crate::storage::{self, Storage};
use crate::types::{PowerEvent, PowerState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Máquina de estados da energia: consome a amostra agregada de cada ciclo,
/// grava início/fim de quedas no ledger e devolve o evento a notificar.
pub struct OutageManager {
    state: PowerState,
    /// Queda aberta por este gerenciador: `(id, start_time)`. Evita reler o
    /// ledger ao encerrar.
    current_outage: Option<(i64, DateTime<Utc>)>,
    storage: Arc<Storage>,
}

impl OutageManager {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            state: PowerState::Unknown,
            current_outage: None,
            storage,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Encerra a queda em cache; sem cache, cai na mais recente do ledger.
    async fn close_current(
        &self,
        now: DateTime<Utc>,
    ) -> storage::Result<Option<(DateTime<Utc>, i64)>> {
        match self.current_outage {
            Some((id, start_time)) => Ok(self
                .storage
                .close_outage_by_id(id, start_time, now)
                .await?
                .map(|duration| (start_time, duration))),
            None => self.storage.close_outage(now).await,
        }
    }

    /// Aplica uma amostra. Se a escrita no ledger falhar o estado não avança,
    /// e a mesma transição é tentada de novo no próximo ciclo.
    pub async fn handle_sample(
        &mut self,
        any_reachable: bool,
        now: DateTime<Utc>,
    ) -> storage::Result<Option<PowerEvent>> {
        match (self.state, any_reachable) {
            (PowerState::Unknown, true) => {
                info!("Estado inicial: energia presente.");
                self.state = PowerState::PowerOn;
                Ok(None)
            }
            (PowerState::Unknown, false) => {
                let id = self.storage.open_outage(now).await?;
                info!("Estado inicial: sem energia. Queda registrada em {}.", now);
                self.state = PowerState::PowerCut;
                self.current_outage = Some((id, now));
                Ok(None)
            }
            (PowerState::PowerOn, false) => {
                let id = self.storage.open_outage(now).await?;
                info!("Queda de energia detectada em {}.", now);
                self.state = PowerState::PowerCut;
                self.current_outage = Some((id, now));
                Ok(Some(PowerEvent::OutageStarted { start_time: now }))
            }
            (PowerState::PowerCut, true) => {
                let closed = self.close_current(now).await?;
                self.state = PowerState::PowerOn;
                self.current_outage = None;
                match closed {
                    Some((start_time, duration_seconds)) => {
                        info!("Energia restabelecida em {} após {}s.", now, duration_seconds);
                        Ok(Some(PowerEvent::OutageEnded {
                            start_time,
                            end_time: now,
                            duration_seconds,
                        }))
                    }
                    None => {
                        warn!("Energia restabelecida, mas nenhuma queda em andamento no ledger.");
                        Ok(None)
                    }
                }
            }
            (PowerState::PowerOn, true) | (PowerState::PowerCut, false) => Ok(None),
        }
    }

    /// Correção manual: fecha todas as quedas abertas e volta para `Unknown`,
    /// para o próximo ciclo recalcular o estado real.
    pub async fn fix(&mut self, now: DateTime<Utc>) -> storage::Result<u64> {
        let closed = self.storage.close_all_ongoing(now).await?;
        info!(
            "[FIX] {} queda(s) encerrada(s); estado {} -> {}.",
            closed,
            self.state,
            PowerState::Unknown
        );
        self.state = PowerState::Unknown;
        self.current_outage = None;
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::temp_storage;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    async fn ongoing_count(storage: &Storage, now: DateTime<Utc>) -> usize {
        storage
            .history(Duration::days(3650), now)
            .await
            .unwrap()
            .iter()
            .filter(|c| c.is_ongoing())
            .count()
    }

    #[tokio::test]
    async fn transition_table() {
        let (_dir, storage) = temp_storage().await;
        let mut manager = OutageManager::new(Arc::new(storage));

        assert_eq!(manager.handle_sample(true, at(0)).await.unwrap(), None);
        assert_eq!(manager.state(), PowerState::PowerOn);
        assert_eq!(manager.handle_sample(true, at(30)).await.unwrap(), None);

        let started = manager.handle_sample(false, at(60)).await.unwrap();
        assert_eq!(started, Some(PowerEvent::OutageStarted { start_time: at(60) }));
        assert_eq!(manager.state(), PowerState::PowerCut);
        assert_eq!(manager.handle_sample(false, at(90)).await.unwrap(), None);

        let ended = manager.handle_sample(true, at(120)).await.unwrap();
        assert_eq!(
            ended,
            Some(PowerEvent::OutageEnded {
                start_time: at(60),
                end_time: at(120),
                duration_seconds: 60,
            })
        );
        assert_eq!(manager.state(), PowerState::PowerOn);
    }

    #[tokio::test]
    async fn failed_ledger_write_is_retried_next_tick() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let mut manager = OutageManager::new(Arc::clone(&storage));
        manager.handle_sample(true, at(0)).await.unwrap();

        // Tabela indisponível: a abertura falha e o estado não avança.
        storage.execute_raw("ALTER TABLE power_cuts RENAME TO power_cuts_off").await;
        assert!(manager.handle_sample(false, at(30)).await.is_err());
        assert_eq!(manager.state(), PowerState::PowerOn);

        storage.execute_raw("ALTER TABLE power_cuts_off RENAME TO power_cuts").await;
        assert_eq!(
            manager.handle_sample(false, at(60)).await.unwrap(),
            Some(PowerEvent::OutageStarted { start_time: at(60) })
        );
        assert_eq!(manager.state(), PowerState::PowerCut);
        assert_eq!(ongoing_count(&storage, at(60)).await, 1);

        // Mesma coisa no encerramento.
        storage.execute_raw("ALTER TABLE power_cuts RENAME TO power_cuts_off").await;
        assert!(manager.handle_sample(true, at(90)).await.is_err());
        assert_eq!(manager.state(), PowerState::PowerCut);

        storage.execute_raw("ALTER TABLE power_cuts_off RENAME TO power_cuts").await;
        assert_eq!(
            manager.handle_sample(true, at(120)).await.unwrap(),
            Some(PowerEvent::OutageEnded {
                start_time: at(60),
                end_time: at(120),
                duration_seconds: 60,
            })
        );
        assert_eq!(manager.state(), PowerState::PowerOn);
        assert_eq!(ongoing_count(&storage, at(120)).await, 0);
    }

    #[tokio::test]
    async fn cold_start_without_power_opens_silently() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let mut manager = OutageManager::new(Arc::clone(&storage));

        assert_eq!(manager.handle_sample(false, at(0)).await.unwrap(), None);
        assert_eq!(manager.state(), PowerState::PowerCut);
        let ongoing = storage.current_ongoing().await.unwrap().unwrap();
        assert_eq!(ongoing.start_time, at(0));
    }

    #[tokio::test]
    async fn scenario_produces_single_interval() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let mut manager = OutageManager::new(Arc::clone(&storage));

        let samples = [true, true, false, false, true];
        for (tick, reachable) in samples.into_iter().enumerate() {
            manager
                .handle_sample(reachable, at(tick as i64 * 30))
                .await
                .unwrap();
        }

        let cuts = storage.history(Duration::days(1), at(200)).await.unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].start_time, at(60));
        assert_eq!(cuts[0].end_time, Some(at(120)));
        assert_eq!(cuts[0].duration_seconds, Some(60));
        assert!(!cuts[0].is_ongoing());
    }

    #[tokio::test]
    async fn power_return_closes_the_interval_it_opened() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let mut manager = OutageManager::new(Arc::clone(&storage));
        manager.handle_sample(true, at(0)).await.unwrap();
        manager.handle_sample(false, at(10)).await.unwrap();

        let ended = manager.handle_sample(true, at(70)).await.unwrap();
        assert_eq!(
            ended,
            Some(PowerEvent::OutageEnded {
                start_time: at(10),
                end_time: at(70),
                duration_seconds: 60,
            })
        );
        let rows = storage.history(Duration::days(1), at(70)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].end_time, Some(at(70)));
        assert_eq!(rows[0].duration_seconds, Some(60));
    }

    #[tokio::test]
    async fn interval_closed_elsewhere_ends_silently() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        let mut manager = OutageManager::new(Arc::clone(&storage));
        manager.handle_sample(true, at(0)).await.unwrap();
        manager.handle_sample(false, at(10)).await.unwrap();
        storage.close_all_ongoing(at(20)).await.unwrap();

        assert_eq!(manager.handle_sample(true, at(30)).await.unwrap(), None);
        assert_eq!(manager.state(), PowerState::PowerOn);
        let rows = storage.history(Duration::days(1), at(30)).await.unwrap();
        assert_eq!(rows[0].end_time, Some(at(20)));
    }

    #[tokio::test]
    async fn fix_closes_everything_and_resets() {
        let (_dir, storage) = temp_storage().await;
        let storage = Arc::new(storage);
        storage.open_outage(at(0)).await.unwrap();
        let mut manager = OutageManager::new(Arc::clone(&storage));
        manager.handle_sample(false, at(10)).await.unwrap();
        assert_eq!(ongoing_count(&storage, at(20)).await, 2);

        assert_eq!(manager.fix(at(20)).await.unwrap(), 2);
        assert_eq!(manager.state(), PowerState::Unknown);
        assert_eq!(ongoing_count(&storage, at(20)).await, 0);

        assert_eq!(manager.handle_sample(true, at(30)).await.unwrap(), None);
        assert_eq!(manager.state(), PowerState::PowerOn);
    }

    #[tokio::test]
    async fn fix_twice_without_ongoing_is_a_noop() {
        let (_dir, storage) = temp_storage().await;
        let mut manager = OutageManager::new(Arc::new(storage));
        manager.handle_sample(true, at(0)).await.unwrap();

        assert_eq!(manager.fix(at(10)).await.unwrap(), 0);
        assert_eq!(manager.state(), PowerState::Unknown);
        assert_eq!(manager.fix(at(20)).await.unwrap(), 0);
        assert_eq!(manager.state(), PowerState::Unknown);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn at_most_one_ongoing_interval(samples in proptest::collection::vec(any::<bool>(), 1..40)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let (_dir, storage) = temp_storage().await;
                let storage = Arc::new(storage);
                let mut manager = OutageManager::new(Arc::clone(&storage));

                for (tick, reachable) in samples.iter().enumerate() {
                    let now = at(tick as i64 * 30);
                    manager.handle_sample(*reachable, now).await.unwrap();
                    let ongoing = ongoing_count(&storage, now).await;
                    assert!(ongoing <= 1, "{} quedas abertas após o ciclo {}", ongoing, tick);
                    assert_eq!(ongoing == 1, manager.state() == PowerState::PowerCut);
                }
            });
        }
    }
}
