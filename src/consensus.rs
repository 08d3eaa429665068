//! consensus.rs — Regra de agregação da alcançabilidade
//!
//! Energia presente se pelo menos um dispositivo respondeu; queda só quando
//! todos falharam. Um dispositivo instável sozinho não gera falsa queda.

use crate::types::ProbeResult;

/// Agrega os resultados de um ciclo em um único booleano.
///
/// Lista vazia conta como inalcançável (nenhum dispositivo confirmou energia).
pub fn any_device_reachable(results: &[ProbeResult]) -> bool {
    results.iter().any(|r| r.reachable)
}
