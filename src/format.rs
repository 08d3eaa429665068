//! format.rs — Textos (Markdown) enviados ao operador
//!
//! Só apresentação: nada aqui altera valores gravados no ledger.

use crate::query::{CurrentStatus, HistoryReport};
use crate::types::PowerEvent;
use chrono::{DateTime, Local, Utc};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_SHORT_FMT: &str = "%Y-%m-%d %H:%M";

/// Formata segundos como `1h 2m 3s`, omitindo unidades zeradas.
/// Segundos aparecem sempre que todo o resto é zero (`0s`).
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}

fn local(ts: DateTime<Utc>, fmt: &str) -> String {
    ts.with_timezone(&Local).format(fmt).to_string()
}

pub fn event_message(event: &PowerEvent) -> String {
    match event {
        PowerEvent::MonitoringStarted { .. } => "🔌 Sistema de monitoramento de energia iniciado".to_string(),
        PowerEvent::OutageStarted { start_time } => format!(
            "🚨 *Queda de energia detectada!*\n📅 Horário: {}\n🔋 Servidor rodando no nobreak",
            local(*start_time, DATETIME_FMT)
        ),
        PowerEvent::OutageEnded {
            end_time,
            duration_seconds,
            ..
        } => format!(
            "✅ *Energia restabelecida!*\n📅 Horário: {}\n⏱️ Duração da queda: {}",
            local(*end_time, DATETIME_FMT),
            format_duration(*duration_seconds)
        ),
    }
}

pub fn status_message(status: &CurrentStatus) -> String {
    match status {
        CurrentStatus::PowerOn => "🟢 *Status atual: ENERGIA PRESENTE*\n✅ Tudo normal".to_string(),
        CurrentStatus::PowerCut {
            outage_start,
            duration_so_far_seconds,
        } => format!(
            "🔴 *Status atual: SEM ENERGIA*\n📅 Início: {}\n⏱️ Duração: {} (em andamento)\n🔋 Servidor rodando no nobreak",
            local(*outage_start, DATETIME_FMT),
            format_duration(*duration_so_far_seconds)
        ),
    }
}

pub fn history_message(report: &HistoryReport, limit: usize) -> String {
    let mut message = format!(
        "📊 *Histórico de quedas (últimos {} dias)*\n\n",
        report.window_days
    );
    if report.intervals.is_empty() {
        message.push_str("Nenhuma queda registrada.");
        return message;
    }

    for cut in report.intervals.iter().take(limit) {
        let icon = if cut.is_ongoing() { "🔴" } else { "✅" };
        message.push_str(&format!(
            "{} *{}*",
            icon,
            local(cut.start_time, DATETIME_SHORT_FMT)
        ));
        match cut.duration_seconds {
            Some(d) if !cut.is_ongoing() => {
                message.push_str(&format!(" - Duração: {}", format_duration(d)))
            }
            _ => message.push_str(" - Em andamento"),
        }
        message.push('\n');
    }
    if report.intervals.len() > limit {
        message.push_str(&format!("\n_... e mais {}_\n", report.intervals.len() - limit));
    }

    let stats = &report.stats;
    message.push_str(&format!(
        "\n📈 *Estatísticas:*\nTotal de quedas: {}\nTempo total sem energia: {}\nDuração média: {}",
        stats.total_completed_count,
        format_duration(stats.total_downtime_seconds),
        format_duration(stats.average_duration_seconds)
    ));
    message
}

pub fn fix_message(closed: u64) -> String {
    format!(
        "🔧 *Correção aplicada*\nEncerrada(s) {closed} queda(s) em andamento\nEstado do monitor reiniciado\nO sistema vai verificar a energia novamente em instantes."
    )
}

pub fn help_message(history_days: i64) -> String {
    format!(
        "🤖 *Comandos do monitor de energia*\n\n\
         /status - Situação atual da energia\n\
         /history - Histórico de quedas (últimos {history_days} dias)\n\
         /fix - Corrige estados travados (use se o status estiver errado)\n\
         /help - Mostra esta ajuda\n\n\
         Você será avisado automaticamente quando:\n\
         • Uma queda de energia for detectada\n\
         • A energia voltar"
    )
}

pub fn welcome_message() -> String {
    "👋 *Bem-vindo ao monitor de energia!*\n\n\
     Vou acompanhar a energia e avisar sobre qualquer queda.\n\
     Use os botões abaixo para interagir:"
        .to_string()
}
