//! # Telemetria Dashboard
//!
//! Painel de operação do ESP32 com GUI acelerada por GPU via eframe/egui.
//!
//! Verifica a presença do dispositivo, inicia e para o stream via MQTT,
//! mostra as últimas leituras num gráfico ao vivo e o histórico completo
//! numa tabela, e salva o histórico em CSV.
//!
//! ## Atalhos
//! - `F` / `F11`: Fullscreen
//! - `H`: Toggle histórico
//! - `T`: Alternar tema
//! - `Q` / `Esc`: Sair

mod dashboard;
mod panels;
mod state;
mod theme_egui;

use dashboard::TelemetryDashboard;
use telemetry_core::config::AppConfig;
use telemetry_core::export::CsvExporter;
use telemetry_core::mqtt::MqttTransport;
use telemetry_core::runtime;
use tracing::{error, info};

fn main() -> eframe::Result<()> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        let _ = config.save(&config_path);
    }
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!("Config {}: {problem}", config_path.display());
        }
        std::process::exit(1);
    }

    // ── Supervisor ──
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let transport = MqttTransport::new(config.broker.clone(), events_tx);
    let exporter = CsvExporter::new(config.export.directory.clone());

    let handle = match runtime::spawn(&config, transport, events_rx, Box::new(exporter)) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Falha ao iniciar o supervisor: {e}");
            std::process::exit(1);
        }
    };
    info!("Broker: {}", config.broker.url());

    // ── Janela eframe ──
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("⚡ Telemetria ESP32 ⚡")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([800.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Telemetria ESP32",
        options,
        Box::new(move |cc| Ok(Box::new(TelemetryDashboard::new(cc, config, handle)))),
    )
}
