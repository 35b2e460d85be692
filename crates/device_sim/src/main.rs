//! # Telemetria Device Sim
//!
//! Faz o papel do ESP32 no broker: responde `DEVICE_OK` ao `CHECK_DEVICE`,
//! obedece START/STOP e publica leituras sintéticas no canal de dados.
//!
//! ## Uso
//! ```bash
//! telemetry_device_sim    # usa o config.toml ao lado do executável
//! ```

mod device;

use crossbeam_channel::{Sender, select, tick, unbounded};
use device::{Outgoing, SimDevice};
use rumqttc::{Client, Connection, Event, Packet, QoS};
use std::time::Duration;
use telemetry_core::config::AppConfig;
use telemetry_core::mqtt::mqtt_options;
use tracing::{debug, error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!("Config {}: {problem}", config_path.display());
        }
        return;
    }

    let client_id = format!("{}-sim-{}", config.broker.client_id_prefix, std::process::id());
    let options = match mqtt_options(&config.broker, client_id) {
        Ok(options) => options,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    let (client, connection) = Client::new(options, 16);

    let mut device = SimDevice::new(
        config.channels.clone(),
        config.session.columns.len(),
        config.session.delimiter,
    );
    let interval = config.device_sim.interval();

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ TELEMETRIA DEVICE SIM – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Broker:    {}", config.broker.url());
    println!("  Dados:     {}", config.channels.data);
    println!("  Colunas:   {}", config.session.columns.join(", "));
    println!("  Intervalo: {:.2}s", config.device_sim.interval_secs);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Thread de rede ──
    let (incoming_tx, incoming_rx) = unbounded::<(String, Vec<u8>)>();
    {
        let client = client.clone();
        let topics = [config.channels.check.clone(), config.channels.control.clone()];
        let spawned = std::thread::Builder::new()
            .name("mqtt-sim".into())
            .spawn(move || network_loop(connection, &client, &topics, &incoming_tx));
        if let Err(e) = spawned {
            error!("Falha ao criar thread de rede: {e}");
            return;
        }
    }

    // ── Loop principal ──
    let ticker = tick(interval);
    loop {
        select! {
            recv(incoming_rx) -> msg => match msg {
                Ok((channel, payload)) => {
                    if let Some(out) = device.handle(&channel, &payload) {
                        publish(&client, out);
                    }
                }
                Err(_) => {
                    error!("Thread de rede encerrada");
                    break;
                }
            },
            recv(ticker) -> _ => {
                if !device.is_streaming() {
                    continue;
                }
                if let Some(out) = device.next_reading() {
                    debug!("→ {}", out.1);
                    publish(&client, out);
                }
            },
        }
    }
}

fn publish(client: &Client, (channel, payload): Outgoing) {
    if let Err(e) = client.publish(channel.as_str(), QoS::AtMostOnce, false, payload.into_bytes()) {
        error!("Erro ao publicar em {channel}: {e}");
    }
}

/// Drena o event loop; a cada ConnAck (re)assina os canais de entrada.
fn network_loop(mut connection: Connection, client: &Client, topics: &[String], tx: &Sender<(String, Vec<u8>)>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Conectado ao broker");
                for topic in topics {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        error!("Falha ao assinar {topic}: {e}");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                if tx.send((p.topic.clone(), p.payload.to_vec())).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Erro de conexão: {e}. Tentando novamente em 2s...");
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
}
