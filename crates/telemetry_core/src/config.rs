//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável, compartilhado pelo
//! dashboard e pelo simulador do dispositivo.

use crate::buffer::{DEFAULT_HISTORY_CAP, DEFAULT_WINDOW_CAPACITY};
use crate::protocol::{DEFAULT_TIMESTAMP_FORMAT, ReadingParser};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Esquemas de transporte suportados pelo adaptador MQTT.
pub const SCHEMES: [&str; 3] = ["wss", "ws", "tcp"];

/// Faixa aceita para o intervalo entre pedidos de verificação (segundos).
pub const POLL_INTERVAL_RANGE: RangeInclusive<f64> = 0.1..=60.0;

/// Faixa aceita para o intervalo do simulador (segundos).
pub const SIM_INTERVAL_RANGE: RangeInclusive<f64> = 0.01..=60.0;

const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.5;
const DEFAULT_SIM_INTERVAL_SECS: f64 = 0.5;

/// Converte segundos em `Duration`; fora da faixa (ou NaN) usa o padrão.
fn interval_or_default(secs: f64, range: &RangeInclusive<f64>, default: f64) -> Duration {
    if range.contains(&secs) {
        Duration::from_secs_f64(secs)
    } else {
        warn!("Intervalo inválido: {secs}, usando {default}s");
        Duration::from_secs_f64(default)
    }
}

/// Endereço do broker MQTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Caminho do endpoint websocket (ignorado em tcp)
    pub path: String,
    /// "wss", "ws" ou "tcp"
    pub scheme: String,
    /// Prefixo do client id; cada sessão recebe um sufixo único
    pub client_id_prefix: String,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "broker.hivemq.com".into(),
            port: 8884,
            path: "/mqtt".into(),
            scheme: "wss".into(),
            client_id_prefix: "telemetria".into(),
            keep_alive_secs: 30,
        }
    }
}

impl BrokerConfig {
    /// URL completa usada nos esquemas websocket.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

/// Nomes dos canais (tópicos) trocados com o ESP32.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Leituras de telemetria
    pub data: String,
    /// Comandos START/STOP
    pub control: String,
    /// Onde o pedido CHECK_DEVICE é publicado
    pub check: String,
    /// Onde o dispositivo responde DEVICE_OK
    pub check_reply: String,
    /// Erros reportados pelo dispositivo
    pub error: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            data: "esp32/affoData".into(),
            control: "esp32/control".into(),
            check: "esp32/checkDevice".into(),
            check_reply: "esp32/deviceStatus".into(),
            error: "esp32/error".into(),
        }
    }
}

/// Parâmetros da sessão de aquisição.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Colunas, na ordem dos campos do payload
    pub columns: Vec<String>,
    pub delimiter: char,
    /// Pontos exibidos no gráfico ao vivo
    pub window_capacity: usize,
    /// Teto do histórico (leituras mais antigas são descartadas)
    pub history_cap: usize,
    /// Intervalo entre pedidos CHECK_DEVICE (segundos)
    pub poll_interval_secs: f64,
    /// Formato chrono do timestamp de captura
    pub timestamp_format: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            columns: vec![
                "fsr1".into(),
                "fsr2".into(),
                "pitch".into(),
                "servo".into(),
            ],
            delimiter: ',',
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            history_cap: DEFAULT_HISTORY_CAP,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.into(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        interval_or_default(self.poll_interval_secs, &POLL_INTERVAL_RANGE, DEFAULT_POLL_INTERVAL_SECS)
    }

    /// Parser configurado com as colunas e o delimitador desta sessão.
    pub fn parser(&self) -> ReadingParser {
        ReadingParser::new(&self.columns, self.delimiter)
            .with_timestamp_format(self.timestamp_format.clone())
    }
}

/// Exportação do histórico.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Nome base do arquivo (sem extensão)
    pub file_name: String,
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "data".into(),
            directory: PathBuf::from("."),
        }
    }
}

/// Preferências do dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Tema: "dark" ou "light"
    pub theme: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            theme: "dark".into(),
        }
    }
}

/// Simulador do ESP32.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSimConfig {
    /// Intervalo entre leituras publicadas (segundos)
    pub interval_secs: f64,
}

impl Default for DeviceSimConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SIM_INTERVAL_SECS,
        }
    }
}

impl DeviceSimConfig {
    pub fn interval(&self) -> Duration {
        interval_or_default(self.interval_secs, &SIM_INTERVAL_RANGE, DEFAULT_SIM_INTERVAL_SECS)
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub channels: ChannelConfig,
    pub session: SessionConfig,
    pub export: ExportConfig,
    pub dashboard: DashboardConfig,
    pub device_sim: DeviceSimConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.broker.port == 0 {
            errors.push("Porta do broker não pode ser 0".into());
        }
        if !SCHEMES.contains(&self.broker.scheme.as_str()) {
            errors.push(format!(
                "Esquema inválido: {} (use wss, ws ou tcp)",
                self.broker.scheme
            ));
        }

        let channels = [
            ("data", &self.channels.data),
            ("control", &self.channels.control),
            ("check", &self.channels.check),
            ("check_reply", &self.channels.check_reply),
            ("error", &self.channels.error),
        ];
        for (name, topic) in channels {
            if topic.trim().is_empty() {
                errors.push(format!("Canal {name} não pode ser vazio"));
            }
        }
        if self.channels.error == self.channels.check_reply {
            errors.push(format!(
                "Canal de erro igual ao de resposta da verificação: {}",
                self.channels.error
            ));
        }

        let session = &self.session;
        if session.columns.is_empty() {
            errors.push("Lista de colunas vazia".into());
        }
        let mut seen = HashSet::new();
        for col in &session.columns {
            if !seen.insert(col.as_str()) {
                errors.push(format!("Coluna duplicada: {col}"));
            }
        }
        if session.columns.iter().any(|c| c == "timestamp") {
            errors.push("Coluna \"timestamp\" é reservada".into());
        }
        if session.window_capacity == 0 {
            errors.push("Capacidade da janela não pode ser 0".into());
        }
        if session.history_cap < session.window_capacity {
            errors.push(format!(
                "Teto do histórico ({}) menor que a janela ({})",
                session.history_cap, session.window_capacity
            ));
        }
        if !POLL_INTERVAL_RANGE.contains(&session.poll_interval_secs) {
            errors.push(format!(
                "Intervalo de verificação inválido: {} (0.1–60.0)",
                session.poll_interval_secs
            ));
        }
        if !crate::theme::theme_names().contains(&self.dashboard.theme.as_str()) {
            errors.push(format!("Tema desconhecido: {}", self.dashboard.theme));
        }
        if !SIM_INTERVAL_RANGE.contains(&self.device_sim.interval_secs) {
            errors.push(format!(
                "Intervalo do simulador inválido: {} (0.01–60.0)",
                self.device_sim.interval_secs
            ));
        }

        errors
    }
}
