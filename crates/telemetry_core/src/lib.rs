//! # Telemetry Core
//!
//! Crate compartilhada do supervisor de telemetria do ESP32: verificação de
//! presença do dispositivo, handshake START/STOP, parsing das leituras
//! delimitadas, buffer com janela deslizante e exportação do histórico.
//!
//! ## Módulos
//! - [`types`] – Leitura, status do dispositivo e estado do stream
//! - [`protocol`] – Comandos do dispositivo e parser das leituras
//! - [`config`] – Configuração unificada via TOML
//! - [`buffer`] – Histórico completo e janela das últimas N leituras
//! - [`transport`] – Fronteira publish/subscribe e sessões
//! - [`liveness`] – Máquina de estados da verificação de presença
//! - [`stream`] – Ciclo de vida do stream de dados
//! - [`supervisor`] – Orquestra tudo acima numa única thread
//! - [`runtime`] – Thread dona do supervisor, comandos e atualizações
//! - [`export`] – Exportação do histórico em tabela
//! - [`mqtt`] – Transporte MQTT (rumqttc)
//! - [`theme`] – Temas do dashboard (Dark, Light)

pub mod types;
pub mod protocol;
pub mod config;
pub mod buffer;
pub mod transport;
pub mod liveness;
pub mod stream;
pub mod error;
pub mod export;
pub mod supervisor;
pub mod runtime;
pub mod mqtt;
pub mod theme;

// Re-exports convenientes
pub use types::{DeviceStatus, Reading, StatusSnapshot, StreamState};
pub use protocol::{DecodeError, ReadingParser};
pub use config::AppConfig;
pub use buffer::RollingBuffer;
pub use transport::{SessionId, SessionKind, Transport, TransportError, TransportEvent};
pub use error::SupervisorError;
pub use export::{CsvExporter, ExportError, ExportReport, Exporter};
pub use supervisor::{Supervisor, SupervisorEvent};
pub use runtime::{Command, SupervisorHandle, Update};
pub use mqtt::MqttTransport;
