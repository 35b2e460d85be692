//! Comportamento simulado do firmware: responde à verificação, liga e
//! desliga o stream e gera leituras sintéticas.

use telemetry_core::config::ChannelConfig;
use telemetry_core::protocol::{CMD_START, CMD_STOP, CMD_CHECK_DEVICE, REPLY_DEVICE_OK};
use tracing::{info, warn};

/// Mensagem a publicar: (canal, payload).
pub type Outgoing = (String, String);

pub struct SimDevice {
    channels: ChannelConfig,
    columns: usize,
    delimiter: char,
    streaming: bool,
    step: u64,
}

impl SimDevice {
    pub fn new(channels: ChannelConfig, columns: usize, delimiter: char) -> Self {
        Self {
            channels,
            columns,
            delimiter,
            streaming: false,
            step: 0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Trata uma mensagem recebida e devolve a resposta, se houver.
    pub fn handle(&mut self, channel: &str, payload: &[u8]) -> Option<Outgoing> {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim();

        if channel == self.channels.check {
            if text == CMD_CHECK_DEVICE {
                return Some((self.channels.check_reply.clone(), REPLY_DEVICE_OK.into()));
            }
            return None;
        }

        if channel == self.channels.control {
            match text {
                CMD_START => {
                    info!("START recebido, publicando em {}", self.channels.data);
                    self.streaming = true;
                    self.step = 0;
                }
                CMD_STOP => {
                    info!("STOP recebido");
                    self.streaming = false;
                }
                other => {
                    warn!("Comando desconhecido: {other}");
                    return Some((self.channels.error.clone(), format!("Comando desconhecido: {other}")));
                }
            }
        }
        None
    }

    /// Próxima leitura, se o stream está ligado.
    pub fn next_reading(&mut self) -> Option<Outgoing> {
        if !self.streaming {
            return None;
        }
        let t = self.step as f64 * 0.2;
        self.step += 1;

        let sep = self.delimiter.to_string();
        let line = (0..self.columns)
            .map(|i| {
                let v = 50.0 + 40.0 * (t + i as f64).sin();
                format!("{v:.2}")
            })
            .collect::<Vec<_>>()
            .join(&sep);
        Some((self.channels.data.clone(), line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> SimDevice {
        SimDevice::new(ChannelConfig::default(), 4, ',')
    }

    #[test]
    fn answers_check_request() {
        let mut d = device();
        assert_eq!(
            d.handle("esp32/checkDevice", b"CHECK_DEVICE"),
            Some(("esp32/deviceStatus".into(), "DEVICE_OK".into()))
        );
        assert_eq!(d.handle("esp32/checkDevice", b"PING"), None);
    }

    #[test]
    fn start_and_stop_toggle_stream() {
        let mut d = device();
        assert_eq!(d.next_reading(), None);

        d.handle("esp32/control", b"START");
        assert!(d.is_streaming());
        let (channel, line) = d.next_reading().unwrap();
        assert_eq!(channel, "esp32/affoData");
        assert_eq!(line.split(',').count(), 4);
        assert!(line.split(',').all(|v| v.parse::<f64>().is_ok()));

        d.handle("esp32/control", b"STOP");
        assert_eq!(d.next_reading(), None);
    }

    #[test]
    fn unknown_command_reports_error() {
        let mut d = device();
        let reply = d.handle("esp32/control", b"RESET");
        assert_eq!(reply.map(|(c, _)| c), Some("esp32/error".to_string()));
        assert!(!d.is_streaming());
    }
}
