//! Conversão de temas para `egui::Color32`.

use egui::Color32;
use telemetry_core::theme::{self, Theme};
use telemetry_core::types::DeviceStatus;

/// Tema convertido para tipos egui.
#[derive(Clone)]
pub struct EguiTheme {
    pub name: String,
    pub bg: Color32,
    pub panel: Color32,
    pub border: Color32,
    pub text: Color32,
    pub dim: Color32,
    pub title: Color32,
    pub connected: Color32,
    pub checking: Color32,
    pub unknown: Color32,
    pub error: Color32,
    pub series: Vec<Color32>,
}

impl EguiTheme {
    /// Converte um [`Theme`] do core para [`EguiTheme`].
    pub fn from_core(t: &Theme) -> Self {
        Self {
            name: t.name.clone(),
            bg: hex_color(&t.bg),
            panel: hex_color(&t.panel),
            border: hex_color(&t.border),
            text: hex_color(&t.text),
            dim: hex_color(&t.dim),
            title: hex_color(&t.title),
            connected: hex_color(&t.connected),
            checking: hex_color(&t.checking),
            unknown: hex_color(&t.unknown),
            error: hex_color(&t.error),
            series: t.series.iter().map(|c| hex_color(c)).collect(),
        }
    }

    /// Cor do indicador de presença do dispositivo.
    pub fn status_color(&self, status: DeviceStatus) -> Color32 {
        match status {
            DeviceStatus::Connected => self.connected,
            DeviceStatus::Checking => self.checking,
            DeviceStatus::Unknown => self.unknown,
        }
    }

    /// Cor da série `index`, em ciclo.
    pub fn series_color(&self, index: usize) -> Color32 {
        if self.series.is_empty() {
            return self.text;
        }
        self.series[index % self.series.len()]
    }
}

fn hex_color(hex: &str) -> Color32 {
    let (r, g, b) = theme::hex_to_rgb(hex);
    Color32::from_rgb(r, g, b)
}

/// Carrega todos os temas disponíveis.
pub fn all_themes() -> Vec<EguiTheme> {
    theme::theme_names()
        .iter()
        .map(|name| EguiTheme::from_core(&theme::get_theme(name)))
        .collect()
}
