//! Temas visuais do dashboard.
//!
//! Cores em hex para poderem vir do TOML; a conversão para `egui::Color32`
//! fica no dashboard.

use serde::{Deserialize, Serialize};

/// Cor em formato hex string (ex: "#00ff88").
pub type Color32Hex = String;

/// Paleta completa de um tema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    // Fundo
    pub bg: Color32Hex,
    pub panel: Color32Hex,
    pub border: Color32Hex,
    // Texto
    pub text: Color32Hex,
    pub dim: Color32Hex,
    pub title: Color32Hex,
    // Status
    pub connected: Color32Hex,
    pub checking: Color32Hex,
    pub unknown: Color32Hex,
    pub error: Color32Hex,
    /// Uma cor por coluna do gráfico, reaproveitada em ciclo
    pub series: Vec<Color32Hex>,
}

impl Theme {
    /// Cor da série `index`, em ciclo pela paleta.
    pub fn series_color(&self, index: usize) -> &str {
        if self.series.is_empty() {
            return &self.text;
        }
        &self.series[index % self.series.len()]
    }
}

/// Converte uma string hex "#RRGGBB" para tupla (r, g, b).
pub fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return (255, 255, 255); // fallback branco
    }
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(255);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(255);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(255);
    (r, g, b)
}

/// Tema Escuro (padrão).
pub fn dark_theme() -> Theme {
    Theme {
        name: "dark".into(),
        bg: "#1a1a1a".into(),
        panel: "#252525".into(),
        border: "#333333".into(),
        text: "#ffffff".into(),
        dim: "#888888".into(),
        title: "#00d9ff".into(),
        connected: "#00ff88".into(),
        checking: "#ffcc00".into(),
        unknown: "#888888".into(),
        error: "#ff3333".into(),
        series: vec![
            "#00d9ff".into(),
            "#ffa500".into(),
            "#00ff88".into(),
            "#bb86fc".into(),
            "#ff6b6b".into(),
        ],
    }
}

/// Tema Claro.
pub fn light_theme() -> Theme {
    Theme {
        name: "light".into(),
        bg: "#f5f5f5".into(),
        panel: "#ffffff".into(),
        border: "#cccccc".into(),
        text: "#333333".into(),
        dim: "#777777".into(),
        title: "#0066cc".into(),
        connected: "#00aa55".into(),
        checking: "#cc9900".into(),
        unknown: "#777777".into(),
        error: "#cc2222".into(),
        series: vec![
            "#0066cc".into(),
            "#cc7700".into(),
            "#00aa55".into(),
            "#7744aa".into(),
            "#cc4444".into(),
        ],
    }
}

/// Retorna tema pelo nome.
pub fn get_theme(name: &str) -> Theme {
    match name.to_lowercase().as_str() {
        "light" => light_theme(),
        _ => dark_theme(),
    }
}

/// Nomes de temas disponíveis.
pub fn theme_names() -> Vec<&'static str> {
    vec!["dark", "light"]
}
