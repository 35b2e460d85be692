//! Painéis do dashboard renderizados com egui.

use crate::state::{NoticeKind, UiState};
use crate::theme_egui::EguiTheme;
use egui::{Color32, RichText, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints};
use telemetry_core::buffer::{RollingBuffer, WindowView};

/// Altura de uma linha da tabela de histórico.
const ROW_HEIGHT: f32 = 18.0;

// ──────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────

pub fn panel_frame(ui: &mut Ui, title: &str, accent: Color32, theme: &EguiTheme, add_body: impl FnOnce(&mut Ui)) {
    egui::Frame::new()
        .fill(theme.panel)
        .stroke(egui::Stroke::new(1.0, theme.border))
        .corner_radius(4.0)
        .inner_margin(8.0)
        .show(ui, |ui: &mut Ui| {
            ui.label(
                RichText::new(format!("── {title} ──"))
                    .color(accent)
                    .strong()
                    .monospace()
                    .size(13.0),
            );
            ui.add_space(4.0);
            add_body(ui);
        });
}

/// Valor de célula: ausente aparece como traço, nunca como zero.
pub fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "—".into(),
    }
}

fn status_row(ui: &mut Ui, label: &str, value: &str, color: Color32, dim: Color32) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(RichText::new(format!("{label}:")).color(dim).monospace());
        ui.label(RichText::new(value).color(color).monospace().strong());
    });
}

// ──────────────────────────────────────────
// Status
// ──────────────────────────────────────────

pub fn render_status(ui: &mut Ui, state: &UiState, theme: &EguiTheme) {
    let status = &state.status;
    panel_frame(ui, "STATUS", theme.title, theme, |ui: &mut Ui| {
        let marker = match status.device {
            telemetry_core::DeviceStatus::Connected => "●",
            _ => "○",
        };
        status_row(
            ui,
            "Dispositivo",
            &format!("{marker} {}", status.device),
            theme.status_color(status.device),
            theme.dim,
        );
        status_row(ui, "Stream", &status.stream.to_string(), theme.text, theme.dim);
        status_row(ui, "Leituras", &status.history_len.to_string(), theme.text, theme.dim);
        if let Some(ref err) = status.last_error {
            status_row(ui, "Último erro", err, theme.error, theme.dim);
        }
    });
}

pub fn render_notices(ui: &mut Ui, state: &UiState, theme: &EguiTheme) {
    for notice in state.notices.iter().rev() {
        let color = match notice.kind {
            NoticeKind::Info => theme.connected,
            NoticeKind::Warning => theme.checking,
            NoticeKind::Error => theme.error,
        };
        ui.label(RichText::new(&notice.text).color(color).monospace());
    }
}

// ──────────────────────────────────────────
// Gráfico ao vivo
// ──────────────────────────────────────────

/// Hora da leitura, sem a data (`dd/mm/aaaa HH:MM:SS.mmm` → `HH:MM:SS.mmm`).
pub fn short_time(timestamp: &str) -> &str {
    timestamp.rsplit_once(' ').map_or(timestamp, |(_, time)| time)
}

/// Rótulo do eixo X: a hora de captura da leitura naquela posição.
pub fn axis_label(view: &WindowView, x: f64) -> String {
    view.timestamp_at(x).map(short_time).unwrap_or_default().to_string()
}

/// Uma linha por coluna sobre a janela atual.
pub fn render_chart(ui: &mut Ui, buffer: &RollingBuffer, columns: &[String], theme: &EguiTheme, height: f32) {
    let view = buffer.window_view();
    let series = view.chart_series(columns);
    let x_max = buffer.window_capacity().saturating_sub(1) as f64;

    // Id por geração: depois de limpar, o gráfico não herda limites antigos
    Plot::new(("janela", view.generation))
        .height(height)
        .legend(Legend::default())
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .include_x(0.0)
        .include_x(x_max)
        .x_axis_formatter(move |mark, _range| axis_label(&view, mark.value))
        .show(ui, |plot_ui| {
            for (i, s) in series.into_iter().enumerate() {
                let line = Line::new(PlotPoints::from(s.points))
                    .name(&s.name)
                    .color(theme.series_color(i))
                    .width(1.5);
                plot_ui.line(line);
            }
        });
}

// ──────────────────────────────────────────
// Tabela do histórico
// ──────────────────────────────────────────

/// Histórico completo, rolando para o fim conforme chegam leituras.
pub fn render_history(ui: &mut Ui, buffer: &RollingBuffer, columns: &[String], theme: &EguiTheme) {
    egui::Grid::new("history_header")
        .num_columns(columns.len() + 1)
        .min_col_width(90.0)
        .show(ui, |ui: &mut Ui| {
            ui.label(RichText::new("timestamp").color(theme.title).monospace().strong());
            for col in columns {
                ui.label(RichText::new(col).color(theme.title).monospace().strong());
            }
            ui.end_row();
        });

    egui::ScrollArea::vertical()
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show_rows(ui, ROW_HEIGHT, buffer.len(), |ui: &mut Ui, range| {
            egui::Grid::new("history_rows")
                .num_columns(columns.len() + 1)
                .min_col_width(90.0)
                .striped(true)
                .show(ui, |ui: &mut Ui| {
                    for reading in buffer.history().skip(range.start).take(range.len()) {
                        ui.label(RichText::new(&reading.timestamp).color(theme.dim).monospace());
                        for value in reading.values() {
                            ui.label(RichText::new(format_cell(*value)).monospace());
                        }
                        ui.end_row();
                    }
                });
        });
}
