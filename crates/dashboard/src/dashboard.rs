//! Dashboard principal – App eframe/egui.

use crate::panels;
use crate::state::UiState;
use crate::theme_egui::{self, EguiTheme};
use egui::{RichText, Ui};
use std::time::{Duration, Instant};
use telemetry_core::config::AppConfig;
use telemetry_core::runtime::{Command, SupervisorHandle};
use telemetry_core::types::DeviceStatus;
use tracing::{info, warn};

const KEY_FILE_NAME: &str = "file_name";
const KEY_THEME: &str = "theme";

/// Estado do dashboard.
pub struct TelemetryDashboard {
    theme: EguiTheme,
    theme_index: usize,
    all_themes: Vec<EguiTheme>,

    // Supervisor
    handle: SupervisorHandle,
    state: UiState,

    // UI state
    file_name: String,
    show_history: bool,
    is_fullscreen: bool,
}

impl TelemetryDashboard {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, handle: SupervisorHandle) -> Self {
        let stored = |key: &str| cc.storage.and_then(|s| eframe::get_value::<String>(s, key));

        let theme_name = stored(KEY_THEME).unwrap_or_else(|| config.dashboard.theme.clone());
        let file_name = stored(KEY_FILE_NAME).unwrap_or_else(|| config.export.file_name.clone());

        // Carrega tema
        let all_themes = theme_egui::all_themes();
        let theme_index = all_themes
            .iter()
            .position(|t| t.name == theme_name)
            .unwrap_or(0);
        let theme = all_themes[theme_index].clone();

        Self {
            theme,
            theme_index,
            all_themes,
            handle,
            state: UiState::new(&config.session),
            file_name,
            show_history: true,
            is_fullscreen: false,
        }
    }

    /// Processa atualizações pendentes da thread do supervisor.
    fn poll_supervisor(&mut self) {
        while let Ok(update) = self.handle.updates().try_recv() {
            self.state.apply(update);
        }
        self.state.expire_notices(Instant::now());
    }

    fn send(&self, command: Command) {
        if !self.handle.send(command) {
            warn!("Supervisor encerrado, comando descartado");
        }
    }

    fn render_controls(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui: &mut Ui| {
            if self.state.status.device == DeviceStatus::Checking {
                if ui.button("Cancelar verificação").clicked() {
                    self.send(Command::EndCheck);
                }
            } else if ui
                .add_enabled(self.state.can_check(), egui::Button::new("Verificar"))
                .clicked()
            {
                self.send(Command::BeginCheck);
            }

            if ui
                .add_enabled(self.state.can_start(), egui::Button::new("▶ Start"))
                .clicked()
            {
                self.send(Command::Start);
            }
            if ui
                .add_enabled(self.state.can_stop(), egui::Button::new("■ Stop"))
                .clicked()
            {
                self.send(Command::Stop);
            }

            ui.separator();

            ui.label(RichText::new("Arquivo:").color(self.theme.dim).monospace());
            ui.add(egui::TextEdit::singleline(&mut self.file_name).desired_width(160.0));
            if ui
                .add_enabled(self.state.can_save(), egui::Button::new("Salvar"))
                .clicked()
            {
                self.send(Command::Export {
                    file_name: self.file_name.clone(),
                });
            }
            if ui
                .add_enabled(self.state.can_clear(), egui::Button::new("Limpar"))
                .clicked()
            {
                self.send(Command::Clear);
            }
        });
    }
}

/// Teclas de atalho pressionadas neste frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Shortcuts {
    history: bool,
    theme: bool,
    quit: bool,
    fullscreen: bool,
}

/// Lê as teclas. Nada de comandos de viewport aqui: `ctx.input` segura o
/// lock do contexto até o closure terminar.
fn read_shortcuts(ctx: &egui::Context) -> Shortcuts {
    ctx.input(|i: &egui::InputState| Shortcuts {
        history: i.key_pressed(egui::Key::H),
        theme: i.key_pressed(egui::Key::T),
        quit: i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape),
        fullscreen: i.key_pressed(egui::Key::F) || i.key_pressed(egui::Key::F11),
    })
}

/// Comandos de janela pedidos pelos atalhos. `fullscreen` é o estado após o toggle.
fn window_commands(keys: Shortcuts, fullscreen: bool) -> Vec<egui::ViewportCommand> {
    let mut commands = Vec::new();
    if keys.quit {
        commands.push(egui::ViewportCommand::Close);
    }
    if keys.fullscreen {
        commands.push(egui::ViewportCommand::Fullscreen(fullscreen));
    }
    commands
}

impl TelemetryDashboard {
    fn apply_shortcuts(&mut self, ctx: &egui::Context, keys: Shortcuts) {
        if keys.history {
            self.show_history = !self.show_history;
        }
        if keys.theme {
            self.theme_index = (self.theme_index + 1) % self.all_themes.len();
            self.theme = self.all_themes[self.theme_index].clone();
            info!("Tema: {}", self.theme.name);
        }
        if keys.fullscreen {
            self.is_fullscreen = !self.is_fullscreen;
        }
        for command in window_commands(keys, self.is_fullscreen) {
            ctx.send_viewport_cmd(command);
        }
    }
}

impl eframe::App for TelemetryDashboard {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ── Poll supervisor ──
        self.poll_supervisor();

        // ── Repaint periódico para pegar leituras novas ──
        ctx.request_repaint_after(Duration::from_millis(50));

        // ── Configurar estilo visual baseado no tema ──
        let mut visuals = if self.theme.name == "light" {
            egui::Visuals::light()
        } else {
            egui::Visuals::dark()
        };
        visuals.panel_fill = self.theme.bg;
        visuals.window_fill = self.theme.panel;
        visuals.override_text_color = Some(self.theme.text);
        ctx.set_visuals(visuals);

        // ── Atalhos de teclado (fora de campos de texto) ──
        if !ctx.wants_keyboard_input() {
            let keys = read_shortcuts(ctx);
            self.apply_shortcuts(ctx, keys);
        }

        // ── Painel central ──
        egui::CentralPanel::default().show(ctx, |ui: &mut Ui| {
            // ── Título ──
            ui.vertical_centered(|ui: &mut Ui| {
                ui.label(
                    RichText::new("⚡ TELEMETRIA ESP32 ⚡")
                        .color(self.theme.title)
                        .size(22.0)
                        .strong()
                        .monospace(),
                );
            });
            ui.add_space(6.0);

            self.render_controls(ui);
            ui.add_space(6.0);

            ui.columns(2, |cols| {
                panels::render_status(&mut cols[0], &self.state, &self.theme);
                panels::render_notices(&mut cols[1], &self.state, &self.theme);
            });
            ui.add_space(6.0);

            // ── Gráfico ──
            let window = self.state.buffer.window_capacity();
            panels::panel_frame(
                ui,
                &format!("ÚLTIMAS {window} LEITURAS"),
                self.theme.title,
                &self.theme,
                |ui: &mut Ui| {
                    panels::render_chart(ui, &self.state.buffer, &self.state.columns, &self.theme, 220.0);
                },
            );

            // ── Histórico ──
            if self.show_history {
                ui.add_space(6.0);
                panels::panel_frame(ui, "HISTÓRICO", self.theme.title, &self.theme, |ui: &mut Ui| {
                    panels::render_history(ui, &self.state.buffer, &self.state.columns, &self.theme);
                });
            }

            // ── Help bar (fundo) ──
            ui.with_layout(egui::Layout::bottom_up(egui::Align::Center), |ui: &mut Ui| {
                ui.label(
                    RichText::new("[F] Fullscreen | [H] Histórico | [T] Tema | [Q/Esc] Sair")
                        .color(self.theme.dim)
                        .monospace()
                        .size(10.0),
                );
            });
        });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, KEY_FILE_NAME, &self.file_name);
        eframe::set_value(storage, KEY_THEME, &self.theme.name);
    }
}
