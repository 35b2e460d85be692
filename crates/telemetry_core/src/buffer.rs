//! Histórico de leituras e a janela deslizante para o gráfico ao vivo.
//!
//! A janela não é armazenada: é sempre o sufixo de tamanho
//! `min(W, len(histórico))`, então histórico e janela nunca divergem.

use crate::types::Reading;
use std::collections::VecDeque;

/// Capacidade padrão da janela (pontos no gráfico).
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Teto prático do histórico.
pub const DEFAULT_HISTORY_CAP: usize = 100_000;

/// Histórico append-only com janela derivada.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    history: VecDeque<Reading>,
    window_capacity: usize,
    history_cap: usize,
    /// Incrementado a cada `clear()`
    generation: u64,
}

/// Cópia da janela para o gráfico: leituras e geração vêm do mesmo instante.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowView {
    pub generation: u64,
    pub readings: Vec<Reading>,
}

/// Série de uma coluna para o gráfico; pontos ausentes são omitidos.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

impl RollingBuffer {
    pub fn new(window_capacity: usize, history_cap: usize) -> Self {
        let window_capacity = window_capacity.max(1);
        Self {
            history: VecDeque::new(),
            window_capacity,
            history_cap: history_cap.max(window_capacity),
            generation: 0,
        }
    }

    /// Adiciona no fim. Acima do teto, descarta a leitura mais antiga.
    pub fn append(&mut self, reading: Reading) {
        if self.history.len() >= self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(reading);
    }

    /// Esvazia histórico e janela num único passo.
    pub fn clear(&mut self) {
        self.history.clear();
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }

    /// Histórico completo em ordem de chegada.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Reading> + ExactSizeIterator {
        self.history.iter()
    }

    /// Últimas `W` leituras em ordem de chegada.
    pub fn window(&self) -> impl DoubleEndedIterator<Item = &Reading> + ExactSizeIterator {
        let start = self.history.len().saturating_sub(self.window_capacity);
        self.history.range(start..)
    }

    pub fn window_len(&self) -> usize {
        self.history.len().min(self.window_capacity)
    }

    pub fn window_view(&self) -> WindowView {
        WindowView {
            generation: self.generation,
            readings: self.window().cloned().collect(),
        }
    }
}

impl WindowView {
    /// Projeção em uma série por coluna. O eixo X é o índice da leitura
    /// na janela; o rótulo vem de [`WindowView::timestamp_at`].
    pub fn chart_series(&self, columns: &[String]) -> Vec<ChartSeries> {
        columns
            .iter()
            .enumerate()
            .map(|(col, name)| ChartSeries {
                name: name.clone(),
                points: self
                    .readings
                    .iter()
                    .enumerate()
                    .map(|(x, r)| [x as f64, r.plot_value(col)])
                    .filter(|[_, y]| !y.is_nan())
                    .collect(),
            })
            .collect()
    }

    /// Timestamp da leitura na posição `x` do eixo. Só posições inteiras
    /// dentro da janela têm rótulo.
    pub fn timestamp_at(&self, x: f64) -> Option<&str> {
        if x < 0.0 || x.fract() != 0.0 {
            return None;
        }
        self.readings.get(x as usize).map(|r| r.timestamp.as_str())
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY, DEFAULT_HISTORY_CAP)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
