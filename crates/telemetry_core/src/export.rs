//! Exportação do histórico para arquivo tabular.
//!
//! Uma linha por leitura, colunas `timestamp` + colunas configuradas, na
//! mesma ordem. Histórico vazio é erro: nunca se gera arquivo vazio.

use crate::buffer::RollingBuffer;
use crate::types::Reading;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Nome da primeira coluna do arquivo exportado.
pub const TIMESTAMP_HEADER: &str = "timestamp";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Nenhum dado para salvar")]
    EmptyHistory,

    #[error("Nome de arquivo inválido: {0:?}")]
    InvalidName(String),

    #[error("Erro de E/S: {0}")]
    Io(#[from] io::Error),
}

/// Resultado de uma exportação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub location: PathBuf,
    pub rows: usize,
}

/// Destino de exportação.
pub trait Exporter {
    fn export(&self, name: &str, columns: &[String], rows: &[&Reading]) -> Result<ExportReport, ExportError>;
}

/// Exporta o histórico inteiro. Falha com [`ExportError::EmptyHistory`]
/// antes de tocar o destino se não há leituras.
pub fn export_history(
    exporter: &dyn Exporter,
    name: &str,
    columns: &[String],
    buffer: &RollingBuffer,
) -> Result<ExportReport, ExportError> {
    if buffer.is_empty() {
        return Err(ExportError::EmptyHistory);
    }
    let rows: Vec<&Reading> = buffer.history().collect();
    let report = exporter.export(name, columns, &rows)?;
    info!("{} linhas exportadas para {}", report.rows, report.location.display());
    Ok(report)
}

/// Exportador CSV: grava `<directory>/<name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    pub directory: PathBuf,
    pub delimiter: char,
}

impl CsvExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            delimiter: ',',
        }
    }

    /// Caminho final para o nome base informado.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, ExportError> {
        let base = name.trim();
        let base = base.strip_suffix(".csv").unwrap_or(base);
        if base.is_empty() || base.contains(['/', '\\']) || base == "." || base == ".." {
            return Err(ExportError::InvalidName(name.to_string()));
        }
        Ok(self.directory.join(format!("{base}.csv")))
    }
}

impl Exporter for CsvExporter {
    fn export(&self, name: &str, columns: &[String], rows: &[&Reading]) -> Result<ExportReport, ExportError> {
        if rows.is_empty() {
            return Err(ExportError::EmptyHistory);
        }
        let location = self.path_for(name)?;
        let mut out = BufWriter::new(File::create(&location)?);
        write_table(&mut out, columns, rows, self.delimiter)?;
        out.flush()?;
        Ok(ExportReport {
            location,
            rows: rows.len(),
        })
    }
}

/// Escreve cabeçalho + linhas em formato delimitado.
pub fn write_table<W: Write>(out: &mut W, columns: &[String], rows: &[&Reading], delimiter: char) -> io::Result<()> {
    let sep = delimiter.to_string();

    let header: Vec<String> = std::iter::once(TIMESTAMP_HEADER)
        .chain(columns.iter().map(String::as_str))
        .map(|h| escape(h, delimiter))
        .collect();
    writeln!(out, "{}", header.join(&sep))?;

    for row in rows {
        let mut cells = Vec::with_capacity(columns.len() + 1);
        cells.push(escape(&row.timestamp, delimiter));
        for i in 0..columns.len() {
            cells.push(
                row.values()
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writeln!(out, "{}", cells.join(&sep))?;
    }
    Ok(())
}

fn escape(cell: &str, delimiter: char) -> String {
    if cell.contains(delimiter) || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
