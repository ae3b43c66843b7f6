//! Document translation for plain text, JSON and CSV files.
//!
//! Each format is split into units, the units go through one batch run, and
//! the document is rebuilt around the results. Units that fail keep their
//! original text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::{BatchOptions, BatchOutcome, BatchStats};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::language::LanguageCode;
use crate::planner::RouteKind;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Txt,
    Json,
    Csv,
}

impl FileFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        extension.parse()
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Options for one file translation
#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Forced format; detected from the extension when `None`
    pub format: Option<FileFormat>,
    /// txt: translate line by line, keeping blank lines
    pub preserve_formatting: bool,
    /// json: only translate values under these keys
    pub fields: Option<Vec<String>>,
    /// csv: only translate these columns
    pub columns: Option<Vec<String>>,
    pub batch: BatchOptions,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            format: None,
            preserve_formatting: true,
            fields: None,
            columns: None,
            batch: BatchOptions::default(),
        }
    }
}

/// Summary of one file translation
#[derive(Debug, Clone, Serialize)]
pub struct FileStats {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: FileFormat,
    pub source: LanguageCode,
    pub target: LanguageCode,
    pub route: RouteKind,
    /// Units sent for translation
    pub units: usize,
    /// Input length in chars
    pub original_length: usize,
    /// Output length in chars
    pub translated_length: usize,
    pub batch: BatchStats,
}

/// `<stem>_translated_<target><ext>` next to the input
pub fn default_output_path(input: &Path, target: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let extension = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    input.with_file_name(format!("{stem}_translated_{target}{extension}"))
}

/// Translates whole documents through an [`Engine`]
#[derive(Debug, Clone)]
pub struct FileTranslator {
    engine: Arc<Engine>,
}

impl FileTranslator {
    pub const fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub const fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Translate `input` into `output` (or the default output path).
    ///
    /// Unknown languages and unroutable pairs fail before anything is read.
    pub async fn translate_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        source: &str,
        target: &str,
        options: &FileOptions,
    ) -> Result<FileStats> {
        let format = match options.format {
            Some(format) => format,
            None => FileFormat::from_path(input)?,
        };
        let plan = self.engine.plan(source, target)?;
        let output = output.map_or_else(
            || default_output_path(input, plan.target().as_str()),
            Path::to_path_buf,
        );

        info!("Translating {} file {} ({})", format, input.display(), plan);
        let content = tokio::fs::read_to_string(input).await?;

        let (translated, units, batch) = match format {
            FileFormat::Txt => self.translate_text(&content, source, target, options).await?,
            FileFormat::Json => self.translate_json(&content, source, target, options).await?,
            FileFormat::Csv => self.translate_csv(&content, source, target, options).await?,
        };

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&output, &translated).await?;

        info!(
            "Wrote {} ({} units, {} failed)",
            output.display(),
            units,
            batch.failed
        );

        Ok(FileStats {
            input: input.to_path_buf(),
            output,
            format,
            source: plan.source().clone(),
            target: plan.target().clone(),
            route: plan.kind(),
            units,
            original_length: content.chars().count(),
            translated_length: translated.chars().count(),
            batch,
        })
    }

    async fn translate_units(
        &self,
        units: &[String],
        source: &str,
        target: &str,
        options: &FileOptions,
    ) -> Result<BatchOutcome> {
        self.engine
            .translate_batch_with(units, source, target, &options.batch)
            .await
    }

    async fn translate_text(
        &self,
        content: &str,
        source: &str,
        target: &str,
        options: &FileOptions,
    ) -> Result<(String, usize, BatchStats)> {
        if !options.preserve_formatting {
            let units = vec![content.to_string()];
            let outcome = self.translate_units(&units, source, target, options).await?;
            let translated = merge(units, outcome.results).pop().unwrap_or_default();
            return Ok((translated, 1, outcome.stats));
        }

        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        let positions: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, _)| i)
            .collect();
        let units: Vec<String> = positions.iter().map(|&i| lines[i].clone()).collect();

        let outcome = self.translate_units(&units, source, target, options).await?;
        let count = units.len();
        for (position, text) in positions.into_iter().zip(merge(units, outcome.results)) {
            lines[position] = text;
        }

        Ok((lines.join("\n"), count, outcome.stats))
    }

    async fn translate_json(
        &self,
        content: &str,
        source: &str,
        target: &str,
        options: &FileOptions,
    ) -> Result<(String, usize, BatchStats)> {
        let mut document: Value = serde_json::from_str(content)?;
        let fields = options.fields.as_deref();

        let mut units = Vec::new();
        visit_strings(&mut document, None, fields, &mut |s| units.push(s.clone()));

        let outcome = self.translate_units(&units, source, target, options).await?;
        let count = units.len();
        let mut translated = merge(units, outcome.results).into_iter();
        visit_strings(&mut document, None, fields, &mut |s| {
            if let Some(text) = translated.next() {
                *s = text;
            }
        });

        let mut output = serde_json::to_string_pretty(&document)?;
        output.push('\n');
        Ok((output, count, outcome.stats))
    }

    async fn translate_csv(
        &self,
        content: &str,
        source: &str,
        target: &str,
        options: &FileOptions,
    ) -> Result<(String, usize, BatchStats)> {
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers = reader.headers()?.clone();

        let selected: Vec<usize> = match &options.columns {
            None => (0..headers.len()).collect(),
            Some(columns) => {
                for missing in columns.iter().filter(|c| !headers.iter().any(|h| h == c.as_str())) {
                    warn!("Column '{}' not found in CSV header", missing);
                }
                headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| columns.iter().any(|c| c == *h))
                    .map(|(i, _)| i)
                    .collect()
            }
        };

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        let mut cells = Vec::new();
        let mut units = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for &c in &selected {
                if let Some(cell) = row.get(c)
                    && !cell.trim().is_empty()
                {
                    cells.push((r, c));
                    units.push(cell.clone());
                }
            }
        }

        let outcome = self.translate_units(&units, source, target, options).await?;
        let count = units.len();
        for ((r, c), text) in cells.into_iter().zip(merge(units, outcome.results)) {
            rows[r][c] = text;
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;

        Ok((String::from_utf8_lossy(&bytes).into_owned(), count, outcome.stats))
    }
}

/// Translated text where the unit succeeded, original text otherwise
fn merge(units: Vec<String>, results: Vec<crate::executor::TranslationResult>) -> Vec<String> {
    units
        .into_iter()
        .zip(results)
        .map(|(original, result)| if result.succeeded { result.text } else { original })
        .collect()
}

/// Visit every non-blank string selected by `fields`, in document order.
///
/// A string inside an array is selected by the key that holds the array.
/// Top-level strings have no key and are only selected without a filter.
fn visit_strings(
    value: &mut Value,
    key: Option<&str>,
    fields: Option<&[String]>,
    visit: &mut impl FnMut(&mut String),
) {
    match value {
        Value::String(s) => {
            let selected = fields.is_none_or(|fields| key.is_some_and(|k| fields.iter().any(|f| f == k)));
            if selected && !s.trim().is_empty() {
                visit(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_strings(item, key, fields, visit);
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                visit_strings(v, Some(k.as_str()), fields, visit);
            }
        }
        _ => {}
    }
}
