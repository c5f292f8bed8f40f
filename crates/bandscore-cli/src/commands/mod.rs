//! Subcommand implementations.

pub mod backends;
pub mod compare;
pub mod init;
pub mod score;
pub mod session;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use bandscore_core::model::Criterion;
use bandscore_core::parser::ValidationWarning;
use bandscore_core::results::EvaluationResult;
use bandscore_providers::config::load_config_from;
use bandscore_providers::BandscoreConfig;

/// Flags shared by `score` and `session`.
pub struct RunOptions {
    pub criteria: Option<String>,
    pub backend: Option<String>,
    pub model: Option<String>,
    pub format: String,
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
}

impl RunOptions {
    /// Load the config file and apply the command-line overrides.
    pub fn load_config(&self) -> Result<BandscoreConfig> {
        let mut config = load_config_from(self.config.as_deref())?;
        if let Some(backend) = &self.backend {
            config.grammar_backend = backend.clone();
        }
        if let Some(model) = &self.model {
            config.grammar_model = Some(model.clone());
        }
        if let Some(seed) = self.seed {
            config.scoring.template_seed = Some(seed);
        }
        Ok(config)
    }

    pub fn output_dir(&self, config: &BandscoreConfig) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| config.output_dir.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Html,
    Markdown,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
        }
    }
}

pub fn parse_formats(s: &str) -> Result<Vec<OutputFormat>> {
    if s.trim() == "all" {
        return Ok(vec![
            OutputFormat::Json,
            OutputFormat::Html,
            OutputFormat::Markdown,
        ]);
    }
    let mut formats = Vec::new();
    for part in s.split(',').map(str::trim) {
        let format = match part {
            "json" => OutputFormat::Json,
            "html" => OutputFormat::Html,
            "markdown" | "md" => OutputFormat::Markdown,
            other => anyhow::bail!("unknown format: '{other}' (expected json, html, markdown or all)"),
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}

/// Parse `--criteria`. `None` selects all four.
pub fn parse_criteria(s: Option<&str>) -> Result<Vec<Criterion>> {
    match s {
        None => Ok(Criterion::ALL.to_vec()),
        Some(list) => list
            .split(',')
            .map(|c| c.parse::<Criterion>().map_err(anyhow::Error::msg))
            .collect(),
    }
}

/// A file name stem safe on every platform.
pub fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn print_warnings(warnings: &[ValidationWarning]) {
    for w in warnings {
        let prefix = w
            .answer_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        eprintln!("{prefix} WARNING: {}", w.message);
    }
}

pub fn bands_table(results: &[EvaluationResult]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Criterion", "Band"]);
    for result in results {
        table.add_row(vec![
            Cell::new(result.criterion.title()),
            Cell::new(result.ielts_band.to_string()),
        ]);
    }
    table
}
