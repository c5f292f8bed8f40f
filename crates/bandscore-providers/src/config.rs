//! Configuration and the evaluator factory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use bandscore_core::engine::{Collaborators, Evaluator, ScoringConfig};
use bandscore_core::fluency::FluencyParams;
use bandscore_core::lexicon::{FrequencyLexicon, ZipfLexicon};
use bandscore_core::model::{Answer, Criterion};
use bandscore_core::pronunciation::PronunciationParams;
use bandscore_core::templates::TemplateCatalog;
use bandscore_core::traits::GrammarCorrector;

use crate::http::{HttpCollaborators, HttpCorrector};
use crate::openai::OpenAiCorrector;
use crate::recorded::{RecordedCollaborators, RECORDED_BACKEND};

/// Configuration for one grammar-correction backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// The inference server's `/correct` route.
    Http {
        #[serde(default)]
        base_url: String,
        #[serde(default)]
        model: Option<String>,
    },
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    /// Corrections recorded in the answer files.
    Recorded,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendConfig::Http { base_url, model } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            BackendConfig::OpenAI {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            BackendConfig::Recorded => f.write_str("Recorded"),
        }
    }
}

impl BackendConfig {
    /// Short type label for listings.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Http { .. } => "http",
            BackendConfig::OpenAI { .. } => "openai",
            BackendConfig::Recorded => "recorded",
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            BackendConfig::Http { model, .. } | BackendConfig::OpenAI { model, .. } => {
                model.as_deref()
            }
            BackendConfig::Recorded => None,
        }
    }
}

/// Where segmentation, tagging, CEFR, fill-mask and alignment come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CollaboratorConfig {
    Http {
        #[serde(default)]
        base_url: String,
        #[serde(default)]
        mask_token: Option<String>,
    },
    /// Replay the `recorded` sections of the answer files.
    #[default]
    Recorded,
}

/// Scorer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSection {
    #[serde(default = "default_long_pause")]
    pub long_pause_threshold: f64,
    #[serde(default = "default_under_duration")]
    pub under_duration_threshold: f64,
    #[serde(default = "default_top_k")]
    pub fill_mask_top_k: usize,
    /// Seed for feedback template selection. Omit for random feedback.
    #[serde(default)]
    pub template_seed: Option<u64>,
}

fn default_long_pause() -> f64 {
    FluencyParams::default().long_pause_threshold
}
fn default_under_duration() -> f64 {
    PronunciationParams::default().under_duration_threshold
}
fn default_top_k() -> usize {
    5
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            long_pause_threshold: default_long_pause(),
            under_duration_threshold: default_under_duration(),
            fill_mask_top_k: default_top_k(),
            template_seed: None,
        }
    }
}

/// Top-level bandscore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandscoreConfig {
    /// Active grammar corrector.
    #[serde(default = "default_backend")]
    pub grammar_backend: String,
    /// Model override passed to the active corrector.
    #[serde(default)]
    pub grammar_model: Option<String>,
    /// Max answers evaluated concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub collaborators: CollaboratorConfig,
    /// Grammar backends keyed by name.
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    #[serde(default)]
    pub scoring: ScoringSection,
    /// Frequency lexicon TSV (`word<TAB>zipf`). The built-in list is used
    /// when unset.
    #[serde(default)]
    pub lexicon: Option<PathBuf>,
    /// Feedback template catalog overlay (TOML).
    #[serde(default)]
    pub templates: Option<PathBuf>,
}

fn default_backend() -> String {
    RECORDED_BACKEND.to_string()
}
fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./bandscore-results")
}

impl Default for BandscoreConfig {
    fn default() -> Self {
        Self {
            grammar_backend: default_backend(),
            grammar_model: None,
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
            collaborators: CollaboratorConfig::default(),
            backends: HashMap::new(),
            scoring: ScoringSection::default(),
            lexicon: None,
            templates: None,
        }
    }
}

impl BandscoreConfig {
    /// The immutable per-call scoring configuration for `criteria`.
    pub fn scoring_config(&self, criteria: &[Criterion]) -> ScoringConfig {
        ScoringConfig {
            grammar_backend: self.grammar_backend.clone(),
            grammar_model: self.grammar_model.clone(),
            fluency: FluencyParams {
                long_pause_threshold: self.scoring.long_pause_threshold,
            },
            pronunciation: PronunciationParams {
                under_duration_threshold: self.scoring.under_duration_threshold,
            },
            fill_mask_top_k: self.scoring.fill_mask_top_k,
            criteria: criteria.to_vec(),
        }
    }

    /// The configured template catalog, or the built-in one.
    pub fn template_catalog(&self) -> Result<TemplateCatalog> {
        match &self.templates {
            Some(path) => TemplateCatalog::load(path),
            None => Ok(TemplateCatalog::builtin()),
        }
    }

    /// The configured frequency lexicon, or the built-in one.
    pub fn frequency_lexicon(&self) -> Result<ZipfLexicon> {
        match &self.lexicon {
            Some(path) => ZipfLexicon::load(path),
            None => {
                let lexicon = ZipfLexicon::builtin();
                tracing::warn!(
                    words = lexicon.len(),
                    "no lexicon configured; words outside the bundled list count as advanced"
                );
                Ok(lexicon)
            }
        }
    }

    /// Backend names in sorted order, with `recorded` always present.
    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        if !self.backends.contains_key(RECORDED_BACKEND) {
            names.push(RECORDED_BACKEND.to_string());
        }
        names.sort();
        names
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_backend_config(config: &BackendConfig) -> BackendConfig {
    match config {
        BackendConfig::Http { base_url, model } => BackendConfig::Http {
            base_url: resolve_env_vars(base_url),
            model: model.as_ref().map(|m| resolve_env_vars(m)),
        },
        BackendConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => BackendConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            model: model.as_ref().map(|m| resolve_env_vars(m)),
        },
        BackendConfig::Recorded => BackendConfig::Recorded,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `bandscore.toml` in the current directory
/// 2. `~/.config/bandscore/config.toml`
///
/// Environment variable override: `BANDSCORE_OPENAI_KEY` sets the key of
/// the `openai` backend, creating it if needed.
pub fn load_config() -> Result<BandscoreConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<BandscoreConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("bandscore.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<BandscoreConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => BandscoreConfig::default(),
    };

    if let Ok(key) = std::env::var("BANDSCORE_OPENAI_KEY") {
        let entry = config
            .backends
            .entry("openai".into())
            .or_insert(BackendConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                model: None,
            });
        if let BackendConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    config.backends = config
        .backends
        .iter()
        .map(|(k, v)| (k.clone(), resolve_backend_config(v)))
        .collect();
    if let CollaboratorConfig::Http { base_url, .. } = &mut config.collaborators {
        *base_url = resolve_env_vars(base_url);
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("bandscore"))
}

/// Create a grammar corrector from its configuration.
///
/// Recorded backends replay `recorded` and must be named `recorded`.
pub fn create_corrector(
    name: &str,
    config: &BackendConfig,
    recorded: &Arc<RecordedCollaborators>,
) -> Result<Arc<dyn GrammarCorrector>> {
    match config {
        BackendConfig::Http { base_url, model } => {
            Ok(Arc::new(HttpCorrector::new(name, base_url, model.clone())))
        }
        BackendConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("backend '{name}' has no API key (set BANDSCORE_OPENAI_KEY or api_key)");
            }
            Ok(Arc::new(OpenAiCorrector::new(
                name,
                api_key,
                base_url.clone(),
                model.clone(),
            )))
        }
        BackendConfig::Recorded => {
            if name != RECORDED_BACKEND {
                anyhow::bail!("recorded backend must be named '{RECORDED_BACKEND}', found '{name}'");
            }
            Ok(recorded.clone())
        }
    }
}

/// Build an evaluator from the configuration. `answers` supply the
/// recordings for offline collaborators and the `recorded` backend.
pub fn build_evaluator(config: &BandscoreConfig, answers: &[Answer]) -> Result<Evaluator> {
    let recorded = Arc::new(RecordedCollaborators::from_answers(answers));
    let lexicon: Arc<dyn FrequencyLexicon> = Arc::new(
        config
            .frequency_lexicon()
            .context("failed to load frequency lexicon")?,
    );

    let collaborators = match &config.collaborators {
        CollaboratorConfig::Http {
            base_url,
            mask_token,
        } => {
            let http = Arc::new(HttpCollaborators::new(base_url, mask_token.clone()));
            tracing::info!(base_url = http.base_url(), "using inference server");
            Collaborators {
                segmenter: http.clone(),
                tagger: http.clone(),
                cefr: http.clone(),
                fill_mask: http.clone(),
                aligner: http,
                lexicon,
            }
        }
        CollaboratorConfig::Recorded => {
            if recorded.is_empty() {
                tracing::warn!("no recorded collaborator outputs found in the answers");
            }
            Collaborators {
                segmenter: recorded.clone(),
                tagger: recorded.clone(),
                cefr: recorded.clone(),
                fill_mask: recorded.clone(),
                aligner: recorded.clone(),
                lexicon,
            }
        }
    };

    let mut evaluator = Evaluator::new(collaborators).with_corrector(recorded.clone());
    let sorted: BTreeMap<&String, &BackendConfig> = config.backends.iter().collect();
    for (name, backend) in sorted {
        let corrector = create_corrector(name, backend, &recorded)
            .with_context(|| format!("failed to create backend '{name}'"))?;
        evaluator = evaluator.with_corrector(corrector);
    }

    Ok(evaluator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_BANDSCORE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_BANDSCORE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_BANDSCORE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no ${closing"), "no ${closing");
        std::env::remove_var("_BANDSCORE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = BandscoreConfig::default();
        assert_eq!(config.grammar_backend, "recorded");
        assert_eq!(config.parallelism, 4);
        assert!(matches!(config.collaborators, CollaboratorConfig::Recorded));
        assert_eq!(config.scoring.fill_mask_top_k, 5);
        assert_eq!(config.backend_names(), vec!["recorded"]);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
grammar_backend = "coedit"
parallelism = 2

[collaborators]
type = "http"
base_url = "http://localhost:8000"

[backends.coedit]
type = "http"
base_url = "http://localhost:8000"
model = "grammarly/coedit-large"

[backends.gpt]
type = "openai"
api_key = "sk-test"
model = "gpt-4o-mini"

[scoring]
long_pause_threshold = 2.5
template_seed = 7
"#;
        let config: BandscoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends["coedit"].model(), Some("grammarly/coedit-large"));
        assert_eq!(config.backends["gpt"].kind(), "openai");
        assert_eq!(config.scoring.long_pause_threshold, 2.5);
        assert_eq!(config.scoring.under_duration_threshold, 0.06);
        assert_eq!(config.scoring.template_seed, Some(7));
        assert_eq!(config.backend_names(), vec!["coedit", "gpt", "recorded"]);

        let scoring = config.scoring_config(&[Criterion::Grammar]);
        assert_eq!(scoring.grammar_backend, "coedit");
        assert_eq!(scoring.fluency.long_pause_threshold, 2.5);
        assert_eq!(scoring.criteria, vec![Criterion::Grammar]);
    }

    #[test]
    fn frequency_lexicon_prefers_the_configured_file() {
        let config = BandscoreConfig::default();
        let builtin = config.frequency_lexicon().unwrap();
        assert!(builtin.zipf("coffee") >= 4.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zipf.tsv");
        std::fs::write(&path, "coffee\t4.9\nmeander\t2.6\n").unwrap();
        let config = BandscoreConfig {
            lexicon: Some(path),
            ..BandscoreConfig::default()
        };
        let loaded = config.frequency_lexicon().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.zipf("meander"), 2.6);
    }

    #[test]
    fn debug_masks_api_key() {
        let backend = BackendConfig::OpenAI {
            api_key: "sk-secret".into(),
            base_url: None,
            model: None,
        };
        let debug = format!("{backend:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn load_from_file_resolves_env_and_override() {
        std::env::set_var("_BANDSCORE_TEST_URL", "http://infer:9000");
        std::env::set_var("BANDSCORE_OPENAI_KEY", "sk-from-env");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bandscore.toml");
        std::fs::write(
            &path,
            r#"
[backends.coedit]
type = "http"
base_url = "${_BANDSCORE_TEST_URL}"
"#,
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        std::env::remove_var("_BANDSCORE_TEST_URL");
        std::env::remove_var("BANDSCORE_OPENAI_KEY");

        assert!(matches!(
            &config.backends["coedit"],
            BackendConfig::Http { base_url, .. } if base_url == "http://infer:9000"
        ));
        assert!(matches!(
            &config.backends["openai"],
            BackendConfig::OpenAI { api_key, .. } if api_key == "sk-from-env"
        ));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let err = load_config_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn factory_registers_backends() {
        let mut config = BandscoreConfig::default();
        config.backends.insert(
            "coedit".into(),
            BackendConfig::Http {
                base_url: "http://localhost:8000".into(),
                model: None,
            },
        );
        let evaluator = build_evaluator(&config, &[]).unwrap();
        assert_eq!(evaluator.backends(), vec!["coedit", "recorded"]);
    }

    #[test]
    fn factory_rejects_misnamed_recorded_backend() {
        let recorded = Arc::new(RecordedCollaborators::new());
        assert!(create_corrector("offline", &BackendConfig::Recorded, &recorded).is_err());
        let no_key = BackendConfig::OpenAI {
            api_key: String::new(),
            base_url: None,
            model: None,
        };
        assert!(create_corrector("gpt", &no_key, &recorded).is_err());
    }
}
