//! Server configuration.
//!
//! Settings are layered: defaults, then an optional JSON config file, then
//! environment variables. The binary applies command-line flags last.
//!
//! Environment variables:
//! - `PLAYGROUND_PORT` - HTTP port (default: 5000)
//! - `PLAYGROUND_GRAPH` - path to the concept graph JSON document
//! - `PLAYGROUND_DB` - path to the SQLite database file
//! - `PLAYGROUND_CORS_ORIGINS` - allowed origins, comma-separated
//! - `PLAYGROUND_QUESTIONS` - path to a static concept → question JSON file
//! - `PLAYGROUND_MATERIALS_DIR` - directory of `<concept>.txt` learning material
//! - `PLAYGROUND_QUESTION_CONCURRENCY` - question lookups in flight per session start
//! - `GEMINI_API_KEY` / `GEMINI_MODEL` - enable the generative question source

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::diagnostic::DEFAULT_QUESTION_CONCURRENCY;
use crate::questions::{GeminiQuestions, MaterialLibrary, QuestionSource, StaticQuestions};

const APP_NAME: &str = "prereq-playground";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRAPH: &str = "data/concept_graph.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub graph_path: PathBuf,
    /// SQLite file. Falls back to the platform data directory when unset.
    pub database_path: Option<PathBuf>,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub question_concurrency: usize,
    pub questions: QuestionConfig,
}

/// Which question source backs the diagnostic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionConfig {
    /// Static concept → question JSON file. Takes precedence over Gemini.
    pub static_path: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
    pub materials_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            graph_path: PathBuf::from(DEFAULT_GRAPH),
            database_path: None,
            cors_origins: Vec::new(),
            question_concurrency: DEFAULT_QUESTION_CONCURRENCY,
            questions: QuestionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path` (or the user config directory when `None`), then apply
    /// environment overrides. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PLAYGROUND_PORT").and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        if let Some(graph) = var("PLAYGROUND_GRAPH") {
            self.graph_path = PathBuf::from(graph);
        }
        if let Some(db) = var("PLAYGROUND_DB") {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(origins) = var("PLAYGROUND_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(limit) = var("PLAYGROUND_QUESTION_CONCURRENCY").and_then(|s| s.parse().ok()) {
            self.question_concurrency = limit;
        }
        if let Some(path) = var("PLAYGROUND_QUESTIONS") {
            self.questions.static_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = var("PLAYGROUND_MATERIALS_DIR") {
            self.questions.materials_dir = Some(PathBuf::from(dir));
        }
        if let Some(key) = var("GEMINI_API_KEY") {
            self.questions.gemini_api_key = Some(key);
        }
        if let Some(model) = var("GEMINI_MODEL") {
            self.questions.gemini_model = Some(model);
        }
    }
}

impl QuestionConfig {
    /// Build the configured question source.
    ///
    /// A static file wins over Gemini. With neither configured, the source is
    /// empty and every diagnostic completes immediately.
    pub fn build(&self) -> Result<Arc<dyn QuestionSource>> {
        if let Some(path) = &self.static_path {
            let source = StaticQuestions::load(path)
                .with_context(|| format!("Failed to load questions from {}", path.display()))?;
            tracing::info!("Loaded {} static questions", source.len());
            return Ok(Arc::new(source));
        }

        if let Some(key) = &self.gemini_api_key {
            let materials = MaterialLibrary::new(
                self.materials_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("materials")),
            );
            let materials_root = materials.root().display().to_string();
            let source = GeminiQuestions::new(
                key.clone(),
                self.gemini_model.clone(),
                self.gemini_base_url.clone(),
                materials,
            )?;
            tracing::info!(
                "Using Gemini question source ({}) with materials from {}",
                source.model(),
                materials_root
            );
            return Ok(Arc::new(source));
        }

        tracing::warn!("No question source configured; diagnostics will have no questions");
        Ok(Arc::new(StaticQuestions::default()))
    }
}

fn default_config_path() -> Option<PathBuf> {
    let mut path = config_dir()?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Some(path)
}
