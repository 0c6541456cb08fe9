use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_settings;
use super::ConfigError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "credential",
    "access_key",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "tokens"];

/// Environment variables that override file configuration, with the
/// settings path they land on.
const ENV_OVERRIDES: [(&str, &[&str]); 14] = [
    ("HOST", &["server", "host"]),
    ("PORT", &["server", "port"]),
    ("EMBEDDING_PROVIDER", &["embedding", "provider"]),
    ("EMBEDDING_MODEL", &["embedding", "model"]),
    ("EMBEDDING_BASE_URL", &["embedding", "base_url"]),
    ("COMPLETION_PROVIDER", &["completion", "provider"]),
    ("COMPLETION_MODEL", &["completion", "model"]),
    ("COMPLETION_BASE_URL", &["completion", "base_url"]),
    ("VECTOR_INDEX", &["index", "kind"]),
    ("PINECONE_API_KEY", &["index", "api_key"]),
    ("PINECONE_INDEX_HOST", &["index", "host"]),
    ("PINECONE_NAMESPACE", &["index", "namespace"]),
    ("RAG_TOP_K", &["retrieval", "top_k"]),
    ("RAG_MIN_SCORE", &["retrieval", "min_score"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("SUPPORT_RAG_CONFIG") {
            return PathBuf::from(path);
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.project_root.join("secrets.yaml")
    }

    /// Loads, merges, overrides and validates the process settings.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        self.load_with_env(|key| env::var(key).ok())
    }

    pub fn load_with_env<F>(&self, lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, &lookup)?;

        let mut settings: Settings =
            serde_json::from_value(merged).map_err(|e| ConfigError::Parse(e.to_string()))?;
        resolve_credentials(&mut settings, &lookup);
        if settings.index.sqlite_path.is_none() {
            settings.index.sqlite_path = Some(self.paths.default_index_path());
        }

        validate_settings(&settings)?;
        Ok(settings)
    }
}

/// Serializes settings for logging with every secret replaced.
pub fn redacted(settings: &Settings) -> Value {
    let value = serde_json::to_value(settings).unwrap_or(Value::Null);
    redact_sensitive_values(&value)
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let value = serde_yaml::from_str::<Value>(&contents)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Parse(format!(
            "{}: top level must be a mapping",
            path.display()
        ))),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for &(var, path) in ENV_OVERRIDES.iter() {
        let Some(raw) = lookup(var) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        ensure_object_path(config, path, env_value(var, raw)?);
    }
    Ok(())
}

fn env_value(var: &str, raw: &str) -> Result<Value, ConfigError> {
    match var {
        "PORT" | "RAG_TOP_K" => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| ConfigError::invalid(var, format!("expected an integer, got {:?}", raw))),
        "RAG_MIN_SCORE" => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| ConfigError::invalid(var, format!("expected a number, got {:?}", raw))),
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Applies the provider's conventional key variable (`GEMINI_API_KEY`,
/// `OPENAI_API_KEY`) over whatever the files set, like the other
/// environment overrides.
fn resolve_credentials<F>(settings: &mut Settings, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let key_from_env = |var: &str| {
        lookup(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    if let Some(key) = key_from_env(settings.embedding.provider.api_key_env()) {
        settings.embedding.api_key = Some(key);
    }
    if let Some(key) = key_from_env(settings.completion.provider.api_key_env()) {
        settings.completion.api_key = Some(key);
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
