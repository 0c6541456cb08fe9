use super::settings::{IndexKind, Settings};
use super::ConfigError;

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.server.port == 0 {
        return Err(ConfigError::invalid("server.port", "must be nonzero"));
    }

    validate_non_empty("embedding.model", &settings.embedding.model)?;
    validate_non_empty("completion.model", &settings.completion.model)?;
    validate_range("embedding.timeout_secs", settings.embedding.timeout_secs, 1, 600)?;
    validate_range("completion.timeout_secs", settings.completion.timeout_secs, 1, 600)?;
    validate_range("index.timeout_secs", settings.index.timeout_secs, 1, 600)?;
    if let Some(dims) = settings.embedding.dimensions {
        validate_range("embedding.dimensions", dims as u64, 1, 65_536)?;
    }

    let embedding = &settings.embedding;
    if embedding
        .provider
        .requires_api_key(embedding.base_url.as_deref())
    {
        validate_present("embedding.api_key", embedding.api_key.as_deref())?;
    }
    let completion = &settings.completion;
    if completion
        .provider
        .requires_api_key(completion.base_url.as_deref())
    {
        validate_present("completion.api_key", completion.api_key.as_deref())?;
    }

    if settings.index.kind == IndexKind::Pinecone {
        validate_present("index.api_key", settings.index.api_key.as_deref())?;
        let host = validate_present("index.host", settings.index.host.as_deref())?;
        validate_http_url("index.host", host)?;
    }
    for (field, url) in [
        ("embedding.base_url", embedding.base_url.as_deref()),
        ("completion.base_url", completion.base_url.as_deref()),
    ] {
        if let Some(url) = url {
            validate_http_url(field, url)?;
        }
    }

    validate_range("retrieval.top_k", settings.retrieval.top_k as u64, 1, 100)?;
    let min_score = settings.retrieval.min_score;
    if !(0.0..=1.0).contains(&min_score) {
        return Err(ConfigError::invalid(
            "retrieval.min_score",
            format!("must be between 0 and 1, got {}", min_score),
        ));
    }

    let ingest = &settings.ingest;
    validate_range("ingest.batch_size", ingest.batch_size as u64, 1, 1000)?;
    validate_range("ingest.min_chunk_size", ingest.min_chunk_size as u64, 1, 10_000)?;
    validate_range("ingest.max_chunk_size", ingest.max_chunk_size as u64, 2, 100_000)?;
    validate_range("ingest.max_retries", ingest.max_retries as u64, 0, 10)?;
    if ingest.max_chunk_size < ingest.min_chunk_size * 2 {
        return Err(ConfigError::invalid(
            "ingest.max_chunk_size",
            format!(
                "must be at least twice ingest.min_chunk_size ({})",
                ingest.min_chunk_size
            ),
        ));
    }
    if let Some(rpm) = ingest.requests_per_minute {
        validate_range("ingest.requests_per_minute", rpm as u64, 1, 100_000)?;
    }

    Ok(())
}

fn validate_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn validate_present<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::invalid(field, "is required")),
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be an http(s) URL"))
    }
}

fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::invalid(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(())
}
