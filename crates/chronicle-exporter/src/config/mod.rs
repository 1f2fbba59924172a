// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration Module
//!
//! Exporter settings, loaded from defaults, a YAML file and `CHRONICLE_*`
//! environment variables.
//!
//! ## Configuration Priority
//!
//! Sources are applied in the following order (later sources override earlier):
//!
//! 1. **Defaults** - Hard-coded defaults in the code
//! 2. **YAML file** - `chronicle.yaml` (if present)
//! 3. **Environment variables** - `CHRONICLE_*` variables (highest priority)
//!
//! ## Edge Cases and Behaviors
//!
//! - A value of the wrong type in a source is logged and ignored; the previous
//!   value is kept.
//! - `ingestion_labels` from a later source replaces the whole map.
//! - `HTTPS_PROXY` is used when `proxy_https` is not set.
//! - Nothing is validated while loading. [`Config::validate`] runs when an exporter
//!   is built.

pub mod env;
pub mod log_level;
pub mod yaml;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{env::EnvConfigSource, log_level::LogLevel, yaml::YamlConfigSource};
use crate::logs::constants::{
    DEFAULT_GRPC_MAX_ENTRY_COUNT, DEFAULT_GRPC_MAX_REQUEST_SIZE_BYTES,
    DEFAULT_HTTP_MAX_ENTRY_COUNT, DEFAULT_HTTP_MAX_REQUEST_SIZE_BYTES,
};
use crate::logs::enforcer::BatchLimits;
use crate::logs::extractor::ExtractorSettings;
use crate::logs::field::FieldExpr;

pub const DEFAULT_ENDPOINT: &str = "malachiteingestion-pa.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const CONFIG_FILE_NAME: &str = "chronicle.yaml";

/// Copies `source.field` into the `String` field of the same name when present.
#[macro_export]
macro_rules! merge_string {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = &$source.$field {
            $config.$field.clone_from(value);
        }
    };
}

/// Replaces an `Option` field when the source holds a value. The four argument
/// form reads from a differently named (or nested) source field.
#[macro_export]
macro_rules! merge_option {
    ($config:expr, $config_field:ident, $source:expr, $source_field:ident) => {
        if $source.$source_field.is_some() {
            $config.$config_field.clone_from(&$source.$source_field);
        }
    };
    ($config:expr, $source:expr, $field:ident) => {
        $crate::merge_option!($config, $field, $source, $field)
    };
}

/// Unwraps `source.field` into a plain field when present.
#[macro_export]
macro_rules! merge_option_to_value {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = $source.$field.clone() {
            $config.$field = value;
        }
    };
}

/// Replaces a map field with a present, non-empty source map. Maps are not
/// merged key by key.
#[macro_export]
macro_rules! merge_map {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(value) = &$source.$field {
            if !value.is_empty() {
                $config.$field.clone_from(value);
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
}

pub trait ConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError>;
}

/// Ingestion API used to upload batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Grpc,
    Https,
}

/// Request body compression, for both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Chronicle customer id, a UUID.
    pub customer_id: String,
    pub namespace: String,
    /// Log type used when a record does not name its own.
    pub log_type: String,
    /// Expression selecting the raw payload; empty sends the whole record.
    pub raw_log_field: String,
    pub override_log_type: bool,
    pub ingestion_labels: BTreeMap<String, String>,

    pub protocol: Protocol,
    /// Host name only, without scheme.
    pub endpoint: String,
    pub compression: Compression,
    pub location: String,
    pub project: String,
    pub forwarder: String,

    pub batch_log_count_limit_grpc: usize,
    pub batch_request_size_limit_grpc: usize,
    pub batch_log_count_limit_http: usize,
    pub batch_request_size_limit_http: usize,

    /// Request timeout in seconds.
    pub timeout: u64,
    pub proxy_https: Option<String>,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            customer_id: String::new(),
            namespace: String::new(),
            log_type: String::new(),
            raw_log_field: String::new(),
            override_log_type: true,
            ingestion_labels: BTreeMap::new(),
            protocol: Protocol::Grpc,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            compression: Compression::None,
            location: String::new(),
            project: String::new(),
            forwarder: String::new(),
            batch_log_count_limit_grpc: DEFAULT_GRPC_MAX_ENTRY_COUNT,
            batch_request_size_limit_grpc: DEFAULT_GRPC_MAX_REQUEST_SIZE_BYTES,
            batch_log_count_limit_http: DEFAULT_HTTP_MAX_ENTRY_COUNT,
            batch_request_size_limit_http: DEFAULT_HTTP_MAX_REQUEST_SIZE_BYTES,
            timeout: DEFAULT_TIMEOUT_SECS,
            proxy_https: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            raw_log_field: self.raw_log_field.clone(),
            log_type: self.log_type.clone(),
            namespace: self.namespace.clone(),
            override_log_type: self.override_log_type,
            ingestion_labels: self.ingestion_labels.clone(),
        }
    }

    /// Limits of the configured protocol.
    #[must_use]
    pub fn batch_limits(&self) -> BatchLimits {
        match self.protocol {
            Protocol::Grpc => BatchLimits::new(
                self.batch_request_size_limit_grpc,
                self.batch_log_count_limit_grpc,
            ),
            Protocol::Https => BatchLimits::new(
                self.batch_request_size_limit_http,
                self.batch_log_count_limit_http,
            ),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "endpoint should not contain a protocol: {}",
                self.endpoint
            )));
        }

        if !self.raw_log_field.is_empty() {
            self.raw_log_field
                .parse::<FieldExpr>()
                .map_err(|e| ConfigError::Invalid(format!("raw_log_field is invalid: {e}")))?;
        }

        match self.protocol {
            Protocol::Grpc => {
                check_positive("batch_request_size_limit_grpc", self.batch_request_size_limit_grpc)?;
                check_positive("batch_log_count_limit_grpc", self.batch_log_count_limit_grpc)?;
            }
            Protocol::Https => {
                for (name, value) in [
                    ("location", &self.location),
                    ("project", &self.project),
                    ("forwarder", &self.forwarder),
                ] {
                    if value.is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "{name} is required when protocol is https"
                        )));
                    }
                }
                check_positive("batch_request_size_limit_http", self.batch_request_size_limit_http)?;
                check_positive("batch_log_count_limit_http", self.batch_log_count_limit_http)?;
            }
        }

        Ok(())
    }
}

fn check_positive(name: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be positive")));
    }
    Ok(())
}

#[derive(Default)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config: Config,
}

impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn build(&mut self) -> Config {
        let mut failed_sources = 0;
        for source in &self.sources {
            match source.load(&mut self.config) {
                Ok(()) => (),
                Err(e) => {
                    error!("CHRONICLE | Failed to load config: {e}");
                    failed_sources += 1;
                }
            }
        }

        if !self.sources.is_empty() && failed_sources == self.sources.len() {
            debug!("CHRONICLE | All sources failed to load config, using default config.");
        }

        if self.config.endpoint.is_empty() {
            self.config.endpoint = DEFAULT_ENDPOINT.to_string();
        }

        if self.config.proxy_https.is_none() {
            if let Ok(https_proxy) = std::env::var("HTTPS_PROXY") {
                self.config.proxy_https = Some(https_proxy);
            }
        }

        self.config.clone()
    }
}

/// Loads `chronicle.yaml` from `config_directory`, then the environment.
#[must_use]
pub fn get_config(config_directory: &Path) -> Config {
    let path = config_directory.join(CONFIG_FILE_NAME);
    ConfigBuilder::default()
        .add_source(Box::new(YamlConfigSource { path }))
        .add_source(Box::new(EnvConfigSource))
        .build()
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        other => {
            error!(
                "Failed to parse value, expected a string, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}

pub fn deserialize_option_lossless<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Option::<T>::deserialize(deserializer) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("Failed to deserialize optional value: {}, ignoring", e);
            Ok(None)
        }
    }
}

/// Accepts booleans and their usual string spellings.
pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(Some(b)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => {
                error!("Failed to parse bool value: {}, ignoring", s);
                Ok(None)
            }
        },
        Value::Null => Ok(None),
        other => {
            error!("Failed to parse bool value: {}, ignoring", other);
            Ok(None)
        }
    }
}
