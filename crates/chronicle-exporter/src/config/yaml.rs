// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! YAML file-based configuration.
//!
//! # Example Configuration
//!
//! ```yaml
//! customer_id: 12345678-1234-1234-1234-123456789012
//! log_type: WINEVTLOG
//! namespace: prod
//! raw_log_field: body
//! ingestion_labels:
//!   env: prod
//! protocol: https
//! location: us
//! project: my-project
//! forwarder: my-forwarder
//! compression: gzip
//! batch_log_count_limit_http: 500
//! ```
//!
//! Keys that are absent keep the value of earlier sources.

use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::Deserialize;

use crate::config::{
    deserialize_option_lossless, deserialize_optional_bool, deserialize_optional_string,
    log_level::LogLevel, Compression, Config, ConfigError, ConfigSource, Protocol,
};
use crate::{merge_map, merge_option, merge_option_to_value, merge_string};

/// Partial configuration as read from YAML.
#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
pub struct YamlConfig {
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub customer_id: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub namespace: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub log_type: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub raw_log_field: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_bool")]
    pub override_log_type: Option<bool>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub ingestion_labels: Option<BTreeMap<String, String>>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub protocol: Option<Protocol>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub endpoint: Option<String>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub compression: Option<Compression>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub location: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub project: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub forwarder: Option<String>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub batch_log_count_limit_grpc: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub batch_request_size_limit_grpc: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub batch_log_count_limit_http: Option<usize>,
    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub batch_request_size_limit_http: Option<usize>,

    #[serde(deserialize_with = "deserialize_option_lossless")]
    pub timeout: Option<u64>,
    pub proxy: ProxyConfig,
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProxyConfig {
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub https: Option<String>,
}

fn merge_config(config: &mut Config, yaml_config: &YamlConfig) {
    // Extraction
    merge_string!(config, yaml_config, customer_id);
    merge_string!(config, yaml_config, namespace);
    merge_string!(config, yaml_config, log_type);
    merge_string!(config, yaml_config, raw_log_field);
    merge_option_to_value!(config, yaml_config, override_log_type);
    merge_map!(config, yaml_config, ingestion_labels);

    // Transport
    merge_option_to_value!(config, yaml_config, protocol);
    merge_string!(config, yaml_config, endpoint);
    merge_option_to_value!(config, yaml_config, compression);
    merge_string!(config, yaml_config, location);
    merge_string!(config, yaml_config, project);
    merge_string!(config, yaml_config, forwarder);
    merge_option_to_value!(config, yaml_config, timeout);
    merge_option!(config, proxy_https, yaml_config.proxy, https);

    // Limits
    merge_option_to_value!(config, yaml_config, batch_log_count_limit_grpc);
    merge_option_to_value!(config, yaml_config, batch_request_size_limit_grpc);
    merge_option_to_value!(config, yaml_config, batch_log_count_limit_http);
    merge_option_to_value!(config, yaml_config, batch_request_size_limit_http);

    merge_option_to_value!(config, yaml_config, log_level);
}

#[derive(Debug, PartialEq, Clone)]
pub struct YamlConfigSource {
    pub path: PathBuf,
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Yaml::file(self.path.clone()));

        match figment.extract::<YamlConfig>() {
            Ok(yaml_config) => merge_config(config, &yaml_config),
            Err(e) => {
                return Err(ConfigError::Parse(format!(
                    "Failed to parse config from yaml file: {e}, using default config."
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn load(jail: &figment::Jail) -> Config {
        let mut config = Config::default();
        YamlConfigSource {
            path: jail.directory().join("chronicle.yaml"),
        }
        .load(&mut config)
        .unwrap();
        config
    }

    #[test]
    fn test_merge_config_overrides_with_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "chronicle.yaml",
                r#"
customer_id: "12345678-1234-1234-1234-123456789012"
namespace: "prod"
log_type: "WINEVTLOG"
raw_log_field: 'attributes["message"]'
override_log_type: false
ingestion_labels:
  env: "prod"
  team: "secops"
protocol: "https"
endpoint: "europe-malachiteingestion-pa.googleapis.com"
compression: "gzip"
location: "europe"
project: "my-project"
forwarder: "my-forwarder"
batch_log_count_limit_grpc: 10
batch_request_size_limit_grpc: 2048
batch_log_count_limit_http: 20
batch_request_size_limit_http: 4096
timeout: 30
proxy:
  https: "https://proxy.example.com"
log_level: "debug"
"#,
            )?;

            let config = load(jail);
            let expected = Config {
                customer_id: "12345678-1234-1234-1234-123456789012".to_string(),
                namespace: "prod".to_string(),
                log_type: "WINEVTLOG".to_string(),
                raw_log_field: "attributes[\"message\"]".to_string(),
                override_log_type: false,
                ingestion_labels: BTreeMap::from([
                    ("env".to_string(), "prod".to_string()),
                    ("team".to_string(), "secops".to_string()),
                ]),
                protocol: Protocol::Https,
                endpoint: "europe-malachiteingestion-pa.googleapis.com".to_string(),
                compression: Compression::Gzip,
                location: "europe".to_string(),
                project: "my-project".to_string(),
                forwarder: "my-forwarder".to_string(),
                batch_log_count_limit_grpc: 10,
                batch_request_size_limit_grpc: 2048,
                batch_log_count_limit_http: 20,
                batch_request_size_limit_http: 4096,
                timeout: 30,
                proxy_https: Some("https://proxy.example.com".to_string()),
                log_level: LogLevel::Debug,
            };
            assert_eq!(config, expected);
            Ok(())
        });
    }

    #[test]
    fn test_absent_keys_keep_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("chronicle.yaml", "log_type: \"PAN_FIREWALL\"\n")?;

            let config = load(jail);
            assert_eq!(config.log_type, "PAN_FIREWALL");
            assert_eq!(config.endpoint, Config::default().endpoint);
            assert!(config.override_log_type);
            Ok(())
        });
    }

    #[test]
    fn test_wrong_types_are_ignored() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "chronicle.yaml",
                r"
namespace: [1, 2]
protocol: carrier-pigeon
batch_log_count_limit_grpc: lots
log_level: loud
",
            )?;

            let config = load(jail);
            assert_eq!(config.namespace, "");
            assert_eq!(config.protocol, Protocol::Grpc);
            assert_eq!(config.batch_log_count_limit_grpc, 1000);
            assert_eq!(config.log_level, LogLevel::Warn);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("chronicle.yaml", "customer_id: [unclosed\n")?;

            let mut config = Config::default();
            let result = YamlConfigSource {
                path: jail.directory().join("chronicle.yaml"),
            }
            .load(&mut config);
            assert!(matches!(result, Err(ConfigError::Parse(_))));
            assert_eq!(config, Config::default());
            Ok(())
        });
    }
}
