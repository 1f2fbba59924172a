// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `CHRONICLE_*` environment variables.
//!
//! Each variable is the upper-cased config key with the `CHRONICLE_` prefix,
//! e.g. `CHRONICLE_CUSTOMER_ID` or `CHRONICLE_BATCH_LOG_COUNT_LIMIT_HTTP`.
//! `CHRONICLE_INGESTION_LABELS` takes a figment dictionary: `{env=prod,team=secops}`.

use std::collections::BTreeMap;

use figment::{providers::Env, Figment};
use serde::Deserialize;

use crate::config::{
    deserialize_option_lossless, deserialize_optional_bool, deserialize_optional_string,
    log_level::LogLevel, Compression, Config, ConfigError, ConfigSource, Protocol,
};
use crate::{merge_map, merge_option, merge_option_to_value, merge_string};

#[derive(Debug, PartialEq, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EnvConfig {
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
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub proxy_https: Option<String>,
    pub log_level: Option<LogLevel>,
}

fn merge_config(config: &mut Config, env_config: &EnvConfig) {
    merge_string!(config, env_config, customer_id);
    merge_string!(config, env_config, namespace);
    merge_string!(config, env_config, log_type);
    merge_string!(config, env_config, raw_log_field);
    merge_option_to_value!(config, env_config, override_log_type);
    merge_map!(config, env_config, ingestion_labels);

    merge_option_to_value!(config, env_config, protocol);
    merge_string!(config, env_config, endpoint);
    merge_option_to_value!(config, env_config, compression);
    merge_string!(config, env_config, location);
    merge_string!(config, env_config, project);
    merge_string!(config, env_config, forwarder);
    merge_option_to_value!(config, env_config, timeout);
    merge_option!(config, env_config, proxy_https);

    merge_option_to_value!(config, env_config, batch_log_count_limit_grpc);
    merge_option_to_value!(config, env_config, batch_request_size_limit_grpc);
    merge_option_to_value!(config, env_config, batch_log_count_limit_http);
    merge_option_to_value!(config, env_config, batch_request_size_limit_http);

    merge_option_to_value!(config, env_config, log_level);
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut Config) -> Result<(), ConfigError> {
        let figment = Figment::new().merge(Env::prefixed("CHRONICLE_"));

        match figment.extract::<EnvConfig>() {
            Ok(env_config) => merge_config(config, &env_config),
            Err(e) => {
                return Err(ConfigError::Parse(format!(
                    "Failed to parse config from environment variables: {e}, using default config."
                )));
            }
        }

        Ok(())
    }
}
