// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `reqwest` client used by the HTTPS uploader.
//!
//! The client honours the configured upload timeout and, when set, an HTTPS
//! proxy. An unusable proxy setting does not stop the exporter: the client is
//! rebuilt without it and the problem is logged.

use core::time::Duration;
use std::error::Error;

use tracing::error;

use crate::config::Config;

/// Builds the client for HTTPS uploads, falling back to a direct connection and
/// then to `reqwest` defaults when the configured one cannot be built.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "CHRONICLE | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "CHRONICLE | Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(proxy) = &config.proxy_https {
            client = client.proxy(reqwest::Proxy::https(proxy)?);
        }
    }

    Ok(client.build()?)
}
