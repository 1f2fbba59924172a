// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion API limits and the reserved record keys that drive routing.
//!
//! # API Constraints
//!
//! Both ingestion APIs reject requests above a protocol-specific size and
//! entry count. The defaults below are what the services accept out of the box;
//! the exporter configuration can lower them.

/// Default maximum encoded size of one gRPC request in bytes.
///
/// # Value: 1MB (1,048,576 bytes)
pub const DEFAULT_GRPC_MAX_REQUEST_SIZE_BYTES: usize = 1_024 * 1_024;

/// Default maximum number of log entries in one gRPC request.
pub const DEFAULT_GRPC_MAX_ENTRY_COUNT: usize = 1000;

/// Default maximum encoded size of one HTTPS import request in bytes.
///
/// # Value: 5MB (5,242,880 bytes)
pub const DEFAULT_HTTP_MAX_REQUEST_SIZE_BYTES: usize = 5 * 1_024 * 1_024;

/// Default maximum number of logs in one HTTPS import request.
pub const DEFAULT_HTTP_MAX_ENTRY_COUNT: usize = 1000;

/// Record attribute holding a log type that is used verbatim.
pub const LOG_TYPE_OVERRIDE_KEY: &str = "chronicle_log_type";

/// Record attribute holding a generic log type that is mapped through
/// [`known_log_type`].
pub const GENERIC_LOG_TYPE_KEY: &str = "log_type";

/// Record attribute holding a namespace that replaces the configured one.
pub const NAMESPACE_OVERRIDE_KEY: &str = "chronicle_namespace";

/// Prefix of record attributes carrying ingestion labels, e.g.
/// `chronicle_ingestion_label["env"]`.
pub const INGESTION_LABEL_PREFIX: &str = "chronicle_ingestion_label";

/// Fixed identifier the ingestion service expects for this collector.
pub const COLLECTOR_ID: &str = "aaaa1111-aaaa-1111-aaaa-1111aaaa1111";

// Expressions that bypass the general field resolver.
pub(crate) const BODY_EXPR: &str = "body";
pub(crate) const LOG_TYPE_OVERRIDE_EXPR: &str = r#"attributes["chronicle_log_type"]"#;
pub(crate) const GENERIC_LOG_TYPE_EXPR: &str = r#"attributes["log_type"]"#;
pub(crate) const NAMESPACE_OVERRIDE_EXPR: &str = r#"attributes["chronicle_namespace"]"#;

/// Maps a generic log type name to the Chronicle log type code.
///
/// Returns `None` for names without a known mapping.
#[must_use]
pub fn known_log_type(generic: &str) -> Option<&'static str> {
    match generic {
        "windows_event.security" | "windows_event.application" | "windows_event.system" => {
            Some("WINEVTLOG")
        }
        "sql_server" => Some("MICROSOFT_SQL"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_log_types() {
        assert_eq!(known_log_type("windows_event.security"), Some("WINEVTLOG"));
        assert_eq!(known_log_type("windows_event.application"), Some("WINEVTLOG"));
        assert_eq!(known_log_type("windows_event.system"), Some("WINEVTLOG"));
        assert_eq!(known_log_type("sql_server"), Some("MICROSOFT_SQL"));
        assert_eq!(known_log_type("WINEVTLOG"), None);
        assert_eq!(known_log_type(""), None);
    }
}
