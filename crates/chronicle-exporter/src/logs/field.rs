// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Field expressions evaluated against a single record.
//!
//! An expression is a root identifier followed by zero or more bracket
//! accessors:
//!
//! ```text
//! body
//! body["user"]["name"]
//! attributes["log_type"]
//! resource.attributes["host.name"]
//! instrumentation_scope.attributes["library"]
//! ```
//!
//! Missing keys resolve to an empty string. String results are returned as-is and
//! map results are rendered as JSON with sorted keys; any other result type is an
//! error. A handful of expressions the exporter uses on every record skip the
//! general evaluator entirely.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::logs::constants::{
    BODY_EXPR, GENERIC_LOG_TYPE_EXPR, GENERIC_LOG_TYPE_KEY, LOG_TYPE_OVERRIDE_EXPR,
    LOG_TYPE_OVERRIDE_KEY, NAMESPACE_OVERRIDE_EXPR, NAMESPACE_OVERRIDE_KEY,
};
use crate::logs::record::{attributes_to_json, AnyValue, Attributes, RecordContext};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid field expression {expr:?}: {reason}")]
    Parse { expr: String, reason: String },
    #[error("cannot index {found} value with key {key:?}")]
    TypeMismatch { key: String, found: &'static str },
    #[error("unsupported field expression result type: {0}")]
    UnsupportedResult(&'static str),
    #[error("unsupported body type: {0}")]
    UnsupportedBody(&'static str),
    #[error("marshal field value: {0}")]
    Json(String),
}

/// Where evaluation of an expression starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRoot {
    Body,
    Attributes,
    ResourceAttributes,
    ScopeAttributes,
}

impl FieldRoot {
    fn parse(identifier: &str) -> Option<Self> {
        match identifier {
            "body" => Some(FieldRoot::Body),
            "attributes" => Some(FieldRoot::Attributes),
            "resource.attributes" => Some(FieldRoot::ResourceAttributes),
            "instrumentation_scope.attributes" => Some(FieldRoot::ScopeAttributes),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            FieldRoot::Body => "body",
            FieldRoot::Attributes => "attributes",
            FieldRoot::ResourceAttributes => "resource.attributes",
            FieldRoot::ScopeAttributes => "instrumentation_scope.attributes",
        }
    }
}

/// A parsed field expression: a root and a chain of map keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExpr {
    pub root: FieldRoot,
    pub keys: Vec<String>,
}

impl fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root.as_str())?;
        for key in &self.keys {
            write!(f, "[{key:?}]")?;
        }
        Ok(())
    }
}

impl FromStr for FieldExpr {
    type Err = FieldError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: &str| FieldError::Parse {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = expr.trim();
        let split = trimmed.find('[').unwrap_or(trimmed.len());
        let (identifier, mut rest) = trimmed.split_at(split);
        let identifier = identifier.trim_end();
        if identifier.is_empty() {
            return Err(parse_error("missing path identifier"));
        }
        let root = FieldRoot::parse(identifier)
            .ok_or_else(|| parse_error(&format!("unknown path {identifier:?}")))?;

        let mut keys = Vec::new();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest
                .strip_prefix('[')
                .ok_or_else(|| parse_error("expected '['"))?
                .trim_start();
            rest = rest
                .strip_prefix('"')
                .ok_or_else(|| parse_error("keys must be double-quoted strings"))?;

            let mut key = String::new();
            let mut chars = rest.char_indices();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some((_, escaped)) => key.push(escaped),
                        None => break,
                    },
                    '"' => {
                        end = Some(i);
                        break;
                    }
                    _ => key.push(c),
                }
            }
            let end = end.ok_or_else(|| parse_error("unterminated key"))?;
            rest = rest[end + 1..]
                .trim_start()
                .strip_prefix(']')
                .ok_or_else(|| parse_error("expected ']'"))?;
            keys.push(key);
        }

        Ok(FieldExpr { root, keys })
    }
}

enum Cursor<'a> {
    Map(&'a Attributes),
    Value(&'a AnyValue),
}

impl FieldExpr {
    /// Walks the expression against `ctx`. `Ok(None)` means a key was missing.
    fn lookup<'a>(&self, ctx: RecordContext<'a>) -> Result<Option<Cursor<'a>>, FieldError> {
        let mut cursor = match self.root {
            FieldRoot::Body => Cursor::Value(&ctx.record.body),
            FieldRoot::Attributes => Cursor::Map(&ctx.record.attributes),
            FieldRoot::ResourceAttributes => Cursor::Map(ctx.resource),
            FieldRoot::ScopeAttributes => Cursor::Map(&ctx.scope.attributes),
        };

        for key in &self.keys {
            let map = match cursor {
                Cursor::Map(map) | Cursor::Value(AnyValue::Map(map)) => map,
                Cursor::Value(AnyValue::Empty) => return Ok(None),
                Cursor::Value(other) => {
                    return Err(FieldError::TypeMismatch {
                        key: key.clone(),
                        found: other.type_name(),
                    })
                }
            };
            match map.get(key) {
                Some(value) => cursor = Cursor::Value(value),
                None => return Ok(None),
            }
        }
        Ok(Some(cursor))
    }

    /// Evaluates the expression and renders the result as a string.
    pub fn evaluate(&self, ctx: RecordContext<'_>) -> Result<String, FieldError> {
        match self.lookup(ctx)? {
            None | Some(Cursor::Value(AnyValue::Empty)) => Ok(String::new()),
            Some(Cursor::Value(AnyValue::Str(s))) => Ok(s.clone()),
            Some(Cursor::Map(map) | Cursor::Value(AnyValue::Map(map))) => {
                serde_json::to_string(&attributes_to_json(map))
                    .map_err(|e| FieldError::Json(e.to_string()))
            }
            Some(Cursor::Value(other)) => Err(FieldError::UnsupportedResult(other.type_name())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Body,
    StringAttribute(&'static str),
    Path(FieldExpr),
}

/// Resolves one field expression against records.
///
/// Parsing happens once in [`FieldResolver::new`], so a malformed expression is
/// reported before any record is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResolver {
    resolution: Resolution,
}

impl FieldResolver {
    pub fn new(expr: &str) -> Result<Self, FieldError> {
        let resolution = match expr {
            BODY_EXPR => Resolution::Body,
            LOG_TYPE_OVERRIDE_EXPR => Resolution::StringAttribute(LOG_TYPE_OVERRIDE_KEY),
            GENERIC_LOG_TYPE_EXPR => Resolution::StringAttribute(GENERIC_LOG_TYPE_KEY),
            NAMESPACE_OVERRIDE_EXPR => Resolution::StringAttribute(NAMESPACE_OVERRIDE_KEY),
            _ => Resolution::Path(expr.parse()?),
        };
        Ok(FieldResolver { resolution })
    }

    pub fn resolve(&self, ctx: RecordContext<'_>) -> Result<String, FieldError> {
        match &self.resolution {
            Resolution::Body => match &ctx.record.body {
                AnyValue::Empty => Ok(String::new()),
                AnyValue::Str(s) => Ok(s.clone()),
                AnyValue::Map(map) => serde_json::to_string(&attributes_to_json(map))
                    .map_err(|e| FieldError::Json(e.to_string())),
                other => Err(FieldError::UnsupportedBody(other.type_name())),
            },
            // reserved attributes only count when they hold a string
            Resolution::StringAttribute(key) => Ok(ctx
                .record
                .attributes
                .get(*key)
                .and_then(AnyValue::as_str)
                .unwrap_or_default()
                .to_string()),
            Resolution::Path(expr) => expr.evaluate(ctx),
        }
    }
}

/// Parses `expr` and resolves it against `ctx` in one step.
pub fn resolve(expr: &str, ctx: RecordContext<'_>) -> Result<String, FieldError> {
    FieldResolver::new(expr)?.resolve(ctx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logs::record::{InstrumentationScope, LogRecord};

    fn ctx<'a>(
        record: &'a LogRecord,
        scope: &'a InstrumentationScope,
        resource: &'a Attributes,
    ) -> RecordContext<'a> {
        RecordContext {
            record,
            scope,
            resource,
        }
    }

    fn nested_body() -> AnyValue {
        let mut user = Attributes::new();
        user.insert("name".to_string(), AnyValue::from("ada"));
        user.insert("id".to_string(), AnyValue::Int(7));
        let mut body = Attributes::new();
        body.insert("user".to_string(), AnyValue::Map(user));
        body.insert("msg".to_string(), AnyValue::from("hello"));
        AnyValue::Map(body)
    }

    #[test]
    fn test_parse_expressions() {
        let expr: FieldExpr = r#"body["user"]["name"]"#.parse().unwrap();
        assert_eq!(expr.root, FieldRoot::Body);
        assert_eq!(expr.keys, vec!["user", "name"]);

        let expr: FieldExpr = r#" resource.attributes [ "host.name" ] "#.parse().unwrap();
        assert_eq!(expr.root, FieldRoot::ResourceAttributes);
        assert_eq!(expr.keys, vec!["host.name"]);

        let expr: FieldExpr = r#"attributes["with \"quote\""]"#.parse().unwrap();
        assert_eq!(expr.keys, vec![r#"with "quote""#]);
        assert_eq!(expr.to_string(), r#"attributes["with \"quote\""]"#);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "bogus",
            r#"bogus["x"]"#,
            r#"attributes[x]"#,
            r#"attributes["x""#,
            r#"attributes["x"] trailing"#,
            r#"attributes["x"]["y""#,
        ] {
            assert!(
                matches!(FieldResolver::new(bad), Err(FieldError::Parse { .. })),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_body_fast_path() {
        let scope = InstrumentationScope::default();
        let resource = Attributes::new();

        let record = LogRecord::new("raw line");
        assert_eq!(resolve("body", ctx(&record, &scope, &resource)).unwrap(), "raw line");

        let record = LogRecord::new(nested_body());
        assert_eq!(
            resolve("body", ctx(&record, &scope, &resource)).unwrap(),
            r#"{"msg":"hello","user":{"id":7,"name":"ada"}}"#
        );

        let record = LogRecord::new(AnyValue::Empty);
        assert_eq!(resolve("body", ctx(&record, &scope, &resource)).unwrap(), "");

        let record = LogRecord::new(AnyValue::Int(3));
        assert_eq!(
            resolve("body", ctx(&record, &scope, &resource)),
            Err(FieldError::UnsupportedBody("int"))
        );
    }

    #[test]
    fn test_reserved_attribute_fast_paths() {
        let scope = InstrumentationScope::default();
        let resource = Attributes::new();
        let record = LogRecord::new("x")
            .with_attribute("chronicle_log_type", "CUSTOM")
            .with_attribute("log_type", AnyValue::Int(5))
            .with_attribute("chronicle_namespace", "ns");
        let c = ctx(&record, &scope, &resource);

        assert_eq!(resolve(r#"attributes["chronicle_log_type"]"#, c).unwrap(), "CUSTOM");
        assert_eq!(resolve(r#"attributes["chronicle_namespace"]"#, c).unwrap(), "ns");
        // non-string values are ignored
        assert_eq!(resolve(r#"attributes["log_type"]"#, c).unwrap(), "");
    }

    #[test]
    fn test_general_paths() {
        let scope = InstrumentationScope {
            attributes: [("library".to_string(), AnyValue::from("otel"))]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let resource: Attributes = [("host.name".to_string(), AnyValue::from("h1"))]
            .into_iter()
            .collect();
        let record = LogRecord::new(nested_body()).with_attribute("count", AnyValue::Int(2));
        let c = ctx(&record, &scope, &resource);

        assert_eq!(resolve(r#"body["user"]["name"]"#, c).unwrap(), "ada");
        assert_eq!(resolve(r#"body["user"]"#, c).unwrap(), r#"{"id":7,"name":"ada"}"#);
        assert_eq!(resolve(r#"resource.attributes["host.name"]"#, c).unwrap(), "h1");
        assert_eq!(
            resolve(r#"instrumentation_scope.attributes["library"]"#, c).unwrap(),
            "otel"
        );
        assert_eq!(resolve("resource.attributes", c).unwrap(), r#"{"host.name":"h1"}"#);
    }

    #[test]
    fn test_missing_keys_resolve_empty() {
        let scope = InstrumentationScope::default();
        let resource = Attributes::new();
        let record = LogRecord::new(nested_body());
        let c = ctx(&record, &scope, &resource);

        assert_eq!(resolve(r#"attributes["absent"]"#, c).unwrap(), "");
        assert_eq!(resolve(r#"body["user"]["absent"]["deeper"]"#, c).unwrap(), "");

        let empty = LogRecord::default();
        assert_eq!(
            resolve(r#"body["anything"]"#, ctx(&empty, &scope, &resource)).unwrap(),
            ""
        );
    }

    #[test]
    fn test_evaluation_errors() {
        let scope = InstrumentationScope::default();
        let resource = Attributes::new();
        let record = LogRecord::new(nested_body());
        let c = ctx(&record, &scope, &resource);

        assert_eq!(
            resolve(r#"body["msg"]["x"]"#, c),
            Err(FieldError::TypeMismatch {
                key: "x".to_string(),
                found: "string"
            })
        );
        assert_eq!(
            resolve(r#"body["user"]["id"]"#, c),
            Err(FieldError::UnsupportedResult("int"))
        );
    }
}
