// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tracing formatter and subscriber setup for processes embedding the exporter.
//!
//! # Format
//!
//! ```text
//! CHRONICLE_EXPORTER | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! # Example
//!
//! ```text
//! CHRONICLE_EXPORTER | ERROR | CHRONICLE | Single entry exceeds max request size. Dropping entry size=6291502 max_request_size=5242880
//! ```

use std::fmt;

use tracing::subscriber::SetGlobalDefaultError;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::log_level::LogLevel;

/// Prefixes every line with `CHRONICLE_EXPORTER` and the level.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "CHRONICLE_EXPORTER | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                // stored by the fmt layer when the span was created
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("install subscriber: {0}")]
    Install(#[from] SetGlobalDefaultError),
}

/// Filter directives for `level`, with the chatty transport crates silenced.
#[must_use]
pub fn filter_directives(level: LogLevel) -> String {
    format!(
        "h2=off,hyper=off,rustls=off,tower=off,{}",
        level.as_ref().to_lowercase()
    )
}

/// Installs a global subscriber using [`Formatter`] at `level`.
pub fn init_logging(level: LogLevel) -> Result<(), LoggingError> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(filter_directives(level))?)
        .event_format(Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
