// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Mutex;

/// Totals of what has been delivered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportCounters {
    pub batches: u64,
    pub logs: u64,
    pub bytes: u64,
}

/// Delivery counters shared by every export call of an exporter.
///
/// Only successful uploads are recorded.
#[derive(Debug, Default)]
pub struct ExportStats {
    counters: Mutex<ExportCounters>,
}

impl ExportStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&self, logs: usize, bytes: usize) {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.batches += 1;
        counters.logs += logs as u64;
        counters.bytes += bytes as u64;
    }

    #[must_use]
    pub fn snapshot(&self) -> ExportCounters {
        match self.counters.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
