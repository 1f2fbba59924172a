// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Splits requests until every one fits the ingestion limits.
//!
//! A request over either limit is split at `len / 2` and each half is checked
//! again, left before right, so entry order survives. The encoded size of the
//! whole request is measured on every call. A request that is still too large
//! with a single entry is dropped; this is the only place the pipeline loses
//! data on purpose.

use tracing::error;

use crate::logs::batch::SplittableRequest;

/// Maximum encoded size and entry count of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_request_size: usize,
    pub max_entry_count: usize,
}

impl BatchLimits {
    #[must_use]
    pub fn new(max_request_size: usize, max_entry_count: usize) -> Self {
        BatchLimits {
            max_request_size,
            max_entry_count,
        }
    }

    #[must_use]
    pub fn admits<R: SplittableRequest>(&self, request: &R) -> bool {
        request.encoded_size() <= self.max_request_size
            && request.entry_count() <= self.max_entry_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeEnforcer {
    limits: BatchLimits,
}

impl SizeEnforcer {
    #[must_use]
    pub fn new(limits: BatchLimits) -> Self {
        SizeEnforcer { limits }
    }

    #[must_use]
    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Returns the requests to send for `request`, in order.
    #[must_use]
    pub fn enforce<R: SplittableRequest>(&self, request: R) -> Vec<R> {
        let mut requests = Vec::new();
        self.enforce_into(request, &mut requests);
        requests
    }

    fn enforce_into<R: SplittableRequest>(&self, mut request: R, out: &mut Vec<R>) {
        let size = request.encoded_size();
        let count = request.entry_count();
        if size <= self.limits.max_request_size && count <= self.limits.max_entry_count {
            out.push(request);
            return;
        }

        if count < 2 {
            error!(
                size,
                max_request_size = self.limits.max_request_size,
                "CHRONICLE | Single entry exceeds max request size. Dropping entry"
            );
            return;
        }

        let right = request.split_off(count / 2);
        self.enforce_into(request, out);
        self.enforce_into(right, out);
    }
}
