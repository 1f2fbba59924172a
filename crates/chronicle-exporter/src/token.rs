// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;
use std::{future::Future, pin::Pin};

/// Produces a bearer token, or `None` when one could not be obtained.
pub type TokenResolverFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Option<String>> + Send>> + Send + Sync>;

/// Source of the bearer token sent with every upload.
///
/// Access tokens expire, so a dynamic resolver is called for every request and
/// is expected to do its own caching.
#[derive(Clone)]
pub enum TokenFactory {
    Static(String),
    Dynamic(TokenResolverFn),
}

impl TokenFactory {
    #[must_use]
    pub fn new_from_resolver(resolver_fn: TokenResolverFn) -> Self {
        Self::Dynamic(resolver_fn)
    }

    #[must_use]
    pub fn new_from_static_token(token: &str) -> Self {
        Self::Static(token.to_string())
    }

    /// A factory that never authenticates, for endpoints that do not need it.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::Static(String::new())
    }

    /// The token to send, `Some("")` meaning no authorization header.
    pub async fn get_token(&self) -> Option<String> {
        match self {
            Self::Static(token) => Some(token.clone()),
            Self::Dynamic(resolver_fn) => (resolver_fn)().await,
        }
    }
}

impl Debug for TokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenFactory")
    }
}

#[cfg(test)]
pub mod tests {
    use crate::token::TokenFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn new_from_resolver() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let token_factory = TokenFactory::new_from_resolver(Arc::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Some(format!("token-{n}")) })
        }));

        assert_eq!(token_factory.get_token().await.as_deref(), Some("token-0"));
        assert_eq!(token_factory.get_token().await.as_deref(), Some("token-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn new_from_resolver_failure() {
        let token_factory =
            TokenFactory::new_from_resolver(Arc::new(|| Box::pin(async { None })));
        assert_eq!(token_factory.get_token().await, None);
    }

    #[tokio::test]
    async fn new_from_static_token() {
        let token_factory = TokenFactory::new_from_static_token("mock-token");
        assert_eq!(token_factory.get_token().await.as_deref(), Some("mock-token"));
        assert_eq!(TokenFactory::anonymous().get_token().await.as_deref(), Some(""));
    }
}
