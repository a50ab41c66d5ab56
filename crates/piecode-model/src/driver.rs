// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{CompletionRequest, ProviderError, ResponseEvent};

pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<ResponseEvent, ProviderError>> + Send>>;

/// Transport layer of the provider adapter: one driver per wire protocol.
///
/// Drivers only move bytes; budgets, timeouts, cancellation, and delta
/// accumulation live in [`crate::ProviderAdapter`].  Transports without
/// streaming support return a two-event stream (`TextDelta(full body)`,
/// `Done`) so the adapter still delivers exactly one delta.
#[async_trait]
pub trait ModelDriver: Send + Sync {
    /// Stable driver id for status display and logs.
    fn name(&self) -> &str;

    /// Whether this driver speaks native tool calls.  Text-mode drivers
    /// receive a flattened prompt and return prose; the turn driver parses
    /// actions out of it.
    fn supports_native_tools(&self) -> bool;

    /// Send a completion request and return a streaming response.
    async fn stream(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError>;
}
