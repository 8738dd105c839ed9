/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Request/reply correlation over asynchronous transports.
//!
//! A requester owns one [`CorrelatedCall`]. Its reply pump (a consume loop on the
//! private reply queue or inbox) hands every inbound reply to the shared
//! [`ReplyMatcher`], which forwards it to the caller only when the correlation id
//! matches the single outstanding request. Anything else is dropped with a log line.

use crate::codec::Envelope;
use crate::error::{ClipError, ClipResult};
use crate::observability::events;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

const COMPONENT: &str = "correlation";

pub(crate) fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

struct PendingReply {
    correlation_id: String,
    sender: oneshot::Sender<Envelope>,
}

/// Slot for the one reply a requester is waiting on.
#[derive(Default)]
pub(crate) struct ReplyMatcher {
    pending: Mutex<Option<PendingReply>>,
}

impl ReplyMatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers the outstanding correlation id, replacing any previous one.
    pub(crate) fn expect(&self, correlation_id: &str) -> oneshot::Receiver<Envelope> {
        let (sender, receiver) = oneshot::channel();
        *self.lock() = Some(PendingReply {
            correlation_id: correlation_id.to_string(),
            sender,
        });
        receiver
    }

    /// Delivers `reply` if it answers the outstanding request.
    pub(crate) fn offer(&self, correlation_id: Option<&str>, reply: Envelope) -> bool {
        let mut pending = self.lock();
        let matches = matches!(
            (pending.as_ref(), correlation_id),
            (Some(expected), Some(received)) if expected.correlation_id == received
        );

        if !matches {
            debug!(
                event = events::REPLY_IGNORED_UNCORRELATED,
                component = COMPONENT,
                correlation_id = correlation_id.unwrap_or("none"),
                expected = pending
                    .as_ref()
                    .map(|expected| expected.correlation_id.as_str())
                    .unwrap_or("none"),
                "ignoring reply that does not match the outstanding request"
            );
            return false;
        }

        match pending.take() {
            Some(expected) => expected.sender.send(reply).is_ok(),
            None => false,
        }
    }

    /// Forgets the outstanding request if it is still `correlation_id`.
    pub(crate) fn abandon(&self, correlation_id: &str) {
        let mut pending = self.lock();
        if pending
            .as_ref()
            .is_some_and(|expected| expected.correlation_id == correlation_id)
        {
            pending.take();
        }
    }

    #[cfg(test)]
    fn is_waiting(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PendingReply>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serialized publish-then-await-reply sequence with a deadline.
pub(crate) struct CorrelatedCall {
    name: String,
    matcher: Arc<ReplyMatcher>,
    call_lock: tokio::sync::Mutex<()>,
    reply_timeout: Duration,
}

impl CorrelatedCall {
    pub(crate) fn new(name: &str, reply_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            matcher: Arc::new(ReplyMatcher::new()),
            call_lock: tokio::sync::Mutex::new(()),
            reply_timeout,
        }
    }

    /// Matcher to hand to the reply pump.
    pub(crate) fn matcher(&self) -> Arc<ReplyMatcher> {
        self.matcher.clone()
    }

    /// Generates a correlation id, lets `send` publish the request with it, and waits
    /// for the matching reply.
    pub(crate) async fn round_trip<F, Fut>(&self, send: F) -> ClipResult<Envelope>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ClipResult<()>>,
    {
        let _serialized = self.call_lock.lock().await;

        let correlation_id = new_correlation_id();
        let reply = self.matcher.expect(&correlation_id);

        debug!(
            event = events::REQUEST_SEND,
            component = COMPONENT,
            requester = self.name.as_str(),
            correlation_id = correlation_id.as_str(),
            "sending correlated request"
        );

        if let Err(err) = send(correlation_id.clone()).await {
            self.matcher.abandon(&correlation_id);
            warn!(
                event = events::REQUEST_SEND_FAILED,
                component = COMPONENT,
                requester = self.name.as_str(),
                correlation_id = correlation_id.as_str(),
                err = %err,
                "unable to send request"
            );
            return Err(err);
        }

        match tokio::time::timeout(self.reply_timeout, reply).await {
            Ok(Ok(envelope)) => {
                debug!(
                    event = events::REQUEST_REPLY_OK,
                    component = COMPONENT,
                    requester = self.name.as_str(),
                    correlation_id = correlation_id.as_str(),
                    "received correlated reply"
                );
                Ok(envelope)
            }
            Ok(Err(_)) => Err(ClipError::transport(format!(
                "{}: reply channel closed before the reply to {correlation_id} arrived",
                self.name
            ))),
            Err(_) => {
                self.matcher.abandon(&correlation_id);
                warn!(
                    event = events::REQUEST_REPLY_TIMEOUT,
                    component = COMPONENT,
                    requester = self.name.as_str(),
                    correlation_id = correlation_id.as_str(),
                    timeout_ms = self.reply_timeout.as_millis() as u64,
                    "no reply before deadline"
                );
                Err(ClipError::Timeout(self.reply_timeout))
            }
        }
    }
}
