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

//! Transport implementations of [`Driver`](crate::Driver) and the plumbing they share.

pub mod amqp;
pub mod nats;
pub mod rest;
pub mod zmq;

use crate::codec::{Envelope, RC, SERVER_ERROR_MESSAGE};
use crate::driver::{MessageListener, TopicMessage, TreatmentCallback};
use crate::error::{ClipError, ClipResult};
use crate::observability::{events, fields};
use crate::runtime::worker_runtime::ConsumeLoopHandle;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const COMPONENT: &str = "transport";

/// Status code put on replies whose treatment callback failed.
pub(crate) const CALLBACK_FAILURE_RC: i64 = 500;

/// Runs a service callback, turning an error or a panic into an `RC = 500` reply.
pub(crate) async fn treat_request(
    service: &str,
    callback: &dyn TreatmentCallback,
    request: Envelope,
) -> Envelope {
    let correlation_id = fields::format_correlation_id(&request);
    match AssertUnwindSafe(callback.on_request(request))
        .catch_unwind()
        .await
    {
        Ok(Ok(reply)) => {
            debug!(
                event = events::SERVICE_REQUEST_RECEIVE,
                component = COMPONENT,
                service,
                correlation_id = correlation_id.as_str(),
                status_code = fields::format_status_code(&reply).as_str(),
                "treatment callback replied"
            );
            reply
        }
        Ok(Err(err)) => {
            warn!(
                event = events::SERVICE_CALLBACK_FAILED,
                component = COMPONENT,
                service,
                correlation_id = correlation_id.as_str(),
                worker_thread = fields::current_thread_name_or_default().as_str(),
                reason = fields::REASON_CALLBACK_ERROR,
                err = %err,
                "treatment callback failed"
            );
            failure_reply(&err.to_string())
        }
        Err(_) => {
            warn!(
                event = events::SERVICE_CALLBACK_FAILED,
                component = COMPONENT,
                service,
                correlation_id = correlation_id.as_str(),
                worker_thread = fields::current_thread_name_or_default().as_str(),
                reason = fields::REASON_CALLBACK_PANICKED,
                "treatment callback panicked"
            );
            failure_reply("treatment callback panicked")
        }
    }
}

/// A treated request's reply, addressed back to the requester.
#[derive(Debug)]
pub(crate) struct AddressedReply {
    pub(crate) reply_to: String,
    pub(crate) correlation_id: Option<String>,
    pub(crate) envelope: Envelope,
}

/// Treats `request` and addresses the reply, failure replies included, to `reply_to`.
///
/// The callback always runs; `None` means the requester asked for no answer.
pub(crate) async fn answer_request(
    service: &str,
    callback: &dyn TreatmentCallback,
    request: Envelope,
    correlation_id: Option<String>,
    reply_to: Option<String>,
) -> Option<AddressedReply> {
    let mut envelope = treat_request(service, callback, request).await;
    let reply_to = reply_to?;
    if let Some(correlation_id) = &correlation_id {
        envelope.set_correlation_id(correlation_id);
    }
    Some(AddressedReply {
        reply_to,
        correlation_id,
        envelope,
    })
}

fn failure_reply(message: &str) -> Envelope {
    Envelope::default()
        .with_property(RC, CALLBACK_FAILURE_RC)
        .with_property(SERVER_ERROR_MESSAGE, message)
}

/// Hands one message to a subscriber callback; failures are logged and swallowed.
pub(crate) async fn deliver_message(
    subscriber: &str,
    listener: &dyn MessageListener,
    message: TopicMessage,
) {
    let topic = message.topic.clone();
    debug!(
        event = events::SUBSCRIBER_MESSAGE_RECEIVE,
        component = COMPONENT,
        subscriber,
        topic = topic.as_str(),
        "delivering message"
    );
    match AssertUnwindSafe(listener.on_message(message))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(
            event = events::SUBSCRIBER_CALLBACK_FAILED,
            component = COMPONENT,
            subscriber,
            topic = topic.as_str(),
            reason = fields::REASON_CALLBACK_ERROR,
            err = %err,
            "subscriber callback failed"
        ),
        Err(_) => warn!(
            event = events::SUBSCRIBER_CALLBACK_FAILED,
            component = COMPONENT,
            subscriber,
            topic = topic.as_str(),
            reason = fields::REASON_CALLBACK_PANICKED,
            "subscriber callback panicked"
        ),
    }
}

/// Collects the outcome of stopping one child of a driver.
pub(crate) fn record_teardown(
    driver: &str,
    child: &str,
    result: ClipResult<()>,
    failures: &mut Vec<ClipError>,
) {
    if let Err(err) = result {
        warn!(
            event = events::DRIVER_STOP_CHILD_FAILED,
            component = COMPONENT,
            driver,
            child,
            err = %err,
            "unable to stop driver child"
        );
        failures.push(err);
    }
}

/// A consume loop plus the value it produced when it became ready, restartable.
pub(crate) struct LoopSlot<T> {
    state: tokio::sync::Mutex<Option<(ConsumeLoopHandle, T)>>,
    started: AtomicBool,
}

impl<T: Clone + Send> LoopSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Returns the running loop's value, spawning the loop first if needed.
    pub(crate) async fn start_with<F, Fut>(&self, spawn: F) -> ClipResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClipResult<(ConsumeLoopHandle, T)>>,
    {
        let mut state = self.state.lock().await;
        if let Some((handle, value)) = state.as_ref() {
            if handle.is_running() {
                return Ok(value.clone());
            }
        }
        // A loop that died on its own is reaped before a new one is spawned.
        if let Some((mut stale, _)) = state.take() {
            stale.shutdown().await?;
        }

        let (handle, value) = spawn().await?;
        *state = Some((handle, value.clone()));
        self.started.store(true, Ordering::SeqCst);
        Ok(value)
    }

    /// Value of the running loop, if any.
    pub(crate) async fn current(&self) -> Option<T> {
        self.state
            .lock()
            .await
            .as_ref()
            .filter(|(handle, _)| handle.is_running())
            .map(|(_, value)| value.clone())
    }

    /// Stops the loop. Idempotent.
    pub(crate) async fn stop(&self) -> ClipResult<()> {
        let taken = self.state.lock().await.take();
        self.started.store(false, Ordering::SeqCst);
        match taken {
            Some((mut handle, _)) => handle.shutdown().await,
            None => Ok(()),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        match self.state.try_lock() {
            Ok(state) => state.as_ref().is_some_and(|(handle, _)| handle.is_running()),
            // Mid start or stop; report the last settled state.
            Err(_) => self.started.load(Ordering::SeqCst),
        }
    }
}
