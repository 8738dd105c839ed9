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

//! The driver contract every transport implements, and the primitives it builds.

use crate::codec::{Envelope, Properties};
use crate::config::TransportKind;
use crate::error::{ClipError, ClipResult};
use crate::response::DriverResponse;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Deadline applied to request/reply calls unless the requester overrides it.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type user callbacks may return; it is logged, never propagated.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Server-side treatment of one inbound request.
///
/// The returned envelope is sent back when the request carries a reply address;
/// the correlation id is copied onto it by the service.
#[async_trait]
pub trait TreatmentCallback: Send + Sync {
    async fn on_request(&self, request: Envelope) -> Result<Envelope, CallbackError>;
}

/// One message received by a [`Subscriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: String,
}

#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_message(&self, message: TopicMessage) -> Result<(), CallbackError>;
}

/// Transport-specific connection owner and factory for the primitives below.
///
/// A driver is created unstarted by [`DriverFactory`][crate::DriverFactory];
/// [`start`](Driver::start) opens the connection and [`stop`](Driver::stop) tears down
/// every child it created before closing the connection. Unsupported primitives fail
/// with [`ClipError::Unsupported`].
#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn start(&mut self) -> ClipResult<()>;

    /// Idempotent; failures of individual children are aggregated.
    async fn stop(&mut self) -> ClipResult<()>;

    async fn make_requester(&mut self, args: RequesterArgs) -> ClipResult<Arc<dyn Requester>>;

    async fn make_publisher(&mut self, args: PublisherArgs) -> ClipResult<Arc<dyn Publisher>>;

    async fn make_subscriber(&mut self, args: SubscriberArgs)
        -> ClipResult<Arc<dyn Subscriber>>;

    async fn make_service(&mut self, args: ServiceArgs) -> ClipResult<Arc<dyn Service>>;
}

/// Synchronous call primitive.
///
/// Calls on one requester are serialized: at most one correlation id is outstanding.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn call(&self, args: CallArgs) -> ClipResult<DriverResponse>;

    async fn stop(&self) -> ClipResult<()>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn start(&self) -> ClipResult<()>;

    /// Broadcasts `msg` on the publisher's topic; no delivery guarantee.
    async fn call(&self, msg: &str) -> ClipResult<()>;

    async fn stop(&self) -> ClipResult<()>;
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn start(&self) -> ClipResult<()>;

    async fn stop(&self) -> ClipResult<()>;

    fn is_running(&self) -> bool;
}

#[async_trait]
pub trait Service: Send + Sync {
    async fn start(&self) -> ClipResult<()>;

    async fn stop(&self) -> ClipResult<()>;

    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpOperation {
    #[default]
    Get,
    Post,
}

impl HttpOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpOperation::Get => "GET",
            HttpOperation::Post => "POST",
        }
    }
}

/// Arguments of one [`Requester::call`].
///
/// REST reads `http_operation`, `operation_path` and `parameters`; AMQP and NATS read
/// `properties` and `body`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub http_operation: HttpOperation,
    pub operation_path: Option<String>,
    pub parameters: Option<Properties>,
    pub properties: Properties,
    pub body: Vec<u8>,
}

impl CallArgs {
    pub fn http(http_operation: HttpOperation, operation_path: &str) -> Self {
        Self {
            http_operation,
            operation_path: Some(operation_path.to_string()),
            ..Default::default()
        }
    }

    pub fn message(properties: Properties, body: impl Into<Vec<u8>>) -> Self {
        Self {
            properties,
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: Properties) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub(crate) fn into_envelope(self) -> Envelope {
        Envelope::new(self.properties, self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Publish and wait for the correlated reply.
    #[default]
    RequestReply,
    /// Publish only; `call` returns an empty successful response.
    FireAndForget,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequesterArgs {
    /// REST: path appended to the driver's base url.
    pub repository_path: Option<String>,
    /// AMQP queue / NATS subject requests are published on.
    pub request_q: Option<String>,
    pub mode: RequestMode,
    pub reply_timeout: Option<Duration>,
    pub requester_name: Option<String>,
}

impl RequesterArgs {
    pub fn rest(repository_path: &str) -> Self {
        Self {
            repository_path: Some(repository_path.to_string()),
            ..Default::default()
        }
    }

    pub fn queue(request_q: &str) -> Self {
        Self {
            request_q: Some(request_q.to_string()),
            ..Default::default()
        }
    }

    pub fn fire_and_forget(mut self) -> Self {
        self.mode = RequestMode::FireAndForget;
        self
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = Some(reply_timeout);
        self
    }

    pub fn with_name(mut self, requester_name: &str) -> Self {
        self.requester_name = Some(requester_name.to_string());
        self
    }

    pub(crate) fn reply_timeout(&self) -> Duration {
        self.reply_timeout.unwrap_or(DEFAULT_REPLY_TIMEOUT)
    }
}

#[derive(Clone, Default)]
pub struct ServiceArgs {
    /// Queue (AMQP) or subject (NATS) the service consumes.
    pub service_q: Option<String>,
    pub treatment_callback: Option<Arc<dyn TreatmentCallback>>,
    pub service_name: Option<String>,
}

impl ServiceArgs {
    pub fn new(service_q: &str, treatment_callback: Arc<dyn TreatmentCallback>) -> Self {
        Self {
            service_q: Some(service_q.to_string()),
            treatment_callback: Some(treatment_callback),
            service_name: None,
        }
    }

    pub fn with_name(mut self, service_name: &str) -> Self {
        self.service_name = Some(service_name.to_string());
        self
    }
}

impl fmt::Debug for ServiceArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceArgs")
            .field("service_q", &self.service_q)
            .field("treatment_callback", &self.treatment_callback.is_some())
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublisherArgs {
    pub topic: Option<String>,
    pub publisher_name: Option<String>,
}

impl PublisherArgs {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: Some(topic.to_string()),
            publisher_name: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct SubscriberArgs {
    pub topic: Option<String>,
    pub treatment_callback: Option<Arc<dyn MessageListener>>,
    pub subscriber_name: Option<String>,
}

impl SubscriberArgs {
    pub fn new(topic: &str, treatment_callback: Arc<dyn MessageListener>) -> Self {
        Self {
            topic: Some(topic.to_string()),
            treatment_callback: Some(treatment_callback),
            subscriber_name: None,
        }
    }

    pub fn with_name(mut self, subscriber_name: &str) -> Self {
        self.subscriber_name = Some(subscriber_name.to_string());
        self
    }
}

impl fmt::Debug for SubscriberArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberArgs")
            .field("topic", &self.topic)
            .field("treatment_callback", &self.treatment_callback.is_some())
            .field("subscriber_name", &self.subscriber_name)
            .finish()
    }
}

/// Returns the trimmed value of a mandatory factory argument.
pub(crate) fn required_arg(
    transport: TransportKind,
    name: &str,
    value: Option<&str>,
) -> ClipResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ClipError::configuration(format!(
            "{transport} driver requires a non empty `{name}` argument"
        ))),
    }
}

pub(crate) fn required_callback<T: ?Sized>(
    transport: TransportKind,
    callback: Option<&Arc<T>>,
) -> ClipResult<Arc<T>> {
    callback.cloned().ok_or_else(|| {
        ClipError::configuration(format!(
            "{transport} driver requires a `treatment_callback` argument"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requester_args_default_to_request_reply_with_default_timeout() {
        let args = RequesterArgs::queue("ARIANE_MAPPING_QUEUE");

        assert_eq!(args.mode, RequestMode::RequestReply);
        assert_eq!(args.reply_timeout(), DEFAULT_REPLY_TIMEOUT);
    }

    #[test]
    fn required_arg_rejects_missing_and_blank_values() {
        assert!(required_arg(TransportKind::Rbmq, "request_q", None)
            .unwrap_err()
            .is_configuration());
        assert!(required_arg(TransportKind::Rbmq, "request_q", Some("   "))
            .unwrap_err()
            .is_configuration());
        assert_eq!(
            required_arg(TransportKind::Rbmq, "request_q", Some(" q1 ")).unwrap(),
            "q1"
        );
    }

    #[test]
    fn call_args_message_keeps_properties_and_body() {
        let mut properties = Properties::new();
        properties.insert("OPERATION".to_string(), "getNodes".into());

        let envelope = CallArgs::message(properties.clone(), b"{}".to_vec()).into_envelope();

        assert_eq!(envelope.properties, properties);
        assert_eq!(envelope.body, b"{}".to_vec());
    }
}
