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

//! ZeroMQ PUB/SUB driver. Frames are a single `"<topic> <msg>"` string.

use crate::config::{DriverConfig, TransportKind, ZeromqSettings};
use crate::driver::{
    required_arg, required_callback, Driver, MessageListener, Publisher, PublisherArgs,
    Requester, RequesterArgs, Service, ServiceArgs, Subscriber, SubscriberArgs, TopicMessage,
};
use crate::error::{ClipError, ClipResult};
use crate::observability::events;
use crate::runtime::worker_runtime::{
    build_runtime_thread_name, spawn_consume_loop, ReadySignal, ShutdownSignal,
    DEFAULT_START_TIMEOUT,
};
use crate::transport::{deliver_message, record_teardown, LoopSlot};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeromq::{Endpoint, PubSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

const TRANSPORT: &str = "Z0MQ";
const COMPONENT: &str = "zeromq_driver";
const THREAD_PREFIX: &str = "clip-zmq-";
const RECV_FAILURE_BACKOFF: Duration = Duration::from_millis(100);

fn thread_name() -> String {
    build_runtime_thread_name(THREAD_PREFIX, &Uuid::new_v4().simple().to_string())
}

pub struct ZmqDriver {
    settings: ZeromqSettings,
    started: bool,
    publishers: Vec<Arc<ZmqPublisher>>,
    subscribers: Vec<Arc<ZmqSubscriber>>,
}

impl ZmqDriver {
    pub fn new(config: &DriverConfig) -> ClipResult<Self> {
        Ok(Self {
            settings: ZeromqSettings::from_config(config)?,
            started: false,
            publishers: Vec::new(),
            subscribers: Vec::new(),
        })
    }

    pub fn endpoint(&self) -> String {
        self.settings.endpoint()
    }

    fn ensure_started(&self) -> ClipResult<()> {
        if self.started {
            Ok(())
        } else {
            Err(ClipError::InvalidState(
                "Z0MQ driver must be started before making children".into(),
            ))
        }
    }
}

#[async_trait]
impl Driver for ZmqDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::Z0mq
    }

    async fn start(&mut self) -> ClipResult<()> {
        if !self.started {
            info!(
                event = events::DRIVER_START,
                component = COMPONENT,
                driver = TRANSPORT,
                endpoint = %self.settings.endpoint(),
                "driver started"
            );
            self.started = true;
        }
        Ok(())
    }

    async fn stop(&mut self) -> ClipResult<()> {
        let mut failures = Vec::new();
        for publisher in self.publishers.drain(..) {
            let result = publisher.stop().await;
            record_teardown(TRANSPORT, &publisher.name, result, &mut failures);
        }
        for subscriber in self.subscribers.drain(..) {
            let result = subscriber.stop().await;
            record_teardown(TRANSPORT, &subscriber.name, result, &mut failures);
        }
        if std::mem::take(&mut self.started) {
            info!(
                event = events::DRIVER_STOP,
                component = COMPONENT,
                driver = TRANSPORT,
                "driver stopped"
            );
        }
        ClipError::from_teardown(failures)
    }

    async fn make_requester(&mut self, _args: RequesterArgs) -> ClipResult<Arc<dyn Requester>> {
        Err(ClipError::unsupported(TRANSPORT, "make_requester"))
    }

    async fn make_publisher(&mut self, args: PublisherArgs) -> ClipResult<Arc<dyn Publisher>> {
        let topic = required_arg(TransportKind::Z0mq, "topic", args.topic.as_deref())?;
        self.ensure_started()?;

        let publisher = Arc::new(ZmqPublisher {
            name: args
                .publisher_name
                .unwrap_or_else(|| format!("zmq-publisher:{topic}")),
            topic,
            endpoint: self.settings.endpoint(),
            socket: Mutex::new(None),
        });
        self.publishers.push(publisher.clone());
        Ok(publisher)
    }

    async fn make_subscriber(&mut self, args: SubscriberArgs) -> ClipResult<Arc<dyn Subscriber>> {
        let topic = required_arg(TransportKind::Z0mq, "topic", args.topic.as_deref())?;
        let listener = required_callback(TransportKind::Z0mq, args.treatment_callback.as_ref())?;
        self.ensure_started()?;

        let subscriber = Arc::new(ZmqSubscriber {
            name: args
                .subscriber_name
                .unwrap_or_else(|| format!("zmq-subscriber:{topic}")),
            topic,
            endpoint: self.settings.endpoint(),
            listener,
            consume_loop: LoopSlot::new(),
        });
        self.subscribers.push(subscriber.clone());
        Ok(subscriber)
    }

    async fn make_service(&mut self, _args: ServiceArgs) -> ClipResult<Arc<dyn Service>> {
        Err(ClipError::unsupported(TRANSPORT, "make_service"))
    }
}

pub struct ZmqPublisher {
    name: String,
    topic: String,
    endpoint: String,
    socket: Mutex<Option<PubSocket>>,
}

#[async_trait]
impl Publisher for ZmqPublisher {
    async fn start(&self) -> ClipResult<()> {
        let mut socket = self.socket.lock().await;
        if socket.is_some() {
            return Ok(());
        }
        let mut bound = PubSocket::new();
        bound.bind(&self.endpoint).await?;
        info!(
            event = events::RUNTIME_SPAWN_OK,
            component = COMPONENT,
            publisher = self.name.as_str(),
            endpoint = self.endpoint.as_str(),
            "publisher bound"
        );
        *socket = Some(bound);
        Ok(())
    }

    async fn call(&self, msg: &str) -> ClipResult<()> {
        let mut socket = self.socket.lock().await;
        let socket = socket.as_mut().ok_or_else(|| {
            ClipError::InvalidState(format!("{} must be started before publishing", self.name))
        })?;
        debug!(
            event = events::PUBLISHER_SEND,
            component = COMPONENT,
            publisher = self.name.as_str(),
            topic = self.topic.as_str(),
            "publishing message"
        );
        socket
            .send(ZmqMessage::from(format!("{} {msg}", self.topic)))
            .await?;
        Ok(())
    }

    async fn stop(&self) -> ClipResult<()> {
        let Some(socket) = self.socket.lock().await.take() else {
            return Ok(());
        };
        let failures = socket
            .close()
            .await
            .into_iter()
            .map(ClipError::from)
            .collect();
        ClipError::from_teardown(failures)
    }
}

pub struct ZmqSubscriber {
    name: String,
    topic: String,
    endpoint: String,
    listener: Arc<dyn MessageListener>,
    consume_loop: LoopSlot<()>,
}

#[async_trait]
impl Subscriber for ZmqSubscriber {
    async fn start(&self) -> ClipResult<()> {
        let endpoint = self.endpoint.clone();
        let topic = self.topic.clone();
        let listener = self.listener.clone();
        let name = self.name.clone();
        self.consume_loop
            .start_with(|| {
                spawn_consume_loop(
                    thread_name(),
                    DEFAULT_START_TIMEOUT,
                    move |ready, shutdown| {
                        run_subscriber(endpoint, topic, listener, name, ready, shutdown)
                    },
                )
            })
            .await
    }

    async fn stop(&self) -> ClipResult<()> {
        self.consume_loop.stop().await
    }

    fn is_running(&self) -> bool {
        self.consume_loop.is_running()
    }
}

/// Reports ready once the endpoint parses. Connecting happens afterwards and keeps retrying
/// until a publisher binds or the loop is shut down.
async fn run_subscriber(
    endpoint: String,
    topic: String,
    listener: Arc<dyn MessageListener>,
    subscriber: String,
    ready: ReadySignal<()>,
    mut shutdown: ShutdownSignal,
) {
    if let Err(err) = endpoint.parse::<Endpoint>() {
        let _ = ready.send(Err(ClipError::configuration(format!(
            "invalid ZeroMQ endpoint {endpoint}: {err}"
        ))));
        return;
    }
    let _ = ready.send(Ok(()));

    let mut socket = SubSocket::new();
    let connected = tokio::select! {
        _ = &mut shutdown => false,
        connected = connect_and_subscribe(&mut socket, &endpoint, &topic) => match connected {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    event = events::SUBSCRIBER_CONNECT_FAILED,
                    component = COMPONENT,
                    subscriber = subscriber.as_str(),
                    endpoint = endpoint.as_str(),
                    err = %err,
                    "unable to connect subscriber"
                );
                false
            }
        }
    };

    while connected {
        tokio::select! {
            _ = &mut shutdown => break,
            received = socket.recv() => match received {
                Ok(message) => {
                    let Some(frame) = message.get(0) else {
                        continue;
                    };
                    let frame = String::from_utf8_lossy(frame);
                    deliver_message(&subscriber, listener.as_ref(), split_frame(&frame)).await;
                }
                Err(err) => {
                    warn!(
                        event = events::SUBSCRIBER_RECV_FAILED,
                        component = COMPONENT,
                        subscriber = subscriber.as_str(),
                        topic = topic.as_str(),
                        err = %err,
                        "receive failed"
                    );
                    tokio::time::sleep(RECV_FAILURE_BACKOFF).await;
                }
            }
        }
    }

    let _ = socket.close().await;
}

async fn connect_and_subscribe(
    socket: &mut SubSocket,
    endpoint: &str,
    topic: &str,
) -> ClipResult<()> {
    socket.connect(endpoint).await?;
    socket.subscribe(topic).await?;
    debug!(
        event = events::SUBSCRIBER_CONNECTED,
        component = COMPONENT,
        endpoint,
        topic,
        "subscriber connected"
    );
    Ok(())
}

/// `"<topic> <msg>"`, split at the first space.
pub(crate) fn split_frame(frame: &str) -> TopicMessage {
    let (topic, payload) = frame.split_once(' ').unwrap_or((frame, ""));
    TopicMessage {
        topic: topic.to_string(),
        payload: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_split_at_the_first_space() {
        let message = split_frame("test hello world");

        assert_eq!(message.topic, "test");
        assert_eq!(message.payload, "hello world");
    }

    #[test]
    fn frame_without_payload_has_empty_payload() {
        let message = split_frame("test");

        assert_eq!(message.topic, "test");
        assert_eq!(message.payload, "");
    }

    #[test]
    fn endpoint_defaults_to_localhost_6669() {
        let driver = ZmqDriver::new(&DriverConfig::new(TransportKind::Z0mq)).unwrap();

        assert_eq!(driver.endpoint(), "tcp://127.0.0.1:6669");
    }

    #[tokio::test]
    async fn requests_and_services_are_unsupported() {
        let mut driver = ZmqDriver::new(&DriverConfig::new(TransportKind::Z0mq)).unwrap();
        driver.start().await.unwrap();

        assert!(driver
            .make_requester(RequesterArgs::queue("q1"))
            .await
            .err()
            .unwrap()
            .is_unsupported());
        assert!(driver
            .make_service(ServiceArgs::default())
            .await
            .err()
            .unwrap()
            .is_unsupported());
    }

    #[tokio::test]
    async fn publisher_must_be_started_before_publishing() {
        let mut driver = ZmqDriver::new(&DriverConfig::new(TransportKind::Z0mq)).unwrap();
        driver.start().await.unwrap();
        let publisher = driver
            .make_publisher(PublisherArgs::new("test"))
            .await
            .unwrap();

        let err = publisher.call("hello").await.unwrap_err();

        assert!(matches!(err, ClipError::InvalidState(_)));
        publisher.stop().await.unwrap();
    }
}
