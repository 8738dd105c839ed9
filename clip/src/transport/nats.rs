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

//! NATS driver.
//!
//! Every requester, service, publisher and subscriber owns its own client, connected from
//! inside its consume loop thread so the client's connection task lives on that thread's
//! runtime. Stopping the loop closes the connection.

use crate::codec::{decode_envelope, encode_envelope, Envelope};
use crate::config::{DriverConfig, NatsSettings, TransportKind};
use crate::correlation::{CorrelatedCall, ReplyMatcher};
use crate::driver::{
    required_arg, required_callback, CallArgs, Driver, MessageListener, Publisher,
    PublisherArgs, RequestMode, Requester, RequesterArgs, Service, ServiceArgs, Subscriber,
    SubscriberArgs, TopicMessage, TreatmentCallback,
};
use crate::error::{ClipError, ClipResult};
use crate::observability::events;
use crate::response::DriverResponse;
use crate::runtime::worker_runtime::{
    build_runtime_thread_name, spawn_consume_loop, ReadySignal, ShutdownSignal,
    DEFAULT_START_TIMEOUT,
};
use crate::transport::{answer_request, deliver_message, record_teardown, LoopSlot};
use async_nats::{Client, ConnectOptions, Message};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TRANSPORT: &str = "NATS";
const COMPONENT: &str = "nats_driver";
const THREAD_PREFIX: &str = "clip-nats-";

fn nats_error(context: &str, err: impl Display) -> ClipError {
    ClipError::transport(format!("{context}: {err}"))
}

fn thread_name() -> String {
    build_runtime_thread_name(THREAD_PREFIX, &Uuid::new_v4().simple().to_string())
}

async fn connect(settings: &NatsSettings) -> ClipResult<Client> {
    let url = settings.server_url();
    ConnectOptions::with_user_and_password(settings.user.clone(), settings.password.clone())
        .name(settings.connection_name().as_str())
        .connect(url.as_str())
        .await
        .map_err(|err| nats_error(&format!("unable to connect to {url}"), err))
}

pub struct NatsDriver {
    settings: NatsSettings,
    started: bool,
    requesters: Vec<Arc<NatsRequester>>,
    services: Vec<Arc<NatsService>>,
    publishers: Vec<Arc<NatsPublisher>>,
    subscribers: Vec<Arc<NatsSubscriber>>,
}

impl NatsDriver {
    pub fn new(config: &DriverConfig) -> ClipResult<Self> {
        Ok(Self {
            settings: NatsSettings::from_config(config)?,
            started: false,
            requesters: Vec::new(),
            services: Vec::new(),
            publishers: Vec::new(),
            subscribers: Vec::new(),
        })
    }

    pub fn settings(&self) -> &NatsSettings {
        &self.settings
    }

    fn ensure_started(&self) -> ClipResult<()> {
        if self.started {
            Ok(())
        } else {
            Err(ClipError::InvalidState(
                "NATS driver must be started before making children".into(),
            ))
        }
    }
}

#[async_trait]
impl Driver for NatsDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::Nats
    }

    async fn start(&mut self) -> ClipResult<()> {
        if !self.started {
            info!(
                event = events::DRIVER_START,
                component = COMPONENT,
                driver = TRANSPORT,
                server = %self.settings.server_url(),
                "driver started"
            );
            self.started = true;
        }
        Ok(())
    }

    async fn stop(&mut self) -> ClipResult<()> {
        let mut failures = Vec::new();
        for requester in self.requesters.drain(..) {
            let result = requester.stop().await;
            record_teardown(TRANSPORT, &requester.name, result, &mut failures);
        }
        for service in self.services.drain(..) {
            let result = service.stop().await;
            record_teardown(TRANSPORT, &service.name, result, &mut failures);
        }
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

    async fn make_requester(&mut self, args: RequesterArgs) -> ClipResult<Arc<dyn Requester>> {
        let subject = required_arg(TransportKind::Nats, "request_q", args.request_q.as_deref())?;
        self.ensure_started()?;

        let requester = Arc::new(NatsRequester::open(&self.settings, subject, &args).await?);
        self.requesters.push(requester.clone());
        Ok(requester)
    }

    async fn make_publisher(&mut self, args: PublisherArgs) -> ClipResult<Arc<dyn Publisher>> {
        let subject = required_arg(TransportKind::Nats, "topic", args.topic.as_deref())?;
        self.ensure_started()?;

        let publisher = Arc::new(NatsPublisher {
            name: args
                .publisher_name
                .unwrap_or_else(|| format!("nats-publisher:{subject}")),
            subject,
            settings: self.settings.clone(),
            link: LoopSlot::new(),
        });
        self.publishers.push(publisher.clone());
        Ok(publisher)
    }

    async fn make_subscriber(&mut self, args: SubscriberArgs) -> ClipResult<Arc<dyn Subscriber>> {
        let subject = required_arg(TransportKind::Nats, "topic", args.topic.as_deref())?;
        let listener = required_callback(TransportKind::Nats, args.treatment_callback.as_ref())?;
        self.ensure_started()?;

        let subscriber = Arc::new(NatsSubscriber {
            name: args
                .subscriber_name
                .unwrap_or_else(|| format!("nats-subscriber:{subject}")),
            subject,
            settings: self.settings.clone(),
            listener,
            consume_loop: LoopSlot::new(),
        });
        self.subscribers.push(subscriber.clone());
        Ok(subscriber)
    }

    async fn make_service(&mut self, args: ServiceArgs) -> ClipResult<Arc<dyn Service>> {
        let subject = required_arg(TransportKind::Nats, "service_q", args.service_q.as_deref())?;
        let callback = required_callback(TransportKind::Nats, args.treatment_callback.as_ref())?;
        self.ensure_started()?;

        let service = Arc::new(NatsService {
            name: args
                .service_name
                .unwrap_or_else(|| format!("nats-service:{subject}")),
            subject,
            settings: self.settings.clone(),
            callback,
            consume_loop: LoopSlot::new(),
        });
        self.services.push(service.clone());
        Ok(service)
    }
}

#[derive(Clone)]
struct RequesterLink {
    client: Client,
    inbox: Option<String>,
}

pub struct NatsRequester {
    name: String,
    subject: String,
    mode: RequestMode,
    call: CorrelatedCall,
    link: LoopSlot<RequesterLink>,
    stopped: AtomicBool,
}

impl NatsRequester {
    async fn open(
        settings: &NatsSettings,
        subject: String,
        args: &RequesterArgs,
    ) -> ClipResult<Self> {
        let name = args
            .requester_name
            .clone()
            .unwrap_or_else(|| format!("nats-requester:{subject}"));
        let requester = Self {
            call: CorrelatedCall::new(&name, args.reply_timeout()),
            name,
            subject,
            mode: args.mode,
            link: LoopSlot::new(),
            stopped: AtomicBool::new(false),
        };

        let settings = settings.clone();
        let matcher = requester.call.matcher();
        let listen = requester.mode == RequestMode::RequestReply;
        let name = requester.name.clone();
        requester
            .link
            .start_with(|| {
                spawn_consume_loop(
                    thread_name(),
                    DEFAULT_START_TIMEOUT,
                    move |ready, shutdown| {
                        run_reply_pump(settings, listen, matcher, name, ready, shutdown)
                    },
                )
            })
            .await?;

        Ok(requester)
    }
}

#[async_trait]
impl Requester for NatsRequester {
    async fn call(&self, args: CallArgs) -> ClipResult<DriverResponse> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ClipError::InvalidState(format!("{} is stopped", self.name)));
        }
        let link = self.link.current().await.ok_or_else(|| {
            ClipError::transport(format!("{}: connection loop is not running", self.name))
        })?;
        let mut request = args.into_envelope();

        let inbox = match (self.mode, link.inbox) {
            (RequestMode::RequestReply, Some(inbox)) => inbox,
            _ => {
                let payload = encode_envelope(&request)?;
                link.client
                    .publish(self.subject.clone(), Bytes::from(payload))
                    .await
                    .map_err(|err| nats_error("unable to publish request", err))?;
                link.client
                    .flush()
                    .await
                    .map_err(|err| nats_error("unable to flush request", err))?;
                return Ok(DriverResponse::new(0, None, None, None));
            }
        };

        let client = link.client;
        let reply = self
            .call
            .round_trip(|correlation_id| {
                request.set_correlation_id(&correlation_id);
                async move {
                    let payload = encode_envelope(&request)?;
                    client
                        .publish_with_reply(self.subject.clone(), inbox, Bytes::from(payload))
                        .await
                        .map_err(|err| nats_error("unable to publish request", err))?;
                    client
                        .flush()
                        .await
                        .map_err(|err| nats_error("unable to flush request", err))
                }
            })
            .await?;

        Ok(DriverResponse::from_envelope(reply))
    }

    async fn stop(&self) -> ClipResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.link.stop().await
    }
}

async fn run_reply_pump(
    settings: NatsSettings,
    listen: bool,
    matcher: Arc<ReplyMatcher>,
    requester: String,
    ready: ReadySignal<RequesterLink>,
    mut shutdown: ShutdownSignal,
) {
    let client = match connect(&settings).await {
        Ok(client) => client,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    if !listen {
        let _ = ready.send(Ok(RequesterLink {
            client: client.clone(),
            inbox: None,
        }));
        let _ = shutdown.await;
        let _ = client.flush().await;
        return;
    }

    let inbox = client.new_inbox();
    let mut replies = match client.subscribe(inbox.clone()).await {
        Ok(replies) => replies,
        Err(err) => {
            let _ = ready.send(Err(nats_error("unable to subscribe to reply inbox", err)));
            return;
        }
    };
    let _ = ready.send(Ok(RequesterLink {
        client: client.clone(),
        inbox: Some(inbox.clone()),
    }));

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = replies.next() => match message {
                Some(message) => match decode_envelope(&message.payload) {
                    Ok(reply) => {
                        let correlation_id = reply.correlation_id();
                        matcher.offer(correlation_id.as_deref(), reply);
                    }
                    Err(err) => warn!(
                        event = events::REPLY_DECODE_FAILED,
                        component = COMPONENT,
                        requester = requester.as_str(),
                        subject = inbox.as_str(),
                        err = %err,
                        "dropping undecodable reply"
                    ),
                },
                None => {
                    debug!(
                        event = events::CONSUME_LOOP_STREAM_CLOSED,
                        component = COMPONENT,
                        requester = requester.as_str(),
                        subject = inbox.as_str(),
                        "reply subscription closed"
                    );
                    break;
                }
            }
        }
    }

    let _ = replies.unsubscribe().await;
}

pub struct NatsService {
    name: String,
    subject: String,
    settings: NatsSettings,
    callback: Arc<dyn TreatmentCallback>,
    consume_loop: LoopSlot<()>,
}

#[async_trait]
impl Service for NatsService {
    async fn start(&self) -> ClipResult<()> {
        let settings = self.settings.clone();
        let subject = self.subject.clone();
        let callback = self.callback.clone();
        let name = self.name.clone();
        self.consume_loop
            .start_with(|| {
                spawn_consume_loop(thread_name(), DEFAULT_START_TIMEOUT, move |ready, shutdown| {
                    run_service(settings, subject, callback, name, ready, shutdown)
                })
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

async fn run_service(
    settings: NatsSettings,
    subject: String,
    callback: Arc<dyn TreatmentCallback>,
    service: String,
    ready: ReadySignal<()>,
    mut shutdown: ShutdownSignal,
) {
    let client = match connect(&settings).await {
        Ok(client) => client,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    // Instances serving the same subject share the load, like consumers of one AMQP queue.
    let mut requests = match client.queue_subscribe(subject.clone(), subject.clone()).await {
        Ok(requests) => requests,
        Err(err) => {
            let _ = ready.send(Err(nats_error("unable to subscribe service subject", err)));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    info!(
        event = events::RUNTIME_SPAWN_OK,
        component = COMPONENT,
        service = service.as_str(),
        subject = subject.as_str(),
        "service subscribed"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = requests.next() => match message {
                Some(message) => serve_message(&client, &service, callback.as_ref(), message).await,
                None => break,
            }
        }
    }

    let _ = requests.unsubscribe().await;
    let _ = client.flush().await;
}

async fn serve_message(
    client: &Client,
    service: &str,
    callback: &dyn TreatmentCallback,
    message: Message,
) {
    let reply_subject = message.reply.as_ref().map(|subject| subject.to_string());
    match answer_payload(service, callback, &message.payload, reply_subject).await {
        Ok(Some((reply_subject, payload))) => {
            if let Err(err) = client
                .publish(reply_subject.clone(), Bytes::from(payload))
                .await
            {
                warn!(
                    event = events::SERVICE_REPLY_FAILED,
                    component = COMPONENT,
                    service,
                    subject = reply_subject.as_str(),
                    err = %err,
                    "unable to reply"
                );
            }
        }
        Ok(None) => {}
        Err(err) => warn!(
            event = events::REPLY_DECODE_FAILED,
            component = COMPONENT,
            service,
            subject = message.subject.as_str(),
            err = %err,
            "dropping request"
        ),
    }
}

/// Reply subject and encoded reply for one request payload.
async fn answer_payload(
    service: &str,
    callback: &dyn TreatmentCallback,
    payload: &[u8],
    reply_subject: Option<String>,
) -> ClipResult<Option<(String, Vec<u8>)>> {
    let request = decode_envelope(payload)?;
    let correlation_id = request.correlation_id();
    debug!(
        event = events::SERVICE_REQUEST_RECEIVE,
        component = COMPONENT,
        service,
        correlation_id = correlation_id.as_deref().unwrap_or("none"),
        "request received"
    );

    match answer_request(service, callback, request, correlation_id, reply_subject).await {
        Some(reply) => Ok(Some((reply.reply_to, encode_envelope(&reply.envelope)?))),
        None => Ok(None),
    }
}

pub struct NatsPublisher {
    name: String,
    subject: String,
    settings: NatsSettings,
    link: LoopSlot<Client>,
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn start(&self) -> ClipResult<()> {
        let settings = self.settings.clone();
        self.link
            .start_with(|| {
                spawn_consume_loop(
                    thread_name(),
                    DEFAULT_START_TIMEOUT,
                    move |ready: ReadySignal<Client>, shutdown: ShutdownSignal| async move {
                        let client = match connect(&settings).await {
                            Ok(client) => client,
                            Err(err) => {
                                let _ = ready.send(Err(err));
                                return;
                            }
                        };
                        let _ = ready.send(Ok(client.clone()));
                        let _ = shutdown.await;
                        let _ = client.flush().await;
                    },
                )
            })
            .await
            .map(|_| ())
    }

    async fn call(&self, msg: &str) -> ClipResult<()> {
        let client = self.link.current().await.ok_or_else(|| {
            ClipError::InvalidState(format!("{} must be started before publishing", self.name))
        })?;
        debug!(
            event = events::PUBLISHER_SEND,
            component = COMPONENT,
            publisher = self.name.as_str(),
            subject = self.subject.as_str(),
            "publishing message"
        );
        client
            .publish(self.subject.clone(), Bytes::from(msg.to_string()))
            .await
            .map_err(|err| nats_error("unable to publish message", err))?;
        client
            .flush()
            .await
            .map_err(|err| nats_error("unable to flush message", err))
    }

    async fn stop(&self) -> ClipResult<()> {
        self.link.stop().await
    }
}

pub struct NatsSubscriber {
    name: String,
    subject: String,
    settings: NatsSettings,
    listener: Arc<dyn MessageListener>,
    consume_loop: LoopSlot<()>,
}

#[async_trait]
impl Subscriber for NatsSubscriber {
    async fn start(&self) -> ClipResult<()> {
        let settings = self.settings.clone();
        let subject = self.subject.clone();
        let listener = self.listener.clone();
        let name = self.name.clone();
        self.consume_loop
            .start_with(|| {
                spawn_consume_loop(thread_name(), DEFAULT_START_TIMEOUT, move |ready, shutdown| {
                    run_subscriber(settings, subject, listener, name, ready, shutdown)
                })
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

async fn run_subscriber(
    settings: NatsSettings,
    subject: String,
    listener: Arc<dyn MessageListener>,
    subscriber: String,
    ready: ReadySignal<()>,
    mut shutdown: ShutdownSignal,
) {
    let client = match connect(&settings).await {
        Ok(client) => client,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let mut messages = match client.subscribe(subject.clone()).await {
        Ok(messages) => messages,
        Err(err) => {
            let _ = ready.send(Err(nats_error("unable to subscribe", err)));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = messages.next() => match message {
                Some(message) => {
                    let message = TopicMessage {
                        topic: message.subject.to_string(),
                        payload: String::from_utf8_lossy(&message.payload).into_owned(),
                    };
                    deliver_message(&subscriber, listener.as_ref(), message).await;
                }
                None => {
                    debug!(
                        event = events::CONSUME_LOOP_STREAM_CLOSED,
                        component = COMPONENT,
                        subscriber = subscriber.as_str(),
                        subject = subject.as_str(),
                        "subscription closed"
                    );
                    break;
                }
            }
        }
    }

    let _ = messages.unsubscribe().await;
}
