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

//! AMQP 0-9-1 (RabbitMQ) driver.
//!
//! One connection per driver, one channel per requester or service. Requests carry the
//! native `correlation_id`/`reply_to` properties plus the `MSG_CORRELATION_ID` header;
//! replies land on an exclusive, auto-deleted queue owned by the requester and are pumped
//! into its [`CorrelatedCall`] by a background consume loop.

use crate::codec::{Envelope, Properties, PropertyValue};
use crate::config::{AmqpSettings, DriverConfig, TransportKind};
use crate::correlation::{CorrelatedCall, ReplyMatcher};
use crate::driver::{
    required_arg, required_callback, CallArgs, Driver, Publisher, PublisherArgs, RequestMode,
    Requester, RequesterArgs, Service, ServiceArgs, Subscriber, SubscriberArgs,
    TreatmentCallback,
};
use crate::error::{ClipError, ClipResult};
use crate::observability::events;
use crate::response::DriverResponse;
use crate::runtime::worker_runtime::{
    build_runtime_thread_name, spawn_consume_loop, ReadySignal, ShutdownSignal,
    DEFAULT_START_TIMEOUT,
};
use crate::transport::{answer_request, record_teardown, AddressedReply, LoopSlot};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldArray, FieldTable, LongString, ShortString};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TRANSPORT: &str = "RBMQ";
const COMPONENT: &str = "amqp_driver";
const THREAD_PREFIX: &str = "clip-amqp-";
const CLOSE_OK: u16 = 200;

fn thread_name() -> String {
    build_runtime_thread_name(THREAD_PREFIX, &Uuid::new_v4().simple().to_string())
}

pub struct AmqpDriver {
    settings: AmqpSettings,
    connection: Option<Arc<Connection>>,
    requesters: Vec<Arc<AmqpRequester>>,
    services: Vec<Arc<AmqpService>>,
}

impl AmqpDriver {
    pub fn new(config: &DriverConfig) -> ClipResult<Self> {
        Ok(Self {
            settings: AmqpSettings::from_config(config)?,
            connection: None,
            requesters: Vec::new(),
            services: Vec::new(),
        })
    }

    pub fn settings(&self) -> &AmqpSettings {
        &self.settings
    }

    fn connection(&self) -> ClipResult<Arc<Connection>> {
        self.connection.clone().ok_or_else(|| {
            ClipError::InvalidState("RBMQ driver must be started before making children".into())
        })
    }

    /// Broker address taken field by field from the settings.
    fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.settings.user.clone(),
                    password: self.settings.password.clone(),
                },
                host: self.settings.host.clone(),
                port: self.settings.port,
            },
            vhost: self.settings.vhost.clone(),
            ..AMQPUri::default()
        }
    }

    fn connection_properties(&self) -> ConnectionProperties {
        let mut properties = ConnectionProperties::default();
        for (key, value) in &self.settings.client_properties {
            properties.client_properties.insert(
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.clone())),
            );
        }
        properties
    }
}

#[async_trait]
impl Driver for AmqpDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::Rbmq
    }

    async fn start(&mut self) -> ClipResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let connection = Connection::connect_uri(self.amqp_uri(), self.connection_properties())
            .await
            .map_err(|err| {
                warn!(
                    event = events::DRIVER_START_FAILED,
                    component = COMPONENT,
                    driver = TRANSPORT,
                    host = self.settings.host.as_str(),
                    port = self.settings.port,
                    err = %err,
                    "unable to connect to broker"
                );
                ClipError::from(err)
            })?;

        info!(
            event = events::DRIVER_START,
            component = COMPONENT,
            driver = TRANSPORT,
            host = self.settings.host.as_str(),
            port = self.settings.port,
            vhost = self.settings.vhost.as_str(),
            "connected to broker"
        );
        self.connection = Some(Arc::new(connection));
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

        if let Some(connection) = self.connection.take() {
            if connection.status().connected() {
                let result = connection
                    .close(CLOSE_OK, "OK")
                    .await
                    .map_err(ClipError::from);
                record_teardown(TRANSPORT, "connection", result, &mut failures);
            }
            info!(
                event = events::DRIVER_STOP,
                component = COMPONENT,
                driver = TRANSPORT,
                "disconnected from broker"
            );
        }

        ClipError::from_teardown(failures)
    }

    async fn make_requester(&mut self, args: RequesterArgs) -> ClipResult<Arc<dyn Requester>> {
        let request_q = required_arg(TransportKind::Rbmq, "request_q", args.request_q.as_deref())?;
        let connection = self.connection()?;

        let requester = Arc::new(AmqpRequester::open(&connection, request_q, &args).await?);
        self.requesters.push(requester.clone());
        Ok(requester)
    }

    async fn make_publisher(&mut self, _args: PublisherArgs) -> ClipResult<Arc<dyn Publisher>> {
        Err(ClipError::unsupported(TRANSPORT, "make_publisher"))
    }

    async fn make_subscriber(
        &mut self,
        _args: SubscriberArgs,
    ) -> ClipResult<Arc<dyn Subscriber>> {
        Err(ClipError::unsupported(TRANSPORT, "make_subscriber"))
    }

    async fn make_service(&mut self, args: ServiceArgs) -> ClipResult<Arc<dyn Service>> {
        let queue = required_arg(TransportKind::Rbmq, "service_q", args.service_q.as_deref())?;
        let callback = required_callback(TransportKind::Rbmq, args.treatment_callback.as_ref())?;
        let connection = self.connection()?;

        let service = Arc::new(AmqpService {
            name: args
                .service_name
                .unwrap_or_else(|| format!("amqp-service:{queue}")),
            queue,
            connection,
            callback,
            consume_loop: LoopSlot::new(),
        });
        self.services.push(service.clone());
        Ok(service)
    }
}

pub struct AmqpRequester {
    name: String,
    request_q: String,
    mode: RequestMode,
    channel: Channel,
    call: CorrelatedCall,
    reply_pump: LoopSlot<String>,
    stopped: AtomicBool,
}

impl AmqpRequester {
    async fn open(
        connection: &Connection,
        request_q: String,
        args: &RequesterArgs,
    ) -> ClipResult<Self> {
        let name = args
            .requester_name
            .clone()
            .unwrap_or_else(|| format!("amqp-requester:{request_q}"));
        let channel = connection.create_channel().await?;
        channel
            .queue_declare(
                &request_q,
                QueueDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let requester = Self {
            call: CorrelatedCall::new(&name, args.reply_timeout()),
            name,
            request_q,
            mode: args.mode,
            channel,
            reply_pump: LoopSlot::new(),
            stopped: AtomicBool::new(false),
        };

        if requester.mode == RequestMode::RequestReply {
            let channel = requester.channel.clone();
            let matcher = requester.call.matcher();
            let name = requester.name.clone();
            let reply_q = requester
                .reply_pump
                .start_with(|| {
                    spawn_consume_loop(
                        thread_name(),
                        DEFAULT_START_TIMEOUT,
                        move |ready, shutdown| {
                            run_reply_pump(channel, matcher, name, ready, shutdown)
                        },
                    )
                })
                .await?;
            debug!(
                event = events::RUNTIME_SPAWN_OK,
                component = COMPONENT,
                requester = requester.name.as_str(),
                queue = reply_q.as_str(),
                "reply queue ready"
            );
        }

        Ok(requester)
    }

    async fn publish(
        &self,
        envelope: &Envelope,
        correlation_id: Option<&str>,
        reply_to: Option<&str>,
    ) -> ClipResult<()> {
        let mut properties = BasicProperties::default();
        if let Some(correlation_id) = correlation_id {
            properties =
                properties.with_correlation_id(ShortString::from(correlation_id.to_string()));
        }
        if let Some(reply_to) = reply_to {
            properties = properties.with_reply_to(ShortString::from(reply_to.to_string()));
        }
        properties = properties.with_headers(to_amqp_headers(&envelope.properties));

        self.channel
            .basic_publish(
                "",
                &self.request_q,
                BasicPublishOptions::default(),
                &envelope.body,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Requester for AmqpRequester {
    async fn call(&self, args: CallArgs) -> ClipResult<DriverResponse> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ClipError::InvalidState(format!("{} is stopped", self.name)));
        }
        let envelope = args.into_envelope();

        if self.mode == RequestMode::FireAndForget {
            self.publish(&envelope, None, None).await?;
            return Ok(DriverResponse::new(0, None, None, None));
        }

        let reply_q = self.reply_pump.current().await.ok_or_else(|| {
            ClipError::transport(format!("{}: reply consumer is not running", self.name))
        })?;

        let reply = self
            .call
            .round_trip(|correlation_id| {
                let mut request = envelope;
                request.set_correlation_id(&correlation_id);
                let reply_q = reply_q.clone();
                async move {
                    self.publish(&request, Some(&correlation_id), Some(&reply_q))
                        .await
                }
            })
            .await?;

        Ok(DriverResponse::from_envelope(reply))
    }

    async fn stop(&self) -> ClipResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let pump = self.reply_pump.stop().await;
        let channel = if self.channel.status().connected() {
            self.channel
                .close(CLOSE_OK, "OK")
                .await
                .map_err(ClipError::from)
        } else {
            Ok(())
        };
        pump.and(channel)
    }
}

async fn run_reply_pump(
    channel: Channel,
    matcher: Arc<ReplyMatcher>,
    requester: String,
    ready: ReadySignal<String>,
    mut shutdown: ShutdownSignal,
) {
    let reply_queue = match channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(queue) => queue.name().as_str().to_string(),
        Err(err) => {
            let _ = ready.send(Err(err.into()));
            return;
        }
    };
    let mut consumer = match channel
        .basic_consume(
            &reply_queue,
            "",
            BasicConsumeOptions {
                no_ack: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(err) => {
            let _ = ready.send(Err(err.into()));
            return;
        }
    };
    let _ = ready.send(Ok(reply_queue.clone()));

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            delivery = consumer.next() => match delivery {
                Some(Ok(delivery)) => {
                    let (correlation_id, reply) = delivery_envelope(delivery);
                    matcher.offer(correlation_id.as_deref(), reply);
                }
                Some(Err(err)) => {
                    warn!(
                        event = events::CONSUME_LOOP_STREAM_CLOSED,
                        component = COMPONENT,
                        requester = requester.as_str(),
                        queue = reply_queue.as_str(),
                        err = %err,
                        "reply consumer failed"
                    );
                    break;
                }
                None => {
                    debug!(
                        event = events::CONSUME_LOOP_STREAM_CLOSED,
                        component = COMPONENT,
                        requester = requester.as_str(),
                        queue = reply_queue.as_str(),
                        "reply consumer closed"
                    );
                    break;
                }
            }
        }
    }
}

fn delivery_envelope(mut delivery: Delivery) -> (Option<String>, Envelope) {
    let data = std::mem::take(&mut delivery.data);
    inbound_envelope(&delivery.properties, data)
}

/// Splits message properties and body into a correlation id and an envelope.
///
/// The native property wins; the `MSG_CORRELATION_ID` header is the fallback.
fn inbound_envelope(properties: &BasicProperties, data: Vec<u8>) -> (Option<String>, Envelope) {
    let headers = properties
        .headers()
        .as_ref()
        .map(from_amqp_headers)
        .unwrap_or_default();
    let envelope = Envelope::new(headers, data);
    let correlation_id = properties
        .correlation_id()
        .as_ref()
        .map(|id| id.as_str().to_string())
        .or_else(|| envelope.correlation_id());
    (correlation_id, envelope)
}

pub struct AmqpService {
    name: String,
    queue: String,
    connection: Arc<Connection>,
    callback: Arc<dyn TreatmentCallback>,
    consume_loop: LoopSlot<()>,
}

#[async_trait]
impl Service for AmqpService {
    async fn start(&self) -> ClipResult<()> {
        let connection = self.connection.clone();
        let callback = self.callback.clone();
        let name = self.name.clone();
        let queue = self.queue.clone();
        self.consume_loop
            .start_with(|| {
                spawn_consume_loop(
                    thread_name(),
                    DEFAULT_START_TIMEOUT,
                    move |ready, shutdown| {
                        run_service(connection, queue, callback, name, ready, shutdown)
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

async fn run_service(
    connection: Arc<Connection>,
    queue: String,
    callback: Arc<dyn TreatmentCallback>,
    service: String,
    ready: ReadySignal<()>,
    mut shutdown: ShutdownSignal,
) {
    let (channel, mut consumer) = match open_service_consumer(&connection, &queue).await {
        Ok(opened) => opened,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    info!(
        event = events::RUNTIME_SPAWN_OK,
        component = COMPONENT,
        service = service.as_str(),
        queue = queue.as_str(),
        "service consuming"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            delivery = consumer.next() => match delivery {
                Some(Ok(delivery)) => {
                    serve_delivery(&channel, &service, callback.as_ref(), delivery).await;
                }
                Some(Err(err)) => {
                    warn!(
                        event = events::CONSUME_LOOP_STREAM_CLOSED,
                        component = COMPONENT,
                        service = service.as_str(),
                        queue = queue.as_str(),
                        err = %err,
                        "service consumer failed"
                    );
                    break;
                }
                None => break,
            }
        }
    }

    if channel.status().connected() {
        if let Err(err) = channel.close(CLOSE_OK, "OK").await {
            debug!(
                event = events::CONSUME_LOOP_STOPPED,
                component = COMPONENT,
                service = service.as_str(),
                err = %err,
                "service channel already closed"
            );
        }
    }
}

async fn open_service_consumer(
    connection: &Connection,
    queue: &str,
) -> ClipResult<(Channel, Consumer)> {
    let channel = connection.create_channel().await?;
    channel
        .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
        .await?;
    let consumer = channel
        .basic_consume(
            queue,
            "",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok((channel, consumer))
}

/// Treats one request, replies when asked to, then acks whatever the callback did.
async fn serve_delivery(
    channel: &Channel,
    service: &str,
    callback: &dyn TreatmentCallback,
    mut delivery: Delivery,
) {
    let reply_to = delivery
        .properties
        .reply_to()
        .as_ref()
        .map(|queue| queue.as_str().to_string());
    let data = std::mem::take(&mut delivery.data);
    let (correlation_id, request) = inbound_envelope(&delivery.properties, data);

    debug!(
        event = events::SERVICE_REQUEST_RECEIVE,
        component = COMPONENT,
        service,
        correlation_id = correlation_id.as_deref().unwrap_or("none"),
        "request received"
    );

    if let Some(reply) = answer_request(service, callback, request, correlation_id, reply_to).await
    {
        let published = match channel
            .basic_publish(
                "",
                &reply.reply_to,
                BasicPublishOptions::default(),
                &reply.envelope.body,
                reply_properties(&reply),
            )
            .await
        {
            Ok(confirm) => confirm.await.map(|_| ()),
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            warn!(
                event = events::SERVICE_REPLY_FAILED,
                component = COMPONENT,
                service,
                queue = reply.reply_to.as_str(),
                err = %err,
                "unable to publish reply"
            );
        }
    }

    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
        warn!(
            event = events::SERVICE_ACK_FAILED,
            component = COMPONENT,
            service,
            err = %err,
            "unable to ack request"
        );
    }
}

fn reply_properties(reply: &AddressedReply) -> BasicProperties {
    let mut properties = BasicProperties::default();
    if let Some(correlation_id) = &reply.correlation_id {
        properties = properties.with_correlation_id(ShortString::from(correlation_id.clone()));
    }
    properties.with_headers(to_amqp_headers(&reply.envelope.properties))
}

/// Native AMQP header table for a property map.
///
/// Every property keeps its kind on the wire: maps travel as nested field tables, so a
/// string header is always decoded as a string.
pub(crate) fn to_amqp_headers(properties: &Properties) -> FieldTable {
    let mut headers = FieldTable::default();
    for (name, value) in properties {
        headers.insert(ShortString::from(name.clone()), to_amqp_value(value));
    }
    headers
}

fn to_amqp_value(value: &PropertyValue) -> AMQPValue {
    match value {
        PropertyValue::String(s) => AMQPValue::LongString(LongString::from(s.clone())),
        PropertyValue::Long(l) => AMQPValue::LongLongInt(*l),
        PropertyValue::Double(d) => AMQPValue::Double(*d),
        PropertyValue::Boolean(b) => AMQPValue::Boolean(*b),
        PropertyValue::Array(items) => AMQPValue::FieldArray(FieldArray::from(
            items.iter().map(to_amqp_value).collect::<Vec<_>>(),
        )),
        PropertyValue::Map(map) => AMQPValue::FieldTable(json_table(map)),
    }
}

fn json_table(map: &Map<String, Value>) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in map {
        table.insert(ShortString::from(key.clone()), json_to_amqp(value));
    }
    table
}

fn json_to_amqp(value: &Value) -> AMQPValue {
    match value {
        Value::Null => AMQPValue::Void,
        Value::Bool(b) => AMQPValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(l) => AMQPValue::LongLongInt(l),
            None => n.as_f64().map(AMQPValue::Double).unwrap_or(AMQPValue::Void),
        },
        Value::String(s) => AMQPValue::LongString(LongString::from(s.clone())),
        Value::Array(items) => AMQPValue::FieldArray(FieldArray::from(
            items.iter().map(json_to_amqp).collect::<Vec<_>>(),
        )),
        Value::Object(map) => AMQPValue::FieldTable(json_table(map)),
    }
}

/// Property map for an AMQP header table. Values with no property counterpart are skipped.
pub(crate) fn from_amqp_headers(headers: &FieldTable) -> Properties {
    headers
        .inner()
        .iter()
        .filter_map(|(name, value)| {
            from_amqp_value(value).map(|value| (name.as_str().to_string(), value))
        })
        .collect()
}

fn from_amqp_value(value: &AMQPValue) -> Option<PropertyValue> {
    let property = match value {
        AMQPValue::Boolean(b) => PropertyValue::Boolean(*b),
        AMQPValue::ShortShortInt(i) => PropertyValue::Long(i64::from(*i)),
        AMQPValue::ShortShortUInt(i) => PropertyValue::Long(i64::from(*i)),
        AMQPValue::ShortInt(i) => PropertyValue::Long(i64::from(*i)),
        AMQPValue::ShortUInt(i) => PropertyValue::Long(i64::from(*i)),
        AMQPValue::LongInt(i) => PropertyValue::Long(i64::from(*i)),
        AMQPValue::LongUInt(i) => PropertyValue::Long(i64::from(*i)),
        AMQPValue::LongLongInt(i) => PropertyValue::Long(*i),
        AMQPValue::Timestamp(t) => PropertyValue::Long(i64::try_from(*t).ok()?),
        AMQPValue::Float(f) => PropertyValue::Double(f64::from(*f)),
        AMQPValue::Double(d) => PropertyValue::Double(*d),
        AMQPValue::ShortString(s) => PropertyValue::String(s.as_str().to_string()),
        AMQPValue::LongString(s) => {
            PropertyValue::String(String::from_utf8_lossy(s.as_bytes()).into_owned())
        }
        AMQPValue::FieldArray(items) => PropertyValue::Array(
            items.as_slice().iter().filter_map(from_amqp_value).collect(),
        ),
        AMQPValue::FieldTable(table) => PropertyValue::Map(table_json(table)),
        _ => return None,
    };
    Some(property)
}

fn table_json(table: &FieldTable) -> Map<String, Value> {
    table
        .inner()
        .iter()
        .filter_map(|(key, value)| {
            amqp_to_json(value).map(|value| (key.as_str().to_string(), value))
        })
        .collect()
}

fn amqp_to_json(value: &AMQPValue) -> Option<Value> {
    match value {
        AMQPValue::Void => Some(Value::Null),
        AMQPValue::FieldArray(items) => Some(Value::Array(
            items.as_slice().iter().filter_map(amqp_to_json).collect(),
        )),
        AMQPValue::FieldTable(table) => Some(Value::Object(table_json(table))),
        other => from_amqp_value(other).map(|property| property.to_json()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MSG_CORRELATION_ID, RC, SERVER_ERROR_MESSAGE};
    use serde_json::json;

    fn amqp_config() -> DriverConfig {
        DriverConfig::new(TransportKind::Rbmq)
            .with_credentials("ariane", "password")
            .with_host("localhost")
    }

    fn header<'a>(headers: &'a FieldTable, name: &str) -> &'a AMQPValue {
        headers
            .inner()
            .get(&ShortString::from(name.to_string()))
            .expect("header should be present")
    }

    #[test]
    fn properties_map_to_native_header_types() {
        let mut properties = Properties::new();
        properties.insert("OPERATION".to_string(), "getNode".into());
        properties.insert("ID".to_string(), 42i64.into());
        properties.insert("weight".to_string(), 1.5f64.into());
        properties.insert("strict".to_string(), true.into());
        properties.insert(
            "filters".to_string(),
            PropertyValue::Array(vec![1i64.into(), "two".into()]),
        );

        let headers = to_amqp_headers(&properties);

        assert_eq!(
            header(&headers, "OPERATION"),
            &AMQPValue::LongString(LongString::from("getNode".to_string()))
        );
        assert_eq!(header(&headers, "ID"), &AMQPValue::LongLongInt(42));
        assert_eq!(header(&headers, "weight"), &AMQPValue::Double(1.5));
        assert_eq!(header(&headers, "strict"), &AMQPValue::Boolean(true));
        assert_eq!(
            header(&headers, "filters"),
            &AMQPValue::FieldArray(FieldArray::from(vec![
                AMQPValue::LongLongInt(1),
                AMQPValue::LongString(LongString::from("two".to_string())),
            ]))
        );
    }

    #[test]
    fn maps_travel_as_nested_tables_and_come_back_as_maps() {
        let map = json!({"name": "dc1", "racks": [1, 2], "parent": null, "geo": {"lat": 4.5}})
            .as_object()
            .cloned()
            .unwrap();
        let mut properties = Properties::new();
        properties.insert("datacenter".to_string(), PropertyValue::Map(map.clone()));

        let headers = to_amqp_headers(&properties);

        assert!(matches!(header(&headers, "datacenter"), AMQPValue::FieldTable(_)));
        assert_eq!(
            from_amqp_headers(&headers).get("datacenter"),
            Some(&PropertyValue::Map(map))
        );
    }

    #[test]
    fn json_looking_strings_stay_strings() {
        let mut properties = Properties::new();
        properties.insert("filter".to_string(), r#"{"a":1}"#.into());
        properties.insert(
            "filters".to_string(),
            PropertyValue::Array(vec![r#"{"b":2}"#.into()]),
        );

        let decoded = from_amqp_headers(&to_amqp_headers(&properties));

        assert_eq!(
            decoded.get("filter"),
            Some(&PropertyValue::String(r#"{"a":1}"#.to_string()))
        );
        assert_eq!(
            decoded.get("filters"),
            Some(&PropertyValue::Array(vec![PropertyValue::String(
                r#"{"b":2}"#.to_string()
            )]))
        );
    }

    #[test]
    fn every_integer_width_decodes_to_long() {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(RC.to_string()), AMQPValue::LongInt(7));
        headers.insert(ShortString::from("small".to_string()), AMQPValue::ShortShortUInt(3));

        let properties = from_amqp_headers(&headers);

        assert_eq!(properties.get(RC), Some(&PropertyValue::Long(7)));
        assert_eq!(properties.get("small"), Some(&PropertyValue::Long(3)));
    }

    #[test]
    fn reserved_headers_pass_through_as_plain_strings() {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from(SERVER_ERROR_MESSAGE.to_string()),
            AMQPValue::LongString(LongString::from("{\"not\": \"a map\"}".to_string())),
        );
        headers.insert(
            ShortString::from(MSG_CORRELATION_ID.to_string()),
            AMQPValue::ShortString(ShortString::from("corr-1".to_string())),
        );

        let properties = from_amqp_headers(&headers);

        assert_eq!(
            properties.get(SERVER_ERROR_MESSAGE),
            Some(&PropertyValue::String("{\"not\": \"a map\"}".to_string()))
        );
        assert_eq!(
            properties.get(MSG_CORRELATION_ID),
            Some(&PropertyValue::String("corr-1".to_string()))
        );
    }

    #[test]
    fn unsupported_header_values_are_skipped() {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from("nothing".to_string()), AMQPValue::Void);

        assert!(from_amqp_headers(&headers).is_empty());
    }

    #[test]
    fn native_correlation_id_wins_over_the_header() {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from(MSG_CORRELATION_ID.to_string()),
            AMQPValue::LongString(LongString::from("from-header".to_string())),
        );
        let properties = BasicProperties::default()
            .with_correlation_id(ShortString::from("native".to_string()))
            .with_headers(headers.clone());

        let (correlation_id, envelope) = inbound_envelope(&properties, b"body".to_vec());
        assert_eq!(correlation_id.as_deref(), Some("native"));
        assert_eq!(envelope.body, b"body".to_vec());

        let (correlation_id, _) =
            inbound_envelope(&BasicProperties::default().with_headers(headers), Vec::new());
        assert_eq!(correlation_id.as_deref(), Some("from-header"));

        let (correlation_id, envelope) = inbound_envelope(&BasicProperties::default(), Vec::new());
        assert_eq!(correlation_id, None);
        assert!(envelope.properties.is_empty());
    }

    #[test]
    fn reply_carries_correlation_natively_and_in_headers() {
        let mut envelope = Envelope::default()
            .with_property(RC, 500i64)
            .with_property(SERVER_ERROR_MESSAGE, "boom");
        envelope.set_correlation_id("corr-3");
        let reply = AddressedReply {
            reply_to: "amq.reply".to_string(),
            correlation_id: Some("corr-3".to_string()),
            envelope,
        };

        let properties = reply_properties(&reply);

        assert_eq!(
            properties.correlation_id().as_ref().map(|id| id.as_str()),
            Some("corr-3")
        );
        let headers = from_amqp_headers(properties.headers().as_ref().unwrap());
        assert_eq!(headers.get(RC), Some(&PropertyValue::Long(500)));
        assert_eq!(
            headers.get(MSG_CORRELATION_ID),
            Some(&PropertyValue::String("corr-3".to_string()))
        );
    }

    #[test]
    fn broker_address_keeps_credentials_and_vhost_verbatim() {
        let driver = AmqpDriver::new(
            &DriverConfig::new(TransportKind::Rbmq)
                .with_credentials("ops@ariane", "p@ss:w/rd%20")
                .with_host("rabbit.local")
                .with_port(5673)
                .with_vhost("/"),
        )
        .unwrap();

        let uri = driver.amqp_uri();

        assert_eq!(uri.authority.userinfo.username, "ops@ariane");
        assert_eq!(uri.authority.userinfo.password, "p@ss:w/rd%20");
        assert_eq!(uri.authority.host, "rabbit.local");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn missing_mandatory_settings_fail_at_construction() {
        let err = AmqpDriver::new(&DriverConfig::new(TransportKind::Rbmq).with_host("localhost"))
            .err()
            .expect("user and password are mandatory");

        assert!(err.is_configuration());
    }

    #[test]
    fn client_properties_are_announced_as_long_strings() {
        let driver = AmqpDriver::new(&amqp_config().with_client_property("product", "tests"))
            .unwrap();

        let properties = driver.connection_properties();

        assert_eq!(
            properties
                .client_properties
                .inner()
                .get(&ShortString::from("product".to_string())),
            Some(&AMQPValue::LongString(LongString::from("tests".to_string())))
        );
    }

    #[tokio::test]
    async fn argument_validation_precedes_state_checks() {
        let mut driver = AmqpDriver::new(&amqp_config()).unwrap();

        let err = driver
            .make_requester(RequesterArgs::default())
            .await
            .err()
            .expect("request_q is mandatory");
        assert!(err.is_configuration());

        let err = driver
            .make_service(ServiceArgs::default())
            .await
            .err()
            .expect("service_q is mandatory");
        assert!(err.is_configuration());

        let err = driver
            .make_requester(RequesterArgs::queue("q1"))
            .await
            .err()
            .expect("unstarted driver must refuse");
        assert!(matches!(err, ClipError::InvalidState(_)));
    }

    #[tokio::test]
    async fn pub_sub_is_unsupported_and_stop_is_idempotent() {
        let mut driver = AmqpDriver::new(&amqp_config()).unwrap();

        assert!(driver
            .make_publisher(PublisherArgs::new("topic"))
            .await
            .err()
            .unwrap()
            .is_unsupported());
        assert!(driver
            .make_subscriber(SubscriberArgs::default())
            .await
            .err()
            .unwrap()
            .is_unsupported());

        driver.stop().await.unwrap();
        driver.stop().await.unwrap();
    }
}
