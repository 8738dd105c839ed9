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

//! # clip
//!
//! `clip` is the client transport substrate used to talk to an Ariane server over REST,
//! AMQP (RabbitMQ), ZeroMQ or NATS through one [`Driver`] contract.
//!
//! A [`DriverFactory`] turns a [`DriverConfig`] into an unstarted driver. Once started,
//! the driver builds the primitives its transport supports:
//!
//! | transport | requester | publisher / subscriber | service |
//! |-----------|-----------|------------------------|---------|
//! | `REST`    | yes       | no                     | no      |
//! | `RBMQ`    | yes       | no                     | yes     |
//! | `Z0MQ`    | no        | yes                    | no      |
//! | `NATS`    | yes       | yes                    | yes     |
//!
//! Unsupported combinations fail with [`ClipError::Unsupported`].
//!
//! ```
//! use clip::{DriverConfig, DriverFactory, PublisherArgs, RequesterArgs, TransportKind};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let mut driver = DriverFactory::make(&DriverConfig::new(TransportKind::Z0mq)).unwrap();
//! driver.start().await.unwrap();
//!
//! let _publisher = driver.make_publisher(PublisherArgs::new("test")).await.unwrap();
//! assert!(driver
//!     .make_requester(RequesterArgs::queue("q1"))
//!     .await
//!     .err()
//!     .unwrap()
//!     .is_unsupported());
//!
//! driver.stop().await.unwrap();
//! driver.stop().await.unwrap();
//! # });
//! ```
//!
//! ## Layout
//!
//! - `codec`: typed properties, the wire form of property lists and NATS envelopes.
//! - `response`: [`DriverResponse`], the uniform result of a requester call.
//! - `correlation`: one outstanding correlation id per requester, with a reply deadline.
//! - `runtime`: background consume loops, each on its own named thread and runtime.
//! - `transport`: the four driver implementations.
//!
//! ## Observability
//!
//! The crate emits `tracing` events carrying `event` and `component` fields; event names
//! are listed in `observability::events`. No subscriber is installed by the library.

pub mod codec;
pub mod config;
mod correlation;
pub mod driver;
mod driver_factory;
pub mod error;
#[doc(hidden)]
pub mod observability;
pub mod response;
mod runtime;
pub mod transport;

pub use codec::{Envelope, Properties, PropertyValue, ResponseContent, TypeTag, WireProperty};
pub use config::{DriverConfig, TransportKind};
pub use driver::{
    CallArgs, CallbackError, Driver, HttpOperation, MessageListener, Publisher, PublisherArgs,
    RequestMode, Requester, RequesterArgs, Service, ServiceArgs, Subscriber, SubscriberArgs,
    TopicMessage, TreatmentCallback, DEFAULT_REPLY_TIMEOUT,
};
pub use driver_factory::DriverFactory;
pub use error::{ClipError, ClipResult};
pub use response::DriverResponse;
