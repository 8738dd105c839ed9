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

#![allow(dead_code)]

use clip::{DriverConfig, TransportKind};
use std::time::Duration;

pub(crate) const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Broker settings for the live RabbitMQ scenarios, overridable through `CLIP_RBMQ_*`.
pub(crate) fn amqp_config() -> DriverConfig {
    DriverConfig::new(TransportKind::Rbmq)
        .with_host(&env_or("CLIP_RBMQ_HOST", "localhost"))
        .with_credentials(
            &env_or("CLIP_RBMQ_USER", "guest"),
            &env_or("CLIP_RBMQ_PASSWORD", "guest"),
        )
}

/// Server settings for the live NATS scenarios, overridable through `CLIP_NATS_*`.
pub(crate) fn nats_config() -> DriverConfig {
    DriverConfig::new(TransportKind::Nats)
        .with_host(&env_or("CLIP_NATS_HOST", "localhost"))
        .with_credentials(
            &env_or("CLIP_NATS_USER", "ariane"),
            &env_or("CLIP_NATS_PASSWORD", "password"),
        )
}

pub(crate) fn zeromq_config(port: u16) -> DriverConfig {
    DriverConfig::new(TransportKind::Z0mq)
        .with_host("127.0.0.1")
        .with_port(port)
}
