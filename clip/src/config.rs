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

//! Driver configuration.
//!
//! [`DriverConfig`] mirrors the loosely typed key set every transport reads from.
//! Each driver validates the keys it needs into its own settings struct at
//! construction time, so a missing key fails fast with
//! [`ClipError::Configuration`].

use crate::error::{ClipError, ClipResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_AMQP_PORT: u16 = 5672;
pub const DEFAULT_AMQP_VHOST: &str = "/";
pub const DEFAULT_NATS_PORT: u16 = 4222;
pub const DEFAULT_ZEROMQ_HOST: &str = "127.0.0.1";
pub const DEFAULT_ZEROMQ_PORT: u16 = 6669;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Rest,
    Rbmq,
    Z0mq,
    Nats,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Rest => "REST",
            TransportKind::Rbmq => "RBMQ",
            TransportKind::Z0mq => "Z0MQ",
            TransportKind::Nats => "NATS",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ClipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REST" => Ok(TransportKind::Rest),
            "RBMQ" => Ok(TransportKind::Rbmq),
            "Z0MQ" => Ok(TransportKind::Z0mq),
            "NATS" => Ok(TransportKind::Nats),
            "" => Err(ClipError::configuration("driver type is empty")),
            other => Err(ClipError::configuration(format!(
                "unknown driver type `{other}`"
            ))),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    #[serde(rename = "type", default)]
    pub driver_type: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub vhost: Option<String>,
    #[serde(default)]
    pub client_properties: Option<BTreeMap<String, String>>,
}

impl DriverConfig {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            driver_type: Some(kind.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn from_json5_str(contents: &str) -> ClipResult<Self> {
        json5::from_str(contents).map_err(|e| {
            ClipError::configuration(format!("unable to parse driver configuration: {e}"))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> ClipResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClipError::configuration(format!("unable to read {}: {e}", path.display()))
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn transport_kind(&self) -> ClipResult<TransportKind> {
        match self.driver_type.as_deref() {
            Some(driver_type) => driver_type.parse(),
            None => Err(ClipError::configuration("driver type is missing")),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_vhost(mut self, vhost: &str) -> Self {
        self.vhost = Some(vhost.to_string());
        self
    }

    pub fn with_client_property(mut self, key: &str, value: &str) -> Self {
        self.client_properties
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    fn required(
        &self,
        key: &str,
        value: &Option<String>,
        transport: TransportKind,
    ) -> ClipResult<String> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(ClipError::configuration(format!(
                "{transport} driver requires a non empty `{key}`"
            ))),
        }
    }

    fn merged_client_properties(&self) -> BTreeMap<String, String> {
        let mut properties = default_client_properties();
        if let Some(custom) = &self.client_properties {
            properties.extend(custom.clone());
        }
        properties
    }
}

/// Client properties announced to brokers, overridable through `client_properties`.
pub fn default_client_properties() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("product".to_string(), "Ariane CLIP".to_string()),
        (
            "information".to_string(),
            "Ariane client library over REST, AMQP, ZeroMQ and NATS".to_string(),
        ),
        ("platform".to_string(), "Rust".to_string()),
        ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestSettings {
    pub base_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl RestSettings {
    pub fn from_config(config: &DriverConfig) -> ClipResult<Self> {
        let base_url = config.required("base_url", &config.base_url, TransportKind::Rest)?;
        Ok(Self {
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmqpSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub client_properties: BTreeMap<String, String>,
}

impl AmqpSettings {
    pub fn from_config(config: &DriverConfig) -> ClipResult<Self> {
        let kind = TransportKind::Rbmq;
        Ok(Self {
            user: config.required("user", &config.user, kind)?,
            password: config.required("password", &config.password, kind)?,
            host: config.required("host", &config.host, kind)?,
            port: config.port.unwrap_or(DEFAULT_AMQP_PORT),
            vhost: config
                .vhost
                .clone()
                .filter(|vhost| !vhost.is_empty())
                .unwrap_or_else(|| DEFAULT_AMQP_VHOST.to_string()),
            client_properties: config.merged_client_properties(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NatsSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub client_properties: BTreeMap<String, String>,
}

impl NatsSettings {
    pub fn from_config(config: &DriverConfig) -> ClipResult<Self> {
        let kind = TransportKind::Nats;
        Ok(Self {
            user: config.required("user", &config.user, kind)?,
            password: config.required("password", &config.password, kind)?,
            host: config.required("host", &config.host, kind)?,
            port: config.port.unwrap_or(DEFAULT_NATS_PORT),
            client_properties: config.merged_client_properties(),
        })
    }

    pub fn server_url(&self) -> String {
        format!("nats://{}:{}", self.host, self.port)
    }

    /// Connection name announced to the server.
    pub fn connection_name(&self) -> String {
        let product = self
            .client_properties
            .get("product")
            .map(String::as_str)
            .unwrap_or("Ariane CLIP");
        match self.client_properties.get("version") {
            Some(version) => format!("{product} {version}"),
            None => product.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZeromqSettings {
    pub host: String,
    pub port: u16,
}

impl ZeromqSettings {
    pub fn from_config(config: &DriverConfig) -> ClipResult<Self> {
        Ok(Self {
            host: config
                .host
                .clone()
                .filter(|host| !host.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ZEROMQ_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_ZEROMQ_PORT),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_parses_known_tags_case_insensitively() {
        assert_eq!("REST".parse::<TransportKind>().unwrap(), TransportKind::Rest);
        assert_eq!("rbmq".parse::<TransportKind>().unwrap(), TransportKind::Rbmq);
        assert_eq!("Z0MQ".parse::<TransportKind>().unwrap(), TransportKind::Z0mq);
        assert_eq!(" nats ".parse::<TransportKind>().unwrap(), TransportKind::Nats);
    }

    #[test]
    fn transport_kind_rejects_unknown_and_empty_tags() {
        assert!("UNKNOWN".parse::<TransportKind>().unwrap_err().is_configuration());
        assert!("".parse::<TransportKind>().unwrap_err().is_configuration());
    }

    #[test]
    fn missing_type_is_a_configuration_error() {
        assert!(DriverConfig::default()
            .transport_kind()
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn json5_config_is_parsed() {
        let config = DriverConfig::from_json5_str(
            r#"{
                // broker settings
                type: "RBMQ",
                user: "ariane",
                password: "password",
                host: "localhost",
                client_properties: { product: "injector" },
            }"#,
        )
        .expect("config should parse");

        let settings = AmqpSettings::from_config(&config).expect("settings should validate");
        assert_eq!(settings.port, DEFAULT_AMQP_PORT);
        assert_eq!(settings.vhost, "/");
        assert_eq!(settings.client_properties["product"], "injector");
        assert_eq!(settings.client_properties["platform"], "Rust");
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(DriverConfig::from_json5_str(r#"{ type: "REST", colour: "red" }"#)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn amqp_settings_require_user_password_and_host() {
        let config = DriverConfig::new(TransportKind::Rbmq).with_host("localhost");

        let err = AmqpSettings::from_config(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("`user`"));
    }

    #[test]
    fn nats_settings_default_to_the_nats_port() {
        let config = DriverConfig::new(TransportKind::Nats)
            .with_credentials("ariane", "password")
            .with_host("localhost");

        let settings = NatsSettings::from_config(&config).unwrap();
        assert_eq!(settings.port, DEFAULT_NATS_PORT);
        assert_eq!(settings.server_url(), "nats://localhost:4222");
    }

    #[test]
    fn zeromq_settings_default_to_loopback() {
        let settings =
            ZeromqSettings::from_config(&DriverConfig::new(TransportKind::Z0mq)).unwrap();

        assert_eq!(settings.endpoint(), "tcp://127.0.0.1:6669");
    }

    #[test]
    fn rest_settings_reject_blank_base_url() {
        let config = DriverConfig::new(TransportKind::Rest).with_base_url("  ");

        assert!(RestSettings::from_config(&config).unwrap_err().is_configuration());
    }
}
