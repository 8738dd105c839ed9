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

use crate::config::{DriverConfig, TransportKind};
use crate::driver::Driver;
use crate::error::ClipResult;
use crate::observability::events;
use crate::transport::amqp::AmqpDriver;
use crate::transport::nats::NatsDriver;
use crate::transport::rest::RestDriver;
use crate::transport::zmq::ZmqDriver;
use tracing::debug;

/// Builds unstarted drivers from their configuration.
pub struct DriverFactory;

impl DriverFactory {
    /// Selects the transport from `type` and validates its mandatory settings.
    ///
    /// No connection is opened here; call [`Driver::start`] on the result.
    pub fn make(config: &DriverConfig) -> ClipResult<Box<dyn Driver>> {
        let kind = config.transport_kind()?;
        debug!(
            event = events::DRIVER_FACTORY_MAKE,
            component = "driver_factory",
            driver = kind.as_str(),
            "building driver"
        );

        let driver: Box<dyn Driver> = match kind {
            TransportKind::Rest => Box::new(RestDriver::new(config)?),
            TransportKind::Rbmq => Box::new(AmqpDriver::new(config)?),
            TransportKind::Z0mq => Box::new(ZmqDriver::new(config)?),
            TransportKind::Nats => Box::new(NatsDriver::new(config)?),
        };
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_a_configuration_error() {
        let config = DriverConfig {
            driver_type: Some("MQTT".to_string()),
            ..Default::default()
        };

        let err = DriverFactory::make(&config).err().expect("MQTT is not a driver");

        assert!(err.is_configuration());
    }

    #[test]
    fn missing_or_blank_type_is_a_configuration_error() {
        assert!(DriverFactory::make(&DriverConfig::default())
            .err()
            .expect("type is mandatory")
            .is_configuration());

        let blank = DriverConfig {
            driver_type: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(DriverFactory::make(&blank)
            .err()
            .expect("blank type is rejected")
            .is_configuration());
    }

    #[test]
    fn type_selects_the_driver() {
        let zeromq = DriverFactory::make(&DriverConfig::new(TransportKind::Z0mq)).unwrap();
        let rest = DriverFactory::make(
            &DriverConfig::new(TransportKind::Rest).with_base_url("http://localhost:6969/ariane"),
        )
        .unwrap();

        assert_eq!(zeromq.kind(), TransportKind::Z0mq);
        assert_eq!(rest.kind(), TransportKind::Rest);
    }

    #[test]
    fn transport_settings_are_validated_at_construction() {
        let err = DriverFactory::make(&DriverConfig::new(TransportKind::Rest))
            .err()
            .expect("REST needs base_url");

        assert!(err.is_configuration());
    }
}
