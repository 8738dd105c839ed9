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

mod support;

use clip::{
    DriverConfig, DriverFactory, PublisherArgs, RequesterArgs, ServiceArgs, SubscriberArgs,
    TransportKind,
};
use integration_test_utils::{CountingService, RecordingListener};
use std::sync::Arc;

#[test]
fn factory_builds_a_driver_from_a_json5_file() {
    integration_test_utils::init_logging();

    let config = DriverConfig::from_file("tests/configs/rest_driver.json5")
        .expect("fixture should parse");
    let driver = DriverFactory::make(&config).expect("REST config is complete");

    assert_eq!(driver.kind(), TransportKind::Rest);
}

#[test]
fn nats_config_keeps_custom_client_properties() {
    let config = DriverConfig::from_file("tests/configs/nats_driver.json5")
        .expect("fixture should parse");

    assert_eq!(config.transport_kind().unwrap(), TransportKind::Nats);
    assert_eq!(
        config
            .client_properties
            .as_ref()
            .and_then(|properties| properties.get("product"))
            .map(String::as_str),
        Some("Ariane CLIP tests")
    );
    assert_eq!(DriverFactory::make(&config).unwrap().kind(), TransportKind::Nats);
}

#[test]
fn factory_rejects_unknown_fields_and_types() {
    assert!(DriverConfig::from_json5_str("{ type: 'REST', bogus: 1 }")
        .unwrap_err()
        .is_configuration());

    let config = DriverConfig::from_json5_str("{ type: 'SOAP' }").unwrap();
    assert!(DriverFactory::make(&config)
        .err()
        .expect("SOAP is not a transport")
        .is_configuration());
}

#[test]
fn factory_validates_mandatory_transport_settings() {
    for config in [
        DriverConfig::new(TransportKind::Rest),
        DriverConfig::new(TransportKind::Rbmq).with_host("localhost"),
        DriverConfig::new(TransportKind::Nats).with_credentials("ariane", "password"),
    ] {
        assert!(DriverFactory::make(&config)
            .err()
            .expect("mandatory setting is missing")
            .is_configuration());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_primitives_fail_with_a_typed_error() {
    integration_test_utils::init_logging();

    let listener = Arc::new(RecordingListener::new());
    let callback = Arc::new(CountingService::new());

    let mut rest = DriverFactory::make(
        &DriverConfig::new(TransportKind::Rest).with_base_url("http://localhost:6969/ariane"),
    )
    .unwrap();
    rest.start().await.unwrap();
    assert!(rest
        .make_publisher(PublisherArgs::new("test"))
        .await
        .err()
        .unwrap()
        .is_unsupported());
    assert!(rest
        .make_subscriber(SubscriberArgs::new("test", listener.clone()))
        .await
        .err()
        .unwrap()
        .is_unsupported());
    assert!(rest
        .make_service(ServiceArgs::new("q1", callback.clone()))
        .await
        .err()
        .unwrap()
        .is_unsupported());

    let mut zeromq = DriverFactory::make(&support::zeromq_config(6679)).unwrap();
    zeromq.start().await.unwrap();
    assert!(zeromq
        .make_requester(RequesterArgs::queue("q1"))
        .await
        .err()
        .unwrap()
        .is_unsupported());
    assert!(zeromq
        .make_service(ServiceArgs::new("q1", callback))
        .await
        .err()
        .unwrap()
        .is_unsupported());

    let mut amqp = DriverFactory::make(&support::amqp_config()).unwrap();
    assert!(amqp
        .make_publisher(PublisherArgs::new("test"))
        .await
        .err()
        .unwrap()
        .is_unsupported());
    assert!(amqp
        .make_subscriber(SubscriberArgs::new("test", listener))
        .await
        .err()
        .unwrap()
        .is_unsupported());

    rest.stop().await.unwrap();
    zeromq.stop().await.unwrap();
    amqp.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_any_driver_twice_is_ok() {
    integration_test_utils::init_logging();

    let configs = [
        DriverConfig::new(TransportKind::Rest).with_base_url("http://localhost:6969/ariane"),
        support::amqp_config(),
        support::zeromq_config(6678),
        support::nats_config(),
    ];

    for config in configs {
        let mut driver = DriverFactory::make(&config).unwrap();
        driver.stop().await.unwrap();
        driver.stop().await.unwrap();
    }
}
