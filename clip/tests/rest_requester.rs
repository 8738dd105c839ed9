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

use clip::{
    CallArgs, ClipError, Driver, DriverConfig, DriverFactory, HttpOperation, Properties,
    PropertyValue, RequesterArgs, ResponseContent, TransportKind,
};
use integration_test_utils::{CannedResponse, HttpStub};
use serde_json::json;

async fn started_driver(stub: &HttpStub) -> Box<dyn Driver> {
    let config = DriverConfig::new(TransportKind::Rest)
        .with_base_url(&format!("{}/ariane/", stub.base_url()))
        .with_credentials("yoda", "secure123");
    let mut driver = DriverFactory::make(&config).expect("REST config is complete");
    driver.start().await.expect("REST driver starts without network");
    driver
}

#[tokio::test(flavor = "multi_thread")]
async fn get_with_parameters_returns_decoded_json() {
    integration_test_utils::init_logging();

    let stub = HttpStub::start(vec![CannedResponse::json(
        r#"{"datacenterID": 12, "datacenterName": "dc1"}"#,
    )])
    .await
    .unwrap();
    let mut driver = started_driver(&stub).await;
    let requester = driver
        .make_requester(RequesterArgs::rest("/rest/domain/datacenters"))
        .await
        .unwrap();

    let mut parameters = Properties::new();
    parameters.insert("ID".to_string(), PropertyValue::from(12i64));
    parameters.insert("name".to_string(), PropertyValue::from("dc1"));
    let response = requester
        .call(CallArgs::http(HttpOperation::Get, "get").with_parameters(parameters))
        .await
        .expect("stub answers");

    assert!(response.is_success());
    assert_eq!(
        response.response_content(),
        Some(&ResponseContent::Json(
            json!({"datacenterID": 12, "datacenterName": "dc1"})
        ))
    );

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path(), "/ariane/rest/domain/datacenters/get");
    assert_eq!(requests[0].query(), Some("ID=12&name=dc1"));
    assert_eq!(
        requests[0].header("authorization"),
        Some("Basic eW9kYTpzZWN1cmUxMjM=")
    );

    driver.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn non_json_body_falls_back_to_text() {
    let stub = HttpStub::start(vec![CannedResponse::text(200, "pong")])
        .await
        .unwrap();
    let mut driver = started_driver(&stub).await;
    let requester = driver
        .make_requester(RequesterArgs::rest("rest/ping"))
        .await
        .unwrap();

    let response = requester
        .call(CallArgs::http(HttpOperation::Get, ""))
        .await
        .unwrap();

    assert_eq!(response.status_code(), 0);
    assert_eq!(
        response.response_content(),
        Some(&ResponseContent::Text("pong".to_string()))
    );
    assert_eq!(stub.requests()[0].path(), "/ariane/rest/ping");

    driver.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_passed_through_with_reason_phrase() {
    let stub = HttpStub::start(vec![CannedResponse::text(404, "Datacenter 12 not found")])
        .await
        .unwrap();
    let mut driver = started_driver(&stub).await;
    let requester = driver
        .make_requester(RequesterArgs::rest("rest/domain/datacenters"))
        .await
        .unwrap();

    let response = requester
        .call(CallArgs::http(HttpOperation::Get, "get"))
        .await
        .expect("an HTTP error is data, not a call failure");

    assert_eq!(response.status_code(), 404);
    assert_eq!(response.error_message(), Some("Not Found"));
    assert_eq!(response.remote_error(), Some((404, Some("Not Found"))));
    assert_eq!(
        response.response_content(),
        Some(&ResponseContent::Text("Datacenter 12 not found".to_string()))
    );

    driver.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn post_sends_the_body() {
    let stub = HttpStub::start(vec![CannedResponse::json(r#"{"created": true}"#)])
        .await
        .unwrap();
    let mut driver = started_driver(&stub).await;
    let requester = driver
        .make_requester(RequesterArgs::rest("rest/domain/datacenters"))
        .await
        .unwrap();

    let mut args = CallArgs::http(HttpOperation::Post, "create");
    args.body = br#"{"name": "dc2"}"#.to_vec();
    let response = requester.call(args).await.unwrap();

    assert!(response.is_success());
    let requests = stub.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].body, br#"{"name": "dc2"}"#.to_vec());

    driver.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_repository_path_is_a_configuration_error() {
    let stub = HttpStub::start(vec![CannedResponse::json("{}")]).await.unwrap();
    let mut driver = started_driver(&stub).await;

    let err = driver
        .make_requester(RequesterArgs::default())
        .await
        .err()
        .expect("repository_path is mandatory");

    assert!(err.is_configuration());
    assert!(stub.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_a_transport_error() {
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = DriverConfig::new(TransportKind::Rest)
        .with_base_url(&format!("http://127.0.0.1:{closed_port}/ariane"));
    let mut driver = DriverFactory::make(&config).unwrap();
    driver.start().await.unwrap();
    let requester = driver
        .make_requester(RequesterArgs::rest("rest/ping"))
        .await
        .unwrap();

    let err = requester
        .call(CallArgs::http(HttpOperation::Get, ""))
        .await
        .unwrap_err();

    assert!(matches!(err, ClipError::Transport(_)));
    driver.stop().await.unwrap();
    driver.stop().await.unwrap();
}
