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

use async_trait::async_trait;
use clip::{
    CallbackError, DriverFactory, MessageListener, PublisherArgs, SubscriberArgs, TopicMessage,
};
use integration_test_utils::{wait_for_count, RecordingListener};
use std::sync::Arc;
use std::time::Duration;
use support::DELIVERY_TIMEOUT;

const SUBSCRIPTION_SETTLE: Duration = Duration::from_millis(500);

#[tokio::test(flavor = "multi_thread")]
async fn subscriber_receives_exactly_one_published_message() {
    integration_test_utils::init_logging();

    let mut driver = DriverFactory::make(&support::zeromq_config(6669)).unwrap();
    driver.start().await.unwrap();

    let publisher = driver
        .make_publisher(PublisherArgs::new("test"))
        .await
        .unwrap();
    publisher.start().await.expect("publisher binds 127.0.0.1:6669");

    let listener = RecordingListener::new();
    let subscriber = driver
        .make_subscriber(SubscriberArgs::new("test", Arc::new(listener.clone())))
        .await
        .unwrap();
    subscriber.start().await.expect("subscriber connects");
    assert!(subscriber.is_running());
    tokio::time::sleep(SUBSCRIPTION_SETTLE).await;

    publisher.call("hello").await.unwrap();

    let received = wait_for_count(1, DELIVERY_TIMEOUT, || listener.count()).await;
    assert_eq!(received, 1);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let messages = listener.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "test");
    assert!(messages[0].payload.contains("hello"));

    driver.stop().await.unwrap();
    assert!(!subscriber.is_running());
    subscriber.stop().await.unwrap();
    driver.stop().await.unwrap();
}

struct RejectingListener {
    seen: RecordingListener,
}

#[async_trait]
impl MessageListener for RejectingListener {
    async fn on_message(&self, message: TopicMessage) -> Result<(), CallbackError> {
        self.seen.on_message(message).await?;
        Err("listener rejects everything".into())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_listener_does_not_stop_the_subscriber() {
    integration_test_utils::init_logging();

    let mut driver = DriverFactory::make(&support::zeromq_config(6671)).unwrap();
    driver.start().await.unwrap();
    let publisher = driver
        .make_publisher(PublisherArgs::new("ariane.events"))
        .await
        .unwrap();
    publisher.start().await.unwrap();

    let seen = RecordingListener::new();
    let subscriber = driver
        .make_subscriber(SubscriberArgs::new(
            "ariane.events",
            Arc::new(RejectingListener { seen: seen.clone() }),
        ))
        .await
        .unwrap();
    subscriber.start().await.unwrap();
    tokio::time::sleep(SUBSCRIPTION_SETTLE).await;

    publisher.call("first").await.unwrap();
    publisher.call("second").await.unwrap();

    assert_eq!(wait_for_count(2, DELIVERY_TIMEOUT, || seen.count()).await, 2);
    assert!(subscriber.is_running());
    let payloads: Vec<String> = seen.messages().into_iter().map(|m| m.payload).collect();
    assert_eq!(payloads, vec!["first".to_string(), "second".to_string()]);

    driver.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn subscriber_ignores_other_topics_and_restarts_after_stop() {
    integration_test_utils::init_logging();

    let mut driver = DriverFactory::make(&support::zeromq_config(6672)).unwrap();
    driver.start().await.unwrap();
    let other_topic = driver
        .make_publisher(PublisherArgs::new("other"))
        .await
        .unwrap();
    other_topic.start().await.unwrap();

    let listener = RecordingListener::new();
    let subscriber = driver
        .make_subscriber(SubscriberArgs::new("test", Arc::new(listener.clone())))
        .await
        .unwrap();

    subscriber.start().await.unwrap();
    subscriber.stop().await.unwrap();
    subscriber.stop().await.unwrap();
    assert!(!subscriber.is_running());

    subscriber.start().await.unwrap();
    assert!(subscriber.is_running());
    tokio::time::sleep(SUBSCRIPTION_SETTLE).await;

    other_topic.call("not for you").await.unwrap();
    tokio::time::sleep(SUBSCRIPTION_SETTLE).await;
    assert_eq!(listener.count(), 0);

    driver.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn subscriber_started_before_its_publisher_catches_up() {
    integration_test_utils::init_logging();

    let mut driver = DriverFactory::make(&support::zeromq_config(6673)).unwrap();
    driver.start().await.unwrap();

    let listener = RecordingListener::new();
    let subscriber = driver
        .make_subscriber(SubscriberArgs::new("test", Arc::new(listener.clone())))
        .await
        .unwrap();
    subscriber
        .start()
        .await
        .expect("nothing is bound yet, the subscriber still starts");
    assert!(subscriber.is_running());

    let publisher = driver
        .make_publisher(PublisherArgs::new("test"))
        .await
        .unwrap();
    publisher.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + DELIVERY_TIMEOUT;
    while listener.count() == 0 && tokio::time::Instant::now() < deadline {
        publisher.call("late hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(listener.count() >= 1);
    assert!(listener
        .messages()
        .iter()
        .all(|message| message.topic == "test" && message.payload == "late hello"));

    driver.stop().await.unwrap();
}
