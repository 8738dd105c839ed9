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

use async_trait::async_trait;
use clip::codec::RC;
use clip::{CallbackError, Envelope, MessageListener, TopicMessage, TreatmentCallback};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Subscriber callback keeping every message it sees.
#[derive(Clone, Default)]
pub struct RecordingListener {
    message_store: Arc<Mutex<Vec<TopicMessage>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<TopicMessage> {
        self.message_store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.message_store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl MessageListener for RecordingListener {
    async fn on_message(&self, message: TopicMessage) -> Result<(), CallbackError> {
        debug!("within recording_listener! msg: {:?}", message);
        self.message_store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

/// Service callback counting requests and echoing each body back with `RC = 0`
/// and the running count in a `COUNT` property.
#[derive(Clone, Default)]
pub struct CountingService {
    counter: Arc<AtomicUsize>,
}

impl CountingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TreatmentCallback for CountingService {
    async fn on_request(&self, request: Envelope) -> Result<Envelope, CallbackError> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("within counting_service! request #{count}");
        Ok(Envelope::new(Default::default(), request.body)
            .with_property(RC, 0i64)
            .with_property("COUNT", count as i64))
    }
}

/// Service callback that always fails with the given message.
#[derive(Clone)]
pub struct FailingService {
    message: String,
}

impl FailingService {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl TreatmentCallback for FailingService {
    async fn on_request(&self, _request: Envelope) -> Result<Envelope, CallbackError> {
        Err(self.message.clone().into())
    }
}
