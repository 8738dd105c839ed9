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

//! HTTP/REST driver: one synchronous round trip per call, no pub/sub, no services.

use crate::codec::{decode_body, Properties, PropertyValue};
use crate::config::{DriverConfig, RestSettings, TransportKind};
use crate::driver::{
    required_arg, CallArgs, Driver, HttpOperation, Publisher, PublisherArgs, Requester,
    RequesterArgs, Service, ServiceArgs, Subscriber, SubscriberArgs,
};
use crate::error::{ClipError, ClipResult};
use crate::observability::events;
use crate::response::DriverResponse;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TRANSPORT: &str = "REST";
const COMPONENT: &str = "rest_driver";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestDriver {
    settings: RestSettings,
    client: Option<Client>,
    requesters: Vec<Arc<RestRequester>>,
}

impl RestDriver {
    pub fn new(config: &DriverConfig) -> ClipResult<Self> {
        Ok(Self {
            settings: RestSettings::from_config(config)?,
            client: None,
            requesters: Vec::new(),
        })
    }

    pub fn is_started(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Driver for RestDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    async fn start(&mut self) -> ClipResult<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        info!(
            event = events::DRIVER_START,
            component = COMPONENT,
            driver = TRANSPORT,
            base_url = self.settings.base_url.as_str(),
            "http session opened"
        );
        self.client = Some(client);
        Ok(())
    }

    async fn stop(&mut self) -> ClipResult<()> {
        for requester in self.requesters.drain(..) {
            requester.stop().await?;
        }
        if self.client.take().is_some() {
            info!(
                event = events::DRIVER_STOP,
                component = COMPONENT,
                driver = TRANSPORT,
                "http session closed"
            );
        }
        Ok(())
    }

    async fn make_requester(&mut self, args: RequesterArgs) -> ClipResult<Arc<dyn Requester>> {
        let repository_path = required_arg(
            TransportKind::Rest,
            "repository_path",
            args.repository_path.as_deref(),
        )?;
        let client = self.client.clone().ok_or_else(|| {
            ClipError::InvalidState("REST driver must be started before making requesters".into())
        })?;

        let requester = Arc::new(RestRequester {
            name: args
                .requester_name
                .unwrap_or_else(|| format!("rest-requester:{repository_path}")),
            client,
            repository_url: join_url(&self.settings.base_url, &repository_path),
            user: self.settings.user.clone(),
            password: self.settings.password.clone(),
            stopped: AtomicBool::new(false),
        });
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

    async fn make_service(&mut self, _args: ServiceArgs) -> ClipResult<Arc<dyn Service>> {
        Err(ClipError::unsupported(TRANSPORT, "make_service"))
    }
}

pub struct RestRequester {
    name: String,
    client: Client,
    repository_url: String,
    user: Option<String>,
    password: Option<String>,
    stopped: AtomicBool,
}

impl RestRequester {
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }
}

#[async_trait]
impl Requester for RestRequester {
    async fn call(&self, args: CallArgs) -> ClipResult<DriverResponse> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ClipError::InvalidState(format!("{} is stopped", self.name)));
        }

        let url = match args.operation_path.as_deref() {
            Some(path) => join_url(&self.repository_url, path),
            None => self.repository_url.clone(),
        };
        let query = args.parameters.as_ref().map(query_pairs).unwrap_or_default();

        let mut request = match args.http_operation {
            HttpOperation::Get => self.client.get(&url),
            HttpOperation::Post => self.client.post(&url),
        }
        .query(&query);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }
        if !args.body.is_empty() {
            request = request.body(args.body);
        }

        debug!(
            event = events::REQUEST_SEND,
            component = COMPONENT,
            requester = self.name.as_str(),
            method = args.http_operation.as_str(),
            url = url.as_str(),
            "sending http request"
        );

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(http_response(status, &body))
    }

    async fn stop(&self) -> ClipResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// HTTP 200 becomes status 0; any other status is passed through with its reason phrase.
fn http_response(status: StatusCode, body: &[u8]) -> DriverResponse {
    let content = decode_body(body);
    if status == StatusCode::OK {
        DriverResponse::new(0, None, None, content)
    } else {
        DriverResponse::new(
            i64::from(status.as_u16()),
            status.canonical_reason().map(str::to_string),
            None,
            content,
        )
    }
}

/// Joins url segments with exactly one `/` between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Scalars are sent verbatim, arrays and maps as JSON.
pub(crate) fn query_pairs(parameters: &Properties) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(name, value)| {
            let value = match value {
                PropertyValue::String(s) => s.clone(),
                PropertyValue::Long(l) => l.to_string(),
                PropertyValue::Double(d) => d.to_string(),
                PropertyValue::Boolean(b) => b.to_string(),
                composite => composite.to_json().to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}
