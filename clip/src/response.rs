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

use crate::codec::{Envelope, Properties, ResponseContent, RC, SERVER_ERROR_MESSAGE};
use tracing::warn;

/// Uniform result of a [`Requester::call`][crate::Requester::call].
///
/// `status_code == 0` means success; any other value is the HTTP status or the
/// server's `RC`. Built once by the requester and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverResponse {
    status_code: i64,
    error_message: Option<String>,
    response_properties: Option<Properties>,
    response_content: Option<ResponseContent>,
}

impl DriverResponse {
    pub fn new(
        status_code: i64,
        error_message: Option<String>,
        response_properties: Option<Properties>,
        response_content: Option<ResponseContent>,
    ) -> Self {
        Self {
            status_code,
            error_message,
            response_properties,
            response_content,
        }
    }

    /// Reads `RC` and `SERVER_ERROR_MESSAGE` from a reply envelope and decodes its body.
    ///
    /// A reply without `RC` is treated as successful.
    pub fn from_envelope(envelope: Envelope) -> Self {
        let status_code = match envelope.properties.get(RC) {
            Some(rc) => rc.as_i64().unwrap_or_else(|| {
                warn!(rc = ?rc, "reply carries a non numeric RC");
                -1
            }),
            None => 0,
        };
        let error_message = envelope
            .properties
            .get(SERVER_ERROR_MESSAGE)
            .and_then(|message| message.as_str())
            .map(str::to_string);
        let response_content = envelope.content();

        Self {
            status_code,
            error_message,
            response_properties: Some(envelope.properties),
            response_content,
        }
    }

    pub fn status_code(&self) -> i64 {
        self.status_code
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn response_properties(&self) -> Option<&Properties> {
        self.response_properties.as_ref()
    }

    pub fn response_content(&self) -> Option<&ResponseContent> {
        self.response_content.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }

    /// `(status, message)` of a remote failure, `None` on success.
    pub fn remote_error(&self) -> Option<(i64, Option<&str>)> {
        (!self.is_success()).then(|| (self.status_code, self.error_message()))
    }
}
