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

//! Canonical structured field keys and value-format helpers.

use crate::codec::{Envelope, RC};

pub const NONE: &str = "none";
pub const REASON_INVALID_THREAD_NAME: &str = "invalid_thread_name";
pub const REASON_CALLBACK_PANICKED: &str = "callback_panicked";
pub const REASON_CALLBACK_ERROR: &str = "callback_error";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_WORKER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}

pub fn format_correlation_id(envelope: &Envelope) -> String {
    envelope
        .correlation_id()
        .unwrap_or_else(|| NONE.to_string())
}

pub fn format_status_code(envelope: &Envelope) -> String {
    envelope
        .properties
        .get(RC)
        .and_then(|rc| rc.as_i64())
        .map(|rc| rc.to_string())
        .unwrap_or_else(|| NONE.to_string())
}
