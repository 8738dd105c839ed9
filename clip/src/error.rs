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

//! Error taxonomy shared by every driver.
//!
//! Configuration and capability errors are raised synchronously by constructors and
//! factories. Remote failures are not errors: they travel inside
//! [`DriverResponse`][crate::DriverResponse] as a non-zero status code.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipError {
    /// A mandatory configuration key or factory argument is missing, empty or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transport has no support for the requested primitive.
    #[error("{operation} is not supported by the {transport} driver")]
    Unsupported {
        transport: &'static str,
        operation: &'static str,
    },

    /// The object is not in a state that allows the operation (e.g. driver not started).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Network or broker level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// No correlated reply arrived before the deadline.
    #[error("no reply received within {0:?}")]
    Timeout(Duration),

    /// A value or envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// One or more children failed while being torn down.
    #[error("teardown failed with {} error(s): {0:?}", .0.len())]
    Teardown(Vec<ClipError>),
}

impl ClipError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub(crate) fn unsupported(transport: &'static str, operation: &'static str) -> Self {
        Self::Unsupported {
            transport,
            operation,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Folds a list of teardown failures into a single result.
    pub(crate) fn from_teardown(mut errors: Vec<ClipError>) -> Result<(), ClipError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Teardown(errors)),
        }
    }
}

impl From<serde_json::Error> for ClipError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<base64::DecodeError> for ClipError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<lapin::Error> for ClipError {
    fn from(err: lapin::Error) -> Self {
        Self::Transport(format!("amqp: {err}"))
    }
}

impl From<reqwest::Error> for ClipError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(format!("http: {err}"))
    }
}

impl From<zeromq::ZmqError> for ClipError {
    fn from(err: zeromq::ZmqError) -> Self {
        Self::Transport(format!("zeromq: {err}"))
    }
}

pub type ClipResult<T> = Result<T, ClipError>;
