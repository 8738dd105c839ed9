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

mod http_stub;
pub use http_stub::{CannedResponse, HttpStub, RecordedRequest};
mod integration_test_utils;
pub use integration_test_utils::{init_logging, wait_for_count, wait_until};
mod integration_test_listeners;
pub use integration_test_listeners::{CountingService, FailingService, RecordingListener};
