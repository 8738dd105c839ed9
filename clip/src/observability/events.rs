//! Canonical structured event names used across `clip`.

// Driver lifecycle events.
pub const DRIVER_FACTORY_MAKE: &str = "driver_factory_make";
pub const DRIVER_START: &str = "driver_start";
pub const DRIVER_START_FAILED: &str = "driver_start_failed";
pub const DRIVER_STOP: &str = "driver_stop";
pub const DRIVER_STOP_CHILD_FAILED: &str = "driver_stop_child_failed";

// Requester events.
pub const REQUEST_SEND: &str = "request_send";
pub const REQUEST_SEND_FAILED: &str = "request_send_failed";
pub const REQUEST_REPLY_OK: &str = "request_reply_ok";
pub const REQUEST_REPLY_TIMEOUT: &str = "request_reply_timeout";
pub const REPLY_IGNORED_UNCORRELATED: &str = "reply_ignored_uncorrelated";
pub const REPLY_DECODE_FAILED: &str = "reply_decode_failed";

// Service and subscriber events.
pub const SERVICE_REQUEST_RECEIVE: &str = "service_request_receive";
pub const SERVICE_CALLBACK_FAILED: &str = "service_callback_failed";
pub const SERVICE_REPLY_FAILED: &str = "service_reply_failed";
pub const SERVICE_ACK_FAILED: &str = "service_ack_failed";
pub const SUBSCRIBER_MESSAGE_RECEIVE: &str = "subscriber_message_receive";
pub const SUBSCRIBER_CALLBACK_FAILED: &str = "subscriber_callback_failed";
pub const SUBSCRIBER_RECV_FAILED: &str = "subscriber_recv_failed";
pub const SUBSCRIBER_CONNECTED: &str = "subscriber_connected";
pub const SUBSCRIBER_CONNECT_FAILED: &str = "subscriber_connect_failed";
pub const PUBLISHER_SEND: &str = "publisher_send";

// Consume loop runtime events.
pub const CONSUME_LOOP_STREAM_CLOSED: &str = "consume_loop_stream_closed";
pub const CONSUME_LOOP_STOPPED: &str = "consume_loop_stopped";
pub const RUNTIME_THREAD_NAME_FALLBACK: &str = "runtime_thread_name_fallback";
pub const RUNTIME_SPAWN_START: &str = "runtime_spawn_start";
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
