//! Structured log helpers.
//!
//! Call events carry the same field names everywhere so they can be filtered
//! and joined downstream:
//! - `session_id`: connection scope
//! - `call_id`: correlation id, unique within a session
//! - any extra context fields

/// Log a call-related event with standard fields.
///
/// ```rust,ignore
/// log_call_event!(info, "Call completed", session_id, call_id, elapsed_ms = 12);
/// ```
#[macro_export]
macro_rules! log_call_event {
    ($level:ident, $msg:expr, $session_id:expr, $call_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            session_id = %$session_id,
            call_id = %$call_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a session-level event with standard fields.
#[macro_export]
macro_rules! log_session_event {
    ($level:ident, $msg:expr, $session_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            session_id = %$session_id,
            $($($field)*,)?
            $msg
        )
    };
}
