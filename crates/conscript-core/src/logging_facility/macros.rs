//! Operation logging macros
//!
//! Engine operations bracket their work with a start event and either an
//! end or an end_error event, all carrying `component`, `op` and `event`.
//! Extra fields use the usual `tracing` syntax (`name = %value`, `?value`).

/// Emit the `start` event of an operation
///
/// ```
/// # use conscript_core::log_op_start;
/// log_op_start!("create_draft");
/// log_op_start!("create_draft", record_type = "widget", record_id = ?Some(3));
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_START,
            $($($field)*)?
        )
    };
}

/// Emit the `end` event of an operation with its duration
///
/// ```
/// # use conscript_core::log_op_end;
/// log_op_end!("publish", duration_ms = 3_u64, destroyed = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)*)?
        )
    };
}

/// Emit the `end_error` event of an operation
///
/// The error goes through `ExError` so the event carries its stable kind
/// and code.
///
/// ```
/// # use conscript_core::{log_op_error, errors::DraftError};
/// let err = DraftError::NotConfigured { record_type: "widget".to_string() };
/// log_op_error!("publish", err, duration_ms = 1_u64);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            $($($field)*)?
        )
    }};
}
