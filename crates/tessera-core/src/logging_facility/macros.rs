//! Canonical logging macros
//!
//! Every session operation logs exactly one start event and one end (or
//! end_error) event, all tagged with `component`, `op` and `event`.

/// Log the start of an operation
///
/// ```
/// # use tessera_core::log_op_start;
/// log_op_start!("save_changes");
/// log_op_start!("delete", resource = "r1@tpl");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = tessera_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = tessera_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use tessera_core::log_op_end;
/// log_op_end!("save_changes", duration_ms = 42);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = tessera_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = tessera_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed operation, classified through `ExError`
///
/// ```ignore
/// # use tessera_core::{log_op_error, errors::SessionError};
/// let err = SessionError::Internal { message: "stale key".to_string() };
/// log_op_error!("resolve", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = tessera_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = tessera_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            $($field)*
        );
    }};
}

/// Log a unit-of-work registration (`created`, `updated` or `deleted`)
///
/// ```
/// # use tessera_core::log_ledger_event;
/// log_ledger_event!(tessera_core_types::schema::EVENT_CREATED, "m1@member");
/// ```
#[macro_export]
macro_rules! log_ledger_event {
    ($event:expr, $resource:expr) => {
        tracing::debug!(
            component = module_path!(),
            op = "unit_of_work",
            event = $event,
            resource = %$resource,
        );
    };
}
