//! Structured logging helpers.
//!
//! Every log line emitted through this macro carries a `subsystem` field
//! so JSON output can be filtered per component.

/// Log a committed or replayed mutation with the standard fields.
#[macro_export]
macro_rules! log_mutation_event {
    ($level:ident, $subsystem:expr, $msg:expr, $sequence:expr, $kind:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            sequence = $sequence,
            kind = %$kind,
            $($($field)*,)?
            $msg
        )
    };
}
