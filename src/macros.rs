/// Returns a `GraphError::Validation` built from a format string.
#[macro_export]
macro_rules! invalid {
    ($($arg:tt)*) => {
        return Err($crate::GraphError::Validation(format!($($arg)*)))
    };
}

/// Checks a validation predicate, returning a `GraphError::Validation`
/// when it does not hold.
#[macro_export]
macro_rules! ensure_valid {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::invalid!($($arg)*);
        }
    };
}
