//! `safe_call!` wraps a call into a host primitive (mutex lock, thread
//! spawn, ...) whose failure the rest of the crate is not prepared to
//! recover from. On an `Err`, it formats `"Error on: <call-text>"` and
//! exits the process via [`crate::fatal`].
//!
//! This mirrors the original runtime's `LER_SAFE_CALL`: the primitive is
//! expected to never fail, so turning a silent failure into a deterministic,
//! diagnosed exit is strictly better than continuing with undefined
//! rendezvous state.

/// Unwrap a `Result`, exiting the process with a diagnostic on `Err`.
#[macro_export]
macro_rules! safe_call {
    ($call:expr) => {
        match $call {
            Ok(v) => v,
            Err(e) => $crate::fatal!("Error on: {}: {}", stringify!($call), e),
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn ok_value_passes_through() {
        let v: Result<i32, &str> = Ok(42);
        let unwrapped = safe_call!(v);
        assert_eq!(unwrapped, 42);
    }
}
