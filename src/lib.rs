pub mod config;
pub mod error;
pub mod pgwire_server;
pub mod security;
pub mod server;
pub mod storage;

// Test-only printing helper: expands to eprintln! in test and debug builds and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks without producing output
        if false { let _ = format!($($arg)*); }
    });
}
