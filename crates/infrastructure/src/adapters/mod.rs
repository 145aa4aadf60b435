//! Adapters for the application's non-storage ports.

mod system_clock;

pub use system_clock::SystemClock;
