//! Single-writer dispatcher runtime, document context, and events.

/// Dispatcher configuration and TOML loading.
pub mod config;
/// UI-visible current-document cell.
pub mod context;
/// Event stream types emitted by the dispatcher.
pub mod events;
/// Handle and dispatch loop implementation.
pub mod handle;
mod writes;
