//! Core functionality for hookwatch
//!
//! Watches directory trees for file changes and reports each qualifying
//! change to a webhook as a JSON POST. The crate is split into:
//! - [`config`]: the JSON configuration document and environment expansion
//! - [`monitor`]: watch registration, classification, filtering, debouncing
//! - [`dispatch`]: webhook delivery, optionally through a bounded pool

pub mod config;
pub mod dispatch;
pub mod monitor;

pub use config::{ConfigError, DispatchMode, OverflowPolicy, WatchConfig};
pub use dispatch::{DispatchError, Dispatcher, NotificationPayload, WebhookClient};
pub use monitor::{DirectoryWatcher, NotificationKind, WatchError, WatcherState};
