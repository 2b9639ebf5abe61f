//! Interfaces supplied by the host query engine.
//!
//! The host owns settings, secrets and per-session state. It passes a
//! [`FileOpener`] into every file system call that needs any of them.

mod context;
mod settings;

pub use context::{ClientContext, ClientContextState};
pub use settings::{SettingValue, SettingsFileOpener, get_setting};

/// Host handle giving access to settings and the session's client context.
pub trait FileOpener: Send + Sync {
    /// Current value of a setting, if the host knows it.
    fn try_get_current_setting(&self, key: &str) -> Option<SettingValue>;

    /// The client context of the running query session, if any.
    fn client_context(&self) -> Option<&ClientContext>;
}
