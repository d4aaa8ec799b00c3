//! Configuration: the persisted settings document and the shared store around it

mod settings;
mod store;
#[cfg(test)]
mod tests;

pub use settings::*;
pub use store::{SettingsListener, SettingsNamespace, SettingsStore};
