//! Remote control: external commands flowing toward the embedded view

mod dispatcher;

pub use dispatcher::{parse_volume, RemoteCommandDispatcher, MAX_VOLUME, VOLUME_STEP};
