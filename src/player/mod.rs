//! Player state: the normalized "now playing" model and its single-writer store

mod events;
mod run_loop;
mod state;
mod store;

pub use events::{PlayState, PlaybackEvent, PlaylistSummary, Track};
pub use run_loop::run_pipeline;
pub use state::{NormalizedPlaybackState, StateDelta};
pub use store::{PlayerStateStore, StateHandle, StateSubscriber};

const PLAYER_LOG_TARGET: &str = "ytmd_bridge::player";
