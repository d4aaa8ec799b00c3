//! User-facing command line

mod cli;

pub use cli::{Args, Cli};
