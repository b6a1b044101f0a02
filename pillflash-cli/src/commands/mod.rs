//! Command implementations.

mod completions;
mod pad;
mod update;

pub(crate) use completions::cmd_completions;
pub(crate) use pad::cmd_pad;
pub(crate) use update::cmd_update;
