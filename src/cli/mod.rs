pub(crate) mod args;
pub(crate) mod commands;

pub(crate) use args::{Cli, Settings};
pub(crate) use commands::{Commands, HistoryCommands, SampleArgs, SessionCommands, SoilArgs};
