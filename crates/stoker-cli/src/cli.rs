//! Argument parsing for the two scheduler entrypoints (§6).

use clap::{Parser, Subcommand, ValueEnum};

use stoker::UnitKind;

#[derive(Debug, Parser)]
#[command(name = "stoker", about = "Distributed job queue scheduler over Redis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml / local.toml. Defaults to ./config.
    #[arg(long, global = true, default_value = "./config")]
    pub config_dir: String,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the Master supervision loop.
    Go,
    /// Run a single unit pass (invoked internally by the Master's spawns).
    Unit {
        #[arg(long = "type", value_enum)]
        kind: UnitKindArg,
        #[arg(long = "name")]
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitKindArg {
    Delay,
    Realtime,
}

impl From<UnitKindArg> for UnitKind {
    fn from(value: UnitKindArg) -> Self {
        match value {
            UnitKindArg::Delay => UnitKind::Delay,
            UnitKindArg::Realtime => UnitKind::Realtime,
        }
    }
}
