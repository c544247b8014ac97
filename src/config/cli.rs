use crate::domain::model::Orientation;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "chess-agent")]
#[command(about = "Plays chess on screen: reads the board with a vision model, moves with an engine")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "agent.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Capture the board rectangle and store it in the config file
    Setup(SetupArgs),
    /// Start playing
    Run(RunArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct SetupArgs {
    /// Left edge of the board in screen pixels (prompted when omitted)
    #[arg(long)]
    pub left: Option<i32>,

    #[arg(long)]
    pub top: Option<i32>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Which side is at the bottom of the screen
    #[arg(long, value_enum)]
    pub orientation: Option<OrientationArg>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Log actions instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Log process CPU and memory after every ply
    #[arg(long)]
    pub monitor: bool,

    /// Override game_loop.max_moves from config
    #[arg(long)]
    pub max_moves: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrientationArg {
    White,
    Black,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::White => Orientation::WhiteAtBottom,
            OrientationArg::Black => Orientation::BlackAtBottom,
        }
    }
}
