//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Icon theme lookup for CapyShell services.
#[derive(Debug, Parser)]
#[command(name = "capy-icond", version)]
pub struct Args {
    /// Path to config file (default: ~/.config/capyshell/icons.json).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Icon theme to prefer, overriding env, config and GTK settings.
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Extra icon roots, searched after the standard ones.
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the file an icon name resolves to.
    Resolve {
        name: String,
        /// Size in pixels (default from config, usually 32).
        #[arg(short = 's', long = "size")]
        size: Option<u32>,
    },
    /// List installed icon themes.
    Themes {
        #[arg(long = "json")]
        json: bool,
    },
    /// Print the theme search order.
    Order,
    /// Register an icon file and print the name it resolves under.
    Register { path: PathBuf },
    /// Keep running: watch theme roots and answer `name [size]` lines on stdin.
    Watch,
}
