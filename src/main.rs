//! capy-icond - Icon theme lookup daemon for CapyShell
//!
//! Resolves icon names against the installed themes, and in `watch` mode keeps
//! the engine current while answering lookups on stdin.

mod cli;
mod services;

use capy_icons::{EngineOptions, IconConfig, IconEngine, paths};
use clap::Parser;
use cli::{Args, Command};
use env_logger::Env;
use log::info;
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(paths::config_path);
    let mut config = IconConfig::load(&config_path);
    config.extra_dirs.extend(args.dirs.iter().cloned());

    let mut options = EngineOptions::from_config(&config);
    if let Some(theme) = &args.theme {
        options.preferred_theme = Some(theme.clone());
    }
    let engine = Arc::new(IconEngine::new(options)?);

    match args.command {
        Command::Resolve { name, size } => {
            let size = size.unwrap_or(config.default_size);
            match engine.resolve(&name, size) {
                Some(icon) => println!("{}", icon.path.display()),
                None => {
                    eprintln!("{}: not found", name);
                    std::process::exit(1);
                }
            }
        }
        Command::Themes { json } => {
            let themes = engine.list_themes();
            if json {
                println!("{}", serde_json::to_string_pretty(&themes)?);
            } else {
                for theme in themes {
                    println!("{}\t{}", theme.id, theme.title);
                }
            }
        }
        Command::Order => {
            for id in engine.search_order() {
                println!("{}", id);
            }
        }
        Command::Register { path } => {
            let name = engine.register_file_path(&path)?;
            println!("{}", name);
        }
        Command::Watch => {
            services::start_all(&engine);
            info!(
                "Serving icon lookups, session dir {}",
                engine.session_dir().display()
            );
            services::query::run(&engine, config.default_size)?;
        }
    }

    Ok(())
}
