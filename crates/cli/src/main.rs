use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use shelfmark_config::ConfigManager;
use std::path::PathBuf;

mod commands;

fn build_cli() -> Command {
    Command::new("shelfmark")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Shelfmark Team")
        .about("Transfers packaged ebooks and audiobooks into the preservation pre-ingest area")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to the config file (defaults to the platform config directory)")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default config file if none exists"))
        .subcommand(
            Command::new("transfer")
                .about("Ingest ready items and send updates for ingested ones")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the report as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show the transfer history of an item directory")
                .arg(Arg::new("item").required(true).value_name("ITEM_DIR").help("Item directory"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the status as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Evaluate whether an item directory is ready for ingest")
                .arg(Arg::new("item").required(true).value_name("ITEM_DIR").help("Item directory")),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    match matches.get_one::<String>("config") {
        Some(path) => Ok(ConfigManager::from_file(PathBuf::from(path))),
        None => ConfigManager::new().context("Failed to locate config directory"),
    }
}

fn item_arg(matches: &ArgMatches) -> Result<PathBuf> {
    matches
        .get_one::<String>("item")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Item directory is required"))
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(&matches)?;

    if let Some(("init", _)) = matches.subcommand() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        return commands::init_config(&manager);
    }

    let config = manager
        .load()
        .with_context(|| format!("Failed to load config from {}", manager.config_path().display()))?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();
    log::debug!("Loaded config from {}", manager.config_path().display());

    match matches.subcommand() {
        Some(("transfer", sub_matches)) => {
            commands::run_transfer(&config, sub_matches.get_flag("json"))
        }
        Some(("status", sub_matches)) => {
            commands::show_status(&item_arg(sub_matches)?, sub_matches.get_flag("json"))
        }
        Some(("check", sub_matches)) => commands::check_item(&config, &item_arg(sub_matches)?),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
