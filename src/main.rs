use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fpl_seasons::config::{self, parse_season_list};
use fpl_seasons::pipeline::{self, RunOptions};
use fpl_seasons::source::{RemoteFetch, SourceLoader};

const USAGE: &str = "usage: fpl_seasons [compile|formations|all] [--config PATH] \
[--seasons 2018-19,2019-20] [--out DIR] [--no-clean] [--no-cache] [--summary PATH]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Compile,
    Formations,
    All,
}

impl Command {
    fn options(self) -> RunOptions {
        match self {
            Command::Compile => RunOptions {
                season_tables: true,
                formations: false,
            },
            Command::Formations => RunOptions {
                season_tables: false,
                formations: true,
            },
            Command::All => RunOptions::all(),
        }
    }
}

#[derive(Debug)]
struct CliArgs {
    command: Command,
    config_path: Option<PathBuf>,
    seasons: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
    no_clean: bool,
    no_cache: bool,
    summary_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let args = parse_args(&std::env::args().skip(1).collect::<Vec<_>>())?;

    let mut config =
        config::load_config(args.config_path.as_deref()).context("failed to load configuration")?;
    if let Some(seasons) = args.seasons.clone() {
        config.seasons = seasons;
    }
    if let Some(dir) = args.output_dir.clone() {
        config.output_dir = dir;
    }
    if args.no_clean {
        config.clean = false;
    }
    if args.no_cache {
        config.use_http_cache = false;
    }
    config.validate().context("invalid configuration")?;
    info!(seasons = ?config.seasons, command = ?args.command, "starting run");

    let loader = SourceLoader::new(
        RemoteFetch::new(
            Duration::from_secs(config.http_timeout_secs),
            config.use_http_cache,
        )
        .with_offline_fallback(config.offline_fallback),
    );
    let summary = pipeline::run(&config, &loader, args.command.options())?;

    println!("Season compile complete");
    println!("Output: {}", summary.output_dir.display());
    println!(
        "Seasons: {}/{}",
        summary.seasons_succeeded, summary.seasons_total
    );
    if args.command != Command::Formations {
        println!("Season rows written: {}", summary.season_rows_written);
        if config.clean {
            println!("Players removed: {}", summary.players_removed);
        }
    }
    if let Some(path) = summary.formation_file.as_ref() {
        println!(
            "Formation rows: {} ({})",
            summary.formation_rows,
            path.display()
        );
    }
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in &summary.errors {
            println!(" - {err}");
        }
    }

    if let Some(path) = args.summary_path.as_ref() {
        pipeline::write_summary(path, &summary)?;
    }

    if summary.seasons_succeeded == 0 {
        return Err(anyhow!("no season could be compiled"));
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut out = CliArgs {
        command: Command::All,
        config_path: None,
        seasons: None,
        output_dir: None,
        no_clean: false,
        no_cache: false,
        summary_path: None,
    };

    let mut idx = 0usize;
    while idx < args.len() {
        let arg = args[idx].as_str();
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg, None),
        };
        let mut value = || -> Result<String> {
            if let Some(v) = inline.clone() {
                return Ok(v);
            }
            idx += 1;
            args.get(idx)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| anyhow!("missing value for {flag}\n{USAGE}"))
        };
        match flag {
            "compile" => out.command = Command::Compile,
            "formations" => out.command = Command::Formations,
            "all" => out.command = Command::All,
            "--config" => out.config_path = Some(PathBuf::from(value()?)),
            "--out" => out.output_dir = Some(PathBuf::from(value()?)),
            "--summary" => out.summary_path = Some(PathBuf::from(value()?)),
            "--seasons" => {
                let seasons = parse_season_list(&value()?);
                if seasons.is_empty() {
                    return Err(anyhow!("--seasons needs at least one season"));
                }
                out.seasons = Some(seasons);
            }
            "--no-clean" => out.no_clean = true,
            "--no-cache" => out.no_cache = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => return Err(anyhow!("unknown argument `{other}`\n{USAGE}")),
        }
        idx += 1;
    }
    Ok(out)
}
