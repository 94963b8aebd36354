use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn, LevelFilter};

use pgn_annotator::{parse_games, write_game, Annotator, EcoBook, GoMode, UciEngine};

/// Annotates PGN chess games with evaluations from a UCI engine.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// PGN files to annotate
    #[arg(required = true, value_name = "PGN")]
    inputs: Vec<PathBuf>,

    /// Engine command token; repeat to pass arguments (the first use names
    /// the program)
    #[arg(short, long, required = true, action = clap::ArgAction::Append, value_name = "TOKEN")]
    engine: Vec<String>,

    /// Seconds of thinking time per half-move
    #[arg(short, long, default_value_t = 30, conflicts_with = "depth", value_name = "N")]
    seconds: u64,

    /// Fixed search depth per half-move instead of a time limit
    #[arg(short, long, value_name = "PLIES")]
    depth: Option<u32>,

    /// Engine hash table size in megabytes
    #[arg(short, long, value_name = "MB")]
    memory: Option<u32>,

    /// Engine option to set; repeatable
    #[arg(short = 'o', long = "option", action = clap::ArgAction::Append, value_name = "NAME=VALUE")]
    options: Vec<String>,

    /// Opening book, tab-separated (code, name, moves)
    #[arg(long, value_name = "FILE")]
    eco: Option<PathBuf>,

    /// Report progress on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Error
        })
        .format_timestamp_micros()
        .parse_default_env()
        .init();

    let go = match args.depth {
        Some(depth) => GoMode::Depth(depth),
        None => GoMode::MoveTime(args.seconds * 1000),
    };

    let book = match &args.eco {
        Some(path) => EcoBook::load(path)
            .with_context(|| format!("loading opening book {}", path.display()))?,
        None => EcoBook::empty(),
    };

    let (program, engine_args) = args
        .engine
        .split_first()
        .context("empty engine command")?;
    let mut engine = UciEngine::spawn(program, engine_args)
        .with_context(|| format!("starting engine {program}"))?;

    // Shut the engine down whether the run succeeded or not; a fatal error
    // mid-game must still walk the escalation ladder.
    let run_result = run(&mut engine, &args, &book, go).await;
    let shutdown_result = engine.shutdown().await;
    run_result?;
    shutdown_result.context("engine shutdown")?;
    Ok(())
}

async fn run(
    engine: &mut UciEngine,
    args: &Args,
    book: &EcoBook,
    go: GoMode,
) -> anyhow::Result<()> {
    engine.handshake().await?;

    let mut settings: Vec<(String, String)> = Vec::new();
    if let Some(megabytes) = args.memory {
        settings.push(("Hash".to_string(), megabytes.to_string()));
    }
    for setting in &args.options {
        match setting.split_once('=') {
            Some((name, value)) => {
                settings.push((name.trim().to_string(), value.trim().to_string()));
            }
            None => warn!("ignoring malformed option {setting:?}, expected NAME=VALUE"),
        }
    }
    engine.configure(&settings).await?;

    let annotator_id = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let mut annotator = Annotator::new(engine, book, go);
    let mut stdout = std::io::stdout().lock();

    for path in &args.inputs {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("cannot read {}: {e}", path.display());
                continue;
            }
        };
        let games = parse_games(&text);
        if games.is_empty() {
            error!("no games found in {}", path.display());
            continue;
        }
        info!("annotating {} game(s) from {}", games.len(), path.display());
        for game in &games {
            let annotated = annotator.annotate(game).await?;
            stdout.write_all(write_game(&annotated, &annotator_id).as_bytes())?;
        }
    }
    Ok(())
}
