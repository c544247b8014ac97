use anyhow::Context;
use chess_vision_agent::app::{RunOptions, Session};
use chess_vision_agent::config::cli::{Cli, Command, RunArgs, SetupArgs};
use chess_vision_agent::config::toml_config::write_board_region;
use chess_vision_agent::core::LoopExit;
use chess_vision_agent::utils::{logger, validation::Validate};
use chess_vision_agent::{AgentConfig, AgentError, BoardRegion, Orientation};
use clap::Parser;
use std::io::{BufRead, Write};
use std::str::FromStr;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Setup(args) => {
            logger::init_cli_logger(cli.verbose, false);
            match setup(&cli.config, args) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("❌ Setup failed: {:#}", e);
                    1
                }
            }
        }
        Command::Run(args) => run(&cli.config, cli.verbose, args).await,
    };
    std::process::exit(code);
}

fn report(e: &AgentError) -> i32 {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    e.severity().exit_code().max(1)
}

async fn run(config_path: &str, verbose: bool, args: RunArgs) -> i32 {
    let config = match AgentConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(verbose, false);
            eprintln!("❌ Failed to load config file '{}': {}", config_path, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            return 1;
        }
    };
    logger::init_cli_logger(verbose, config.logging.json);
    tracing::info!("🚀 Starting chess agent");
    tracing::info!("📁 Configuration: {}", config_path);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report(&e);
        return 1;
    }
    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - moves are logged, not performed");
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        monitor: args.monitor,
        max_moves: args.max_moves,
    };
    let session = match Session::build(&config, &options).await {
        Ok(session) => session,
        Err(e) => {
            // any failure before the first turn is a startup failure
            report(&e);
            return 1;
        }
    };

    let abort = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        tracing::warn!("🛑 Interrupt received, stopping");
    };
    let (exit, agent) = session.run_until(abort).await;
    if let Some(monitor) = agent.monitor() {
        monitor.log_final_stats();
    }

    let state = agent.state();
    let moves: Vec<String> = state.history().iter().map(|m| m.to_string()).collect();
    tracing::info!(moves = %moves.join(" "), fen = %state.position(), "session finished");

    match exit {
        LoopExit::GameOver(status) => {
            println!("🏁 Game over: {}", status);
            0
        }
        LoopExit::MoveLimitReached(played) => {
            println!("✅ Move limit reached after {} moves", played);
            0
        }
        LoopExit::Aborted => {
            println!("🛑 Stopped. Last confirmed position: {}", state.position());
            0
        }
        LoopExit::NeedsManualIntervention(diagnostic) => {
            if let Ok(json) = serde_json::to_string_pretty(&diagnostic) {
                eprintln!("{}", json);
            }
            report(&AgentError::from(diagnostic))
        }
    }
}

fn setup(config_path: &str, args: SetupArgs) -> anyhow::Result<()> {
    println!("📐 Board setup: enter the screen rectangle that contains the board.");
    println!("   (top-left corner of a8/h1 square through bottom-right of h1/a8)");

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let left = value_or_prompt(args.left, "Left (px)", &mut input)?;
    let top = value_or_prompt(args.top, "Top (px)", &mut input)?;
    let width = value_or_prompt(args.width, "Width (px)", &mut input)?;
    let height = value_or_prompt(args.height, "Height (px)", &mut input)?;
    let orientation = match args.orientation {
        Some(arg) => Orientation::from(arg),
        None => {
            let side: String = prompt("Side at the bottom [white/black]", &mut input)?;
            match side.trim().to_ascii_lowercase().as_str() {
                "" | "w" | "white" => Orientation::WhiteAtBottom,
                "b" | "black" => Orientation::BlackAtBottom,
                other => anyhow::bail!("unknown side {:?}", other),
            }
        }
    };

    anyhow::ensure!(
        width >= 8 && height >= 8,
        "board must be at least 8x8 pixels, got {}x{}",
        width,
        height
    );
    let region = BoardRegion {
        left,
        top,
        width,
        height,
        orientation,
    };
    write_board_region(config_path, &region)
        .with_context(|| format!("writing board region to {}", config_path))?;
    println!(
        "✅ Saved board region {}x{} at ({}, {}), {:?}, to {}",
        width, height, left, top, orientation, config_path
    );
    Ok(())
}

fn value_or_prompt<T, R>(value: Option<T>, label: &str, input: &mut R) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    R: BufRead,
{
    match value {
        Some(v) => Ok(v),
        None => {
            let text: String = prompt(label, input)?;
            text.trim()
                .parse()
                .with_context(|| format!("invalid value for {}: {:?}", label, text.trim()))
        }
    }
}

fn prompt<R: BufRead>(label: &str, input: &mut R) -> anyhow::Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    anyhow::ensure!(read > 0, "input closed while reading {}", label);
    Ok(line)
}
