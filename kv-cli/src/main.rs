#![allow(unused)]

use std::io::{stdin, IsTerminal};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{env, fs};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use kv::error::CResult;
use kvcli::command::{self, run_server, Command};
use kvcli::config::ConfigLoad;
use kvcli::session;
use kvcli::{trace, PBAR};
use log::info;

#[derive(Debug, Parser, PartialEq)]
#[command(version)]
// disable default help flag since it would conflict with --host
#[command(author, about, disable_help_flag = true)]
pub struct Args {
    #[clap(short, long, help = "debug model")]
    debug: bool,

    #[clap(long, help = "Print help information")]
    help: bool,

    /// Configuration file path, default 'config/kvdb.toml'
    #[clap(
        short = 'c',
        long = "config",
        help = "Configuration file path",
        default_value = "config/kvdb.toml"
    )]
    config: String,

    /// The subcommand to run: `leader` or `follower`. With neither, `kvcli`
    /// starts the client REPL against the leader named in the config.
    #[clap(subcommand)]
    cmd: Option<Command>,

    /// quiet model, No output printed to stdout
    #[clap(long = "quiet", short = 'q', default_value = "false")]
    quiet: bool,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    #[clap(short = 'n', long, help = "Force non-interactive mode", default_value = "false")]
    non_interactive: bool,

    #[clap(long, require_equals = true, help = "Query to execute")]
    query: Option<String>,
}

/// CMD like:
///     kvcli              ==> client REPL against the configured leader
///     kvcli leader ...    ==> runs a leader coordinator
///     kvcli follower ...  ==> runs a follower storage node
#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_hooks();

    eprintln!();
    eprintln!("██  ██  █        █");
    eprintln!("██ ██   ██      ██");
    eprintln!("███      ██    ██");
    eprintln!("██ ██     ██  ██");
    eprintln!("██  ██     ████  KV Storage CLI");
    eprintln!();

    let args = Args::parse();
    if args.debug {
        println!("{:?}", args);
    }

    let log_dir = format!("{}/.kvcli", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    let _guards = trace::init_logging(&log_dir, &args.log_level).await?;
    info!("kvcli start args: {:?}", &args);

    let mut cmd = Args::command();
    if args.help {
        cmd.print_help()?;
        return Ok(());
    }

    if args.quiet {
        PBAR.set_quiet(true);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("received Ctrl+C!");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let mut cfg = match ConfigLoad::new(&args.config) {
        Ok(c) => c,
        Err(_) => ConfigLoad::default(),
    };
    if args.debug {
        println!("{:?}", &cfg);
        eprintln!();
    }
    info!("kvcli start config: {:?}", &cfg);

    if let Some(cmd) = args.cmd {
        return run_server(cmd, cfg).await.map_err(|err| anyhow::anyhow!(err.to_string()));
    }

    let is_terminal = stdin().is_terminal();
    let is_repl = is_terminal && !args.non_interactive && args.query.is_none();
    if is_repl {
        cfg.terminal_update();
    }

    let mut session = session::Session::try_new(cfg, is_repl, running.clone()).await?;
    info!("kvcli starting, is_repl={is_repl}");

    if is_repl {
        session.handle_repl().await;
        return Ok(());
    }

    match args.query {
        None => session.handle_reader(stdin().lock()).await?,
        Some(query) => session.handle_reader(std::io::Cursor::new(query)).await?,
    }

    Ok(())
}

fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();

    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);
            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta)
                .expect("human-panic: printing error message to console failed");
        }));
    }
}
