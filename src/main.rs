use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use litecached::cache::CacheFacade;
use litecached::config::{Cli, Config};
use litecached::net::server;
use litecached::stats::Stats;

fn main() {
    let cli = Cli::parse();
    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("litecached: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.verbosity.filter_directive()))
        .init();

    if config.daemonize {
        tracing::warn!(
            "--daemonize is accepted for compatibility but ignored; litecached always runs in the foreground"
        );
    }
    if config.username.is_some() {
        tracing::warn!(
            "--username is accepted for compatibility but ignored; litecached does not drop privileges"
        );
    }
    if config.pidfile.is_some() {
        tracing::warn!("--pidfile is accepted for compatibility but ignored");
    }

    let cache = Rc::new(RefCell::new(CacheFacade::new(usize::MAX, config.max_bytes)));
    let stats = Rc::new(RefCell::new(Stats::new(usize::MAX, config.max_bytes)));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build the tokio runtime");
    let local = tokio::task::LocalSet::new();

    let result = local.block_on(&runtime, server::run(&config, cache, stats));

    if let Err(err) = result {
        tracing::error!(error = %err, "server exited with an error");
        std::process::exit(1);
    }
}
