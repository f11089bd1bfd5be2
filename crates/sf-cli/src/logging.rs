//! `tracing` initialization. Always writes to stderr: the broker subcommand
//! speaks line-delimited JSON-RPC on stdout, and nothing may share that
//! stream.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    });

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
