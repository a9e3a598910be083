use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{PartialLines, TailOptions, WatchOptions};

/// Process settings, taken from the command line or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "sampletail", version, about = "Stream numeric samples appended to a log file to browsers")]
pub struct Config {
    /// Log file to tail, created when absent
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Verbose diagnostic logging
    #[arg(long, env = "SAMPLETAIL_DEBUG")]
    pub debug: bool,

    /// Address to listen on
    #[arg(long, env = "SAMPLETAIL_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "SAMPLETAIL_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Milliseconds to wait after a change before reading it
    #[arg(long, env = "SAMPLETAIL_SETTLE_MS", default_value_t = 100)]
    pub settle_ms: u64,

    /// Batches a slow client may fall behind before losing the oldest
    #[arg(long, env = "SAMPLETAIL_CLIENT_QUEUE", default_value_t = 256)]
    pub client_queue: usize,

    /// Leave an unterminated last line unread until its newline arrives
    #[arg(long, env = "SAMPLETAIL_DEFER_PARTIAL_LINES")]
    pub defer_partial_lines: bool,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn tail_options(&self) -> TailOptions {
        TailOptions {
            partial_lines: if self.defer_partial_lines {
                PartialLines::Defer
            } else {
                PartialLines::Consume
            },
        }
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over the `debug` switch.
pub fn init_logging(debug: bool) {
    let default_filter = if debug {
        "info,sampletail=debug,tower_http=debug"
    } else {
        "warn,sampletail=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
