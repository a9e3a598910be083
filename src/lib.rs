//! # Sampletail
//!
//! Sampletail follows a growing log file, extracts one numeric sample per line and streams new samples to
//! connected WebSocket clients, while clients that join late first receive everything seen so far.
//!
//! * `parse_line` pulls the sample out of a line: the fifth whitespace-separated field, parsed as `f64`.
//!
//! ```rust
//! # use sampletail::parse_line;
//! assert_eq!(parse_line("2024-05-01 10:00:00 node-3 td 3.14").unwrap().value, 3.14);
//! assert!(parse_line("x y").is_err());
//! ```
//!
//! * `TailReader` keeps a byte offset into the file and on each call reads only what was appended since,
//! starting over when the file is truncated or replaced. Samples land in a `HistoryStore`.
//!
//! ```rust no_run
//! # use sampletail::{HistoryStore, TailOptions, TailReader, TailError};
//! let mut history = HistoryStore::new();
//! let mut reader = TailReader::initialize("classic-td.log", TailOptions::default(), &mut history)?;
//! for sample in reader.read_new(&mut history)? {
//!     println!("new sample: {}", sample.value);
//! }
//! # Ok::<(), TailError>(())
//! ```
//!
//! * `SampleFeed` guards the history and fans new batches out to subscribers, giving each subscriber the
//! current history first.
//!
//! * `spawn_tailer` watches the file's directory and drives the reader from filesystem notifications, and
//! `server::app` exposes the feed over HTTP.
//!
//! ```rust no_run
//! # use sampletail::{HistoryStore, SampleFeed, TailOptions, TailReader, WatchOptions, WatchTarget};
//! # use tokio_util::sync::CancellationToken;
//! # async fn run() -> anyhow::Result<()> {
//! let target = WatchTarget::resolve("classic-td.log")?;
//! let mut history = HistoryStore::new();
//! let reader = TailReader::initialize(target.file(), TailOptions::default(), &mut history)?;
//! let feed = SampleFeed::new(history, 256);
//! let tailer = sampletail::spawn_tailer(
//!     target,
//!     reader,
//!     feed.clone(),
//!     WatchOptions::default(),
//!     CancellationToken::new(),
//! )?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, sampletail::server::app(feed)).await?;
//! tailer.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!

pub mod config;
mod feed;
mod history;
mod line_parser;
mod offset;
pub mod path_utils;
pub mod server;
mod tail_reader;
mod watcher;

pub use feed::{FeedMessage, SampleFeed, Subscription};
pub use history::HistoryStore;
pub use line_parser::{parse_line, LineRejection, Sample, SAMPLE_FIELD};
pub use offset::{FileStat, OffsetTracker, ReadStart};
pub use tail_reader::{PartialLines, ReadBatch, TailError, TailOptions, TailReader};
pub use watcher::{spawn_tailer, TailerHandle, WatchError, WatchOptions, WatchTarget, DEFAULT_SETTLE};
