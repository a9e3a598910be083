//! Filesystem change notification driving the tail loop.
//!
//! The watch is installed on the data file's parent directory, not on the file itself: writers that replace
//! the file (rename over it, rewrite it) would otherwise silently detach a file-level watch. Events are
//! filtered down to the exact data file path before they reach the loop.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use notify::{
    event::{AccessKind, AccessMode, CreateKind},
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{path_utils::resolve_in_parent, SampleFeed, TailReader};

/// Pause between a change notification and the read it triggers.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// Data file to follow together with the directory the watch is attached to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchTarget {
    dir: PathBuf,
    file: PathBuf,
}

impl WatchTarget {
    /// Resolve `path` once against its canonical parent directory, which must exist.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let path = path.as_ref();
        let (dir, file) = resolve_in_parent(path).map_err(|source| WatchError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { dir, file })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Whether `event` may mean new data in the data file.
    ///
    /// Only content changes, creation and close-after-write of exactly the data file count. Everything else
    /// seen in the directory, including directories and other files, is ignored.
    pub fn matches(&self, event: &notify::Event) -> bool {
        let relevant_kind = match event.kind {
            EventKind::Create(CreateKind::Folder) => false,
            EventKind::Create(_) | EventKind::Modify(_) => true,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
            _ => false,
        };
        relevant_kind && event.paths.iter().any(|path| path == &self.file)
    }
}

/// Knobs for the tail loop.
#[derive(Copy, Clone, Debug)]
pub struct WatchOptions {
    /// Delay between a change notification and the read, lets a writer finish its flush.
    pub settle: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
        }
    }
}

/// Possible errors that could happen while setting up the watch
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("while resolving watch target `{path}`")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("while installing filesystem watch")]
    Notify(#[from] notify::Error),
}

/// Running tail loop. Dropping the handle removes the filesystem watch, which also ends the loop once its
/// pending read is done; `.shutdown()` stops it right away and waits for it to exit.
pub struct TailerHandle {
    _watcher: RecommendedWatcher,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TailerHandle {
    /// Stop the tail loop and wait until it has exited.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!("tail loop ended abnormally: {e}");
        }
    }
}

/// Install the directory watch and spawn the task that owns `reader` for the rest of its life.
///
/// Every relevant change triggers, after the settling delay, one `SampleFeed::ingest` on a blocking thread.
/// Reads never overlap: changes observed while a read is running collapse into a single follow-up read. Must be
/// called from within a tokio runtime.
pub fn spawn_tailer(
    target: WatchTarget,
    reader: TailReader,
    feed: SampleFeed,
    options: WatchOptions,
    shutdown: CancellationToken,
) -> Result<TailerHandle, WatchError> {
    // one slot: a pending change already guarantees the next read
    let (changes_tx, changes_rx) = mpsc::channel(1);
    let watcher = watch_directory(target, changes_tx)?;
    let task = tokio::spawn(run_tail_loop(
        reader,
        feed,
        changes_rx,
        options,
        shutdown.clone(),
    ));
    Ok(TailerHandle {
        _watcher: watcher,
        shutdown,
        task,
    })
}

fn watch_directory(
    target: WatchTarget,
    changes: mpsc::Sender<()>,
) -> Result<RecommendedWatcher, WatchError> {
    let dir = target.dir.clone();
    let mut watcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if target.matches(&event) {
                    trace!(kind = ?event.kind, "data file changed");
                    // a full channel means a read is already pending
                    let _ = changes.try_send(());
                }
            }
            Err(e) => error!("file watcher error: {e}"),
        })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(dir = %dir.display(), "watching for data file changes");
    Ok(watcher)
}

async fn run_tail_loop(
    mut reader: TailReader,
    feed: SampleFeed,
    mut changes: mpsc::Receiver<()>,
    options: WatchOptions,
    shutdown: CancellationToken,
) {
    loop {
        // idle
        tokio::select! {
            _ = shutdown.cancelled() => break,
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
            }
        }

        // settling
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(options.settle) => {}
        }
        // the read below covers whatever changed while settling
        while changes.try_recv().is_ok() {}

        // reading, a change arriving now stays queued for exactly one follow-up read
        let pass_feed = feed.clone();
        let pass = tokio::task::spawn_blocking(move || {
            let result = pass_feed.ingest(&mut reader);
            (reader, result)
        });
        let result = match pass.await {
            Ok((returned, result)) => {
                reader = returned;
                result
            }
            Err(e) => {
                error!("tail read panicked, stopping: {e}");
                break;
            }
        };
        match result {
            Ok(0) => {}
            Ok(count) => debug!(
                samples = count,
                clients = feed.client_count(),
                "broadcast new samples"
            ),
            Err(e) => warn!(error = ?e, "reading data file failed, will retry on next change"),
        }
    }
    debug!("tail loop stopped");
}
