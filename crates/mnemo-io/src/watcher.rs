#![cfg(feature = "watcher")]
//! Debounced file watcher driving incremental scans.
//!
//! A background thread owns the `notify` watcher and a coalescing loop:
//! events for the same path collapse between debounce flushes, with removal
//! beating creation beating modification. Each flush becomes one scanner
//! batch. `start` on a running watcher and `stop` on a stopped one are both
//! no-ops.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mnemo_core::cancel::CancellationListener;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::IoError;
use crate::scanner::Scanner;

/// Kinds of file events the coalescer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileEventKind {
    Created,
    Modified,
    Removed,
}

fn event_rank(k: FileEventKind) -> u8 {
    match k {
        FileEventKind::Removed => 3,
        FileEventKind::Created => 2,
        FileEventKind::Modified => 1,
    }
}

fn map_notify_event(event: &Event) -> Vec<(PathBuf, FileEventKind)> {
    let kind = match &event.kind {
        EventKind::Create(_) => FileEventKind::Created,
        EventKind::Modify(_) => FileEventKind::Modified,
        EventKind::Remove(_) => FileEventKind::Removed,
        _ => return Vec::new(),
    };
    event.paths.iter().map(|p| (p.clone(), kind)).collect()
}

/// A running watcher, stoppable and join-able.
struct WatchTask {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Watches roots and feeds coalesced batches into the scanner.
pub struct ScanWatcher {
    scanner: Arc<Scanner>,
    roots: Vec<PathBuf>,
    debounce: Duration,
    task: Mutex<Option<WatchTask>>,
}

impl ScanWatcher {
    pub fn new(scanner: Arc<Scanner>, roots: Vec<PathBuf>, debounce: Duration) -> Self {
        Self {
            scanner,
            roots,
            debounce,
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().expect("watcher lock").is_some()
    }

    /// Start watching. Starting a running watcher is a no-op.
    pub fn start(&self) -> Result<(), IoError> {
        let mut slot = self.task.lock().expect("watcher lock");
        if slot.is_some() {
            debug!("watcher already running; start is a no-op");
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let scanner = self.scanner.clone();
        let roots = self.roots.clone();
        let debounce = self.debounce;

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        let handle = thread::spawn(move || {
            let (notify_tx, notify_rx) =
                std::sync::mpsc::channel::<Result<Event, notify::Error>>();
            let mut watcher = match RecommendedWatcher::new(
                move |res| {
                    let _ = notify_tx.send(res);
                },
                Config::default().with_poll_interval(debounce),
            ) {
                Ok(w) => w,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            for root in &roots {
                if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
                    warn!(root = %root.display(), error = %e, "failed to watch root");
                }
            }
            let _ = ready_tx.send(Ok(()));

            let mut pending: HashMap<PathBuf, (FileEventKind, Instant)> = HashMap::new();
            loop {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                match notify_rx.recv_timeout(debounce) {
                    Ok(Ok(event)) => {
                        let now = Instant::now();
                        for (path, kind) in map_notify_event(&event) {
                            pending
                                .entry(path)
                                .and_modify(|(existing, last)| {
                                    if event_rank(kind) > event_rank(*existing) {
                                        *existing = kind;
                                    }
                                    *last = now;
                                })
                                .or_insert((kind, now));
                        }
                    }
                    Ok(Err(e)) => warn!(error = %e, "watcher event error"),
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }

                // Flush paths whose debounce window has elapsed.
                let now = Instant::now();
                let ready: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, last))| now.duration_since(*last) >= debounce)
                    .map(|(p, _)| p.clone())
                    .collect();
                if ready.is_empty() {
                    continue;
                }
                let mut batch: Vec<(String, Option<String>)> = Vec::with_capacity(ready.len());
                for path in ready {
                    let (kind, _) = pending.remove(&path).expect("pending entry");
                    let path_str = path.to_string_lossy().to_string();
                    match kind {
                        FileEventKind::Removed => batch.push((path_str, None)),
                        FileEventKind::Created | FileEventKind::Modified => {
                            match std::fs::read_to_string(&path) {
                                Ok(content) => batch.push((path_str, Some(content))),
                                // Unreadable (deleted mid-window, binary, ...):
                                // treat as removal if it is gone, else skip.
                                Err(_) if !path.exists() => batch.push((path_str, None)),
                                Err(e) => {
                                    debug!(path = %path_str, error = %e, "skipping unreadable file")
                                }
                            }
                        }
                    }
                }
                if batch.is_empty() {
                    continue;
                }
                match scanner.scan_changes(&batch, &CancellationListener::never()) {
                    Ok(outcome) => debug!(
                        files = outcome.stats.files_scanned,
                        deleted = outcome.stats.nodes_deleted,
                        "watcher batch scanned"
                    ),
                    Err(e) => warn!(error = %e, "watcher batch scan failed"),
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *slot = Some(WatchTask { stop, handle });
                Ok(())
            }
            Ok(Err(msg)) => {
                let _ = handle.join();
                Err(IoError::Watcher(msg))
            }
            Err(_) => Err(IoError::Watcher("watcher thread died during startup".into())),
        }
    }

    /// Stop watching. Stopping a stopped watcher is a no-op.
    pub fn stop(&self) {
        let task = self.task.lock().expect("watcher lock").take();
        if let Some(task) = task {
            task.stop.store(true, Ordering::Relaxed);
            let _ = task.handle.join();
        } else {
            debug!("watcher not running; stop is a no-op");
        }
    }
}

impl Drop for ScanWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
