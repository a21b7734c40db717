//! Asset pipeline: turns a network-retrievable zip archive into a scene
//! subtree. Strictly sequential, single attempt, no retries; runs once on a
//! dedicated thread and reports progress over a channel that the render loop
//! drains each frame.

use anyhow::{bail, Context, Result};
use std::io::{Cursor, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::loaders::collada::{self, ColladaDocument};

// === Load state machine ===

/// Explicit load state, driven by `LoadEvent`s. `Done` and `Failed` are
/// terminal; there is no retry, cancellation, or timeout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Fetching {
        /// Byte-granularity progress; `None` until the transport reports a
        /// computable length.
        percent: Option<u8>,
    },
    Unzipping,
    Parsing,
    Done,
    Failed(String),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Done | LoadState::Failed(_))
    }

    /// Folds one loader event into the state. Events arriving after a
    /// terminal state are ignored.
    pub fn apply(&mut self, event: &LoadEvent) {
        if self.is_terminal() {
            return;
        }
        *self = match event {
            LoadEvent::Fetching => LoadState::Fetching { percent: None },
            LoadEvent::Progress { loaded, total } => {
                let percent = if *total > 0 {
                    Some(((loaded * 100) / total).min(100) as u8)
                } else {
                    None
                };
                LoadState::Fetching { percent }
            }
            LoadEvent::Unzipping => LoadState::Unzipping,
            LoadEvent::Parsing => LoadState::Parsing,
            LoadEvent::Loaded(_) => LoadState::Done,
            LoadEvent::Failed(message) => LoadState::Failed(message.clone()),
        };
    }
}

/// Messages sent from the loader thread to the render loop.
pub enum LoadEvent {
    Fetching,
    Progress { loaded: u64, total: u64 },
    Unzipping,
    Parsing,
    Loaded(Box<ColladaDocument>),
    Failed(String),
}

// === Pipeline stages ===

/// Fetches the archive bytes. `http(s)` URLs go over the network; anything
/// else is read from the local filesystem. Success is HTTP 200 exactly; any
/// other status fails with the response's status text as the error message.
pub fn fetch_bytes(url: &str, progress: &mut dyn FnMut(u64, u64)) -> Result<Vec<u8>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        let response = reqwest::blocking::get(url)
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            bail!("{reason}");
        }

        let total = response.content_length().unwrap_or(0);
        let mut reader = response;
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut chunk).context("reading response body")?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if total > 0 {
                progress(bytes.len() as u64, total);
            }
        }
        Ok(bytes)
    } else {
        let bytes =
            std::fs::read(url).with_context(|| format!("reading local archive {url:?}"))?;
        progress(bytes.len() as u64, bytes.len() as u64);
        Ok(bytes)
    }
}

/// Opens the bytes as a zip archive and decompresses one named entry to text.
pub fn extract_entry(archive_bytes: &[u8], entry: &str) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(archive_bytes)).context("invalid zip archive")?;
    let mut file = archive
        .by_name(entry)
        .with_context(|| format!("archive has no entry {entry:?}"))?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .with_context(|| format!("entry {entry:?} is not valid UTF-8 text"))?;
    Ok(text)
}

/// Unzip + extract + parse, for callers that already hold the archive bytes.
pub fn load_scene_archive(archive_bytes: &[u8], entry: &str) -> Result<ColladaDocument> {
    let text = extract_entry(archive_bytes, entry)?;
    collada::parse(&text)
}

// === Loader thread ===

/// Spawns the one-shot loader thread. Events arrive on the returned channel;
/// the thread exits after sending `Loaded` or `Failed`.
pub fn spawn_loader(url: String, entry: String) -> Receiver<LoadEvent> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("scene-loader".into())
        .spawn(move || run_loader(&url, &entry, &tx))
        .expect("failed to spawn loader thread");
    rx
}

fn run_loader(url: &str, entry: &str, tx: &Sender<LoadEvent>) {
    log::info!("fetching scene archive from {url}");
    let _ = tx.send(LoadEvent::Fetching);

    let bytes = match fetch_bytes(url, &mut |loaded, total| {
        let _ = tx.send(LoadEvent::Progress { loaded, total });
    }) {
        Ok(bytes) => bytes,
        Err(e) => return fail(tx, e),
    };

    log::info!("unzipping {} bytes", bytes.len());
    let _ = tx.send(LoadEvent::Unzipping);
    let text = match extract_entry(&bytes, entry) {
        Ok(text) => text,
        Err(e) => return fail(tx, e),
    };

    let _ = tx.send(LoadEvent::Parsing);
    match collada::parse(&text) {
        Ok(document) => {
            log::info!(
                "scene ready: {} materials, {} animations discarded",
                document.material_count,
                document.animation_count
            );
            let _ = tx.send(LoadEvent::Loaded(Box::new(document)));
        }
        Err(e) => fail(tx, e),
    }
}

fn fail(tx: &Sender<LoadEvent>, error: anyhow::Error) {
    log::error!("scene load failed: {error:#}");
    let _ = tx.send(LoadEvent::Failed(format!("{error:#}")));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_walks_the_happy_path() {
        let mut state = LoadState::default();
        assert_eq!(state, LoadState::Idle);

        state.apply(&LoadEvent::Fetching);
        assert_eq!(state, LoadState::Fetching { percent: None });

        state.apply(&LoadEvent::Progress { loaded: 50, total: 200 });
        assert_eq!(state, LoadState::Fetching { percent: Some(25) });

        state.apply(&LoadEvent::Unzipping);
        assert_eq!(state, LoadState::Unzipping);

        state.apply(&LoadEvent::Parsing);
        assert_eq!(state, LoadState::Parsing);

        state.apply(&LoadEvent::Failed("boom".into()));
        assert_eq!(state, LoadState::Failed("boom".into()));
        assert!(state.is_terminal());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut state = LoadState::Failed("gone".into());
        state.apply(&LoadEvent::Fetching);
        assert_eq!(state, LoadState::Failed("gone".into()));
    }

    #[test]
    fn unknown_length_reports_no_percent() {
        let mut state = LoadState::Fetching { percent: None };
        state.apply(&LoadEvent::Progress { loaded: 10, total: 0 });
        assert_eq!(state, LoadState::Fetching { percent: None });
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let err = extract_entry(b"definitely not a zip", "scene.dae").unwrap_err();
        assert!(format!("{err:#}").contains("invalid zip archive"));
    }
}
