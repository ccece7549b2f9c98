//! Archive inspection and event helpers for integration tests

use cds_extract::Event;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use zip::ZipArchive;

/// Entry names of the archive at `path`, in the order they were written
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Content of one archive entry
pub fn archive_entry(path: &Path, name: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|e| panic!("missing entry {}: {}", name, e))
        .read_to_string(&mut content)
        .unwrap();
    content
}

/// Receive events until `stop` matches one, or the timeout passes
///
/// Returns every event received, including the matching one.
pub async fn collect_until(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    stop: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}

/// Whether an event ends an export
pub fn is_terminal(event: &Event) -> bool {
    matches!(
        event,
        Event::ExportComplete { .. } | Event::ExportCancelled { .. } | Event::ExportFailed { .. }
    )
}
