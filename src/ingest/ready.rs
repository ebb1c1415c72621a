//! File-ready gate: admit a file once its writer has apparently finished.

use std::path::Path;
use std::time::{Duration, Instant};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Sample the file size every 100 ms for up to `ready_wait`. The file is
/// ready when it can be opened for shared read and two consecutive size
/// samples agree. Returns `false` when the deadline passed first; callers
/// proceed anyway.
pub async fn wait_until_ready(path: &Path, ready_wait: Duration) -> bool {
    let deadline = Instant::now() + ready_wait;
    let mut last_size: Option<u64> = None;

    loop {
        let openable = std::fs::File::open(path).is_ok();
        let size = std::fs::metadata(path).ok().map(|m| m.len());
        if openable {
            if let (Some(previous), Some(current)) = (last_size, size) {
                if previous == current {
                    return true;
                }
            }
        }
        last_size = size;

        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(SAMPLE_INTERVAL).await;
    }
}
