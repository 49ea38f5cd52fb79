//! Retirement engine
//!
//! Deletes capture files once their data is durably delivered. Callers
//! vet candidates (fully below the watermark, delivery confirmed);
//! this module enforces the active-file safeguard and performs
//! best-effort deletion, logged per file. One failed deletion never
//! blocks the others nor fails the run; the file is simply picked up
//! by retirement on a later run.

use crate::catalog::CaptureFile;
use tracing::{info, warn};

/// Delete the given drained capture files. Returns how many were
/// actually removed.
pub fn retire_files(files: &[CaptureFile]) -> usize {
    let mut deleted = 0;

    for file in files {
        // Last line of defense: never touch a file the sensor may
        // still be writing.
        if file.active {
            warn!(file = %file.name, "refusing to retire active file");
            continue;
        }

        match std::fs::remove_file(&file.path) {
            Ok(()) => {
                info!(file = %file.name, "retired capture file");
                deleted += 1;
            },
            Err(e) => {
                warn!(file = %file.name, error = %e, "failed to retire capture file");
            },
        }
    }

    deleted
}
