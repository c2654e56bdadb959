//! Copying output paths to the system clipboard.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

static CLIPBOARD: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

// On Linux the clipboard contents vanish with the owning instance, so each copy
// keeps its instance alive long enough for a clipboard manager to read it.
const HOLD: Duration = Duration::from_secs(2);

fn clipboard_thread() -> &'static std_mpsc::Sender<String> {
    CLIPBOARD.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();
        std::thread::spawn(move || {
            for text in rx {
                if let Ok(mut clipboard) = arboard::Clipboard::new() {
                    if clipboard.set_text(text).is_ok() {
                        std::thread::sleep(HOLD);
                    }
                }
            }
        });
        tx
    })
}

/// Queue `path` for the clipboard without blocking the UI thread.
pub fn copy_path(path: &Path) -> Result<()> {
    clipboard_thread()
        .send(path.display().to_string())
        .map_err(|_| anyhow!("clipboard thread is gone"))
}
