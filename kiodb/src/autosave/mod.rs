//! Periodic autosaving for a shared table.
//!
//! The autosaver is a convenience around `Table::save`: a background
//! thread that flushes the snapshot on an interval. It holds no table
//! state of its own; serialization against user mutations comes from
//! the shared mutex.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::table::Table;

/// Handle to a background autosave thread. Dropping the handle (or
/// calling `stop`) shuts the thread down after flushing once more.
pub struct Autosaver {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Autosaver {
    /// Start saving `table` every `interval`.
    pub fn start(table: Arc<Mutex<Table>>, interval: Duration) -> Autosaver {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    save_locked(&table);
                }
                // Stop requested or the handle was dropped: flush and exit.
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                    save_locked(&table);
                    break;
                }
            }
        });

        Autosaver {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Stop the autosave thread, flushing one final save.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn save_locked(table: &Arc<Mutex<Table>>) {
    let mut table = match table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(e) = table.save() {
        log::warn!("Autosave failed for {}: {e}", table.path().display());
    }
}
