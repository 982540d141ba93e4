use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation, checked once per candidate by the scan coordinator.
///
/// The signal is raised either programmatically or by the appearance of a stop file.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    file: Option<PathBuf>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn stop_file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        if self.file.as_deref().is_some_and(Path::exists) {
            self.request();
            return true;
        }
        false
    }
}
