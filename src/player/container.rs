//! The detached host container engine instances live in.
//!
//! There is one container per process at a time: a private runtime
//! directory (engine instances put their control sockets there). It is
//! created lazily by the first holder and removed when the last holder lets
//! go, which is the only teardown path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tempfile::TempDir;
use tracing::debug;

use super::types::InstanceId;

#[derive(Debug)]
pub struct HostContainer {
    dir: TempDir,
}

impl HostContainer {
    fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("moodtune-").tempdir()?;
        debug!(path = %dir.path().display(), "created host container");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the instance `id` should place its control socket.
    pub fn socket_path(&self, id: InstanceId) -> PathBuf {
        self.dir.path().join(format!("engine-{}.sock", id.0))
    }
}

impl Drop for HostContainer {
    fn drop(&mut self) {
        debug!(path = %self.dir.path().display(), "removing host container");
    }
}

/// Process-wide slot handing out shared references to the container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSlot {
    current: Arc<Mutex<Weak<HostContainer>>>,
}

impl ContainerSlot {
    /// Reuse the live container or create a fresh one.
    pub fn acquire(&self) -> io::Result<Arc<HostContainer>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(c) = current.upgrade() {
            return Ok(c);
        }
        let c = Arc::new(HostContainer::create()?);
        *current = Arc::downgrade(&c);
        Ok(c)
    }

    #[cfg(test)]
    pub fn is_live(&self) -> bool {
        self.current
            .lock()
            .map(|c| c.strong_count() > 0)
            .unwrap_or(false)
    }
}
