//! Positioned file writes on a Tokio blocking pool.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{AsyncWriteTarget, Result, WriteCompletion};
use bytes::BytesMut;
use core_runtime::config::WriteBackSettings;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

/// Writes submitted buffers at their offsets from Tokio's blocking pool.
///
/// Each submission becomes one `spawn_blocking` task doing a positioned
/// write, so completions can arrive in any order. The header path writes
/// synchronously on the caller's thread.
pub struct TokioFileTarget {
    file: Arc<File>,
    path: PathBuf,
    runtime: Runtime,
}

impl TokioFileTarget {
    /// Create (or truncate) `path` for writing.
    pub fn create(path: impl AsRef<Path>, settings: &WriteBackSettings) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(settings.io_worker_threads.max(1))
            .thread_name("wave-io")
            .build()?;

        info!(path = %path.display(), workers = settings.io_worker_threads, "Opened write target");
        Ok(Self {
            file: Arc::new(file),
            path,
            runtime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsyncWriteTarget for TokioFileTarget {
    fn submit(&self, buffer: BytesMut, offset: u64, completion: WriteCompletion) -> Result<()> {
        let file = Arc::clone(&self.file);
        self.runtime.spawn_blocking(move || {
            let result = write_at(&file, &buffer, offset).map(|()| buffer.len());
            completion(buffer, result);
        });
        Ok(())
    }

    fn write_header(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        write_at(&self.file, bytes, offset)?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.file.sync_all()?;
        debug!(path = %self.path.display(), "Write target synced");
        Ok(())
    }
}

#[cfg(unix)]
fn write_at(file: &File, bytes: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(bytes, offset)
}

#[cfg(windows)]
fn write_at(file: &File, mut bytes: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !bytes.is_empty() {
        match file.seek_write(bytes, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                bytes = &bytes[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
