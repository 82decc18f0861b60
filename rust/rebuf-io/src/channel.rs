//! `ChannelProxy`: a shared handle to the file a chunk source reads from.

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A cheaply clonable handle to an open, read-only file together with its path.
///
/// All clones share the same file descriptor, which is closed once the last
/// clone is dropped. Sources that are not backed by a file use a
/// [`named`](ChannelProxy::named) channel, which carries only a path for
/// identification and refuses reads.
#[derive(Clone)]
pub struct ChannelProxy(Arc<ChannelInner>);

struct ChannelInner {
    path: PathBuf,
    file: Option<File>,
}

impl ChannelProxy {
    /// Opens the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<ChannelProxy> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(ChannelProxy::from_file(path, file))
    }

    /// Wraps an already opened file.
    pub fn from_file(path: impl Into<PathBuf>, file: File) -> ChannelProxy {
        ChannelProxy(Arc::new(ChannelInner {
            path: path.into(),
            file: Some(file),
        }))
    }

    /// Creates a channel without a backing file.
    pub fn named(name: impl Into<PathBuf>) -> ChannelProxy {
        ChannelProxy(Arc::new(ChannelInner {
            path: name.into(),
            file: None,
        }))
    }

    pub fn file_path(&self) -> &Path {
        &self.0.path
    }

    /// Returns another handle to the same file.
    pub fn shared_copy(&self) -> ChannelProxy {
        self.clone()
    }

    /// Current size of the file.
    pub fn size(&self) -> std::io::Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    /// Reads into `buf` starting at `position`, until `buf` is full or the end of
    /// the file is reached. Returns the number of bytes read.
    pub fn read_at(&self, position: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let file = self.file()?;
        let mut filled = 0;
        while filled < buf.len() {
            match file_read_at(file, position + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn file(&self) -> std::io::Result<&File> {
        self.0.file.as_ref().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("channel {} is not backed by a file", self.0.path.display()),
            )
        })
    }
}

impl std::fmt::Display for ChannelProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.path.display())
    }
}

impl std::fmt::Debug for ChannelProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelProxy")
            .field("path", &self.0.path)
            .field("file_backed", &self.0.file.is_some())
            .finish()
    }
}

#[cfg(unix)]
fn file_read_at(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;

    file.read_at(buf, pos)
}

#[cfg(windows)]
fn file_read_at(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;

    file.seek_read(buf, pos)
}
