use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

/// Where targets are written. Passed explicitly to every target constructor.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub output_path: PathBuf,
}

impl OutputConfig {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

/// A durable artifact location.
///
/// `exists()` must agree with `open_for_write()`: once a writer has been
/// committed, `exists()` returns true for the same identity; a writer that is
/// dropped or fails before commit leaves nothing that `exists()` would see.
pub trait Target: Send + Sync + fmt::Debug {
    /// Identity of the artifact, derived from the task parameters.
    fn key(&self) -> &str;

    fn exists(&self) -> bool;

    fn open_for_write(&self) -> io::Result<Box<dyn TargetWriter>>;

    /// Committed contents, or `None` if nothing has been written yet.
    fn read(&self) -> io::Result<Option<String>>;
}

/// Scoped write handle returned by [`Target::open_for_write`].
///
/// Bytes become visible only on [`TargetWriter::commit`]. Dropping the handle
/// without committing discards everything written to it.
pub trait TargetWriter: Write + Send {
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Build the identity of a target from a namespace and one parameter.
///
/// Within one namespace, distinct parameters must render distinctly
/// (integers do), which keeps keys collision-free.
pub fn target_key(namespace: &str, param: impl fmt::Display) -> String {
    format!("{}_{}", namespace, param)
}

/// Plain text file under [`OutputConfig::output_path`], named `{key}.txt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalTarget {
    key: String,
    path: PathBuf,
}

impl LocalTarget {
    pub fn new(config: &OutputConfig, namespace: &str, param: impl fmt::Display) -> Self {
        let key = target_key(namespace, param);
        let path = config.output_path.join(format!("{}.txt", key));
        Self { key, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Target for LocalTarget {
    fn key(&self) -> &str {
        &self.key
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn open_for_write(&self) -> io::Result<Box<dyn TargetWriter>> {
        // The temp file must live in the destination directory so that the
        // final rename stays on one filesystem and is atomic.
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let file = tempfile::Builder::new()
            .prefix(&format!(".{}.", self.key))
            .suffix(".tmp")
            .tempfile_in(dir)?;

        debug!("Opened temp file {:?} for target {}", file.path(), self.key);

        Ok(Box::new(LocalTargetWriter {
            file,
            path: self.path.clone(),
        }))
    }

    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

struct LocalTargetWriter {
    file: NamedTempFile,
    path: PathBuf,
}

impl Write for LocalTargetWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl TargetWriter for LocalTargetWriter {
    fn commit(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush()?;
        self.file.as_file().sync_all()?;

        let LocalTargetWriter { file, path } = *self;
        file.persist(&path).map_err(|e| e.error)?;
        sync_parent_dir(&path)?;

        debug!("Committed target {:?}", path);
        Ok(())
    }
}

/// Flush the directory entry created by the rename, otherwise the rename
/// itself can be lost on power failure.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
