use crate::WalkError;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A packaged path found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// `/`-separated path rooted at `/`, e.g. `/usr/local/bin/demo`.
    pub path: String,
    /// Location of the entry on the host filesystem.
    pub full_path: PathBuf,
    pub kind: EntryKind,
    /// Permission bits (`st_mode & 0o7777`).
    pub mode: u32,
}

/// Lazy traversal of a source tree.
///
/// Yields every regular file, plus every directory with no file or directory
/// entry below it (other directories are implied by the paths of their
/// entries).
/// Entries of each directory are visited in byte order of their names and a
/// directory is yielded after its contents. Symlinks, sockets, FIFOs and
/// devices are skipped. Iteration stops after the first error.
pub struct Walker {
    root: PathBuf,
    inner: walkdir::IntoIter,
    /// Per depth: whether the directory currently open at that depth has an
    /// emitted entry somewhere below it.
    populated: Vec<bool>,
    started: bool,
    done: bool,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let inner = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter();
        Self {
            root,
            inner,
            populated: Vec::new(),
            started: false,
            done: false,
        }
    }

    fn check_root(&self) -> Result<(), WalkError> {
        let meta = fs::metadata(&self.root).map_err(|e| WalkError::Io {
            path: self.root.clone(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(WalkError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    fn flag(&mut self, depth: usize) -> &mut bool {
        if self.populated.len() <= depth {
            self.populated.resize(depth + 1, false);
        }
        &mut self.populated[depth]
    }

    /// Record that every directory above `depth` has an emitted entry.
    fn mark_ancestors(&mut self, depth: usize) {
        if self.populated.len() < depth {
            self.populated.resize(depth, false);
        }
        for flag in &mut self.populated[..depth] {
            *flag = true;
        }
    }

    fn make_entry(
        &self,
        entry: &walkdir::DirEntry,
        kind: EntryKind,
    ) -> Result<WalkEntry, WalkError> {
        let meta = entry.metadata().map_err(|e| self.convert(e))?;
        let rel = entry
            .path()
            .strip_prefix(&self.root)
            .map_err(|_| WalkError::Io {
                path: entry.path().to_path_buf(),
                source: std::io::Error::other("entry outside of walk root"),
            })?;
        let path = rooted_path(rel).ok_or_else(|| WalkError::NonUtf8Path(entry.path().into()))?;
        Ok(WalkEntry {
            path,
            full_path: entry.path().to_path_buf(),
            kind,
            mode: meta.permissions().mode() & 0o7777,
        })
    }

    fn convert(&self, e: walkdir::Error) -> WalkError {
        let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
        let msg = e.to_string();
        let source = e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other(msg));
        WalkError::Io { path, source }
    }
}

impl Iterator for Walker {
    type Item = Result<WalkEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            if let Err(e) = self.check_root() {
                self.done = true;
                return Some(Err(e));
            }
        }

        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.done = true;
                    return Some(Err(self.convert(e)));
                }
            };
            let depth = entry.depth();
            let ft = entry.file_type();

            let result = if ft.is_file() {
                self.mark_ancestors(depth);
                self.make_entry(&entry, EntryKind::File)
            } else if ft.is_dir() {
                if std::mem::take(self.flag(depth)) {
                    trace!("{} implied by its entries", entry.path().display());
                    continue;
                }
                self.mark_ancestors(depth);
                self.make_entry(&entry, EntryKind::Directory)
            } else {
                debug!("skipping special file {}", entry.path().display());
                continue;
            };

            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
    }
}

/// Convert a path relative to the walk root into its rooted `/a/b` form.
fn rooted_path(rel: &Path) -> Option<String> {
    let mut out = String::new();
    for component in rel.components() {
        if let Component::Normal(name) = component {
            out.push('/');
            out.push_str(name.to_str()?);
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Some(out)
}

/// Location of a rooted manifest path under `root` on the host.
pub fn rooted_to_host(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}
