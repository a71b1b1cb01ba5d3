//! Browsing of, and uploading to, a directory tree from which trace files are
//! picked.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::iter::Peekable;
use std::path::{Component, Path, PathBuf};
use std::str::Chars;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::fs::ensure_path_exists;
use crate::Error;

/// The number of files accepted in a single upload unless configured
/// otherwise.
pub const DEFAULT_MAX_UPLOAD_FILES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
}

/// The content of a single directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub current_path: String,
    pub files: Vec<FileEntry>,
}

/// A file received as part of an upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// What happened to one file of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gives access to everything beneath a root directory, and nothing outside
/// of it.
#[derive(Debug, Clone)]
pub struct FileBrowser {
    root: PathBuf,
    max_upload_files: usize,
}

impl FileBrowser {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_upload_files: DEFAULT_MAX_UPLOAD_FILES,
        }
    }

    pub fn with_max_upload_files(mut self, max: usize) -> Self {
        self.max_upload_files = max;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_files(&self) -> usize {
        self.max_upload_files
    }

    /// Resolves a path relative to the root. Absolute paths and paths that
    /// could climb out of the root are rejected.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, Error> {
        let mut resolved = self.root.clone();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => (),
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::PathOutsideRoot(rel.to_string()))
                }
            }
        }
        Ok(resolved)
    }

    /// Lists the given directory: directories first, then files, each in
    /// natural order of their names.
    pub fn list(&self, rel: &str) -> Result<Listing, Error> {
        let dir = self.resolve(rel)?;
        let read_err =
            |e: io::Error| Error::Io(format!("while scanning directory {}", dir.display()), e);
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let is_directory = entry.file_type().map_err(read_err)?.is_dir();
            files.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory,
            });
        }
        files.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| natural_cmp(&a.name, &b.name))
        });
        debug!("Listed {} entries in {}", files.len(), dir.display());
        Ok(Listing {
            current_path: rel.to_string(),
            files,
        })
    }

    /// Creates a folder (and any missing parents) named `name` within the
    /// given directory.
    pub fn create_folder(&self, name: &str, rel: &str) -> Result<PathBuf, Error> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains("..") {
            return Err(Error::InvalidFolderName(name.to_string()));
        }
        let path = self.resolve(rel)?.join(trimmed);
        ensure_path_exists(&path)?;
        info!("Created folder {}", path.display());
        Ok(path)
    }

    /// Writes the given files into the given directory. Failing to write one
    /// file does not prevent the others from being written.
    pub fn upload(
        &self,
        rel: &str,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<UploadOutcome>, Error> {
        if files.len() > self.max_upload_files {
            return Err(Error::TooManyFiles {
                count: files.len(),
                max: self.max_upload_files,
            });
        }
        let dir = self.resolve(rel)?;
        let outcomes = files
            .into_iter()
            .map(|file| match write_upload(&dir, &file) {
                Ok(path) => {
                    info!("Uploaded {}", path.display());
                    UploadOutcome {
                        name: file.name,
                        ok: true,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("Failed to upload {}: {}", file.name, e);
                    UploadOutcome {
                        name: file.name,
                        ok: false,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();
        Ok(outcomes)
    }
}

// Only the final component of the client-supplied name is used.
fn write_upload(dir: &Path, file: &UploadedFile) -> Result<PathBuf, Error> {
    let name = Path::new(&file.name).file_name().ok_or_else(|| {
        Error::Io(
            format!("while uploading {}", file.name),
            io::Error::new(io::ErrorKind::InvalidInput, "invalid file name"),
        )
    })?;
    if !dir.is_dir() {
        return Err(Error::Io(
            format!("while uploading {}", file.name),
            io::Error::new(io::ErrorKind::NotFound, "no such directory"),
        ));
    }
    let path = dir.join(name);
    fs::write(&path, &file.content)
        .map_err(|e| Error::Io(format!("while writing {}", path.display()), e))?;
    Ok(path)
}

/// Compares two names the way people expect: runs of digits compare by
/// their numeric value, everything else compares case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ord = cmp_digit_runs(&take_digits(&mut left), &take_digits(&mut right));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(listing: &Listing) -> Vec<&str> {
        listing.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn natural_ordering() {
        let mut names = vec!["trace10.sor", "Trace2.sor", "trace1.sor", "a", "B"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["a", "B", "trace1.sor", "Trace2.sor", "trace10.sor"]
        );
        assert_eq!(natural_cmp("file007", "file7"), Ordering::Less);
    }

    #[test]
    fn lists_directories_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b10.sor"), "").unwrap();
        fs::write(dir.path().join("b9.sor"), "").unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();

        let browser = FileBrowser::new(dir.path());
        let listing = browser.list("").unwrap();
        assert_eq!(names(&listing), vec!["Alpha", "zeta", "b9.sor", "b10.sor"]);
        assert!(listing.files[0].is_directory);
        assert!(!listing.files[2].is_directory);
        assert!(matches!(browser.list("missing"), Err(Error::Io(_, _))));
    }

    #[test]
    fn paths_cannot_escape_the_root() {
        let browser = FileBrowser::new("/srv/public");
        assert_eq!(
            browser.resolve("a/./b").unwrap(),
            PathBuf::from("/srv/public/a/b")
        );
        for rel in ["..", "a/../../etc", "/etc"] {
            assert!(matches!(
                browser.resolve(rel),
                Err(Error::PathOutsideRoot(_))
            ));
        }
    }

    #[test]
    fn folder_names_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let browser = FileBrowser::new(dir.path());
        for name in ["", "  ", "a/b", "..", "x..y"] {
            assert!(matches!(
                browser.create_folder(name, ""),
                Err(Error::InvalidFolderName(_))
            ));
        }
        let created = browser.create_folder("site-7", "nested/deeper").unwrap();
        assert!(created.is_dir());
        assert!(created.starts_with(dir.path()));
    }

    #[test]
    fn uploads_report_per_file_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let browser = FileBrowser::new(dir.path()).with_max_upload_files(2);
        let file = |name: &str| UploadedFile {
            name: name.to_string(),
            content: b"data".to_vec(),
        };

        let outcomes = browser
            .upload("", vec![file("../evil/trace.sor"), file("..")])
            .unwrap();
        assert!(outcomes[0].ok);
        assert!(!outcomes[1].ok);
        assert!(outcomes[1].error.is_some());
        assert_eq!(
            fs::read(dir.path().join("trace.sor")).unwrap(),
            b"data".to_vec()
        );

        assert!(matches!(
            browser.upload("", vec![file("a"), file("b"), file("c")]),
            Err(Error::TooManyFiles { count: 3, max: 2 })
        ));
    }
}
