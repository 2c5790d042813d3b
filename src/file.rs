//! File discovery, output naming and staged output.
//!
//! - [`resolve`] expands command-line arguments (files, directories, globs)
//!   into an ordered, deduplicated list of files
//! - [`encrypted_path`] / [`decrypted_path`] compute default destinations
//! - [`Staged`] writes output to a temporary file and promotes it without
//!   ever replacing an existing file

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Result, bail};
use fast_glob::glob_match;
use hashbrown::HashSet;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cipher::Derive;
use crate::config::{DECRYPTED_SUFFIX, EXCLUDED_PATTERNS, FILE_EXTENSION, OBSCURED_NAME_BYTES, VIDEO_EXTENSION};
use crate::container::ContainerError;
use crate::types::{ProcessorMode, Variant};

static EXCLUSION_MATCHERS: LazyLock<Vec<String>> = LazyLock::new(|| EXCLUDED_PATTERNS.iter().map(|s| (*s).to_owned()).collect());

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A candidate input path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn into_path(self) -> PathBuf {
        self.path
    }

    pub fn size(&self) -> io::Result<u64> {
        fs::metadata(&self.path).map(|meta| meta.len())
    }

    /// Whether the name carries a container extension.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        let name = self.path.as_os_str().to_string_lossy();
        name.ends_with(FILE_EXTENSION) || name.ends_with(VIDEO_EXTENSION)
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.path.file_name().is_some_and(|name| name.to_string_lossy().starts_with('.'))
    }

    pub fn is_excluded(&self) -> bool {
        let path_str = self.path.to_string_lossy();

        EXCLUSION_MATCHERS.iter().any(|pattern| {
            glob_match(pattern, &*path_str) || self.path.components().any(|comp| glob_match(pattern, &*comp.as_os_str().to_string_lossy()))
        })
    }

    pub fn is_eligible(&self, mode: ProcessorMode) -> bool {
        if self.is_hidden() || self.is_excluded() {
            return false;
        }

        match mode {
            ProcessorMode::Encrypt => !self.is_encrypted(),
            ProcessorMode::Decrypt => self.is_encrypted(),
        }
    }
}

/// Expands arguments into files, in argument order, without duplicates.
///
/// Existing files are taken as given. Directories are walked (one level, or
/// fully with `recursive`), skipping hidden and excluded entries and files
/// not eligible for `mode`. Anything else is treated as a glob pattern.
///
/// # Errors
/// Fails when nothing at all was found.
pub fn resolve(inputs: &[String], recursive: bool, mode: ProcessorMode) -> Result<Vec<File>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);

        let found = if path.is_file() {
            vec![File::new(path)]
        } else if path.is_dir() {
            walk(path, recursive, mode)
        } else if input.contains(GLOB_META) {
            glob(input, mode)
        } else {
            warn!(input = %input, "no such file or directory");
            Vec::new()
        };

        if found.is_empty() {
            warn!(input = %input, "matched no eligible files");
        }

        for file in found {
            if seen.insert(file.path.clone()) {
                files.push(file);
            }
        }
    }

    if files.is_empty() {
        bail!("no eligible files found");
    }

    debug!(count = files.len(), "resolved inputs");
    Ok(files)
}

fn walk(root: &Path, recursive: bool, mode: ProcessorMode) -> Vec<File> {
    let depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(root)
        .max_depth(depth)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !File::new(entry.path()).is_hidden())
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| File::new(entry.into_path()))
        .filter(|file| file.is_eligible(mode))
        .collect()
}

fn glob(pattern: &str, mode: ProcessorMode) -> Vec<File> {
    let parts: Vec<&str> = pattern.split('/').collect();
    let literal = parts.iter().take_while(|part| !part.contains(GLOB_META)).count();
    let rest = &parts[literal..];

    let depth = if rest.contains(&"**") { usize::MAX } else { rest.len() };
    let base = parts[..literal].join("/");
    let (root, relative) = if base.is_empty() { (PathBuf::from("."), true) } else { (PathBuf::from(&base), false) };

    WalkDir::new(&root)
        .max_depth(depth)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let path = entry.into_path();
            if relative { path.strip_prefix(".").map(Path::to_path_buf).unwrap_or(path) } else { path }
        })
        .filter(|path| glob_match(pattern, &*path.to_string_lossy()))
        .map(File::new)
        .filter(|file| file.is_eligible(mode))
        .collect()
}

/// Default container path for `input`.
///
/// With `obscure`, the container gets a random hex name in the same
/// directory; otherwise the variant's extension is appended.
pub fn encrypted_path(input: &Path, variant: Variant, obscure: bool) -> PathBuf {
    if obscure {
        let name: [u8; OBSCURED_NAME_BYTES] = Derive::generate_salt();
        return parent_dir(input).join(format!("{}{FILE_EXTENSION}", hex::encode(name)));
    }

    let mut name = input.as_os_str().to_os_string();
    name.push(variant.extension());
    PathBuf::from(name)
}

/// Default plaintext path for the container at `input`.
///
/// A stored original name wins, reduced to its final component. Otherwise
/// the container extension is stripped, or `.decrypted` is appended when
/// there is none to strip.
pub fn decrypted_path(input: &Path, original_name: Option<&str>) -> PathBuf {
    if let Some(name) = original_name.and_then(sanitize_name) {
        return parent_dir(input).join(name);
    }

    let stripped = input.file_name().map(|name| name.to_string_lossy().into_owned()).and_then(|name| {
        [FILE_EXTENSION, VIDEO_EXTENSION]
            .iter()
            .find_map(|ext| name.strip_suffix(ext).map(str::to_owned))
            .filter(|stem| !stem.is_empty())
    });

    match stripped {
        Some(stem) => input.with_file_name(stem),
        None => {
            let mut name = input.as_os_str().to_os_string();
            name.push(DECRYPTED_SUFFIX);
            PathBuf::from(name)
        }
    }
}

/// Reduces a stored name to a single safe path component.
///
/// Names come from the container and are untrusted: directory parts written
/// by any platform are dropped, and `.`/`..` are refused.
fn sanitize_name(name: &str) -> Option<&str> {
    let last = name.rsplit(['/', '\\']).next()?.trim_end_matches('\0');

    match Path::new(last).components().collect::<Vec<_>>().as_slice() {
        [Component::Normal(_)] => Some(last),
        _ => None,
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().filter(|parent| !parent.as_os_str().is_empty()).map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Output under construction.
///
/// Lives as a hidden temporary file in the destination directory and is
/// deleted if dropped before [`Staged::commit`].
pub struct Staged {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl Staged {
    pub fn create(destination: &Path) -> Result<Self, ContainerError> {
        let dir = parent_dir(destination);
        fs::create_dir_all(&dir)?;

        let temp = Builder::new().prefix(".lockbox-").suffix(".part").tempfile_in(&dir)?;
        Ok(Self { temp, destination: destination.to_path_buf() })
    }

    #[inline]
    pub fn file_mut(&mut self) -> &mut fs::File {
        self.temp.as_file_mut()
    }

    /// Syncs the staged file and renames it to the destination.
    ///
    /// # Errors
    /// [`ContainerError::DestinationExists`] if something appeared at the
    /// destination in the meantime; it is left untouched.
    pub fn commit(self) -> Result<PathBuf, ContainerError> {
        self.temp.as_file().sync_all()?;

        match self.temp.persist_noclobber(&self.destination) {
            Ok(_) => Ok(self.destination),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Err(ContainerError::DestinationExists(self.destination)),
            Err(err) => Err(ContainerError::Io(err.error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_encrypted_path() {
        assert_eq!(encrypted_path(Path::new("dir/clip.mp4"), Variant::Video, false), PathBuf::from("dir/clip.mp4.lbv"));
        assert_eq!(encrypted_path(Path::new("dir/a.txt"), Variant::File, false), PathBuf::from("dir/a.txt.lbx"));

        let obscured = encrypted_path(Path::new("dir/a.txt"), Variant::File, true);
        assert_eq!(obscured.parent(), Some(Path::new("dir")));
        let name = obscured.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), OBSCURED_NAME_BYTES * 2 + FILE_EXTENSION.len());
        assert!(name.ends_with(FILE_EXTENSION));
    }

    #[test]
    fn test_decrypted_path() {
        assert_eq!(decrypted_path(Path::new("dir/clip.mp4.lbv"), None), PathBuf::from("dir/clip.mp4"));
        assert_eq!(decrypted_path(Path::new("dir/a.txt.lbx"), None), PathBuf::from("dir/a.txt"));
        assert_eq!(decrypted_path(Path::new("dir/blob"), None), PathBuf::from("dir/blob.decrypted"));
        assert_eq!(decrypted_path(Path::new(".lbx"), None), PathBuf::from(".lbx.decrypted"));
        assert_eq!(decrypted_path(Path::new("dir/0a1b.lbx"), Some("report.pdf")), PathBuf::from("dir/report.pdf"));
        assert_eq!(decrypted_path(Path::new("0a1b.lbx"), Some("report.pdf")), PathBuf::from("./report.pdf"));
    }

    #[test]
    fn test_stored_names_are_sanitized() {
        assert_eq!(decrypted_path(Path::new("d/x.lbx"), Some("../../etc/passwd")), PathBuf::from("d/passwd"));
        assert_eq!(decrypted_path(Path::new("d/x.lbx"), Some("C:\\Users\\me\\photo.jpg")), PathBuf::from("d/photo.jpg"));
        assert_eq!(decrypted_path(Path::new("d/x.lbx"), Some("..")), PathBuf::from("d/x"));
        assert_eq!(decrypted_path(Path::new("d/x.lbx"), Some("dir/")), PathBuf::from("d/x"));
    }

    #[test]
    fn test_eligibility() {
        assert!(File::new("a/notes.txt").is_eligible(ProcessorMode::Encrypt));
        assert!(!File::new("a/notes.txt.lbx").is_eligible(ProcessorMode::Encrypt));
        assert!(File::new("a/clip.mp4.lbv").is_eligible(ProcessorMode::Decrypt));
        assert!(!File::new("a/.hidden").is_eligible(ProcessorMode::Encrypt));
        assert!(!File::new("node_modules/pkg/index.js").is_eligible(ProcessorMode::Encrypt));
        assert!(!File::new("out/.lockbox-abc.part").is_eligible(ProcessorMode::Encrypt));
    }

    #[test]
    fn test_resolve_directory_and_dedup() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("b.txt.lbx"));
        touch(&root.join(".secret"));
        touch(&root.join("nested/c.txt"));

        let root_arg = root.to_string_lossy().into_owned();
        let file_arg = root.join("a.txt").to_string_lossy().into_owned();

        let flat = resolve(&[root_arg.clone(), file_arg], false, ProcessorMode::Encrypt).unwrap();
        assert_eq!(flat, vec![File::new(root.join("a.txt"))]);

        let mut deep: Vec<PathBuf> = resolve(&[root_arg.clone()], true, ProcessorMode::Encrypt).unwrap().into_iter().map(File::into_path).collect();
        deep.sort();
        assert_eq!(deep, vec![root.join("a.txt"), root.join("nested/c.txt")]);

        let containers = resolve(&[root_arg], false, ProcessorMode::Decrypt).unwrap();
        assert_eq!(containers, vec![File::new(root.join("b.txt.lbx"))]);
    }

    #[test]
    fn test_resolve_glob() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("one.txt"));
        touch(&root.join("two.txt"));
        touch(&root.join("three.bin"));

        let pattern = format!("{}/*.txt", root.to_string_lossy());
        let mut found: Vec<PathBuf> = resolve(&[pattern], false, ProcessorMode::Encrypt).unwrap().into_iter().map(File::into_path).collect();
        found.sort();
        assert_eq!(found, vec![root.join("one.txt"), root.join("two.txt")]);
    }

    #[test]
    fn test_resolve_nothing() {
        assert!(resolve(&["/definitely/not/here".into()], false, ProcessorMode::Encrypt).is_err());
    }

    #[test]
    fn test_staged_commit_and_noclobber() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out.bin");

        let mut staged = Staged::create(&destination).unwrap();
        staged.file_mut().write_all(b"first").unwrap();
        assert_eq!(staged.commit().unwrap(), destination);
        assert_eq!(fs::read(&destination).unwrap(), b"first");

        let mut staged = Staged::create(&destination).unwrap();
        staged.file_mut().write_all(b"second").unwrap();
        assert!(matches!(staged.commit(), Err(ContainerError::DestinationExists(_))));
        assert_eq!(fs::read(&destination).unwrap(), b"first");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_staged_drop_cleans_up() {
        let dir = TempDir::new().unwrap();
        let staged = Staged::create(&dir.path().join("out.bin")).unwrap();
        drop(staged);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
