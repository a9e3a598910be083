use std::{
    fs::Metadata,
    io,
    path::{Path, PathBuf},
};

/// Split a file path into its canonical parent directory and the canonical path of the file inside it.
///
/// Only the parent has to exist; the file itself may be created later. A bare file name resolves against the
/// current directory.
///
/// ## Example
///
/// ```rust
/// # let dir = std::env::temp_dir();
/// let (parent, target) = sampletail::path_utils::resolve_in_parent(dir.join("samples.log"))?;
/// assert_eq!(target, parent.join("samples.log"));
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn resolve_in_parent(path: impl AsRef<Path>) -> io::Result<(PathBuf, PathBuf)> {
    let path = path.as_ref();
    let Some(file_name) = path.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("`{}` does not name a file", path.display()),
        ));
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize()?;
    let target = parent.join(file_name);
    Ok((parent, target))
}

/// Inode of the filesystem object described by `metadata`
#[cfg(unix)]
pub fn inode_of(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
pub fn inode_of(_metadata: &Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::resolve_in_parent;

    #[test]
    fn target_lives_in_canonical_parent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();

        let (parent, target) = resolve_in_parent(nested.join("..").join("sub").join("a.log")).unwrap();
        assert_eq!(parent, nested.canonicalize().unwrap());
        assert_eq!(target, parent.join("a.log"));
    }

    #[test]
    fn missing_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_in_parent(dir.path().join("nope").join("a.log")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let err = resolve_in_parent("/").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn replaced_file_gets_new_inode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\n").unwrap();
        let first = super::inode_of(&std::fs::metadata(&path).unwrap());

        let replacement = dir.path().join("a.log.new");
        std::fs::write(&replacement, "two\n").unwrap();
        std::fs::rename(&replacement, &path).unwrap();
        let second = super::inode_of(&std::fs::metadata(&path).unwrap());

        assert!(first.is_some());
        assert_ne!(first, second);
    }
}
