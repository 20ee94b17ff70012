//! Where rendered text goes

use lineage_core::{LineageError, LineageResult};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace the contents of `path` with `contents`.
///
/// The text is written to a temporary file in the destination directory and
/// renamed over the target, so readers never see a partial file.
pub fn write_atomic(path: &Path, contents: &str) -> LineageResult<()> {
    let wrap = |source: io::Error| LineageError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(wrap)?;
    file.write_all(contents.as_bytes()).map_err(wrap)?;
    file.flush().map_err(wrap)?;
    file.persist(path).map_err(|e| wrap(e.error))?;

    log::info!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Write to stdout, ignoring a closed pipe
pub fn write_stdout(contents: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match out.write_all(contents.as_bytes()).and_then(|_| out.flush()) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.txt");
        fs::write(&path, "old contents that are longer than the new ones").unwrap();

        write_atomic(&path, "/sbin/launchd    1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "/sbin/launchd    1\n");

        // No temporary files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_reports_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("tree.txt");

        let err = write_atomic(&path, "x").unwrap_err();
        match err {
            LineageError::OutputWrite { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {}", other),
        }
    }
}
