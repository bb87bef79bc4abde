use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// `dir/aire_2024_03.csv` -> `dir/aire_2024_03.zip`
///
/// A source that already ends in `.zip` gets a second extension
/// (`out.zip` -> `out.zip.zip`) so the archive never overwrites it.
pub fn archive_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")) {
        let mut name = path.as_os_str().to_owned();
        name.push(".zip");
        PathBuf::from(name)
    } else {
        path.with_extension("zip")
    }
}

/// Write a single-entry deflate archive next to `path`.
///
/// The entry is stored under the file's base name. Zip64 is enabled so entries
/// above 4 GiB are accepted. The source file is left untouched; an existing
/// archive with the same name is replaced.
pub fn zip_file(path: &Path) -> Result<PathBuf> {
    let entry_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidRequest(format!("cannot archive {}", path.display())))?;
    let target = archive_path(path);

    let mut source = BufReader::new(File::open(path)?);
    let mut zip = ZipWriter::new(File::create(&target)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    zip.start_file(entry_name, options)?;
    io::copy(&mut source, &mut zip)?;
    zip.finish()?;

    tracing::info!(source = %path.display(), archive = %target.display(), "archived");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn archive_holds_one_entry_with_the_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("meteo_2024_01.csv");
        let content = "X4;32;2024-01-01T00:00:00.000;5,4\nD5;33;2024-01-01T00:00:00.000;Sant Adrià\n";
        std::fs::write(&csv, content).unwrap();

        let zip_path = zip_file(&csv).unwrap();
        assert_eq!(zip_path, dir.path().join("meteo_2024_01.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "meteo_2024_01.csv");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut unpacked = String::new();
        entry.read_to_string(&mut unpacked).unwrap();
        assert_eq!(unpacked, content);

        assert_eq!(std::fs::read_to_string(&csv).unwrap(), content);
    }

    #[test]
    fn rewrites_an_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("aire.csv");
        std::fs::write(&csv, "a\n").unwrap();
        zip_file(&csv).unwrap();
        std::fs::write(&csv, "a\nb\n").unwrap();
        let zip_path = zip_file(&csv).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut unpacked = String::new();
        archive.by_index(0).unwrap().read_to_string(&mut unpacked).unwrap();
        assert_eq!(unpacked, "a\nb\n");
    }

    #[test]
    fn zip_named_source_keeps_its_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.zip");
        std::fs::write(&src, "a;b\nc;d\n").unwrap();

        let zip_path = zip_file(&src).unwrap();
        assert_eq!(zip_path, dir.path().join("out.zip.zip"));
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "a;b\nc;d\n");

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "out.zip");
        let mut unpacked = String::new();
        entry.read_to_string(&mut unpacked).unwrap();
        assert_eq!(unpacked, "a;b\nc;d\n");
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = zip_file(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
