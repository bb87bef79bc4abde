use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};
use tracing::info;

use crate::archive::zip_file;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub output_dir: PathBuf,
    /// Write every bucket to this file instead of one file per month.
    pub fixed_file: Option<String>,
    /// Zip each file once the writer has moved past it.
    pub compress: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            fixed_file: None,
            compress: false,
        }
    }
}

/// Files produced by a [`RollingWriter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenFiles {
    pub files: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
}

#[derive(Debug)]
struct OpenFile {
    path: PathBuf,
    out: BufWriter<File>,
}

/// Append-only writer that switches files when a bucket's month changes.
#[derive(Debug)]
pub struct RollingWriter {
    opts: WriterOptions,
    prefix: String,
    current: Option<OpenFile>,
    written: WrittenFiles,
}

impl RollingWriter {
    pub fn new(opts: WriterOptions, prefix: impl Into<String>) -> Self {
        Self {
            opts,
            prefix: prefix.into(),
            current: None,
            written: WrittenFiles::default(),
        }
    }

    /// Output file for `bucket`: the fixed file, or `<prefix>_<YYYY>_<MM>.csv`.
    pub fn target_for(&self, bucket: NaiveDateTime) -> PathBuf {
        let name = match &self.opts.fixed_file {
            Some(name) => name.clone(),
            None => format!(
                "{}_{:04}_{:02}.csv",
                self.prefix,
                bucket.year(),
                bucket.month()
            ),
        };
        self.opts.output_dir.join(name)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|c| c.path.as_path())
    }

    /// Make `bucket`'s target the open file. Returns `true` on a rollover.
    ///
    /// The previous file is flushed and, with compression on, archived before
    /// the new one is opened for append.
    pub fn open_for(&mut self, bucket: NaiveDateTime) -> Result<bool> {
        let target = self.target_for(bucket);
        if self.current_path() == Some(target.as_path()) {
            return Ok(false);
        }

        if let Some(prev) = self.current.take() {
            self.close(prev)?;
        }

        info!(path = %target.display(), "write to file");
        let file = OpenOptions::new().create(true).append(true).open(&target)?;
        if !self.written.files.contains(&target) {
            self.written.files.push(target.clone());
        }
        self.current = Some(OpenFile {
            path: target,
            out: BufWriter::new(file),
        });
        Ok(true)
    }

    /// Append `lines` to `bucket`'s file, newline-terminated, and flush.
    pub fn write_bucket<I, S>(&mut self, bucket: NaiveDateTime, lines: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.open_for(bucket)?;
        let Some(current) = self.current.as_mut() else {
            return Ok(0);
        };

        let mut n = 0;
        for line in lines {
            current.out.write_all(line.as_ref().as_bytes())?;
            current.out.write_all(b"\n")?;
            n += 1;
        }
        current.out.flush()?;
        Ok(n)
    }

    /// Flush the last file, archive it when compression is on, and report what was produced.
    pub fn finish(mut self) -> Result<WrittenFiles> {
        if let Some(last) = self.current.take() {
            self.close(last)?;
        }
        Ok(std::mem::take(&mut self.written))
    }

    fn close(&mut self, mut file: OpenFile) -> Result<()> {
        file.out.flush()?;
        drop(file.out);
        if self.opts.compress {
            let archive = zip_file(&file.path)?;
            self.written.archives.push(archive);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn writer(dir: &Path, fixed: Option<&str>, compress: bool) -> RollingWriter {
        RollingWriter::new(
            WriterOptions {
                output_dir: dir.to_path_buf(),
                fixed_file: fixed.map(str::to_string),
                compress,
            },
            "aire",
        )
    }

    #[test]
    fn monthly_names_are_zero_padded() {
        let w = writer(Path::new("out"), None, false);
        assert_eq!(
            w.target_for(dt("2024-03-31 23:00:00")),
            Path::new("out").join("aire_2024_03.csv")
        );
        let fixed = writer(Path::new("out"), Some("all.csv"), false);
        assert_eq!(
            fixed.target_for(dt("2019-11-02 00:00:00")),
            Path::new("out").join("all.csv")
        );
    }

    #[test]
    fn rolls_only_when_the_month_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path(), None, false);
        assert!(w.open_for(dt("2024-01-30 00:00:00")).unwrap());
        assert!(!w.open_for(dt("2024-01-31 00:00:00")).unwrap());
        assert!(w.open_for(dt("2024-02-01 00:00:00")).unwrap());
        assert!(!w.open_for(dt("2024-02-01 01:00:00")).unwrap());
        let out = w.finish().unwrap();
        assert_eq!(out.files.len(), 2);
        assert!(out.archives.is_empty());
    }

    #[test]
    fn fixed_file_never_rolls() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path(), Some("fixed.csv"), true);
        assert!(w.open_for(dt("2024-01-31 00:00:00")).unwrap());
        assert!(!w.open_for(dt("2024-02-01 00:00:00")).unwrap());
        assert!(!w.open_for(dt("2025-07-01 00:00:00")).unwrap());
        let out = w.finish().unwrap();
        assert_eq!(out.files, vec![dir.path().join("fixed.csv")]);
        assert_eq!(out.archives, vec![dir.path().join("fixed.zip")]);
    }

    #[test]
    fn fixed_zip_name_is_not_clobbered_by_its_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path(), Some("out.zip"), true);
        w.write_bucket(dt("2024-03-01 00:00:00"), ["a;b", "c;d"]).unwrap();
        let out = w.finish().unwrap();

        assert_eq!(out.archives, vec![dir.path().join("out.zip.zip")]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.zip")).unwrap(),
            "a;b\nc;d\n"
        );
    }

    #[test]
    fn appends_without_truncating_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aire_2024_03.csv");
        std::fs::write(&path, "previous;run\n").unwrap();

        let mut w = writer(dir.path(), None, false);
        let n = w
            .write_bucket(dt("2024-03-01 00:00:00"), ["Girona;NO2;7", "Vic;O3;40"])
            .unwrap();
        assert_eq!(n, 2);
        // Bytes are on disk before finish.
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "previous;run\nGirona;NO2;7\nVic;O3;40\n"
        );
        w.finish().unwrap();
    }

    #[test]
    fn previous_file_is_archived_at_rollover_and_last_one_at_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path(), None, true);
        w.write_bucket(dt("2024-01-31 00:00:00"), ["a"]).unwrap();
        assert!(!dir.path().join("aire_2024_01.zip").exists());

        w.write_bucket(dt("2024-02-01 00:00:00"), ["b"]).unwrap();
        assert!(dir.path().join("aire_2024_01.zip").exists());
        assert!(!dir.path().join("aire_2024_02.zip").exists());

        let out = w.finish().unwrap();
        assert!(dir.path().join("aire_2024_02.zip").exists());
        assert_eq!(out.archives.len(), 2);
        assert!(dir.path().join("aire_2024_01.csv").exists());
    }

    #[test]
    fn finish_without_any_bucket_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = writer(dir.path(), None, true).finish().unwrap();
        assert_eq!(out, WrittenFiles::default());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
