//! Raw dump and summary files.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::OutputError;

/// Default directory for run outputs.
pub const DEFAULT_OUTPUT_DIR: &str = "emails";

/// File locations for one run: `{date}_{days}_{account}[_partial].{txt,md}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub raw: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, date: NaiveDate, days: u32, account: &str, partial: bool) -> Self {
        let mut base = format!("{}_{}_{}", date.format("%Y-%m-%d"), days, account);
        if partial {
            base.push_str("_partial");
        }
        Self {
            raw: dir.join(format!("{base}.txt")),
            summary: dir.join(format!("{base}.md")),
        }
    }

    /// Write the raw artifact, creating the directory if needed.
    pub fn write_raw(&self, text: &str) -> Result<(), OutputError> {
        write_file(&self.raw, text)
    }

    /// Write the Markdown summary.
    pub fn write_summary(&self, text: &str) -> Result<(), OutputError> {
        write_file(&self.summary, text)
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, text).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 19).unwrap()
    }

    #[test]
    fn file_names() {
        let paths = OutputPaths::new(Path::new("emails"), date(), 1, "work", false);
        assert_eq!(paths.raw, Path::new("emails/2025-05-19_1_work.txt"));
        assert_eq!(paths.summary, Path::new("emails/2025-05-19_1_work.md"));
    }

    #[test]
    fn partial_marker() {
        let paths = OutputPaths::new(Path::new("out"), date(), 1, "icloud", true);
        assert_eq!(paths.raw, Path::new("out/2025-05-19_1_icloud_partial.txt"));
        assert_eq!(paths.summary, Path::new("out/2025-05-19_1_icloud_partial.md"));
    }

    #[test]
    fn writes_create_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("emails");
        let paths = OutputPaths::new(&out, date(), 7, "work", false);

        paths.write_raw("raw").unwrap();
        paths.write_summary("# md").unwrap();

        assert_eq!(std::fs::read_to_string(&paths.raw).unwrap(), "raw");
        assert_eq!(std::fs::read_to_string(&paths.summary).unwrap(), "# md");
    }
}
