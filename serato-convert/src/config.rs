//! Converter configuration

use std::path::{Path, PathBuf};

use serato_core::database::DATABASE_FILE_NAME;

#[derive(Debug, Clone)]
pub struct Config {
    /// Serato library folder (`_Serato_`)
    pub serato_dir: PathBuf,
    /// Serato `database V2` file
    pub database_path: PathBuf,
    /// Absolute root that crate paths are relative to
    pub volume_root: PathBuf,
    /// Rekordbox XML output file
    pub output_path: PathBuf,
    /// Optional JSON report of the run
    pub report_path: Option<PathBuf>,
    /// Duplicate hot cues as memory cues
    pub copy_to_memory_cues: bool,
}

impl Config {
    pub fn new(
        serato_dir: &Path,
        database_path: Option<&Path>,
        volume_root: &Path,
        output_path: PathBuf,
        report_path: Option<PathBuf>,
        copy_to_memory_cues: bool,
    ) -> std::io::Result<Self> {
        let serato_dir = expand_home(serato_dir);
        let database_path = database_path
            .map(expand_home)
            .unwrap_or_else(|| serato_dir.join(DATABASE_FILE_NAME));
        let volume_root = absolute(&expand_home(volume_root))?;

        Ok(Self {
            serato_dir,
            database_path,
            volume_root,
            output_path,
            report_path,
            copy_to_memory_cues,
        })
    }
}

/// Replace a leading `~` with `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Anchor a relative path at the working directory
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
