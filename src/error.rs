use std::{io, path::PathBuf};
use thiserror::Error;

/// Fatal outcome of one conversion stage. The `Display` text is what the
/// caller shows the user; causes go to the log only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Path to install does not exist: {}", .0.display())]
    RootMissing(PathBuf),
    #[error(
        "Cannot patch the game, the copy of the game does not seem legitimate. \
         The list of files/folders have been logged to converter.log for troubleshooting."
    )]
    Illegitimate,
    #[error(
        "Cannot patch the game as it is installed in a system folder which can potentially \
         cause some modding errors. Install the game in a location such as C:\\Games"
    )]
    ProtectedLocation,
    #[error("Failed to copy the game to {} ... Cannot continue patching.", .0.display())]
    RelocationFailed(PathBuf),
    #[error("Failed to backup files and/or registry")]
    BackupFailed,
    #[error("Failed to delete cache files from install path")]
    CacheCleanupFailed,
    #[error("Failed to delete old game converter and app files")]
    LegacyDeleteFailed,
    #[error("Failed to move music_ogg to music/vgmstream")]
    MusicMigrationFailed,
    #[error("Failed to delete compatibility flags set by old game converter")]
    CompatFlagsFailed,
    #[error("Failed to copy ff7.exe to install path")]
    ExeReplaceFailed,
    #[error("Failed to copy open gl drivers to install path")]
    DriverInstallFailed,
}

impl StageError {
    /// True when the conversion stopped before any cleanup, delete or replace ran.
    pub fn precedes_destructive_changes(&self) -> bool {
        matches!(
            self,
            StageError::RootMissing(_)
                | StageError::Illegitimate
                | StageError::ProtectedLocation
                | StageError::RelocationFailed(_)
                | StageError::BackupFailed
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config store io: {0}")]
    Io(#[from] io::Error),
    #[error("config store data: {0}")]
    Data(#[from] serde_json::Error),
    #[error("malformed export file {path}: {reason}")]
    Export { path: PathBuf, reason: String },
}
