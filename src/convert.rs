use crate::{
    backup,
    config::Resources,
    driver,
    error::StageError,
    fs_utils,
    game::{ConversionSettings, GameVersion, COMPAT_FLAGS_KEY, OLD_CONVERTER_KEY},
    location::ProtectedLocations,
    manifest::{
        EntryKind, CACHE_PATTERNS, COMPAT_FLAG_TARGETS, CURRENT_APP, HELPER_LIBRARY_PATTERN,
        LEGACY_CONVERTER, MUSIC_SOURCE_FOLDER, MUSIC_TARGET_FOLDER,
    },
    piracy,
    progress::{self, ProgressSink},
    rules::DetectionRules,
    store::ConfigStore,
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    ValidatePath,
    PiracyCheck,
    LocationCheck,
    Relocate,
    Backup,
    CacheCleanup,
    LegacyFileDelete,
    MusicPathMigration,
    CompatFlagCleanup,
    ExeReplace,
    DriverInstall,
    Done,
    Failed,
}

/// Happy path, in order. `Relocate` only runs when `LocationCheck` asks for it.
const PIPELINE: [Stage; 13] = [
    Stage::Start,
    Stage::ValidatePath,
    Stage::PiracyCheck,
    Stage::LocationCheck,
    Stage::Relocate,
    Stage::Backup,
    Stage::CacheCleanup,
    Stage::LegacyFileDelete,
    Stage::MusicPathMigration,
    Stage::CompatFlagCleanup,
    Stage::ExeReplace,
    Stage::DriverInstall,
    Stage::Done,
];

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::ValidatePath => "validate path",
            Stage::PiracyCheck => "legitimacy check",
            Stage::LocationCheck => "location check",
            Stage::Relocate => "relocate",
            Stage::Backup => "backup",
            Stage::CacheCleanup => "cache cleanup",
            Stage::LegacyFileDelete => "legacy file delete",
            Stage::MusicPathMigration => "music path migration",
            Stage::CompatFlagCleanup => "compatibility flag cleanup",
            Stage::ExeReplace => "launcher replace",
            Stage::DriverInstall => "driver install",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    fn successor(self) -> Stage {
        match self {
            Stage::LocationCheck => Stage::Backup,
            Stage::Done | Stage::Failed => self,
            _ => {
                let index = PIPELINE.iter().position(|stage| *stage == self).unwrap_or(0);
                PIPELINE.get(index + 1).copied().unwrap_or(Stage::Done)
            }
        }
    }

    fn percent(self) -> u8 {
        let index = PIPELINE.iter().position(|stage| *stage == self).unwrap_or(0);
        progress::percent(index, PIPELINE.len() - 1)
    }
}

/// Typed result of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Advance,
    /// The stage had nothing to do for these settings.
    Skipped,
    /// Location check found a protected root and relocation is allowed.
    Relocate,
    Fatal(StageError),
}

/// The whole transition table. A fatal result always ends the run.
pub fn transition(stage: Stage, result: &StageResult) -> Stage {
    match (stage, result) {
        (_, StageResult::Fatal(_)) => Stage::Failed,
        (Stage::LocationCheck, StageResult::Relocate) => Stage::Relocate,
        (stage, _) => stage.successor(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub success: bool,
    pub message: String,
}

impl ConversionOutcome {
    fn success() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    fn failure(err: &StageError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub outcome: ConversionOutcome,
    /// Every stage entered, ending in `Done` or `Failed`.
    pub stages: Vec<Stage>,
    pub install_root: PathBuf,
    pub backup_dir: Option<PathBuf>,
    #[serde(skip)]
    pub error: Option<StageError>,
}

struct RunState {
    root: PathBuf,
    backup_dir: Option<PathBuf>,
}

/// Drives one install through the conversion stages.
pub struct Converter<'a> {
    store: &'a mut dyn ConfigStore,
    rules: &'a DetectionRules,
    protected: &'a ProtectedLocations,
    resources: &'a Resources,
    progress: &'a mut dyn ProgressSink,
}

impl<'a> Converter<'a> {
    pub fn new(
        store: &'a mut dyn ConfigStore,
        rules: &'a DetectionRules,
        protected: &'a ProtectedLocations,
        resources: &'a Resources,
        progress: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            store,
            rules,
            protected,
            resources,
            progress,
        }
    }

    pub fn run(&mut self, settings: &ConversionSettings) -> ConversionReport {
        let mut state = RunState {
            root: settings.root_path.clone(),
            backup_dir: None,
        };
        let mut stage = Stage::Start;
        let mut stages = vec![stage];
        let mut failure = None;

        info!(
            root = %settings.root_path.display(),
            target = settings.target_version.label(),
            "starting conversion"
        );
        while !stage.is_terminal() {
            self.progress
                .on_progress(&format!("{} ...", stage.label()), stage.percent());
            let result = self.execute(stage, settings, &mut state);
            match &result {
                StageResult::Fatal(err) => {
                    error!(stage = stage.label(), "{err}");
                    failure = Some(err.clone());
                }
                StageResult::Skipped => info!(stage = stage.label(), "stage skipped"),
                _ => {}
            }
            stage = transition(stage, &result);
            stages.push(stage);
        }

        let outcome = match &failure {
            Some(err) => ConversionOutcome::failure(err),
            None => {
                self.progress.on_progress("conversion complete", 100);
                ConversionOutcome::success()
            }
        };
        ConversionReport {
            outcome,
            stages,
            install_root: state.root,
            backup_dir: state.backup_dir,
            error: failure,
        }
    }

    fn execute(
        &mut self,
        stage: Stage,
        settings: &ConversionSettings,
        state: &mut RunState,
    ) -> StageResult {
        let root = state.root.clone();
        match stage {
            Stage::Start | Stage::Done | Stage::Failed => StageResult::Advance,
            Stage::ValidatePath => {
                if root.is_dir() {
                    StageResult::Advance
                } else {
                    StageResult::Fatal(StageError::RootMissing(root))
                }
            }
            Stage::PiracyCheck => {
                if piracy::is_pirated(&root, self.rules) {
                    StageResult::Fatal(StageError::Illegitimate)
                } else {
                    StageResult::Advance
                }
            }
            Stage::LocationCheck => {
                debug!(prefixes = ?self.protected.prefixes(), "checking protected folders");
                if !self.protected.is_protected(&root) {
                    StageResult::Advance
                } else if settings.relocate_if_protected {
                    warn!(root = %root.display(), "install is in a protected folder, relocating");
                    StageResult::Relocate
                } else {
                    warn!(root = %root.display(), "install is in a protected folder");
                    StageResult::Fatal(StageError::ProtectedLocation)
                }
            }
            Stage::Relocate => {
                let target = settings.relocation_target_path.clone();
                self.progress.on_message(&format!(
                    "copying game from {} to {} ...",
                    root.display(),
                    target.display()
                ));
                match relocate_install(&root, &target) {
                    Ok(()) => {
                        state.root = target;
                        StageResult::Advance
                    }
                    Err(err) => fatal(err, StageError::RelocationFailed(target)),
                }
            }
            Stage::Backup => {
                let dir = match backup::create_backup_dir(&root, Some("conversion")) {
                    Ok(dir) => dir,
                    Err(err) => return fatal(err, StageError::BackupFailed),
                };
                // Kept even if the backup fails halfway; it holds whatever moved.
                state.backup_dir = Some(dir.clone());
                match self.backup(&root, &dir) {
                    Ok(()) => StageResult::Advance,
                    Err(err) => fatal(err, StageError::BackupFailed),
                }
            }
            Stage::CacheCleanup => match delete_cache_files(&root) {
                Ok(_) => StageResult::Advance,
                Err(err) => fatal(err, StageError::CacheCleanupFailed),
            },
            Stage::LegacyFileDelete => match delete_legacy_files(&root, self.store) {
                Ok(()) => StageResult::Advance,
                Err(err) => fatal(err, StageError::LegacyDeleteFailed),
            },
            Stage::MusicPathMigration => {
                if settings.target_version == GameVersion::Original {
                    return StageResult::Skipped;
                }
                match migrate_music(&root) {
                    Ok(true) => StageResult::Advance,
                    Ok(false) => StageResult::Skipped,
                    Err(err) => fatal(err, StageError::MusicMigrationFailed),
                }
            }
            Stage::CompatFlagCleanup => match delete_compat_flags(self.store) {
                Ok(_) => StageResult::Advance,
                Err(err) => fatal(err, StageError::CompatFlagsFailed),
            },
            Stage::ExeReplace => match driver::replace_launchers(self.resources, &root) {
                Ok(()) => StageResult::Advance,
                Err(err) => fatal(err, StageError::ExeReplaceFailed),
            },
            Stage::DriverInstall => match driver::install_driver(self.resources, &root) {
                Ok(_) => StageResult::Advance,
                Err(err) => fatal(err, StageError::DriverInstallFailed),
            },
        }
    }

    fn backup(&mut self, root: &Path, dir: &Path) -> Result<()> {
        self.progress.on_message(&format!(
            "backing up files and registry to {} ...",
            dir.display()
        ));
        backup::backup_configuration(&*self.store, dir)?;
        backup::relocate_manifest(&LEGACY_CONVERTER, root, dir)?;
        backup::relocate_manifest(&CURRENT_APP, root, dir)?;
        Ok(())
    }
}

fn fatal(err: anyhow::Error, stage_error: StageError) -> StageResult {
    error!("stage failed: {err:#}");
    StageResult::Fatal(stage_error)
}

/// Full copy of the install to `target`.
pub fn relocate_install(root: &Path, target: &Path) -> Result<()> {
    if !root.is_dir() {
        bail!("install root {:?} is missing", root);
    }
    if target.starts_with(root) {
        bail!("relocation target {:?} is inside the install", target);
    }
    let copied = fs_utils::copy_dir_recursive(root, target)?;
    info!(copied, target = %target.display(), "install relocated");
    Ok(())
}

/// Removes engine cache files (`S*D.P`, `T*D.P`) from the install root.
pub fn delete_cache_files(root: &Path) -> Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for pattern in CACHE_PATTERNS {
        for file in fs_utils::matching_files(root, pattern)? {
            fs::remove_file(&file).with_context(|| format!("remove {:?}", file))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Deletes both legacy manifests, helper-library files and the old
/// converter's config key. Safe only after the backup stage moved them out.
pub fn delete_legacy_files(root: &Path, store: &mut dyn ConfigStore) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }
    for entry in CURRENT_APP.entries.iter().chain(LEGACY_CONVERTER.entries) {
        let Some(path) = fs_utils::resolve_ignore_case(root, Path::new(entry.relative_path))
        else {
            continue;
        };
        let removed = match entry.kind {
            EntryKind::File => fs_utils::remove_file_if_exists(&path),
            EntryKind::Folder => fs_utils::remove_dir_if_exists(&path),
        };
        removed.with_context(|| format!("delete {:?}", path))?;
    }
    for file in fs_utils::matching_files(root, HELPER_LIBRARY_PATTERN)? {
        fs::remove_file(&file).with_context(|| format!("delete {:?}", file))?;
    }
    store
        .delete_key(OLD_CONVERTER_KEY)
        .context("delete old converter key")?;
    Ok(())
}

/// Moves `data/music_ogg` to `music/vgmstream`. Returns false when there was
/// nothing to move.
pub fn migrate_music(root: &Path) -> Result<bool> {
    let source = root.join(MUSIC_SOURCE_FOLDER);
    if !source.is_dir() {
        return Ok(false);
    }
    fs_utils::move_dir_recursive(&source, &root.join(MUSIC_TARGET_FOLDER))?;
    Ok(true)
}

/// Drops compatibility-mode values the old converter set on the launchers.
pub fn delete_compat_flags(store: &mut dyn ConfigStore) -> Result<usize> {
    let mut removed = 0;
    for name in store.list_value_names(COMPAT_FLAGS_KEY) {
        let lower = name.to_lowercase();
        if COMPAT_FLAG_TARGETS.iter().any(|target| lower.contains(target)) {
            store
                .delete_value(COMPAT_FLAGS_KEY, &name)
                .with_context(|| format!("delete compat flag {name}"))?;
            removed += 1;
        }
    }
    Ok(removed)
}
