//! Required-file checks for a converted install, with recovery from the
//! original discs or from the install's own language folder.

use crate::{
    fs_utils,
    manifest::{
        INSTALL_MEDIA_LABELS, INSTALL_SET_FILES, LANG_FALLBACK_FOLDER, LANG_MOVIES,
        MEDIA_DATA_FOLDER, MOVIES_FOLDER, MOVIE_FILES, MUSIC_FILES, MUSIC_SOURCE_FOLDER,
        MUSIC_TARGET_FOLDER, SUPPLEMENTARY_FILES,
    },
    media::MediaLocator,
    progress::{percent, ProgressSink},
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Core,
    Supplementary,
    Movies,
    Music,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Core,
        AssetCategory::Supplementary,
        AssetCategory::Movies,
        AssetCategory::Music,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::Core => "core",
            AssetCategory::Supplementary => "supplementary",
            AssetCategory::Movies => "movies",
            AssetCategory::Music => "music",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(value))
    }
}

/// A required file that is absent and could not be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingAsset {
    /// Path relative to the install root.
    pub file: String,
    /// Where recovery was attempted: media labels or a fallback folder.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetReport {
    pub category: AssetCategory,
    pub checked: usize,
    pub copied: Vec<String>,
    pub missing: Vec<MissingAsset>,
}

impl AssetReport {
    fn new(category: AssetCategory) -> Self {
        Self {
            category,
            checked: 0,
            copied: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.missing.is_empty()
    }

    fn miss(&mut self, file: impl Into<String>, sources: Vec<String>) {
        self.missing.push(MissingAsset {
            file: file.into(),
            sources,
        });
    }
}

/// Checks the install-set files and copies each missing one from the first
/// labelled disc that carries it. Every entry is attempted before returning.
pub fn verify_core_assets(
    install_root: &Path,
    locator: &dyn MediaLocator,
    progress: &mut dyn ProgressSink,
) -> AssetReport {
    let mut report = AssetReport::new(AssetCategory::Core);
    let total = INSTALL_SET_FILES.len();
    for (index, file) in INSTALL_SET_FILES.iter().enumerate() {
        let target = install_root.join(file);
        report.checked += 1;
        progress.on_progress(
            &format!("... checking if file exists: {}", target.display()),
            percent(index, total),
        );
        if target.is_file() {
            continue;
        }

        progress.on_message("... \t file not found. Scanning discs for files ...");
        let relative = Path::new(MEDIA_DATA_FOLDER).join(file);
        let mut recovered = false;
        for label in INSTALL_MEDIA_LABELS {
            let Some(mount) = locator.resolve_volume_label(label) else {
                continue;
            };
            let Some(source) = fs_utils::resolve_ignore_case(&mount, &relative) else {
                continue;
            };
            if !source.is_file() {
                continue;
            }
            progress.on_message(&format!(
                "... \t found file on {label} at {}. Copying file ...",
                mount.display()
            ));
            match copy_asset(&source, &target) {
                Ok(()) => {
                    report.copied.push(file.to_string());
                    recovered = true;
                    break;
                }
                Err(err) => warn!(file, label, "copy from disc failed: {err:#}"),
            }
        }

        if !recovered {
            progress.on_message(&format!("... \t failed to find {file} on any disc ..."));
            report.miss(*file, labels(&INSTALL_MEDIA_LABELS));
        }
    }
    log_report(&report);
    report
}

/// Checks the per-category files under `data/`, copying a missing one from
/// `data/lang-en/`. Stops at the first file that cannot be recovered.
pub fn verify_supplementary_assets(
    install_root: &Path,
    progress: &mut dyn ProgressSink,
) -> AssetReport {
    let mut report = AssetReport::new(AssetCategory::Supplementary);
    let data = install_root.join("data");
    let fallback = install_root.join(LANG_FALLBACK_FOLDER);
    for file in SUPPLEMENTARY_FILES {
        let target = data.join(file);
        report.checked += 1;
        progress.on_message(&format!("... checking if file exists: {}", target.display()));
        if target.is_file() {
            continue;
        }

        progress.on_message("... \tfile not found");
        let relative = format!("data/{file}");
        let source = fallback.join(file);
        if !source.is_file() {
            progress.on_message(&format!(
                "... \tcannot copy source file because it is missing at {}",
                source.display()
            ));
            report.miss(relative, vec![LANG_FALLBACK_FOLDER.to_string()]);
            break;
        }

        progress.on_message(&format!("... \tcopying file from {}", source.display()));
        if let Err(err) = copy_asset(&source, &target) {
            warn!(file, "copy from language folder failed: {err:#}");
            progress.on_message(&format!("... \tfailed to copy: {err}"));
            report.miss(relative, vec![LANG_FALLBACK_FOLDER.to_string()]);
            break;
        }
        report.copied.push(relative);
    }
    log_report(&report);
    report
}

/// Read-only check of the movie folder. The two language-folder movies also
/// count as present when they sit under `data/lang-en/movies`.
pub fn verify_movie_assets(install_root: &Path) -> AssetReport {
    let mut report = AssetReport::new(AssetCategory::Movies);
    let movies = install_root.join(MOVIES_FOLDER);
    let lang_movies = lang_movies_dir(install_root);
    for (file, discs) in MOVIE_FILES {
        report.checked += 1;
        if movies.join(file).is_file() {
            continue;
        }
        if LANG_MOVIES.contains(file) && lang_movies.join(file).is_file() {
            continue;
        }
        report.miss(format!("{MOVIES_FOLDER}/{file}"), labels(discs));
    }
    log_report(&report);
    report
}

/// Fills the movie folder. Each missing movie comes from the language folder
/// when it is one of the two kept there, otherwise from the first of its
/// discs that has it. Unrecoverable movies are all listed, not fail-fast.
pub fn copy_movie_assets(
    install_root: &Path,
    locator: &dyn MediaLocator,
    progress: &mut dyn ProgressSink,
) -> AssetReport {
    let mut report = AssetReport::new(AssetCategory::Movies);
    let movies = install_root.join(MOVIES_FOLDER);
    let lang_movies = lang_movies_dir(install_root);
    let total = MOVIE_FILES.len();

    for (index, (file, discs)) in MOVIE_FILES.iter().enumerate() {
        let target = movies.join(file);
        report.checked += 1;
        if target.is_file() {
            continue;
        }
        progress.on_progress(
            &format!("\tlooking for {file} ..."),
            percent(index, total),
        );
        let relative = format!("{MOVIES_FOLDER}/{file}");

        if LANG_MOVIES.contains(file) {
            let other = lang_movies.join(file);
            if other.is_file() {
                progress.on_message(&format!(
                    "\tcopying {} to {}",
                    other.display(),
                    target.display()
                ));
                match copy_asset(&other, &target) {
                    Ok(()) => {
                        report.copied.push(relative);
                        continue;
                    }
                    Err(err) => warn!(file, "copy from language folder failed: {err:#}"),
                }
            }
        }

        if copy_movie_from_discs(file, discs, &target, locator, progress) {
            report.copied.push(relative);
        } else {
            report.miss(relative, labels(discs));
        }
    }

    if !report.success() {
        progress.on_message("\tThe following movie files are missing and can not be copied:");
        let listing: Vec<String> = report
            .missing
            .iter()
            .map(|missing| format!("\t - {} on {}", missing.file, missing.sources.join(",")))
            .collect();
        progress.on_message(&listing.join("\n"));
    }
    log_report(&report);
    report
}

fn copy_movie_from_discs(
    file: &str,
    discs: &[&str],
    target: &Path,
    locator: &dyn MediaLocator,
    progress: &mut dyn ProgressSink,
) -> bool {
    let relative = Path::new(MEDIA_DATA_FOLDER).join("movies").join(file);
    for disc in discs {
        let Some(mount) = locator.resolve_volume_label(disc) else {
            continue;
        };
        let Some(source) = fs_utils::resolve_ignore_case(&mount, &relative) else {
            continue;
        };
        if !source.is_file() {
            continue;
        }
        progress.on_message(&format!(
            "\tcopying {} to {}",
            source.display(),
            target.display()
        ));
        match copy_asset(&source, target) {
            Ok(()) => return true,
            Err(err) => warn!(file, disc, "copy from disc failed: {err:#}"),
        }
    }
    false
}

/// Makes sure `music/vgmstream` exists and lists every known track absent
/// from it.
pub fn verify_music_assets(
    install_root: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<AssetReport> {
    let target_dir = install_root.join(MUSIC_TARGET_FOLDER);
    fs::create_dir_all(&target_dir).context("create music folder")?;

    let mut report = AssetReport::new(AssetCategory::Music);
    for file in MUSIC_FILES {
        report.checked += 1;
        let path = target_dir.join(file);
        if !path.is_file() {
            progress.on_message(&format!("\tmissing music file at {}", path.display()));
            report.miss(
                format!("{MUSIC_TARGET_FOLDER}/{file}"),
                vec![MUSIC_SOURCE_FOLDER.to_string()],
            );
        }
    }
    log_report(&report);
    Ok(report)
}

/// Copies known tracks from `data/music_ogg` into `music/vgmstream`.
/// Best-effort: tracks without a source, or whose copy fails, are skipped.
pub fn copy_music_assets(install_root: &Path, progress: &mut dyn ProgressSink) -> Result<usize> {
    let target_dir = install_root.join(MUSIC_TARGET_FOLDER);
    fs::create_dir_all(&target_dir).context("create music folder")?;
    let source_dir = install_root.join(MUSIC_SOURCE_FOLDER);

    let mut copied = 0;
    for file in MUSIC_FILES {
        let target = target_dir.join(file);
        if target.is_file() {
            continue;
        }
        let source = source_dir.join(file);
        if !source.is_file() {
            debug!(file, "no source for music file");
            continue;
        }
        progress.on_message(&format!(
            "\tcopying music file {} to {}",
            source.display(),
            target.display()
        ));
        match fs::copy(&source, &target) {
            Ok(_) => copied += 1,
            Err(err) => warn!(file, error = %err, "music copy failed, skipping"),
        }
    }
    info!(copied, "music files copied");
    Ok(copied)
}

fn lang_movies_dir(install_root: &Path) -> PathBuf {
    install_root.join(LANG_FALLBACK_FOLDER).join("movies")
}

fn copy_asset(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    fs::copy(source, target).with_context(|| format!("copy {:?} -> {:?}", source, target))?;
    Ok(())
}

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn log_report(report: &AssetReport) {
    if report.success() {
        info!(
            category = report.category.label(),
            checked = report.checked,
            copied = report.copied.len(),
            "assets verified"
        );
    } else {
        warn!(
            category = report.category.label(),
            missing = report.missing.len(),
            "assets missing"
        );
    }
}
