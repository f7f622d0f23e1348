use crate::{
    config::Resources,
    fs_utils,
    manifest::{DRIVER_FILE_PATTERN, DRIVER_FOLDERS, LAUNCHER_FILES},
    progress::ProgressSink,
};
use anyhow::{bail, Context, Result};
use std::{fs, path::Path};
use tracing::debug;

/// Overwrites the install's launcher pair with the provided copies.
pub fn replace_launchers(resources: &Resources, install_root: &Path) -> Result<()> {
    if !install_root.is_dir() {
        bail!("install root {:?} is missing", install_root);
    }
    for name in LAUNCHER_FILES {
        let source = resources.launcher_dir.join(name);
        let dest = install_root.join(name);
        fs::copy(&source, &dest).with_context(|| format!("copy {:?} -> {:?}", source, dest))?;
    }
    Ok(())
}

/// Copies the bundle's `plugins/` and `shaders/` trees and its
/// `ff7_opengl.*` files into the install.
pub fn install_driver(resources: &Resources, install_root: &Path) -> Result<usize> {
    let bundle = &resources.driver_bundle;
    if !bundle.is_dir() {
        bail!("driver bundle {:?} is missing", bundle);
    }
    if !install_root.is_dir() {
        bail!("install root {:?} is missing", install_root);
    }

    let mut copied = 0;
    for folder in DRIVER_FOLDERS {
        copied += fs_utils::copy_dir_recursive(&bundle.join(folder), &install_root.join(folder))?;
    }
    for source in fs_utils::matching_files(bundle, DRIVER_FILE_PATTERN)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = install_root.join(name);
        fs::copy(&source, &dest).with_context(|| format!("copy {:?} -> {:?}", source, dest))?;
        copied += 1;
    }
    debug!(copied, "driver files installed");
    Ok(copied)
}

/// True when either installed launcher differs from the provided one.
pub fn launchers_differ(resources: &Resources, install_root: &Path) -> bool {
    LAUNCHER_FILES.iter().any(|name| {
        !fs_utils::files_equal(&resources.launcher_dir.join(name), &install_root.join(name))
    })
}

/// Re-copies driver folders that went missing after install.
pub fn restore_missing_driver_folders(
    resources: &Resources,
    install_root: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    let bundle = &resources.driver_bundle;
    for relative in ["shaders/nolight", "shaders", "plugins"] {
        let target = install_root.join(relative);
        if target.is_dir() {
            continue;
        }
        progress.on_message(&format!(
            "\tmissing {relative} folder. Copying from the driver bundle ..."
        ));
        fs_utils::copy_dir_recursive(&bundle.join(relative), &target)?;
    }
    Ok(())
}
