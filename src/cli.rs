use crate::{
    backup,
    config::AppConfig,
    convert::Converter,
    driver,
    game::{self, ConversionSettings, GameVersion},
    logging, maintenance,
    progress::ConsoleSink,
    rules::DetectionRules,
    store::FileStore,
    verify::{self, AssetCategory, AssetReport},
};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::{path::PathBuf, process::ExitCode};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct CliAction {
    command: CliCommand,
    format: OutputFormat,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Detect,
    Convert(ConvertOptions),
    Verify(VerifyOptions),
    Driver { root: Option<PathBuf> },
    Folders { root: Option<PathBuf> },
    Backups { root: Option<PathBuf> },
    Restore {
        backup_dir: PathBuf,
        root: Option<PathBuf>,
    },
    Help,
    Version,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ConvertOptions {
    root: Option<PathBuf>,
    target: Option<GameVersion>,
    relocate_to: Option<PathBuf>,
    no_backup: bool,
    remove_legacy: bool,
    laptop_keys: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct VerifyOptions {
    root: Option<PathBuf>,
    categories: Vec<AssetCategory>,
    copy: bool,
}

/// Everything a command needs: config, the store and detection rules.
struct Session {
    config: AppConfig,
    store: FileStore,
    rules: DetectionRules,
}

impl Session {
    fn open() -> Result<Self> {
        let config = AppConfig::load_or_create()?;
        if let Err(err) = logging::init(&config.log_path()) {
            eprintln!("Logging disabled: {err:#}");
        }
        let store = FileStore::open(&config.store_path()).context("open config store")?;
        let rules = DetectionRules::load_or_default(Some(&config.rules_path()))?;
        Ok(Self {
            config,
            store,
            rules,
        })
    }

    fn install_root(&self, root: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(root) = root {
            return Ok(root);
        }
        game::install_location(&self.store)
            .ok_or_else(|| anyhow!("No installation found in the config store; pass --root"))
    }
}

pub fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = parse_args(&args)?;
    match action.command {
        CliCommand::Help => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Version => {
            println!("ff7-convert v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        command => {
            let mut session = Session::open()?;
            let success = run_command(&mut session, command, action.format)?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    let (format, tokens) = parse_global_options(args);
    let Some(head) = tokens.first() else {
        return Ok(CliAction {
            command: CliCommand::Help,
            format,
        });
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "detect" => CliCommand::Detect,
        "convert" => CliCommand::Convert(parse_convert(rest)?),
        "verify" => CliCommand::Verify(parse_verify(rest)?),
        "driver" => CliCommand::Driver {
            root: parse_root_only(rest)?,
        },
        "folders" => CliCommand::Folders {
            root: parse_root_only(rest)?,
        },
        "backups" => CliCommand::Backups {
            root: parse_root_only(rest)?,
        },
        "restore" => parse_restore(rest)?,
        other => bail!("Unknown command: {other} (see 'ff7-convert help')"),
    };
    Ok(CliAction { command, format })
}

fn parse_global_options(args: &[String]) -> (OutputFormat, Vec<String>) {
    let mut format = OutputFormat::Text;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            if let Some(parsed) = OutputFormat::parse(value) {
                format = parsed;
            }
            continue;
        }
        if arg == "--format" {
            if let Some(value) = iter.next() {
                if let Some(parsed) = OutputFormat::parse(value) {
                    format = parsed;
                }
            }
            continue;
        }
        tokens.push(arg.to_string());
    }
    (format, tokens)
}

/// `--name value` or `--name=value`.
fn option_value<'a>(
    arg: &'a str,
    name: &str,
    iter: &mut impl Iterator<Item = &'a String>,
) -> Result<Option<&'a str>> {
    if arg == name {
        return match iter.next() {
            Some(value) => Ok(Some(value.as_str())),
            None => bail!("{name} requires a value"),
        };
    }
    Ok(arg
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('=')))
}

fn parse_convert(args: &[String]) -> Result<ConvertOptions> {
    let mut options = ConvertOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = option_value(arg, "--root", &mut iter)? {
            options.root = Some(PathBuf::from(value));
            continue;
        }
        if let Some(value) = option_value(arg, "--target", &mut iter)? {
            let target = GameVersion::parse(value)
                .filter(|version| *version != GameVersion::Unknown)
                .ok_or_else(|| {
                    anyhow!("Unknown target: {value} (use 'original', 'rerelease' or 'steam')")
                })?;
            options.target = Some(target);
            continue;
        }
        if let Some(value) = option_value(arg, "--relocate-to", &mut iter)? {
            options.relocate_to = Some(PathBuf::from(value));
            continue;
        }
        match arg.as_str() {
            "--no-backup" => options.no_backup = true,
            "--remove-legacy" => options.remove_legacy = true,
            "--laptop-keys" => options.laptop_keys = true,
            other => bail!("Unknown convert option: {other}"),
        }
    }
    Ok(options)
}

fn parse_verify(args: &[String]) -> Result<VerifyOptions> {
    let mut root = None;
    let mut categories = Vec::new();
    let mut copy = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = option_value(arg, "--root", &mut iter)? {
            root = Some(PathBuf::from(value));
            continue;
        }
        match arg.as_str() {
            "--copy" => copy = true,
            "all" => {
                for category in AssetCategory::ALL {
                    if !categories.contains(&category) {
                        categories.push(category);
                    }
                }
            }
            value => {
                let category = AssetCategory::parse(value).ok_or_else(|| {
                    anyhow!("Unknown asset set: {value} (use core, supplementary, movies, music or all)")
                })?;
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
        }
    }
    if categories.is_empty() {
        categories.extend(AssetCategory::ALL);
    }
    Ok(VerifyOptions {
        root,
        categories,
        copy,
    })
}

fn parse_root_only(args: &[String]) -> Result<Option<PathBuf>> {
    let mut root = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match option_value(arg, "--root", &mut iter)? {
            Some(value) => root = Some(PathBuf::from(value)),
            None => bail!("Unknown option: {arg}"),
        }
    }
    Ok(root)
}

fn parse_restore(args: &[String]) -> Result<CliCommand> {
    let mut root = None;
    let mut backup_dir = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = option_value(arg, "--root", &mut iter)? {
            root = Some(PathBuf::from(value));
        } else if backup_dir.is_none() && !arg.starts_with('-') {
            backup_dir = Some(PathBuf::from(arg));
        } else {
            bail!("Unknown restore option: {arg}");
        }
    }
    let backup_dir = backup_dir.ok_or_else(|| anyhow!("restore requires a backup dir"))?;
    Ok(CliCommand::Restore { backup_dir, root })
}

/// Runs one command; `Ok(false)` means it ran but reported failure.
fn run_command(session: &mut Session, command: CliCommand, format: OutputFormat) -> Result<bool> {
    match command {
        CliCommand::Detect => detect(session, format),
        CliCommand::Convert(options) => convert(session, options, format),
        CliCommand::Verify(options) => verify_assets(session, options, format),
        CliCommand::Driver { root } => update_driver(session, root, format),
        CliCommand::Folders { root } => create_folders(session, root, format),
        CliCommand::Backups { root } => list_backups(session, root, format),
        CliCommand::Restore { backup_dir, root } => restore(session, backup_dir, root, format),
        CliCommand::Help | CliCommand::Version => Ok(true),
    }
}

fn detect(session: &Session, format: OutputFormat) -> Result<bool> {
    let record = game::detect_installation(&session.store);
    let found = record.detected_version != GameVersion::Unknown;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => {
            if found {
                println!("Version: {}", record.detected_version.label());
                println!("Root: {}", record.root_path.display());
            } else {
                println!("No {} installation found.", game::GAME_NAME);
            }
        }
    }
    Ok(found)
}

fn convert(session: &mut Session, options: ConvertOptions, format: OutputFormat) -> Result<bool> {
    let detected = game::detect_installation(&session.store);
    let root = match options.root {
        Some(root) => root,
        None if detected.detected_version != GameVersion::Unknown => detected.root_path.clone(),
        None => bail!("No installation found in the config store; pass --root"),
    };
    let target = options
        .target
        .or(Some(detected.detected_version).filter(|v| *v != GameVersion::Unknown))
        .unwrap_or(GameVersion::DigitalDistribution);

    let mut settings = ConversionSettings::new(target, root);
    settings.perform_backup = !options.no_backup;
    settings.remove_legacy_if_found = options.remove_legacy;
    settings.use_alternate_keyboard_profile = options.laptop_keys;
    settings.relocate_if_protected = options.relocate_to.is_some();
    settings.relocation_target_path = options
        .relocate_to
        .unwrap_or_else(|| session.config.relocation_target.clone());
    if options.no_backup {
        warn!("--no-backup ignored, a backup is always taken before conversion");
    }

    let protected = session.config.protected_locations();
    let mut sink = ConsoleSink {
        quiet: format == OutputFormat::Json,
    };
    let report = Converter::new(
        &mut session.store,
        &session.rules,
        &protected,
        &session.config.resources,
        &mut sink,
    )
    .run(&settings);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            if report.outcome.success {
                println!("Conversion complete: {}", report.install_root.display());
            } else {
                println!("Conversion failed: {}", report.outcome.message);
                if report
                    .error
                    .as_ref()
                    .is_some_and(|err| err.precedes_destructive_changes())
                {
                    println!("Stopped before cleanup; nothing was deleted.");
                }
            }
            if let Some(dir) = &report.backup_dir {
                println!("Backup: {}", dir.display());
            }
        }
    }
    Ok(report.outcome.success)
}

fn verify_assets(session: &Session, options: VerifyOptions, format: OutputFormat) -> Result<bool> {
    let root = session.install_root(options.root)?;
    if !root.is_dir() {
        bail!("Path to install does not exist: {}", root.display());
    }
    let locator = session.config.media_locator();
    let mut sink = ConsoleSink {
        quiet: format == OutputFormat::Json,
    };

    let mut reports = Vec::new();
    for category in options.categories {
        let report = match category {
            AssetCategory::Core => verify::verify_core_assets(&root, &locator, &mut sink),
            AssetCategory::Supplementary => verify::verify_supplementary_assets(&root, &mut sink),
            AssetCategory::Movies if options.copy => {
                verify::copy_movie_assets(&root, &locator, &mut sink)
            }
            AssetCategory::Movies => verify::verify_movie_assets(&root),
            AssetCategory::Music => {
                if options.copy {
                    verify::copy_music_assets(&root, &mut sink)?;
                }
                verify::verify_music_assets(&root, &mut sink)?
            }
        };
        reports.push(report);
    }

    let success = reports.iter().all(AssetReport::success);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                let status = if report.success() { "ok" } else { "missing" };
                println!(
                    "{:<14} {:<8} checked {:>3}, copied {:>3}",
                    report.category.label(),
                    status,
                    report.checked,
                    report.copied.len()
                );
                for missing in &report.missing {
                    println!("  - {} ({})", missing.file, missing.sources.join(", "));
                }
            }
        }
    }
    Ok(success)
}

#[derive(Serialize)]
struct DriverOutput {
    status: maintenance::DriverStatus,
    launchers_differ: bool,
}

fn update_driver(session: &mut Session, root: Option<PathBuf>, format: OutputFormat) -> Result<bool> {
    let root = session.install_root(root)?;
    let mut sink = ConsoleSink {
        quiet: format == OutputFormat::Json,
    };
    let resources = &session.config.resources;
    let status = maintenance::check_driver_freshness(resources, &root, &mut session.store, &mut sink)
        .context("driver update failed")?;
    driver::restore_missing_driver_folders(resources, &root, &mut sink)?;
    let output = DriverOutput {
        status,
        launchers_differ: driver::launchers_differ(resources, &root),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            match &output.status {
                maintenance::DriverStatus::UpToDate => println!("Driver is up to date."),
                maintenance::DriverStatus::Updated { backup_dir } => {
                    println!("Driver updated. Backup: {}", backup_dir.display())
                }
            }
            if output.launchers_differ {
                println!("Installed launchers differ from the provided ones; run 'convert' to replace them.");
            }
        }
    }
    Ok(true)
}

fn create_folders(session: &Session, root: Option<PathBuf>, format: OutputFormat) -> Result<bool> {
    let root = session.install_root(root)?;
    let mut sink = ConsoleSink {
        quiet: format == OutputFormat::Json,
    };
    let created = maintenance::create_missing_folders(&root, &mut sink);
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "created": created })),
        OutputFormat::Text => println!("Created {created} folder(s)."),
    }
    Ok(true)
}

#[derive(Serialize)]
struct BackupListItem {
    path: PathBuf,
    timestamp: Option<i64>,
    reason: Option<String>,
    last: bool,
}

fn list_backups(session: &Session, root: Option<PathBuf>, format: OutputFormat) -> Result<bool> {
    let root = session.install_root(root)?;
    let last = backup::load_last_backup(&root)?;
    let items: Vec<BackupListItem> = backup::list_backups(&root)?
        .into_iter()
        .map(|path| {
            let meta = backup::load_backup_meta(&path).ok();
            BackupListItem {
                last: last.as_ref() == Some(&path),
                timestamp: meta.as_ref().map(|meta| meta.timestamp),
                reason: meta.and_then(|meta| meta.reason),
                path,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No backups under {}", root.display());
            }
            for item in &items {
                let marker = if item.last { "*" } else { " " };
                let reason = item.reason.as_deref().unwrap_or("-");
                println!("{marker} {}  {reason}", item.path.display());
            }
        }
    }
    Ok(true)
}

fn restore(
    session: &mut Session,
    backup_dir: PathBuf,
    root: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool> {
    let root = match root {
        Some(root) => root,
        None => backup::load_backup_meta(&backup_dir)
            .map(|meta| meta.install_root)
            .or_else(|_| session.install_root(None))?,
    };
    let snapshot = backup::create_backup_dir(&root, Some("before restore"))?;
    backup::backup_launchers(&root, &snapshot)?;
    let report = backup::restore_backup(&backup_dir, &root, &mut session.store)?;
    info!(snapshot = %snapshot.display(), "launchers kept before restore");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!(
                "Restored {} file(s) and {} config export(s) into {}",
                report.files_restored,
                report.keys_imported,
                root.display()
            );
            println!("Previous launchers saved to {}", snapshot.display());
        }
    }
    Ok(true)
}

fn print_help() {
    println!("ff7-convert v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  ff7-convert detect                     Show the installation found in the config store");
    println!("  ff7-convert convert [options]          Convert an install for the mod loader");
    println!("  ff7-convert verify [sets] [--copy]     Check required files (core, supplementary, movies, music, all)");
    println!("  ff7-convert driver                     Update the OpenGL driver if the bundle is newer");
    println!("  ff7-convert folders                    Create missing mod and direct folders");
    println!("  ff7-convert backups                    List backups of an install");
    println!("  ff7-convert restore <backup dir>       Put a backup back in place");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                   Output format");
    println!("  --root <path>                          Install root (default: detected)");
    println!("  -h, --help                             Show help");
    println!("  -V, --version                          Show version");
    println!();
    println!("Convert options:");
    println!("  --target <original|rerelease|steam>    Release being converted (default: detected)");
    println!("  --relocate-to <path>                   Copy the game here if it sits in a protected folder");
    println!("  --no-backup                            Accepted for compatibility; backups always run");
    println!("  --remove-legacy                        Remove old converter files if found");
    println!("  --laptop-keys                          Use the laptop keyboard profile");
    println!();
    println!("Logging: FF7_CONVERT_LOG=<filter> (default info), written to converter.log");
}
