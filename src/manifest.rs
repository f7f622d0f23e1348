//! Fixed file lists the converter and verifier treat as units.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: EntryKind,
    pub relative_path: &'static str,
}

const fn folder(relative_path: &'static str) -> ManifestEntry {
    ManifestEntry {
        kind: EntryKind::Folder,
        relative_path,
    }
}

const fn file(relative_path: &'static str) -> ManifestEntry {
    ManifestEntry {
        kind: EntryKind::File,
        relative_path,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackupManifest {
    pub version: u32,
    pub entries: &'static [ManifestEntry],
}

/// Installer-helper folders left by the old game converter.
pub const LEGACY_CONVERTER: BackupManifest = BackupManifest {
    version: 1,
    entries: &[
        folder("DLL_in"),
        folder("Hext_in"),
        folder("LOADR"),
        folder("Multi_DLL"),
        folder("FF7anyCDv2"),
        folder("BackupGC"),
    ],
};

/// Previous launcher, driver and log files.
pub const CURRENT_APP: BackupManifest = BackupManifest {
    version: 1,
    entries: &[
        file("app.log"),
        file("ff7.exe"),
        file("ff7config.exe"),
        file("RunFFVIIConfig.bat"),
        file("RunFFVIIConfig.exe"),
        file("ff7_mo.exe"),
        file("ff7_nt.exe"),
        file("ff7_ss.exe"),
        file("ff7_ss_safer.exe"),
        file("ff7_bc.exe"),
        file("ff7input.cfg"),
        file("Multi_Readme.txt"),
        file("cfg.log"),
        file("Hext.log"),
        file("FF7_GC.log"),
        file("eax.dll"),
        file("Hext.dll"),
        file("multi.dll"),
        file("ff7_opengl.cfg"),
        file("ff7_opengl.fgd"),
        file("plugins/ff7music.fgp"),
        file("plugins/ffmpeg_movies.fgp"),
        file("plugins/vgmstream_music.fgp"),
    ],
};

/// Code-injection helper library files, relocated whatever the manifest says.
pub const HELPER_LIBRARY_PATTERN: &str = "EasyHook*.*";

/// Engine cache files removed before the new driver goes in.
pub const CACHE_PATTERNS: [&str; 2] = ["S*D.P", "T*D.P"];

pub const BACKUP_FOLDER_NAME: &str = "BackupGC2020";

/// Launcher pair shipped with the converter.
pub const LAUNCHER_FILES: [&str; 2] = ["ff7.exe", "FF7Config.exe"];

pub const DRIVER_DESCRIPTOR: &str = "ff7_opengl.fgd";
pub const DRIVER_FILE_PATTERN: &str = "ff7_opengl.*";
pub const DRIVER_FOLDERS: [&str; 2] = ["plugins", "shaders"];

/// Launchers whose compatibility flags the old converter set.
pub const COMPAT_FLAG_TARGETS: [&str; 3] = ["ff7.exe", "ff7config.exe", "ff7music.exe"];

/// Volume labels searched for install-set files, in priority order.
pub const INSTALL_MEDIA_LABELS: [&str; 4] = ["ff7install", "ff7disc1", "ff7disc2", "ff7disc3"];

/// Folder on every disc holding the game data.
pub const MEDIA_DATA_FOLDER: &str = "FF7";

/// Files a full install carries beyond the minimum one.
pub const INSTALL_SET_FILES: [&str; 9] = [
    "data/wm/world_us.lgp",
    "data/field/char.lgp",
    "data/field/flevel.lgp",
    "data/minigame/chocobo.lgp",
    "data/minigame/coaster.lgp",
    "data/minigame/condor.lgp",
    "data/minigame/high-us.lgp",
    "data/minigame/snowboard-us.lgp",
    "data/minigame/sub.lgp",
];

/// Per-category files under `data/`, recoverable from `data/lang-en/`.
pub const SUPPLEMENTARY_FILES: [&str; 10] = [
    "battle/camdat0.bin",
    "battle/camdat1.bin",
    "battle/camdat2.bin",
    "battle/co.bin",
    "battle/scene.bin",
    "kernel/KERNEL.BIN",
    "kernel/kernel2.bin",
    "kernel/WINDOW.BIN",
    "movies/ending2.avi",
    "movies/jenova_e.avi",
];

pub const LANG_FALLBACK_FOLDER: &str = "data/lang-en";
pub const MOVIES_FOLDER: &str = "data/movies";

/// Movies shipped in the language folder of some releases.
pub const LANG_MOVIES: [&str; 2] = ["ending2.avi", "jenova_e.avi"];

const DISC1: &[&str] = &["ff7disc1"];
const DISC2: &[&str] = &["ff7disc2"];
const DISC3: &[&str] = &["ff7disc3"];
const ALL_DISCS: &[&str] = &["ff7disc1", "ff7disc2", "ff7disc3"];

/// Movie file name and the discs it can be copied from, checked in order.
pub const MOVIE_FILES: &[(&str, &[&str])] = &[
    ("biglight.avi", DISC2),
    ("bike.avi", DISC1),
    ("biskdead.avi", DISC1),
    ("boogdemo.avi", DISC1),
    ("boogdown.avi", ALL_DISCS),
    ("boogstar.avi", DISC1),
    ("boogup.avi", ALL_DISCS),
    ("brgnvl.avi", DISC1),
    ("c_scene1.avi", DISC2),
    ("c_scene2.avi", DISC2),
    ("c_scene3.avi", DISC2),
    ("canon.avi", DISC2),
    ("canonh1p.avi", DISC2),
    ("canonh3f.avi", DISC2),
    ("canonht0.avi", DISC2),
    ("canonht1.avi", DISC2),
    ("canonht2.avi", DISC2),
    ("canonon.avi", DISC2),
    ("car_1209.avi", DISC1),
    ("d_ropego.avi", ALL_DISCS),
    ("d_ropein.avi", ALL_DISCS),
    ("dumcrush.avi", DISC2),
    ("earithdd.avi", DISC1),
    ("eidoslogo.avi", ALL_DISCS),
    ("ending1.avi", DISC3),
    ("ending2.avi", DISC3),
    ("ending3.avi", DISC3),
    ("Explode.avi", ALL_DISCS),
    ("fallpl.avi", DISC1),
    ("fcar.avi", DISC3),
    ("feelwin0.avi", DISC2),
    ("feelwin1.avi", DISC2),
    ("fship2.avi", ALL_DISCS),
    ("funeral.avi", DISC1),
    ("gelnica.avi", DISC2),
    ("gold1.avi", DISC1),
    ("gold2.avi", ALL_DISCS),
    ("gold3.avi", ALL_DISCS),
    ("gold4.avi", ALL_DISCS),
    ("gold5.avi", ALL_DISCS),
    ("gold6.avi", ALL_DISCS),
    ("gold7.avi", DISC1),
    ("gold7_2.avi", DISC1),
    ("greatpit.avi", DISC2),
    ("hiwind0.avi", DISC1),
    ("hwindfly.avi", DISC2),
    ("hwindjet.avi", DISC2),
    ("jairofal.avi", DISC1),
    ("jairofly.avi", DISC1),
    ("jenova_e.avi", DISC1),
    ("junair_d.avi", ALL_DISCS),
    ("junair_u.avi", ALL_DISCS),
    ("junelego.avi", ALL_DISCS),
    ("junelein.avi", ALL_DISCS),
    ("junin_go.avi", ALL_DISCS),
    ("junin_in.avi", ALL_DISCS),
    ("junon.avi", DISC1),
    ("junsea.avi", DISC2),
    ("last4_2.avi", DISC3),
    ("last4_3.avi", DISC3),
    ("last4_4.avi", DISC3),
    ("lastflor.avi", DISC3),
    ("lastmap.avi", DISC3),
    ("loslake1.avi", DISC2),
    ("lslmv.avi", DISC2),
    ("mainplr.avi", DISC1),
    ("meteofix.avi", DISC2),
    ("meteosky.avi", DISC2),
    ("mk8.avi", DISC1),
    ("mkup.avi", DISC1),
    ("monitor.avi", &["ff7disc1", "ff7disc2"]),
    ("moviecam.lgp", ALL_DISCS),
    ("mtcrl.avi", DISC1),
    ("mtnvl.avi", DISC1),
    ("mtnvl2.avi", DISC1),
    ("nivlsfs.avi", DISC1),
    ("northmk.avi", DISC1),
    ("nrcrl.avi", DISC2),
    ("nrcrl_b.avi", DISC2),
    ("nvlmk.avi", DISC1),
    ("ontrain.avi", DISC1),
    ("opening.avi", DISC1),
    ("parashot.avi", DISC2),
    ("phoenix.avi", DISC2),
    ("plrexp.avi", DISC1),
    ("rckethit0.avi", DISC2),
    ("rckethit1.avi", DISC2),
    ("rcketoff.avi", DISC2),
    ("rcktfail.avi", DISC1),
    ("setogake.avi", DISC1),
    ("smk.avi", DISC1),
    ("southmk.avi", DISC1),
    ("sqlogo.avi", ALL_DISCS),
    ("u_ropego.avi", ALL_DISCS),
    ("u_ropein.avi", ALL_DISCS),
    ("weapon0.avi", DISC2),
    ("weapon1.avi", DISC2),
    ("weapon2.avi", DISC2),
    ("weapon3.avi", DISC2),
    ("weapon4.avi", DISC2),
    ("weapon5.avi", DISC2),
    ("wh2e2.avi", DISC2),
    ("white2.avi", &["ff7disc2", "ff7disc3"]),
    ("zmind01.avi", DISC2),
    ("zmind02.avi", DISC2),
    ("zmind03.avi", DISC2),
];

pub const MUSIC_SOURCE_FOLDER: &str = "data/music_ogg";
pub const MUSIC_TARGET_FOLDER: &str = "music/vgmstream";

pub const MUSIC_FILES: &[&str] = &[
    "aseri.ogg", "aseri2.ogg", "ayasi.ogg", "barret.ogg", "bat.ogg", "bee.ogg", "bokujo.ogg",
    "boo.ogg", "cannon.ogg", "canyon.ogg", "cephiros.ogg", "chase.ogg", "chu.ogg", "chu2.ogg",
    "cinco.ogg", "cintro.ogg", "comical.ogg", "condor.ogg", "corel.ogg", "corneo.ogg",
    "costa.ogg", "crlost.ogg", "crwin.ogg", "date.ogg", "dokubo.ogg", "dun2.ogg", "earis.ogg",
    "earislo.ogg", "elec.ogg", "fan2.ogg", "fanfare.ogg", "fiddle.ogg", "fin.ogg", "geki.ogg",
    "gold1.ogg", "guitar2.ogg", "gun.ogg", "hen.ogg", "hiku.ogg", "horror.ogg", "iseki.ogg",
    "jukai.ogg", "junon.ogg", "jyro.ogg", "ketc.ogg", "kita.ogg", "kurai.ogg", "lb1.ogg",
    "lb2.ogg", "ld.ogg", "makoro.ogg", "mati.ogg", "mekyu.ogg", "mogu.ogg", "mura1.ogg",
    "nointro.ogg", "oa.ogg", "ob.ogg", "odds.ogg", "over2.ogg", "parade.ogg", "pj.ogg",
    "pre.ogg", "red.ogg", "rhythm.ogg", "riku.ogg", "ro.ogg", "rocket.ogg", "roll.ogg",
    "rukei.ogg", "sadbar.ogg", "sadsid.ogg", "sea.ogg", "seto.ogg", "si.ogg", "sid2.ogg",
    "sido.ogg", "siera.ogg", "sinra.ogg", "sinraslo.ogg", "snow.ogg", "ta.ogg", "tb.ogg",
    "tender.ogg", "tifa.ogg", "tm.ogg", "utai.ogg", "vincent.ogg", "walz.ogg", "weapon.ogg",
    "yado.ogg", "yufi.ogg", "yufi2.ogg", "yume.ogg",
];

/// Subfolders of `direct/` the mod loader expects.
pub const DIRECT_SUBFOLDERS: [&str; 16] = [
    "battle", "char", "chocobo", "coaster", "condor", "cr", "disc", "flevel", "high", "magic",
    "menu", "midi", "moviecam", "snowboard", "sub", "world",
];

pub const MOD_FOLDERS: [&str; 3] = ["mods", "mods/7th Heaven", "mods/Textures"];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn backup_manifests_never_overlap() {
        let legacy: HashSet<String> = LEGACY_CONVERTER
            .entries
            .iter()
            .map(|entry| entry.relative_path.to_lowercase())
            .collect();
        for entry in CURRENT_APP.entries {
            assert!(!legacy.contains(&entry.relative_path.to_lowercase()));
        }
    }

    #[test]
    fn movie_entries_are_unique_and_have_sources() {
        let mut seen = HashSet::new();
        for (name, labels) in MOVIE_FILES {
            assert!(seen.insert(name.to_lowercase()), "duplicate {name}");
            assert!(!labels.is_empty());
        }
        for name in LANG_MOVIES {
            assert!(seen.contains(name));
        }
    }

    #[test]
    fn music_list_is_unique() {
        let unique: HashSet<_> = MUSIC_FILES.iter().collect();
        assert_eq!(unique.len(), MUSIC_FILES.len());
    }
}
