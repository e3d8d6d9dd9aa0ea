use std::env;
use std::path::{Path, PathBuf};

const WATCHED_VARIABLES: [&str; 5] = [
    "FFMPEG_DIR",
    "PKG_CONFIG_PATH",
    "VCPKG_ROOT",
    "VCPKGRS_DYNAMIC",
    "VCPKGRS_TRIPLET",
];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if let Some(ffmpeg_dir) = env::var_os("FFMPEG_DIR") {
        check_ffmpeg_dir(Path::new(&ffmpeg_dir));
        return;
    }

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() == "windows" {
        windows_hint();
    }
}

/// FFMPEG_DIR is trusted by ffmpeg-next's build; only flag obvious mistakes.
fn check_ffmpeg_dir(ffmpeg_dir: &Path) {
    if !ffmpeg_dir.join("include").is_dir() {
        println!(
            "cargo:warning=FFMPEG_DIR={} has no include/ directory; FFmpeg headers will not be found.",
            ffmpeg_dir.display()
        );
    }
}

fn windows_hint() {
    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=FFMPEG_DIR is not set. On Windows, install FFmpeg via vcpkg and set VCPKG_ROOT + FFMPEG_DIR."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let ffmpeg_dir: PathBuf = [vcpkg_root.as_str(), "installed", triplet.as_str()]
        .iter()
        .collect();

    if !ffmpeg_dir.exists() {
        println!(
            "cargo:warning=VCPKG_ROOT is set but no FFmpeg install was found at {}.",
            ffmpeg_dir.display()
        );
        return;
    }

    println!(
        "cargo:warning=Found vcpkg FFmpeg at {0}. Set FFMPEG_DIR={0} to make discovery explicit.",
        ffmpeg_dir.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=Set VCPKGRS_DYNAMIC=1 when linking a dynamic vcpkg FFmpeg.");
    }
}
