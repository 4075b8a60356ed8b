use crate::core::error::{RmuError, RmuResult};
use std::path::{Path, PathBuf};

/// Get the RMU home directory
///
/// Platform-specific locations:
/// - Windows: %APPDATA%\rmu
/// - Linux: ~/.config/rmu
/// - macOS: ~/Library/Application Support/rmu
pub fn rmu_home() -> RmuResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| RmuError::Path("Could not determine config directory".to_string()))?;
    Ok(config_dir.join("rmu"))
}

/// Get the config file path
///
/// Platform-specific locations:
/// - Windows: %APPDATA%\rmu\config.yaml
/// - Linux: ~/.config/rmu/config.yaml
/// - macOS: ~/Library/Application Support/rmu/config.yaml
pub fn config_file() -> RmuResult<PathBuf> {
    Ok(rmu_home()?.join("config.yaml"))
}

/// Default location of the mod loader's plugin folder inside a Steam install.
///
/// - Windows: %PROGRAMFILES(X86)%\Steam\steamapps\common\Resonite\rml_mods
/// - Elsewhere: ~/.steam/steam/steamapps/common/Resonite/rml_mods
pub fn default_mods_dir() -> RmuResult<PathBuf> {
    if cfg!(target_os = "windows") {
        let program_files = std::env::var("PROGRAMFILES(X86)")
            .map_err(|_| RmuError::Path("PROGRAMFILES(X86) not set".to_string()))?;
        Ok(steam_mods_dir(&PathBuf::from(program_files).join("Steam")))
    } else {
        let home = dirs::home_dir()
            .ok_or_else(|| RmuError::Path("Could not determine home directory".to_string()))?;
        Ok(steam_mods_dir(&home.join(".steam").join("steam")))
    }
}

/// `rml_mods` directory under a Steam root
pub fn steam_mods_dir(steam_root: &Path) -> PathBuf {
    steam_root
        .join("steamapps")
        .join("common")
        .join("Resonite")
        .join("rml_mods")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> RmuResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
