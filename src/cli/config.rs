use rmu::config::Config;
use rmu::core::path::config_file;
use rmu::core::{RmuError, RmuResult};
use std::path::PathBuf;

pub fn show() -> RmuResult<()> {
    let mut config = Config::load()?;
    let token_state = match config.get_token() {
        Some(_) if std::env::var("GITHUB_TOKEN").is_ok_and(|t| !t.is_empty()) => "set (GITHUB_TOKEN)",
        Some(_) => "set",
        None => "not set",
    };
    // Never print the secret itself.
    config.token = None;

    println!("Config file: {}", config_file()?.display());
    match config.get_mods_dir() {
        Ok(dir) => println!("Mods directory: {}", dir.display()),
        Err(e) => println!("Mods directory: unavailable ({})", e),
    }
    println!("Token: {}", token_state);
    println!();
    let yaml = serde_yaml::to_string(&config)?;
    print!("{}", yaml);
    Ok(())
}

pub fn set_path(path: PathBuf) -> RmuResult<()> {
    if !path.is_dir() {
        return Err(RmuError::Path(format!(
            "{} is not a directory",
            path.display()
        )));
    }

    let mut config = Config::load()?;
    config.mods_dir = Some(path.to_string_lossy().into_owned());
    config.save()?;

    println!("✓ Mods directory set to: {}", path.display());
    Ok(())
}

pub fn set_token(token: String) -> RmuResult<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(RmuError::Config("Token must not be empty".to_string()));
    }

    let mut config = Config::load()?;
    config.token = Some(token.to_string());
    config.save()?;

    println!("✓ Token saved");
    Ok(())
}

pub fn clear_token() -> RmuResult<()> {
    let mut config = Config::load()?;
    config.token = None;
    config.save()?;

    println!("✓ Token removed");
    Ok(())
}
