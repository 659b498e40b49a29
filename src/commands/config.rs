//! 同步设置命令

use crate::cli::ConfigSetArgs;
use crate::config::SyncSettings;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// 打印保存的设置
pub fn show_config(config_dir: &Path) -> Result<()> {
    let settings = SyncSettings::load(config_dir);
    println!("# {}", config_dir.join("config.json").display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// 修改并保存设置
pub fn set_config(config_dir: &Path, args: ConfigSetArgs) -> Result<()> {
    let mut settings = SyncSettings::load(config_dir);
    apply(&mut settings, args);
    settings.validate()?;

    settings
        .save(config_dir)
        .with_context(|| format!("保存配置失败: {:?}", config_dir))?;
    info!("同步设置已更新");

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn apply(settings: &mut SyncSettings, args: ConfigSetArgs) {
    if let Some(path) = args.library {
        settings.library_path = Some(path);
    }
    if let Some(path) = args.primary {
        settings.primary_path = Some(path);
    }
    if let Some(path) = args.secondary {
        settings.secondary_path = Some(path);
    }
    if args.clear_secondary {
        settings.secondary_path = None;
    }
    if let Some(folder) = args.music_folder {
        settings.music_folder = folder;
    }
    if let Some(extensions) = args.extensions {
        settings.extensions = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_uppercase())
            .filter(|e| !e.is_empty())
            .collect();
    }
    if let Some(margin) = args.margin {
        settings.free_space_margin_mb = margin;
    }
    if let Some(attempts) = args.max_attempts {
        settings.max_attempts = attempts;
    }
    if let Some(backoff) = args.retry_backoff {
        settings.retry_backoff_ms = backoff;
    }
    if let Some(prune) = args.prune_library {
        settings.prune_library = prune;
    }
    if let Some(create) = args.create_music_folder {
        settings.create_music_folder = create;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_set_persists_changes() {
        let dir = TempDir::new().unwrap();
        let args = ConfigSetArgs {
            library: Some(PathBuf::from("/music")),
            secondary: Some(PathBuf::from("/media/card")),
            extensions: Some(vec![".mp3".to_string(), " flac".to_string()]),
            margin: Some(50),
            ..Default::default()
        };
        set_config(dir.path(), args).unwrap();

        let settings = SyncSettings::load(dir.path());
        assert_eq!(settings.library_path, Some(PathBuf::from("/music")));
        assert_eq!(settings.extensions, vec!["MP3", "FLAC"]);
        assert_eq!(settings.free_space_margin_mb, 50);

        let clear = ConfigSetArgs {
            clear_secondary: true,
            ..Default::default()
        };
        set_config(dir.path(), clear).unwrap();
        assert_eq!(SyncSettings::load(dir.path()).secondary_path, None);
    }

    #[test]
    fn test_invalid_settings_are_not_saved() {
        let dir = TempDir::new().unwrap();
        let args = ConfigSetArgs {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert!(set_config(dir.path(), args).is_err());
        assert!(!dir.path().join("config.json").exists());
    }
}
