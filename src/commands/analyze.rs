use crate::cli::PathArgs;
use crate::core::{format_bytes, SyncEngine};
use anyhow::Result;
use std::path::Path;

/// 只读分析：列出同步将要删除和添加的文件
pub async fn analyze(config_dir: &Path, paths: PathArgs, list: bool, json: bool) -> Result<()> {
    let config = super::load_config(config_dir, paths)?;
    let analysis = SyncEngine::new(config).analyze().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!(
        "{} files read from library ({}).",
        analysis.library_files,
        format_bytes(analysis.library_bytes)
    );
    println!("{} files read from device.", analysis.device_files);
    println!("To delete: {}", analysis.to_delete.len());
    println!(
        "To add:    {} ({})",
        analysis.to_add.len(),
        format_bytes(analysis.bytes_to_add)
    );

    if list {
        for id in &analysis.to_delete {
            println!("- {}", id);
        }
        for id in &analysis.to_add {
            println!("+ {}", id);
        }
    }

    Ok(())
}
