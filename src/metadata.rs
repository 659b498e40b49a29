//! 内嵌封面读取
//!
//! 仅用于展示，读取失败一律视为“没有封面”，不影响同步。

use anyhow::{Context, Result};
use async_trait::async_trait;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::path::{Path, PathBuf};

/// 从音频文件中取出的封面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// 封面读取接口
#[async_trait]
pub trait ArtworkSource: Send + Sync {
    async fn cover_art(&self, path: &Path) -> Result<Option<Artwork>>;
}

/// 基于 lofty 的实现，取主标签（没有则取第一个标签）的第一张图片
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyArtwork;

#[async_trait]
impl ArtworkSource for LoftyArtwork {
    async fn cover_art(&self, path: &Path) -> Result<Option<Artwork>> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_cover(&path)).await?
    }
}

fn read_cover(path: &Path) -> Result<Option<Artwork>> {
    let tagged = Probe::open(path)
        .with_context(|| format!("无法打开 {:?}", path))?
        .guess_file_type()
        .with_context(|| format!("无法识别格式 {:?}", path))?
        .read()
        .with_context(|| format!("无法解析标签 {:?}", path))?;

    // 时长为 0 的文件不当作有效音频
    if tagged.properties().duration().is_zero() {
        return Ok(None);
    }

    let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
    let Some(picture) = tag.and_then(|t| t.pictures().first()) else {
        return Ok(None);
    };

    if picture.data().is_empty() {
        return Ok(None);
    }

    Ok(Some(Artwork {
        mime_type: picture.mime_type().map(|m| m.as_str().to_string()),
        data: picture.data().to_vec(),
    }))
}

/// 不读取封面
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtwork;

#[async_trait]
impl ArtworkSource for NoArtwork {
    async fn cover_art(&self, _path: &Path) -> Result<Option<Artwork>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unreadable_file_has_no_art() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let result = LoftyArtwork.cover_art(&path).await;
        assert!(!matches!(result, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = LoftyArtwork.cover_art(&dir.path().join("gone.mp3")).await;
        assert!(result.is_err());
    }
}
