//! 媒体文件标识与文件集合
//!
//! 同步只比较相对路径，不比较内容、大小或修改时间。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_set;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// 默认识别的扩展名（音频 + 封面图）
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["MP3", "WAV", "WMA", "M4A", "JPG"];

/// 图片扩展名，不尝试读取内嵌封面
const IMAGE_EXTENSIONS: [&str; 3] = ["JPG", "JPEG", "PNG"];

/// 媒体文件的相对标识，形如 `Artist/Album/Track.ext`
///
/// 分隔符统一为 `/`。相等、哈希和排序都基于小写形式，
/// 原始大小写保留下来用于拼接磁盘路径。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MediaPath {
    raw: String,
    key: String,
}

impl MediaPath {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw
            .into()
            .replace('\\', "/")
            .trim_start_matches('/')
            .to_string();
        let key = raw.to_lowercase();
        Self { raw, key }
    }

    /// 由相对路径构造，含 `..` 或非 UTF-8 段时返回 None
    pub fn from_relative(path: &Path) -> Option<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self::new(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn file_name(&self) -> &str {
        self.raw.rsplit('/').next().unwrap_or(&self.raw)
    }

    /// 大写扩展名
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let idx = name.rfind('.')?;
        Some(name[idx + 1..].to_uppercase())
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// 拼接到根目录下。存在性检查、删除、复制都走这一条规则。
    pub fn resolve(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        for segment in self.raw.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl PartialEq for MediaPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MediaPath {}

impl Hash for MediaPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for MediaPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Display for MediaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for MediaPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for MediaPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<MediaPath> for String {
    fn from(path: MediaPath) -> Self {
        path.raw
    }
}

/// 识别的扩展名集合（大写存储）
#[derive(Debug, Clone)]
pub struct ExtensionSet {
    allowed: HashSet<String>,
}

impl ExtensionSet {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_uppercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.allowed.contains(&e.to_uppercase()))
            .unwrap_or(false)
    }
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

/// 无序的标识集合
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    entries: HashSet<MediaPath>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已存在同名（忽略大小写）条目时保留先插入的
    pub fn insert(&mut self, path: MediaPath) -> bool {
        self.entries.insert(path)
    }

    pub fn contains(&self, path: &MediaPath) -> bool {
        self.entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, MediaPath> {
        self.entries.iter()
    }

    /// 并入另一集合
    pub fn union_with(&mut self, other: FileSet) {
        for path in other.entries {
            self.entries.insert(path);
        }
    }

    /// self − other，顺序不确定
    pub fn difference(&self, other: &FileSet) -> Vec<MediaPath> {
        self.entries.difference(&other.entries).cloned().collect()
    }

    /// 按小写标识排序后的列表
    pub fn sorted(&self) -> Vec<MediaPath> {
        let mut list: Vec<_> = self.entries.iter().cloned().collect();
        list.sort();
        list
    }
}

impl FromIterator<MediaPath> for FileSet {
    fn from_iter<T: IntoIterator<Item = MediaPath>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileSet {
    type Item = MediaPath;
    type IntoIter = hash_set::IntoIter<MediaPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a MediaPath;
    type IntoIter = hash_set::Iter<'a, MediaPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_case() {
        let a = MediaPath::new("Artist/Album/Track.MP3");
        let b = MediaPath::new("artist/album/track.mp3");
        assert_eq!(a, b);

        let set: FileSet = vec![a.clone()].into_iter().collect();
        assert!(set.contains(&b));
        assert_eq!(set.iter().next().map(|p| p.as_str()), Some("Artist/Album/Track.MP3"));
    }

    #[test]
    fn test_backslash_normalized() {
        let p = MediaPath::new("\\Artist\\Album\\01.wma");
        assert_eq!(p.as_str(), "Artist/Album/01.wma");
        assert_eq!(p.file_name(), "01.wma");
        assert_eq!(p.extension().as_deref(), Some("WMA"));
    }

    #[test]
    fn test_from_relative_rejects_parent() {
        assert!(MediaPath::from_relative(Path::new("../x.mp3")).is_none());
        let p = MediaPath::from_relative(Path::new("A/B/1.mp3")).unwrap();
        assert_eq!(p.as_str(), "A/B/1.mp3");
    }

    #[test]
    fn test_resolve_splits_segments() {
        let p = MediaPath::new("A/B/1.mp3");
        let base = Path::new("/media/player/Music");
        assert_eq!(p.resolve(base), base.join("A").join("B").join("1.mp3"));
    }

    #[test]
    fn test_extension_set() {
        let set = ExtensionSet::default();
        assert!(set.matches(Path::new("a/b.Mp3")));
        assert!(set.matches(Path::new("folder.jpg")));
        assert!(!set.matches(Path::new("a/b.flac")));
        assert!(!set.matches(Path::new("noext")));

        let custom = ExtensionSet::new([".flac"]);
        assert!(custom.matches(Path::new("x.FLAC")));
    }

    #[test]
    fn test_is_image() {
        assert!(MediaPath::new("A/B/Folder.jpg").is_image());
        assert!(!MediaPath::new("A/B/1.m4a").is_image());
    }
}
