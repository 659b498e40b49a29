use crate::core::media::{FileSet, MediaPath};

/// 一次同步的差异计划
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// 设备上有、音乐库中没有（顺序无意义）
    pub to_delete: Vec<MediaPath>,
    /// 音乐库中有、设备上没有，按小写标识排序
    pub to_add: Vec<MediaPath>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }
}

/// 计算音乐库与设备（主设备 + 扩展卡）的差集
///
/// 纯函数，不做任何 IO。
pub fn reconcile(library: &FileSet, device: &FileSet) -> SyncPlan {
    let to_delete = device.difference(library);

    let mut to_add = library.difference(device);
    to_add.sort();

    SyncPlan { to_delete, to_add }
}
