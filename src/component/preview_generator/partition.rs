use crate::catalog::Episode;
use crate::config::StorageBackend;

/// 一個待處理的媒體庫項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: String,
    pub title: String,
    /// 媒體伺服器回報的檔案路徑（用於分類儲存後端）
    pub file: Option<String>,
}

impl From<Episode> for WorkItem {
    fn from(episode: Episode) -> Self {
        Self {
            key: episode.key,
            title: episode.title,
            file: episode.file,
        }
    }
}

/// 同一批平行處理的項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sublist {
    pub name: String,
    pub items: Vec<WorkItem>,
    /// 此批使用的 worker 數
    pub workers: usize,
}

impl Sublist {
    #[must_use]
    pub fn new(name: impl Into<String>, items: Vec<WorkItem>, workers: usize) -> Self {
        Self {
            name: name.into(),
            items,
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 依檔案路徑前綴判斷所屬的儲存後端，依表格順序取第一個符合者
#[must_use]
pub fn classify_backend<'a>(
    file: Option<&str>,
    backends: &'a [StorageBackend],
    default_backend: &'a str,
) -> &'a str {
    file.and_then(|file| {
        backends
            .iter()
            .find(|backend| file.starts_with(backend.prefix.as_str()))
    })
    .map_or(default_backend, |backend| backend.name.as_str())
}

/// 分成每個儲存後端一組；順序為後端表格順序，最後是預設後端
#[must_use]
pub fn partition_by_backend(
    items: Vec<WorkItem>,
    backends: &[StorageBackend],
    default_backend: &str,
) -> Vec<(String, Vec<WorkItem>)> {
    let mut groups: Vec<(String, Vec<WorkItem>)> = backends
        .iter()
        .map(|backend| (backend.name.clone(), Vec::new()))
        .collect();
    if !groups.iter().any(|(name, _)| name == default_backend) {
        groups.push((default_backend.to_string(), Vec::new()));
    }

    for item in items {
        let name = classify_backend(item.file.as_deref(), backends, default_backend);
        if let Some((_, group)) = groups.iter_mut().find(|(group_name, _)| group_name == name) {
            group.push(item);
        }
    }

    groups
}

/// 輪流從各後端取一個項目組成一列（zip-longest），
/// 讓每個後端同時都有進度，而不是一個後端處理完才換下一個
#[must_use]
pub fn interleave_round_robin(groups: Vec<(String, Vec<WorkItem>)>) -> Vec<Sublist> {
    let longest = groups.iter().map(|(_, items)| items.len()).max().unwrap_or(0);
    let mut iters: Vec<_> = groups
        .into_iter()
        .map(|(_, items)| items.into_iter())
        .collect();

    (0..longest)
        .map(|row| {
            let items: Vec<WorkItem> = iters.iter_mut().filter_map(Iterator::next).collect();
            Sublist::new(format!("第 {} 列", row + 1), items, 1)
        })
        .filter(|sublist| !sublist.is_empty())
        .collect()
}
