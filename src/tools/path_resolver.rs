use crate::config::{PathMapping, PathMappingSettings};
use log::debug;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// 將媒體伺服器回報的檔案路徑轉換為本機可存取的路徑
///
/// 探測順序：
/// 1. 上一次成功的對應（sticky）
/// 2. 候選對應（本機根目錄 × 伺服器根目錄）
/// 3. 預設對應
///
/// 找到可用的候選對應後會記住，之後的項目優先嘗試。
pub struct PathResolver {
    default: PathMapping,
    candidates: Vec<PathMapping>,
    sticky: Mutex<Option<PathMapping>>,
}

impl PathResolver {
    #[must_use]
    pub fn new(settings: &PathMappingSettings) -> Self {
        Self {
            default: settings.default.clone(),
            candidates: settings.candidates(),
            sticky: Mutex::new(None),
        }
    }

    /// 回傳存在於磁碟上的本機路徑，全部失敗時回傳 `None`
    pub fn resolve(&self, remote_path: &str) -> Option<PathBuf> {
        if let Some(mapping) = self.sticky()
            && let Some(path) = existing_path(remote_path, &mapping)
        {
            return Some(path);
        }

        for mapping in &self.candidates {
            if let Some(path) = existing_path(remote_path, mapping) {
                debug!("路徑對應 {} -> {}", mapping.remote, mapping.local);
                *self.sticky.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(mapping.clone());
                return Some(path);
            }
        }

        // 預設對應的前綴不符時沿用原路徑（直接在媒體伺服器上執行）
        existing_path(remote_path, &self.default)
            .or_else(|| Some(PathBuf::from(remote_path)).filter(|path| path.is_file()))
    }

    #[must_use]
    pub fn sticky(&self) -> Option<PathMapping> {
        self.sticky
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// 以前綴替換，不符合前綴時回傳 `None`
fn substitute(remote_path: &str, mapping: &PathMapping) -> Option<String> {
    if mapping.remote.is_empty() {
        return Some(format!("{}{}", mapping.local, remote_path));
    }
    remote_path
        .strip_prefix(mapping.remote.as_str())
        .map(|rest| format!("{}{}", mapping.local, rest))
}

fn existing_path(remote_path: &str, mapping: &PathMapping) -> Option<PathBuf> {
    substitute(remote_path, mapping)
        .map(PathBuf::from)
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn root_str(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    fn settings_with_roots(locals: &[&Path], default: PathMapping) -> PathMappingSettings {
        PathMappingSettings {
            default,
            local_roots: locals.iter().map(|p| root_str(p)).collect(),
            remote_roots: vec!["/zfs/zpool1/Union".to_string(), "/rclone/Union".to_string()],
        }
    }

    #[test]
    fn test_substitute_prefix_only() {
        let mapping = PathMapping::new("/media", "/mnt/share");
        assert_eq!(
            substitute("/media/tv/show.mkv", &mapping).as_deref(),
            Some("/mnt/share/tv/show.mkv")
        );
        assert_eq!(substitute("/other/media/show.mkv", &mapping), None);
    }

    #[test]
    fn test_resolves_nth_root_and_becomes_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let roots: Vec<_> = ["a", "b", "c"].iter().map(|n| dir.path().join(n)).collect();
        for root in &roots {
            fs::create_dir_all(root.join("tv")).unwrap();
        }
        fs::write(roots[2].join("tv/ep1.mkv"), "x").unwrap();

        let settings = settings_with_roots(
            &[&roots[0], &roots[1], &roots[2]],
            PathMapping::new("", ""),
        );
        let resolver = PathResolver::new(&settings);

        let resolved = resolver.resolve("/rclone/Union/tv/ep1.mkv").unwrap();
        assert_eq!(resolved, roots[2].join("tv/ep1.mkv"));
        assert_eq!(
            resolver.sticky(),
            Some(PathMapping::new("/rclone/Union", root_str(&roots[2])))
        );

        // 同時存在於 a 與 c 時，sticky 的 c 優先
        fs::write(roots[0].join("tv/ep2.mkv"), "x").unwrap();
        fs::write(roots[2].join("tv/ep2.mkv"), "x").unwrap();
        let resolved = resolver.resolve("/rclone/Union/tv/ep2.mkv").unwrap();
        assert_eq!(resolved, roots[2].join("tv/ep2.mkv"));
    }

    #[test]
    fn test_falls_back_to_default_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let default_root = dir.path().join("default");
        fs::create_dir_all(&default_root).unwrap();
        fs::write(default_root.join("movie.mp4"), "x").unwrap();

        let settings = settings_with_roots(
            &[&dir.path().join("empty")],
            PathMapping::new("/media/", format!("{}/", root_str(&default_root))),
        );
        let resolver = PathResolver::new(&settings);

        let resolved = resolver.resolve("/media/movie.mp4").unwrap();
        assert_eq!(resolved, default_root.join("movie.mp4"));
        assert_eq!(resolver.sticky(), None);
    }

    #[test]
    fn test_default_prefix_mismatch_keeps_original_path() {
        let dir = tempfile::tempdir().unwrap();
        let local_file = dir.path().join("tv/ep1.mkv");
        fs::create_dir_all(local_file.parent().unwrap()).unwrap();
        fs::write(&local_file, "x").unwrap();

        let settings = settings_with_roots(
            &[&dir.path().join("empty")],
            PathMapping::new("/media/sean/1tb1/Union/", "//172.17.1.77/Union/"),
        );
        let resolver = PathResolver::new(&settings);

        let resolved = resolver.resolve(&root_str(&local_file)).unwrap();
        assert_eq!(resolved, local_file);
        assert_eq!(resolver.sticky(), None);
    }

    #[test]
    fn test_unreachable_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_roots(&[dir.path()], PathMapping::new("", ""));
        let resolver = PathResolver::new(&settings);
        assert!(resolver.resolve("/rclone/Union/missing.mkv").is_none());
    }
}
