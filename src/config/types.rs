use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 執行模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// 掃描整個媒體庫
    #[default]
    Full,
    /// 只處理「繼續觀看」清單中各季尚未觀看的集數
    CurrentlyPlaying,
    /// 互動式挑選節目，並依儲存後端交錯排程
    Manual,
}

impl RunMode {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "full" => Some(Self::Full),
            "currently_playing" => Some(Self::CurrentlyPlaying),
            "manual" | "other" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "完整媒體庫"),
            Self::CurrentlyPlaying => write!(f, "繼續觀看"),
            Self::Manual => write!(f, "手動挑選"),
        }
    }
}

/// 媒體伺服器回報的路徑前綴與本機可存取路徑前綴的對應
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub remote: String,
    pub local: String,
}

impl PathMapping {
    #[must_use]
    pub fn new(remote: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }
}

/// 路徑對應設定
///
/// `default` 為找不到任何可用對應時的後備；候選對應由
/// `local_roots` × `remote_roots` 依序組合而成（本機路徑優先）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathMappingSettings {
    pub default: PathMapping,
    pub local_roots: Vec<String>,
    pub remote_roots: Vec<String>,
}

impl PathMappingSettings {
    #[must_use]
    pub fn candidates(&self) -> Vec<PathMapping> {
        self.local_roots
            .iter()
            .flat_map(|local| {
                self.remote_roots
                    .iter()
                    .map(move |remote| PathMapping::new(remote.clone(), local.clone()))
            })
            .collect()
    }
}

impl Default for PathMappingSettings {
    fn default() -> Self {
        Self {
            default: PathMapping::new("", ""),
            local_roots: Vec::new(),
            remote_roots: Vec::new(),
        }
    }
}

/// 儲存後端：以媒體伺服器上的路徑前綴辨識
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBackend {
    pub name: String,
    pub prefix: String,
}

impl StorageBackend {
    #[must_use]
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub url: String,
    pub token: String,
    pub timeout_secs: u64,
    pub verify_tls: bool,
    /// 手動模式用來列出節目的伺服器，未設定時沿用 `url`
    pub selection_url: Option<String>,
}

impl CatalogSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_secs: 60,
            verify_tls: false,
            selection_url: None,
        }
    }
}

/// 縮圖擷取設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// 取樣間隔（秒）
    pub frame_interval: u32,
    /// JPEG 品質 (2-6，數字越小品質越高)
    pub thumbnail_quality: u8,
    pub gpu_threads: usize,
    pub cpu_threads: usize,
    pub ffmpeg_path: PathBuf,
    pub mediainfo_path: PathBuf,
    pub nvidia_smi_path: PathBuf,
}

impl ExtractionSettings {
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.gpu_threads + self.cpu_threads
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            frame_interval: 5,
            thumbnail_quality: 2,
            gpu_threads: 2,
            cpu_threads: 0,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            mediainfo_path: PathBuf::from("mediainfo"),
            nvidia_smi_path: PathBuf::from("nvidia-smi"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub extraction: ExtractionSettings,
    /// 媒體伺服器的 bundle 根目錄（本機可存取）
    pub local_media_path: PathBuf,
    pub tmp_folder: PathBuf,
    pub processing_folder: PathBuf,
    pub path_mapping: PathMappingSettings,
    pub storage_backends: Vec<StorageBackend>,
    pub default_backend: String,
    pub run_mode: RunMode,
    /// 兩輪掃描之間的間隔（秒）
    pub run_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let temp = std::env::temp_dir();
        Self {
            catalog: CatalogSettings::default(),
            extraction: ExtractionSettings::default(),
            local_media_path: PathBuf::new(),
            tmp_folder: temp.join("vpt"),
            processing_folder: temp.join("vpt-processing"),
            path_mapping: PathMappingSettings::default(),
            storage_backends: default_storage_backends(),
            default_backend: "WM".to_string(),
            run_mode: RunMode::default(),
            run_interval_secs: 10,
        }
    }
}

fn default_storage_backends() -> Vec<StorageBackend> {
    let mut backends = vec![StorageBackend::new("RCLONE", "/rclone")];
    backends.extend((1..=6).map(|n| {
        StorageBackend::new(&format!("ZPOOL{n}"), &format!("/zfs/zpool{n}"))
    }));
    backends
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_parse() {
        assert_eq!(RunMode::parse("Full"), Some(RunMode::Full));
        assert_eq!(
            RunMode::parse("Currently Playing"),
            Some(RunMode::CurrentlyPlaying)
        );
        assert_eq!(RunMode::parse("manual"), Some(RunMode::Manual));
        assert_eq!(RunMode::parse("bogus"), None);
    }

    #[test]
    fn test_candidates_order_local_first() {
        let mapping = PathMappingSettings {
            default: PathMapping::new("/media/", "/mnt/"),
            local_roots: vec!["/a".into(), "/b".into()],
            remote_roots: vec!["/r1".into(), "/r2".into()],
        };

        let candidates = mapping.candidates();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0], PathMapping::new("/r1", "/a"));
        assert_eq!(candidates[1], PathMapping::new("/r2", "/a"));
        assert_eq!(candidates[2], PathMapping::new("/r1", "/b"));
    }

    #[test]
    fn test_default_backends() {
        let settings = Settings::default();
        assert_eq!(settings.storage_backends.len(), 7);
        assert_eq!(settings.storage_backends[0].name, "RCLONE");
        assert_eq!(settings.storage_backends[6].prefix, "/zfs/zpool6");
        assert_eq!(settings.extraction.worker_count(), 2);
    }
}
