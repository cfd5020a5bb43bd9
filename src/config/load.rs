use crate::config::types::{RunMode, Settings};
use anyhow::{Context, Result, bail};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SETTINGS_FILE: &str = "settings.json";

impl Settings {
    /// 載入設定：`settings.json`（可選）→ `.env`（可選）→ 環境變數
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from_file(Path::new(SETTINGS_FILE))?;
        dotenv::dotenv().ok();
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }

    /// 以環境變數覆寫設定；`lookup` 抽象化以便測試
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PLEX_URL") {
            self.catalog.url = v;
        }
        if let Some(v) = get("PLEX_TOKEN") {
            self.catalog.token = v;
        }
        if let Some(v) = get("PLEX_TIMEOUT") {
            self.catalog.timeout_secs = parse_number("PLEX_TIMEOUT", &v)?;
        }
        if let Some(v) = get("PLEX_VERIFY_TLS") {
            self.catalog.verify_tls = parse_bool("PLEX_VERIFY_TLS", &v)?;
        }
        if let Some(v) = get("PLEX_SELECTION_URL") {
            self.catalog.selection_url = Some(v);
        }

        if let Some(v) = get("PLEX_BIF_FRAME_INTERVAL") {
            self.extraction.frame_interval = parse_number("PLEX_BIF_FRAME_INTERVAL", &v)?;
        }
        if let Some(v) = get("THUMBNAIL_QUALITY") {
            self.extraction.thumbnail_quality = parse_number("THUMBNAIL_QUALITY", &v)?;
        }
        if let Some(v) = get("GPU_THREADS") {
            self.extraction.gpu_threads = parse_number("GPU_THREADS", &v)?;
        }
        if let Some(v) = get("CPU_THREADS") {
            self.extraction.cpu_threads = parse_number("CPU_THREADS", &v)?;
        }
        if let Some(v) = get("FFMPEG_PATH") {
            self.extraction.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = get("MEDIAINFO_PATH") {
            self.extraction.mediainfo_path = PathBuf::from(v);
        }
        if let Some(v) = get("NVIDIA_SMI_PATH") {
            self.extraction.nvidia_smi_path = PathBuf::from(v);
        }

        if let Some(v) = get("PLEX_LOCAL_MEDIA_PATH") {
            self.local_media_path = PathBuf::from(v);
        }
        if let Some(v) = get("TMP_FOLDER") {
            self.tmp_folder = PathBuf::from(v);
        }
        if let Some(v) = get("PROCESSING_FOLDER") {
            self.processing_folder = PathBuf::from(v);
        }

        if let Some(v) = get("PLEX_VIDEOS_PATH_MAPPING") {
            self.path_mapping.default.remote = v;
        }
        if let Some(v) = get("PLEX_LOCAL_VIDEOS_PATH_MAPPING") {
            self.path_mapping.default.local = v;
        }
        if let Some(v) = get("PLEX_VIDEOS_PATH_ARRAY") {
            self.path_mapping.remote_roots = split_list(&v);
        }
        if let Some(v) = get("PLEX_LOCAL_VIDEOS_PATH_ARRAY") {
            self.path_mapping.local_roots = split_list(&v);
        }

        if let Some(v) = get("RUN_TYPE") {
            match RunMode::parse(&v) {
                Some(mode) => self.run_mode = mode,
                None => warn!("未知的 RUN_TYPE「{v}」，沿用 {}", self.run_mode),
            }
        }
        if let Some(v) = get("RUN_INTERVAL") {
            self.run_interval_secs = parse_number("RUN_INTERVAL", &v)?;
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("環境變數 {key} 不是有效的數字: {raw}"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("環境變數 {key} 不是有效的布林值: {raw}"),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env_overrides(lookup_from(&[
                ("PLEX_URL", "https://plex.local:32400/"),
                ("PLEX_TOKEN", "abc"),
                ("GPU_THREADS", "4"),
                ("CPU_THREADS", "2"),
                ("PLEX_LOCAL_VIDEOS_PATH_ARRAY", "/mnt/a, /mnt/b"),
                ("RUN_TYPE", "currently playing"),
                ("PLEX_VERIFY_TLS", "yes"),
            ]))
            .unwrap();

        assert_eq!(settings.catalog.url, "https://plex.local:32400/");
        assert_eq!(settings.catalog.token, "abc");
        assert!(settings.catalog.verify_tls);
        assert_eq!(settings.extraction.worker_count(), 6);
        assert_eq!(settings.path_mapping.local_roots, vec!["/mnt/a", "/mnt/b"]);
        assert_eq!(settings.run_mode, RunMode::CurrentlyPlaying);
    }

    #[test]
    fn test_invalid_number_is_error() {
        let mut settings = Settings::default();
        let result = settings.apply_env_overrides(lookup_from(&[("GPU_THREADS", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut settings = Settings::default();
        settings
            .apply_env_overrides(lookup_from(&[("PLEX_BIF_FRAME_INTERVAL", "  ")]))
            .unwrap();
        assert_eq!(settings.extraction.frame_interval, 5);
    }

    #[test]
    fn test_load_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"catalog": {"url": "http://x"}, "extraction": {"frame_interval": 10}}"#,
        )
        .unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.catalog.url, "http://x");
        assert_eq!(settings.catalog.timeout_secs, 60);
        assert_eq!(settings.extraction.frame_interval, 10);
        assert_eq!(settings.extraction.thumbnail_quality, 2);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load_from_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.default_backend, "WM");
    }
}
