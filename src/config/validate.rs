use crate::config::types::Settings;
use crate::tools::{ensure_executable_available, validate_directory_exists};
use anyhow::{Context, Result, bail};

impl Settings {
    /// 檢查必要設定；任何錯誤都屬於啟動時的致命錯誤
    pub fn validate(&self) -> Result<()> {
        if self.catalog.url.trim().is_empty() {
            bail!("請設定 PLEX_URL 環境變數");
        }
        if self.catalog.token.trim().is_empty() {
            bail!("請設定 PLEX_TOKEN 環境變數");
        }

        validate_directory_exists(&self.local_media_path).with_context(|| {
            format!(
                "{} 不存在，請設定 PLEX_LOCAL_MEDIA_PATH 環境變數",
                self.local_media_path.display()
            )
        })?;

        if self.extraction.frame_interval == 0 {
            bail!("PLEX_BIF_FRAME_INTERVAL 必須大於 0");
        }
        if self.extraction.thumbnail_quality == 0 {
            bail!("THUMBNAIL_QUALITY 必須大於 0");
        }
        if self.extraction.worker_count() == 0 {
            bail!("GPU_THREADS 與 CPU_THREADS 不能同時為 0");
        }

        Ok(())
    }

    /// 檢查外部程式：ffmpeg 與 mediainfo 為必要
    pub fn validate_executables(&self) -> Result<()> {
        ensure_executable_available(&self.extraction.ffmpeg_path, "-version")?;
        ensure_executable_available(&self.extraction.mediainfo_path, "--Version")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings(root: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.catalog.url = "http://localhost:32400".to_string();
        settings.catalog.token = "token".to_string();
        settings.local_media_path = root.to_path_buf();
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        let dir = tempfile::tempdir().unwrap();
        assert!(valid_settings(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_missing_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = valid_settings(dir.path());
        settings.catalog.token.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_bundle_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = valid_settings(dir.path());
        settings.local_media_path = dir.path().join("nope");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_budget_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = valid_settings(dir.path());
        settings.extraction.gpu_threads = 0;
        settings.extraction.cpu_threads = 0;
        assert!(settings.validate().is_err());
    }
}
