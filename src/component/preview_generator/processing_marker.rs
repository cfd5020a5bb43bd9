use anyhow::{Context, Result};
use log::warn;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 處理中的標記：暫存影格資料夾 + 標記檔
///
/// 兩者皆以「不存在才建立」取得；離開作用域時一律清除，
/// 不論擷取或封裝成功與否。
#[derive(Debug)]
pub struct ProcessingMarker {
    frames_dir: PathBuf,
    marker_file: PathBuf,
    owner_token: String,
}

impl ProcessingMarker {
    /// 嘗試取得標記；已被其他嘗試佔用時回傳 `None`
    pub fn acquire(frames_dir: &Path, marker_file: &Path, video_path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = frames_dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("無法建立暫存資料夾: {}", parent.display()))?;
        }

        match fs::create_dir(frames_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("無法建立暫存資料夾: {}", frames_dir.display()));
            }
        }

        let owner_token = Uuid::new_v4().to_string();
        match write_marker_file(marker_file, &owner_token, video_path) {
            Ok(true) => Ok(Some(Self {
                frames_dir: frames_dir.to_path_buf(),
                marker_file: marker_file.to_path_buf(),
                owner_token,
            })),
            Ok(false) => {
                let _ = fs::remove_dir_all(frames_dir);
                Ok(None)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(frames_dir);
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    fn owns_marker_file(&self) -> bool {
        fs::read_to_string(&self.marker_file)
            .is_ok_and(|content| content.lines().next() == Some(self.owner_token.as_str()))
    }
}

impl Drop for ProcessingMarker {
    fn drop(&mut self) {
        if self.frames_dir.exists()
            && let Err(e) = fs::remove_dir_all(&self.frames_dir)
        {
            warn!("無法清理暫存資料夾 {}: {e}", self.frames_dir.display());
        }

        // 標記檔可能已被整輪清理移除，只刪除自己建立的
        if self.owns_marker_file()
            && let Err(e) = fs::remove_file(&self.marker_file)
        {
            warn!("無法刪除處理中標記 {}: {e}", self.marker_file.display());
        }
    }
}

/// 以 create-new 建立標記檔；已存在時回傳 `Ok(false)`
fn write_marker_file(marker_file: &Path, owner_token: &str, video_path: &Path) -> Result<bool> {
    if let Some(parent) = marker_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("無法建立標記資料夾: {}", parent.display()))?;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(marker_file)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("無法建立處理中標記: {}", marker_file.display()));
        }
    };

    writeln!(file, "{owner_token}")?;
    writeln!(file, "{}", video_path.display())?;
    Ok(true)
}
