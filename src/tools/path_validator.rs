use anyhow::{Context, Result, bail};
use log::warn;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("路徑不存在: {}", path.display());
    }
    if !path.is_dir() {
        bail!("路徑不是資料夾: {}", path.display());
    }
    Ok(())
}

pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("無法建立資料夾: {}", path.display()))?;
    }
    Ok(())
}

/// 清空並重建資料夾
pub fn reset_directory(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("無法清除資料夾: {}", path.display()))?;
    }
    ensure_directory_exists(path)
}

/// 盡力刪除暫存資料夾，失敗只記錄警告
pub fn remove_directories(paths: &[PathBuf]) {
    for path in paths {
        if path.is_dir()
            && let Err(e) = std::fs::remove_dir_all(path)
        {
            warn!("無法刪除 {}: {e}", path.display());
        }
    }
}

/// 確認外部程式可以執行（以版本參數試跑一次）
pub fn ensure_executable_available(program: &Path, version_arg: &str) -> Result<()> {
    let status = Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            bail!("找不到 {}，請安裝並加入 PATH", program.display())
        }
        Err(e) => Err(e).with_context(|| format!("無法執行 {}", program.display())),
    }
}
