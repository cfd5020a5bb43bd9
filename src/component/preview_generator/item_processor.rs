use super::frame_extractor::{ExtractionStats, FrameExtractor};
use super::processing_marker::ProcessingMarker;
use crate::catalog::{Catalog, MediaPart};
use crate::tools::{BifIndex, PathResolver, write_bif};
use anyhow::{Context, Result, anyhow, bail};
use log::{debug, error, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 索引檔在 bundle 內的相對路徑
const INDEXES_SUBDIR: [&str; 2] = ["Contents", "Indexes"];
const INDEX_FILE_NAME: &str = "index-sd.bif";

/// 略過項目的原因（不算失敗）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 項目已從媒體庫移除
    CatalogItemGone,
    CatalogUnavailable(String),
    NoMediaParts,
    MissingHash,
    FilteredOut,
    FileNotReachable(String),
    AlreadyIndexed,
    /// 同 hash 的暫存資料夾已存在
    InProgress,
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogItemGone => write!(f, "媒體庫中已無此項目"),
            Self::CatalogUnavailable(e) => write!(f, "查詢媒體庫失敗: {e}"),
            Self::NoMediaParts => write!(f, "沒有可處理的影片檔"),
            Self::MissingHash => write!(f, "影片檔缺少有效的 hash"),
            Self::FilteredOut => write!(f, "不符合路徑篩選條件"),
            Self::FileNotReachable(file) => write!(f, "本機找不到檔案: {file}"),
            Self::AlreadyIndexed => write!(f, "索引檔已存在"),
            Self::InProgress => write!(f, "已有其他程序在處理"),
            Self::Cancelled => write!(f, "已取消"),
        }
    }
}

/// 單一項目的處理結果
#[derive(Debug)]
pub enum ItemOutcome {
    Skipped(SkipReason),
    Failed(anyhow::Error),
    Completed(ExtractionStats),
}

impl ItemOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// 項目處理器相關的路徑
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// bundle 根目錄
    pub local_media_path: PathBuf,
    pub tmp_folder: PathBuf,
    pub processing_folder: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn index_dir(&self, bundle_relative: &Path) -> PathBuf {
        let mut dir = self.local_media_path.join(bundle_relative);
        for segment in INDEXES_SUBDIR {
            dir.push(segment);
        }
        dir
    }

    #[must_use]
    pub fn index_file(&self, bundle_relative: &Path) -> PathBuf {
        self.index_dir(bundle_relative).join(INDEX_FILE_NAME)
    }

    #[must_use]
    pub fn frames_dir(&self, hash: &str) -> PathBuf {
        self.tmp_folder.join(hash)
    }

    #[must_use]
    pub fn marker_file(&self, hash: &str) -> PathBuf {
        self.processing_folder.join(format!("{hash}.txt"))
    }
}

/// 處理單一媒體庫項目：查詢 → 解析路徑 → 擷取影格 → 封裝索引
pub struct ItemProcessor {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<PathResolver>,
    extractor: FrameExtractor,
    layout: OutputLayout,
    path_filter: Option<String>,
    shutdown_signal: Arc<AtomicBool>,
}

impl ItemProcessor {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn Catalog>,
        resolver: Arc<PathResolver>,
        extractor: FrameExtractor,
        layout: OutputLayout,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            extractor,
            layout,
            path_filter: None,
            shutdown_signal,
        }
    }

    /// 只處理路徑包含此字串的檔案
    #[must_use]
    pub fn with_path_filter(mut self, path_filter: Option<String>) -> Self {
        self.path_filter = path_filter.filter(|f| !f.is_empty());
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// 處理一個項目的所有實體檔案
    ///
    /// 第一個完成的檔案即結束此項目；不符合篩選條件時立即略過整個項目。
    pub fn process(&self, item_key: &str) -> ItemOutcome {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return ItemOutcome::Skipped(SkipReason::Cancelled);
        }

        let parts = match self.catalog.media_parts(item_key) {
            Ok(parts) => parts,
            Err(e) if e.is_not_found() => {
                warn!("項目 {item_key} 已不在媒體庫中，略過");
                return ItemOutcome::Skipped(SkipReason::CatalogItemGone);
            }
            Err(e) => {
                error!("查詢項目 {item_key} 失敗: {e}");
                return ItemOutcome::Skipped(SkipReason::CatalogUnavailable(e.to_string()));
            }
        };

        let mut outcome = ItemOutcome::Skipped(SkipReason::NoMediaParts);
        for part in &parts {
            outcome = self.process_part(part);
            match &outcome {
                ItemOutcome::Completed(_)
                | ItemOutcome::Skipped(SkipReason::FilteredOut | SkipReason::Cancelled) => {
                    return outcome;
                }
                ItemOutcome::Skipped(reason) => debug!("略過 {}: {reason}", part.file),
                ItemOutcome::Failed(e) => error!("產生預覽失敗 {}: {e:#}", part.file),
            }
        }
        outcome
    }

    fn process_part(&self, part: &MediaPart) -> ItemOutcome {
        let (Some(hash), Some(bundle_relative)) = (part.valid_hash(), part.bundle_relative_path())
        else {
            return ItemOutcome::Skipped(SkipReason::MissingHash);
        };

        let local_path = self.resolver.resolve(&part.file);

        if let Some(filter) = &self.path_filter {
            let matches_remote = part.file.contains(filter.as_str());
            let matches_local = local_path
                .as_deref()
                .is_some_and(|p| p.to_string_lossy().contains(filter.as_str()));
            if !matches_remote && !matches_local {
                return ItemOutcome::Skipped(SkipReason::FilteredOut);
            }
        }

        let Some(local_path) = local_path else {
            warn!("本機找不到檔案，略過: {}", part.file);
            return ItemOutcome::Skipped(SkipReason::FileNotReachable(part.file.clone()));
        };

        let index_file = self.layout.index_file(&bundle_relative);
        if index_file.is_file() {
            return ItemOutcome::Skipped(SkipReason::AlreadyIndexed);
        }
        let frames_dir = self.layout.frames_dir(hash);
        if frames_dir.exists() {
            return ItemOutcome::Skipped(SkipReason::InProgress);
        }

        let index_dir = self.layout.index_dir(&bundle_relative);
        if let Err(e) = fs::create_dir_all(&index_dir) {
            return ItemOutcome::Failed(
                anyhow!(e).context(format!("無法建立索引資料夾: {}", index_dir.display())),
            );
        }

        let marker = match ProcessingMarker::acquire(
            &frames_dir,
            &self.layout.marker_file(hash),
            &local_path,
        ) {
            Ok(Some(marker)) => marker,
            Ok(None) => return ItemOutcome::Skipped(SkipReason::InProgress),
            Err(e) => return ItemOutcome::Failed(e),
        };

        // marker 在此函式結束時釋放，暫存影格一併刪除
        match self.extract_and_encode(&local_path, marker.frames_dir(), &index_file) {
            Ok(stats) => ItemOutcome::Completed(stats),
            Err(e) => ItemOutcome::Failed(e),
        }
    }

    fn extract_and_encode(
        &self,
        local_path: &Path,
        frames_dir: &Path,
        index_file: &Path,
    ) -> Result<ExtractionStats> {
        let stats = self
            .extractor
            .extract(local_path, frames_dir)
            .context("擷取影格失敗")?;
        if stats.frame_count == 0 {
            bail!("ffmpeg 沒有產生任何影格: {}", local_path.display());
        }

        if let Err(e) = encode_index(index_file, frames_dir, self.extractor.frame_interval()) {
            discard_partial_index(index_file);
            return Err(e.context("封裝索引檔失敗"));
        }

        Ok(stats)
    }
}

/// 刪除封裝失敗留下的索引檔（包含指向他處的連結本身）
fn discard_partial_index(index_file: &Path) {
    if fs::symlink_metadata(index_file).is_ok()
        && let Err(e) = fs::remove_file(index_file)
    {
        warn!("無法刪除不完整的索引檔 {}: {e}", index_file.display());
    }
}

/// 寫入索引檔並讀回檢查
fn encode_index(index_file: &Path, frames_dir: &Path, interval_secs: u32) -> Result<()> {
    let summary = write_bif(index_file, frames_dir, interval_secs)?;
    let index = BifIndex::open(index_file)?;
    if index.frame_count() != summary.frame_count {
        bail!(
            "索引檔影格數不符: 預期 {}，實際 {}",
            summary.frame_count,
            index.frame_count()
        );
    }
    debug!(
        "已寫入索引 {} ({} 張, {} bytes)",
        index_file.display(),
        summary.frame_count,
        summary.file_size
    );
    Ok(())
}
