use super::frame_extractor::FrameExtractor;
use super::item_processor::{ItemProcessor, OutputLayout};
use super::partition::{Sublist, WorkItem, interleave_round_robin, partition_by_backend};
use super::show_picker::{pick_show, selected_guids};
use super::task_scheduler::{SublistReport, TaskScheduler};
use crate::catalog::{Catalog, CatalogEntry, Episode, PlexClient, SectionKind};
use crate::config::{RunMode, Settings};
use crate::tools::{GpuProbe, MediaInfoProbe, NvidiaSmiProbe, PathResolver, reset_directory};
use anyhow::{Context, Result};
use console::Term;
use log::{error, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 手動模式查詢節目集數時的並行數
const GUID_LOOKUP_WORKERS: usize = 4;

/// 每一輪掃描媒體庫並產生預覽
pub struct PreviewGenerator {
    settings: Settings,
    catalog: Arc<dyn Catalog>,
    /// 手動模式中列出節目的伺服器
    selection_catalog: Arc<dyn Catalog>,
    scheduler: TaskScheduler,
    shutdown_signal: Arc<AtomicBool>,
    term: Term,
}

impl PreviewGenerator {
    /// 依設定建立媒體庫用戶端、探測工具與排程器
    pub fn from_settings(
        settings: Settings,
        shutdown_signal: Arc<AtomicBool>,
        path_filter: Option<String>,
    ) -> Result<Self> {
        let catalog: Arc<dyn Catalog> =
            Arc::new(PlexClient::new(&settings.catalog).context("無法建立媒體庫連線")?);
        let selection_catalog: Arc<dyn Catalog> = match &settings.catalog.selection_url {
            Some(url) => Arc::new(
                PlexClient::with_base_url(&settings.catalog, url).context("無法建立選單伺服器連線")?,
            ),
            None => Arc::clone(&catalog),
        };

        let gpu_probe = NvidiaSmiProbe::new(&settings.extraction.nvidia_smi_path);
        if gpu_probe.decode_processes().is_none() {
            warn!("偵測不到 GPU（{}），將使用軟體解碼", settings.extraction.nvidia_smi_path.display());
        }

        let extractor = FrameExtractor::new(
            settings.extraction.clone(),
            Box::new(MediaInfoProbe::new(&settings.extraction.mediainfo_path)),
            Box::new(gpu_probe),
            Arc::clone(&shutdown_signal),
        );
        let processor = ItemProcessor::new(
            Arc::clone(&catalog),
            Arc::new(PathResolver::new(&settings.path_mapping)),
            extractor,
            OutputLayout {
                local_media_path: settings.local_media_path.clone(),
                tmp_folder: settings.tmp_folder.clone(),
                processing_folder: settings.processing_folder.clone(),
            },
            Arc::clone(&shutdown_signal),
        )
        .with_path_filter(path_filter);

        let scheduler = TaskScheduler::new(Arc::new(processor), Arc::clone(&shutdown_signal));

        Ok(Self::new(
            settings,
            catalog,
            selection_catalog,
            scheduler,
            shutdown_signal,
        ))
    }

    #[must_use]
    pub fn new(
        settings: Settings,
        catalog: Arc<dyn Catalog>,
        selection_catalog: Arc<dyn Catalog>,
        scheduler: TaskScheduler,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            catalog,
            selection_catalog,
            scheduler,
            shutdown_signal,
            term: Term::stdout(),
        }
    }

    /// 執行一輪；回傳 `false` 表示使用者選擇結束
    pub fn run_once(&self) -> Result<bool> {
        reset_directory(&self.settings.processing_folder)?;

        match self.settings.run_mode {
            RunMode::Full => self.run_full().map(|()| true),
            RunMode::CurrentlyPlaying => self.run_currently_playing().map(|()| true),
            RunMode::Manual => self.run_manual(),
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }

    /// 處理所有影集類型的媒體庫區段
    fn run_full(&self) -> Result<()> {
        let sections = self.catalog.sections().context("無法取得媒體庫區段")?;

        for section in sections {
            if self.is_shutdown() {
                break;
            }

            match &section.kind {
                SectionKind::Episodic => {
                    let episodes = match self.catalog.section_episodes(&section) {
                        Ok(episodes) => episodes,
                        Err(e) => {
                            error!("無法取得 {} 的集數: {e}", section.title);
                            continue;
                        }
                    };
                    info!("{}：共 {} 集", section.title, episodes.len());
                    self.scheduler
                        .run_sublist(&self.flat_sublist(&section.title, episodes))?;
                }
                SectionKind::Unsupported(kind) => {
                    info!("略過 {}，不支援的類型: {kind}", section.title);
                }
            }
        }
        Ok(())
    }

    /// 對「繼續觀看」中的每一集，處理同一季尚未觀看的集數
    fn run_currently_playing(&self) -> Result<()> {
        let entries = self.catalog.on_deck().context("無法取得繼續觀看清單")?;

        for entry in entries {
            if self.is_shutdown() {
                break;
            }
            let CatalogEntry::Episode(episode) = entry else {
                continue;
            };
            let Some(season_key) = &episode.season_key else {
                continue;
            };

            let unwatched = match self.catalog.unwatched_in_season(season_key) {
                Ok(unwatched) => unwatched,
                Err(e) => {
                    warn!("無法取得 {} 的未觀看集數: {e}", episode.title);
                    continue;
                }
            };
            let name = episode.show_title.as_deref().unwrap_or("繼續觀看");
            self.scheduler
                .run_sublist(&self.flat_sublist(name, unwatched))?;
        }
        Ok(())
    }

    /// 選擇節目後依儲存後端分組並交錯處理
    fn run_manual(&self) -> Result<bool> {
        let shows = self
            .selection_catalog
            .shows()
            .context("無法取得節目清單")?;
        let Some(selection) = pick_show(&self.term, &shows)? else {
            info!("使用者取消選擇，結束程式");
            return Ok(false);
        };

        let guids = selected_guids(&shows, selection);
        self.run_for_shows(&guids)?;
        Ok(true)
    }

    /// 處理指定節目 guid 的所有集數：依儲存後端分組、交錯成列後並行處理
    pub fn run_for_shows(&self, guids: &[String]) -> Result<Vec<SublistReport>> {
        let items = self.fetch_episodes_by_guid(guids)?;
        info!("共 {} 個節目，{} 集", guids.len(), items.len());

        let groups = partition_by_backend(
            items,
            &self.settings.storage_backends,
            &self.settings.default_backend,
        );
        for (name, group) in &groups {
            if !group.is_empty() {
                info!("  {name}: {} 集", group.len());
            }
        }

        let rows = interleave_round_robin(groups);
        self.scheduler
            .run_parallel(&rows, self.settings.extraction.worker_count())
    }

    fn fetch_episodes_by_guid(&self, guids: &[String]) -> Result<Vec<WorkItem>> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(GUID_LOOKUP_WORKERS)
            .build()
            .context("無法建立執行緒池")?;

        let batches: Vec<Vec<Episode>> = pool.install(|| {
            guids
                .par_iter()
                .map(|guid| {
                    self.catalog
                        .episodes_by_show_guid(guid)
                        .unwrap_or_else(|e| {
                            warn!("無法取得 {guid} 的集數: {e}");
                            Vec::new()
                        })
                })
                .collect()
        });

        Ok(batches
            .into_iter()
            .flatten()
            .map(WorkItem::from)
            .collect())
    }

    fn flat_sublist(&self, name: &str, episodes: Vec<Episode>) -> Sublist {
        Sublist::new(
            name,
            episodes.into_iter().map(WorkItem::from).collect(),
            self.settings.extraction.worker_count(),
        )
    }
}
