//! 影片預覽縮圖（BIF）產生元件
//!
//! 從媒體庫取得項目，以 ffmpeg 擷取影格後封裝為索引檔

mod frame_extractor;
mod item_processor;
mod main;
mod partition;
mod processing_marker;
mod show_picker;
mod task_scheduler;

pub use frame_extractor::{ExtractionStats, FrameExtractor, build_filter_graph};
pub use item_processor::{ItemOutcome, ItemProcessor, OutputLayout, SkipReason};
pub use main::PreviewGenerator;
pub use partition::{
    Sublist, WorkItem, classify_backend, interleave_round_robin, partition_by_backend,
};
pub use processing_marker::ProcessingMarker;
pub use show_picker::{ShowSelection, pick_show, selected_guids};
pub use task_scheduler::{SublistReport, TaskScheduler};
