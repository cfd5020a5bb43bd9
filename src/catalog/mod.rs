//! 媒體伺服器目錄
//!
//! 所有查詢皆為唯讀；「找不到」屬於正常狀況（項目已在上游刪除）。

mod client;
mod error;
mod types;

pub use client::PlexClient;
pub use error::CatalogError;
pub use types::{CatalogEntry, Episode, LibrarySection, MediaPart, SectionKind};

pub trait Catalog: Send + Sync {
    /// 查詢單一項目的 metadata tree，回傳其中所有實體檔案
    fn media_parts(&self, item_key: &str) -> Result<Vec<MediaPart>, CatalogError>;

    fn sections(&self) -> Result<Vec<LibrarySection>, CatalogError>;

    fn section_episodes(&self, section: &LibrarySection) -> Result<Vec<Episode>, CatalogError>;

    /// 「繼續觀看」清單
    fn on_deck(&self) -> Result<Vec<CatalogEntry>, CatalogError>;

    fn unwatched_in_season(&self, season_key: &str) -> Result<Vec<Episode>, CatalogError>;

    fn shows(&self) -> Result<Vec<CatalogEntry>, CatalogError>;

    fn episodes_by_show_guid(&self, guid: &str) -> Result<Vec<Episode>, CatalogError>;
}
