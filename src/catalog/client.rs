use super::error::CatalogError;
use super::types::{
    CatalogEntry, DirectoryContainer, Envelope, Episode, LibrarySection, MediaPart,
    MetadataContainer, collect_media_parts,
};
use super::Catalog;
use crate::config::CatalogSettings;
use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Plex 相容媒體伺服器的 HTTP 用戶端（JSON 回應）
#[derive(Clone)]
pub struct PlexClient {
    http_client: Client,
    base_url: String,
    token: String,
}

impl PlexClient {
    pub fn new(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        Self::with_base_url(settings, &settings.url)
    }

    /// 以另一台伺服器為對象（共用 token 與逾時設定）
    pub fn with_base_url(settings: &CatalogSettings, base_url: &str) -> Result<Self, CatalogError> {
        let http_client = Client::builder()
            .timeout(settings.timeout())
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = self.url(path);
        debug!("GET {url} {query:?}");

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .header("X-Plex-Token", &self.token)
            .header(ACCEPT, "application/json")
            .send()?;

        match response.status() {
            StatusCode::OK => {
                let text = response.text()?;
                Ok(serde_json::from_str(&text)?)
            }
            StatusCode::NOT_FOUND => Err(CatalogError::NotFound(path.to_string())),
            status => Err(CatalogError::UnexpectedStatus { status, url }),
        }
    }

    fn metadata(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<CatalogEntry>, CatalogError> {
        let envelope: Envelope<MetadataContainer> = self.get_json(path, query)?;
        Ok(envelope
            .container
            .metadata
            .into_iter()
            .map(CatalogEntry::from)
            .collect())
    }

    fn episodes(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Episode>, CatalogError> {
        Ok(only_episodes(self.metadata(path, query)?))
    }
}

fn only_episodes(entries: Vec<CatalogEntry>) -> Vec<Episode> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            CatalogEntry::Episode(episode) => Some(episode),
            _ => None,
        })
        .collect()
}

impl Catalog for PlexClient {
    fn media_parts(&self, item_key: &str) -> Result<Vec<MediaPart>, CatalogError> {
        let tree: Value = self.get_json(&format!("{item_key}/tree"), &[])?;
        let mut parts = Vec::new();
        collect_media_parts(&tree, &mut parts);
        Ok(parts)
    }

    fn sections(&self) -> Result<Vec<LibrarySection>, CatalogError> {
        let envelope: Envelope<DirectoryContainer> = self.get_json("/library/sections", &[])?;
        Ok(envelope
            .container
            .directory
            .into_iter()
            .map(LibrarySection::from)
            .collect())
    }

    fn section_episodes(&self, section: &LibrarySection) -> Result<Vec<Episode>, CatalogError> {
        self.episodes(
            &format!("/library/sections/{}/all", section.key),
            &[("type", "4")],
        )
    }

    fn on_deck(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.metadata("/library/onDeck", &[])
    }

    fn unwatched_in_season(&self, season_key: &str) -> Result<Vec<Episode>, CatalogError> {
        let episodes = self.episodes(&format!("{season_key}/children"), &[])?;
        Ok(episodes.into_iter().filter(|e| !e.watched).collect())
    }

    fn shows(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.metadata("/library/all", &[("type", "2")])
    }

    fn episodes_by_show_guid(&self, guid: &str) -> Result<Vec<Episode>, CatalogError> {
        let matches = self.metadata("/library/all", &[("guid", guid)])?;
        let rating_key = matches.into_iter().find_map(|entry| match entry {
            CatalogEntry::Show { rating_key, .. } => rating_key,
            _ => None,
        });

        match rating_key {
            Some(id) => self.episodes(&format!("/library/metadata/{id}/allLeaves"), &[]),
            None => Ok(Vec::new()),
        }
    }
}
