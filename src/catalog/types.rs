use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

/// 一個實體影片檔：媒體伺服器上的路徑與內容 hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub file: String,
    pub hash: Option<String>,
}

impl MediaPart {
    /// 可安全作為資料夾名稱的 hash（至少兩個英數字元）
    #[must_use]
    pub fn valid_hash(&self) -> Option<&str> {
        self.hash
            .as_deref()
            .map(str::trim)
            .filter(|h| h.len() >= 2 && h.chars().all(|c| c.is_ascii_alphanumeric()))
    }

    /// bundle 相對路徑：`hash[0]/hash[1..].bundle`
    #[must_use]
    pub fn bundle_relative_path(&self) -> Option<PathBuf> {
        let (first, rest) = self.valid_hash()?.split_at(1);
        Some(PathBuf::from(first).join(format!("{rest}.bundle")))
    }
}

/// 單集影片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub key: String,
    pub title: String,
    pub show_title: Option<String>,
    pub show_guid: Option<String>,
    pub season_key: Option<String>,
    pub file: Option<String>,
    pub watched: bool,
}

/// 媒體庫項目，依類型在取得時即分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    Show {
        key: String,
        rating_key: Option<String>,
        title: String,
        guid: Option<String>,
    },
    Season {
        key: String,
        title: String,
        parent_guid: Option<String>,
    },
    Episode(Episode),
    Other {
        key: String,
        title: String,
        kind: String,
    },
}

impl CatalogEntry {
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Show { title, .. } | Self::Season { title, .. } | Self::Other { title, .. } => {
                title
            }
            Self::Episode(episode) => &episode.title,
        }
    }

    /// 所屬節目的 guid（節目本身、季的上層、集的上上層）
    #[must_use]
    pub fn show_guid(&self) -> Option<&str> {
        match self {
            Self::Show { guid, .. } => guid.as_deref(),
            Self::Season { parent_guid, .. } => parent_guid.as_deref(),
            Self::Episode(episode) => episode.show_guid.as_deref(),
            Self::Other { .. } => None,
        }
    }
}

/// 媒體庫區段的類型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    /// 影集：內容為單集
    Episodic,
    Unsupported(String),
}

impl SectionKind {
    #[must_use]
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "show" => Self::Episodic,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySection {
    pub key: String,
    pub title: String,
    pub kind: SectionKind,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    pub container: T,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<RawMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DirectoryContainer {
    #[serde(rename = "Directory", default)]
    pub directory: Vec<RawDirectory>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDirectory {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl From<RawDirectory> for LibrarySection {
    fn from(raw: RawDirectory) -> Self {
        Self {
            kind: SectionKind::from_type(&raw.kind),
            key: raw.key,
            title: raw.title,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMetadata {
    pub key: String,
    pub rating_key: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    pub guid: Option<String>,
    pub parent_guid: Option<String>,
    pub grandparent_guid: Option<String>,
    pub parent_key: Option<String>,
    pub grandparent_title: Option<String>,
    pub view_count: Option<u64>,
    #[serde(rename = "Media", default)]
    pub media: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMedia {
    #[serde(rename = "Part", default)]
    pub part: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPart {
    pub file: Option<String>,
}

impl From<RawMetadata> for CatalogEntry {
    fn from(raw: RawMetadata) -> Self {
        match raw.kind.as_str() {
            "show" => Self::Show {
                key: raw.key,
                rating_key: raw.rating_key,
                title: raw.title,
                guid: raw.guid,
            },
            "season" => Self::Season {
                key: raw.key,
                title: raw.title,
                parent_guid: raw.parent_guid,
            },
            "episode" => {
                let file = raw
                    .media
                    .first()
                    .and_then(|m| m.part.first())
                    .and_then(|p| p.file.clone());
                Self::Episode(Episode {
                    key: raw.key,
                    title: raw.title,
                    show_title: raw.grandparent_title,
                    show_guid: raw.grandparent_guid,
                    season_key: raw.parent_key,
                    file,
                    watched: raw.view_count.unwrap_or(0) > 0,
                })
            }
            _ => Self::Other {
                key: raw.key,
                title: raw.title,
                kind: raw.kind,
            },
        }
    }
}

/// 從 `/tree` 回應中找出所有 `MediaPart`（不限層數）
pub(crate) fn collect_media_parts(value: &Value, parts: &mut Vec<MediaPart>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "MediaPart" {
                    match child {
                        Value::Array(items) => items.iter().for_each(|item| push_part(item, parts)),
                        single => push_part(single, parts),
                    }
                }
                collect_media_parts(child, parts);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_media_parts(item, parts);
            }
        }
        _ => {}
    }
}

fn push_part(value: &Value, parts: &mut Vec<MediaPart>) {
    let Some(file) = value.get("file").and_then(Value::as_str) else {
        return;
    };
    let hash = value
        .get("hash")
        .and_then(Value::as_str)
        .map(str::to_string);
    parts.push(MediaPart {
        file: file.to_string(),
        hash,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_relative_path() {
        let part = MediaPart {
            file: "/media/a.mkv".to_string(),
            hash: Some("3f2a9c0d".to_string()),
        };
        assert_eq!(
            part.bundle_relative_path(),
            Some(PathBuf::from("3").join("f2a9c0d.bundle"))
        );

        let no_hash = MediaPart {
            file: "/media/a.mkv".to_string(),
            hash: None,
        };
        assert_eq!(no_hash.bundle_relative_path(), None);

        let unsafe_hash = MediaPart {
            file: "/media/a.mkv".to_string(),
            hash: Some("../etc".to_string()),
        };
        assert_eq!(unsafe_hash.valid_hash(), None);
    }

    #[test]
    fn test_collect_nested_media_parts() {
        let raw = serde_json::json!({
            "MediaContainer": {
                "MetadataItem": [{
                    "id": 1,
                    "MetadataItem": [{
                        "MediaItem": [{
                            "MediaPart": [
                                {"file": "/zfs/zpool1/Union/a.mkv", "hash": "abc"},
                                {"file": "/zfs/zpool1/Union/b.mkv"}
                            ]
                        }]
                    }]
                }]
            }
        });

        let mut parts = Vec::new();
        collect_media_parts(&raw, &mut parts);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].hash.as_deref(), Some("abc"));
        assert_eq!(parts[1].hash, None);
    }

    #[test]
    fn test_metadata_classification() {
        let raw: MetadataContainer = serde_json::from_value(serde_json::json!({
            "Metadata": [
                {"key": "/library/metadata/1/children", "ratingKey": "1", "type": "show",
                 "title": "Show", "guid": "plex://show/1"},
                {"key": "/library/metadata/2/children", "type": "season",
                 "title": "Season 1", "parentGuid": "plex://show/1"},
                {"key": "/library/metadata/3", "type": "episode", "title": "Pilot",
                 "grandparentGuid": "plex://show/1", "parentKey": "/library/metadata/2",
                 "viewCount": 2,
                 "Media": [{"Part": [{"file": "/rclone/Union/pilot.mkv"}]}]},
                {"key": "/library/metadata/4", "type": "movie", "title": "Film"}
            ]
        }))
        .unwrap();

        let entries: Vec<CatalogEntry> = raw.metadata.into_iter().map(Into::into).collect();
        assert!(entries.iter().take(3).all(|e| e.show_guid() == Some("plex://show/1")));
        assert_eq!(entries[3].show_guid(), None);

        let CatalogEntry::Episode(episode) = &entries[2] else {
            panic!("expected episode");
        };
        assert_eq!(episode.file.as_deref(), Some("/rclone/Union/pilot.mkv"));
        assert_eq!(episode.season_key.as_deref(), Some("/library/metadata/2"));
        assert!(episode.watched);
    }

    #[test]
    fn test_section_kind() {
        assert_eq!(SectionKind::from_type("show"), SectionKind::Episodic);
        assert_eq!(
            SectionKind::from_type("movie"),
            SectionKind::Unsupported("movie".to_string())
        );
    }
}
