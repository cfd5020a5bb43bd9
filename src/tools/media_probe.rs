use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 主要視訊軌的資訊
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoTrackInfo {
    pub has_video_track: bool,
    /// HDR 格式標籤；空值或字串 "None" 代表 SDR
    pub hdr_format: Option<String>,
}

impl VideoTrackInfo {
    #[must_use]
    pub fn is_hdr(&self) -> bool {
        is_hdr_format(self.hdr_format.as_deref())
    }
}

/// HDR 判斷只看標籤本身：缺值、空字串或 "None" 都視為 SDR
#[must_use]
pub fn is_hdr_format(tag: Option<&str>) -> bool {
    tag.map(str::trim)
        .is_some_and(|t| !t.is_empty() && t != "None")
}

pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoTrackInfo>;
}

#[derive(Deserialize)]
struct MediaInfoOutput {
    media: Option<MediaInfoMedia>,
}

#[derive(Deserialize)]
struct MediaInfoMedia {
    #[serde(default)]
    track: Vec<MediaInfoTrack>,
}

#[derive(Deserialize)]
struct MediaInfoTrack {
    #[serde(rename = "@type")]
    track_type: String,
    #[serde(rename = "HDR_Format")]
    hdr_format: Option<String>,
}

/// 使用 mediainfo 取得視訊軌資訊
pub struct MediaInfoProbe {
    program: PathBuf,
}

impl MediaInfoProbe {
    #[must_use]
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }
}

impl MediaProbe for MediaInfoProbe {
    fn probe(&self, path: &Path) -> Result<VideoTrackInfo> {
        let output = Command::new(&self.program)
            .arg("--Output=JSON")
            .arg(path)
            .output()
            .with_context(|| format!("無法執行 mediainfo: {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("mediainfo 執行失敗: {}", stderr.trim());
        }

        parse_mediainfo_json(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("無法解析 mediainfo 輸出: {}", path.display()))
    }
}

fn parse_mediainfo_json(raw: &str) -> Result<VideoTrackInfo> {
    let parsed: MediaInfoOutput = serde_json::from_str(raw)?;

    // 只看第一條視訊軌
    let video_track = parsed
        .media
        .iter()
        .flat_map(|m| m.track.iter())
        .find(|t| t.track_type == "Video");

    Ok(video_track.map_or_else(VideoTrackInfo::default, |track| VideoTrackInfo {
        has_video_track: true,
        hdr_format: track.hdr_format.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hdr_format() {
        assert!(!is_hdr_format(None));
        assert!(!is_hdr_format(Some("")));
        assert!(!is_hdr_format(Some("None")));
        assert!(is_hdr_format(Some("SMPTE ST 2086")));
        assert!(is_hdr_format(Some("Dolby Vision")));
    }

    #[test]
    fn test_parse_hdr_track() {
        let raw = r#"{"media":{"@ref":"a.mkv","track":[
            {"@type":"General","Format":"Matroska"},
            {"@type":"Video","Format":"HEVC","HDR_Format":"SMPTE ST 2086"},
            {"@type":"Video","Format":"HEVC"}
        ]}}"#;
        let info = parse_mediainfo_json(raw).unwrap();
        assert!(info.has_video_track);
        assert!(info.is_hdr());
    }

    #[test]
    fn test_parse_sdr_track() {
        let raw = r#"{"media":{"track":[{"@type":"Video","Format":"AVC"}]}}"#;
        let info = parse_mediainfo_json(raw).unwrap();
        assert!(info.has_video_track);
        assert!(!info.is_hdr());
    }

    #[test]
    fn test_parse_audio_only() {
        let raw = r#"{"media":{"track":[{"@type":"Audio","Format":"FLAC"}]}}"#;
        let info = parse_mediainfo_json(raw).unwrap();
        assert_eq!(info, VideoTrackInfo::default());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_mediainfo_json("not json").is_err());
    }
}
