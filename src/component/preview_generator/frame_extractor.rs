use crate::config::ExtractionSettings;
use crate::tools::{DecodeMode, GpuProbe, MediaProbe, select_decode_mode};
use anyhow::{Context, Result, bail};
use log::{debug, error, warn};
use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::{Duration, Instant};

/// 縮圖最大尺寸
pub const PREVIEW_WIDTH: u32 = 320;
pub const PREVIEW_HEIGHT: u32 = 240;

/// 啟動 ffmpeg 後先等待一下再開始輪詢
const SETTLE_DELAY: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// 失敗時記錄的 stderr 行數
const ERROR_TAIL_LINES: usize = 5;

const RAW_FRAME_PATTERN: &str = "img-%06d.jpg";

static REGEX_RAW_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^img-(\d+)\.jpg$").expect("Invalid regex"));

static REGEX_SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"speed= ?([0-9]+\.?[0-9]*|\.[0-9]+)x").expect("Invalid regex")
});

/// 單次擷取的統計
#[derive(Debug, Clone)]
pub struct ExtractionStats {
    pub video_file: PathBuf,
    pub hardware: bool,
    pub seconds: f64,
    /// ffmpeg 回報的速度倍率
    pub speed: Option<f64>,
    pub frame_count: usize,
}

/// 以 ffmpeg 將影片取樣為一張張 JPEG，並以秒數重新命名
pub struct FrameExtractor {
    settings: ExtractionSettings,
    media_probe: Box<dyn MediaProbe>,
    gpu_probe: Box<dyn GpuProbe>,
    shutdown_signal: Arc<AtomicBool>,
    settle_delay: Duration,
}

impl FrameExtractor {
    #[must_use]
    pub fn new(
        settings: ExtractionSettings,
        media_probe: Box<dyn MediaProbe>,
        gpu_probe: Box<dyn GpuProbe>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            media_probe,
            gpu_probe,
            shutdown_signal,
            settle_delay: SETTLE_DELAY,
        }
    }

    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    #[must_use]
    pub const fn frame_interval(&self) -> u32 {
        self.settings.frame_interval
    }

    /// 擷取影格到 `output_dir`（需為空資料夾）
    pub fn extract(&self, video_path: &Path, output_dir: &Path) -> Result<ExtractionStats> {
        let track = self
            .media_probe
            .probe(video_path)
            .with_context(|| format!("無法讀取影片資訊: {}", video_path.display()))?;
        if !track.has_video_track {
            warn!("找不到視訊軌，以 SDR 參數處理: {}", video_path.display());
        }
        let hdr = track.is_hdr();

        let mode = select_decode_mode(
            self.gpu_probe.decode_processes(),
            self.settings.gpu_threads,
            self.settings.cpu_threads,
        );

        let filter_graph = build_filter_graph(self.settings.frame_interval, hdr, mode);
        let mut command = self.build_command(video_path, output_dir, mode, &filter_graph);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!(
            "擷取影格: {} (HDR={hdr}, {mode:?}) vf={filter_graph}",
            video_path.display()
        );

        let start = Instant::now();
        let mut child = command
            .spawn()
            .with_context(|| format!("無法啟動 ffmpeg: {}", self.settings.ffmpeg_path.display()))?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = stderr.read_to_end(&mut buffer);
                String::from_utf8_lossy(&buffer).into_owned()
            })
        });

        thread::sleep(self.settle_delay);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.shutdown_signal.load(Ordering::SeqCst) {
                let _ = child.kill();
                let _ = child.wait();
                bail!("收到中斷信號，已終止 ffmpeg: {}", video_path.display());
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let seconds = (start.elapsed().as_secs_f64() * 10.0).round() / 10.0;

        if !status.success() {
            for line in tail_lines(&stderr, ERROR_TAIL_LINES) {
                error!("  ffmpeg: {line}");
            }
            bail!(
                "ffmpeg 擷取影格失敗 (exit {}): {}",
                status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                video_path.display()
            );
        }

        let frame_count = rename_frames(output_dir, self.settings.frame_interval)?;

        Ok(ExtractionStats {
            video_file: video_path.to_path_buf(),
            hardware: mode == DecodeMode::Hardware,
            seconds,
            speed: parse_speed(&stderr),
            frame_count,
        })
    }

    fn build_command(
        &self,
        video_path: &Path,
        output_dir: &Path,
        mode: DecodeMode,
        filter_graph: &str,
    ) -> Command {
        let mut cmd = Command::new(&self.settings.ffmpeg_path);

        cmd.args(["-loglevel", "info", "-skip_frame:v", "nokey"]);
        if mode == DecodeMode::Hardware {
            cmd.args(["-hwaccel_output_format", "cuda", "-hwaccel", "cuda"]);
        }
        // 單執行緒解碼，避免多個 worker 同時執行時 CPU 過度訂閱
        cmd.args(["-threads:0", "1"]);
        cmd.arg("-i").arg(video_path);
        cmd.args(["-an", "-sn", "-dn"]);
        cmd.arg("-q:v")
            .arg(self.settings.thumbnail_quality.to_string());
        cmd.arg("-vf").arg(filter_graph);
        cmd.arg(output_dir.join(RAW_FRAME_PATTERN));

        cmd
    }
}

/// `1/interval` 以 6 位小數表示
fn fps_expression(interval_secs: u32) -> String {
    let fps = (1.0 / f64::from(interval_secs.max(1)) * 1_000_000.0).round() / 1_000_000.0;
    format!("{fps}")
}

/// 建立 ffmpeg 濾鏡鏈
///
/// - SDR：取樣 → 縮放
/// - HDR：取樣 → 線性化 → tonemap 至 SDR → 縮放
/// - 硬體解碼時在最前面加上 hwdownload 與像素格式轉換
#[must_use]
pub fn build_filter_graph(interval_secs: u32, hdr: bool, mode: DecodeMode) -> String {
    let fps = format!("fps=fps={}:round=up", fps_expression(interval_secs));
    let scale = format!(
        "scale=w={PREVIEW_WIDTH}:h={PREVIEW_HEIGHT}:force_original_aspect_ratio=decrease"
    );

    let mut stages = Vec::new();
    if mode == DecodeMode::Hardware {
        stages.push("hwdownload");
        stages.push(if hdr { "format=p010le" } else { "format=nv12" });
    }
    stages.push(&fps);
    if hdr {
        stages.extend([
            "zscale=t=linear:npl=100",
            "format=gbrpf32le",
            "zscale=p=bt709",
            "tonemap=tonemap=hable:desat=0",
            "zscale=t=bt709:m=bt709:r=tv",
            "format=yuv420p",
        ]);
    }
    stages.push(&scale);

    stages.join(",")
}

/// 取最後一次回報的速度倍率
fn parse_speed(stderr: &str) -> Option<f64> {
    REGEX_SPEED
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn tail_lines(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines[lines.len().saturating_sub(count)..].to_vec()
}

/// 將 `img-000001.jpg` 重新命名為 `{秒數:010}.jpg`，回傳影格數
fn rename_frames(output_dir: &Path, interval_secs: u32) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("無法讀取影格資料夾: {}", output_dir.display()))?
    {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(frame_no) = file_name
            .to_str()
            .and_then(|name| REGEX_RAW_FRAME.captures(name))
            .and_then(|caps| caps[1].parse::<u64>().ok())
        else {
            continue;
        };

        let second = frame_no.saturating_sub(1) * u64::from(interval_secs);
        let target = output_dir.join(format!("{second:010}.jpg"));
        fs::rename(entry.path(), &target).with_context(|| {
            format!(
                "無法重新命名影格 {} -> {}",
                entry.path().display(),
                target.display()
            )
        })?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_expression() {
        assert_eq!(fps_expression(5), "0.2");
        assert_eq!(fps_expression(1), "1");
        assert_eq!(fps_expression(3), "0.333333");
    }

    #[test]
    fn test_filter_graph_sdr_software() {
        let vf = build_filter_graph(5, false, DecodeMode::Software);
        assert_eq!(
            vf,
            "fps=fps=0.2:round=up,scale=w=320:h=240:force_original_aspect_ratio=decrease"
        );
    }

    #[test]
    fn test_filter_graph_hdr_software() {
        let vf = build_filter_graph(5, true, DecodeMode::Software);
        assert!(vf.starts_with("fps=fps=0.2:round=up,zscale=t=linear:npl=100"));
        assert!(vf.contains("tonemap=tonemap=hable:desat=0"));
        assert!(vf.ends_with("scale=w=320:h=240:force_original_aspect_ratio=decrease"));
    }

    #[test]
    fn test_filter_graph_hardware_prefix() {
        let sdr = build_filter_graph(5, false, DecodeMode::Hardware);
        assert!(sdr.starts_with("hwdownload,format=nv12,fps=fps=0.2"));

        let hdr = build_filter_graph(5, true, DecodeMode::Hardware);
        assert!(hdr.starts_with("hwdownload,format=p010le,fps=fps=0.2"));
    }

    #[test]
    fn test_parse_speed_takes_last() {
        let stderr = "frame=1 speed=0.5x\rframe=9 speed= 12.3x\nframe=10 speed=14x\n";
        assert_eq!(parse_speed(stderr), Some(14.0));
        assert_eq!(parse_speed("speed=.5x"), Some(0.5));
        assert_eq!(parse_speed("no progress here"), None);
    }

    #[test]
    fn test_tail_lines() {
        let text = "a\nb\n\nc\rd\ne\nf\n";
        assert_eq!(tail_lines(text, 3), vec!["d", "e", "f"]);
        assert_eq!(tail_lines("one", 5), vec!["one"]);
    }

    #[test]
    fn test_rename_frames() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=3 {
            fs::write(dir.path().join(format!("img-{n:06}.jpg")), "x").unwrap();
        }
        fs::write(dir.path().join("other.txt"), "x").unwrap();

        let count = rename_frames(dir.path(), 5).unwrap();
        assert_eq!(count, 3);
        for second in [0, 5, 10] {
            assert!(dir.path().join(format!("{second:010}.jpg")).exists());
        }
        assert!(dir.path().join("other.txt").exists());
    }
}
