use log::debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 查詢目前佔用 GPU 的解碼程序數量
pub trait GpuProbe: Send + Sync {
    /// `None` 表示偵測不到 GPU
    fn decode_processes(&self) -> Option<usize>;
}

/// 透過 nvidia-smi 列出 compute 程序，計算 ffmpeg 的數量
pub struct NvidiaSmiProbe {
    program: PathBuf,
}

impl NvidiaSmiProbe {
    #[must_use]
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }
}

impl GpuProbe for NvidiaSmiProbe {
    fn decode_processes(&self) -> Option<usize> {
        let output = Command::new(&self.program)
            .args([
                "--query-compute-apps=pid,process_name",
                "--format=csv,noheader",
            ])
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => Some(count_ffmpeg_processes(
                &String::from_utf8_lossy(&output.stdout),
            )),
            Ok(output) => {
                debug!("nvidia-smi 回傳錯誤碼: {:?}", output.status.code());
                None
            }
            Err(e) => {
                debug!("無法執行 nvidia-smi: {e}");
                None
            }
        }
    }
}

/// 解析 `pid, process_name` 每行一筆的輸出
fn count_ffmpeg_processes(csv: &str) -> usize {
    csv.lines()
        .filter_map(|line| line.split_once(','))
        .map(|(_, name)| name.trim())
        .filter_map(|name| name.rsplit(['/', '\\']).next())
        .filter(|name| name.to_lowercase().starts_with("ffmpeg"))
        .count()
}

/// 解碼方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Hardware,
    Software,
}

/// 貪婪式 GPU 分配：只看當下的佔用量，不做保留
///
/// 並行啟動時可能同時判斷為有空位而略為超額使用 GPU。
#[must_use]
pub const fn select_decode_mode(
    busy: Option<usize>,
    gpu_threads: usize,
    cpu_threads: usize,
) -> DecodeMode {
    match busy {
        Some(count) if count < gpu_threads || cpu_threads == 0 => DecodeMode::Hardware,
        _ => DecodeMode::Software,
    }
}
