//! BIF（Base Index Frames）預覽索引檔
//!
//! 格式：
//! - 0..8   magic
//! - 8..12  版本（LE u32，固定為 0）
//! - 12..16 影格數 N（LE u32）
//! - 16..20 取樣間隔毫秒（LE u32）
//! - 20..64 保留，補零
//! - 64..   N+1 筆索引（序號, 位移），最後一筆為 sentinel（0xFFFFFFFF, 檔案總長）
//! - 之後依序串接 JPEG 原始資料

use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const BIF_MAGIC: [u8; 8] = [0x89, 0x42, 0x49, 0x46, 0x0d, 0x0a, 0x1a, 0x0a];
pub const BIF_VERSION: u32 = 0;
pub const BIF_HEADER_SIZE: u32 = 64;
pub const BIF_RECORD_SIZE: u32 = 8;
pub const BIF_SENTINEL: u32 = 0xFFFF_FFFF;
pub const FRAME_EXTENSION: &str = "jpg";

/// 寫入完成後的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BifSummary {
    pub frame_count: usize,
    pub file_size: u64,
}

/// 列出資料夾中的影格，依檔名字典序排序
///
/// 檔名為固定寬度補零的秒數，字典序即時間順序。
pub fn list_frames(frames_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in WalkDir::new(frames_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("無法讀取影格資料夾: {}", frames_dir.display()))?;
        let is_frame = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == FRAME_EXTENSION);
        if is_frame {
            frames.push(entry.into_path());
        }
    }
    Ok(frames)
}

/// 將影格資料夾封裝為 BIF 檔
///
/// 任何 I/O 錯誤都會中止寫入；呼叫端需自行刪除不完整的輸出檔。
pub fn write_bif(output_path: &Path, frames_dir: &Path, interval_secs: u32) -> Result<BifSummary> {
    let frames = list_frames(frames_dir)?;

    let mut sizes = Vec::with_capacity(frames.len());
    for frame in &frames {
        let metadata = fs::metadata(frame)
            .with_context(|| format!("無法讀取影格資訊: {}", frame.display()))?;
        sizes.push(metadata.len());
    }

    let frame_count = u32::try_from(frames.len()).context("影格數量超過 BIF 上限")?;
    let interval_ms = interval_secs
        .checked_mul(1000)
        .context("取樣間隔超過 BIF 上限")?;

    let table_size = u64::from(BIF_RECORD_SIZE) * (u64::from(frame_count) + 1);
    let data_start = u64::from(BIF_HEADER_SIZE) + table_size;
    let total_size = data_start + sizes.iter().sum::<u64>();
    if total_size > u64::from(u32::MAX) {
        bail!("BIF 檔案大小超過 4GiB 上限: {total_size} bytes");
    }

    let file = File::create(output_path)
        .with_context(|| format!("無法建立 BIF 檔案: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut header = [0u8; BIF_HEADER_SIZE as usize];
    header[0..8].copy_from_slice(&BIF_MAGIC);
    header[8..12].copy_from_slice(&BIF_VERSION.to_le_bytes());
    header[12..16].copy_from_slice(&frame_count.to_le_bytes());
    header[16..20].copy_from_slice(&interval_ms.to_le_bytes());
    writer.write_all(&header)?;

    // total_size 已確認不超過 u32，以下位移皆不會溢位
    let mut offset = data_start as u32;
    for (index, size) in sizes.iter().enumerate() {
        writer.write_all(&(index as u32).to_le_bytes())?;
        writer.write_all(&offset.to_le_bytes())?;
        offset += *size as u32;
    }
    writer.write_all(&BIF_SENTINEL.to_le_bytes())?;
    writer.write_all(&offset.to_le_bytes())?;

    for (frame, expected) in frames.iter().zip(&sizes) {
        let data =
            fs::read(frame).with_context(|| format!("無法讀取影格: {}", frame.display()))?;
        if data.len() as u64 != *expected {
            bail!("影格在封裝期間被修改: {}", frame.display());
        }
        writer.write_all(&data)?;
    }

    writer
        .flush()
        .with_context(|| format!("無法寫入 BIF 檔案: {}", output_path.display()))?;

    Ok(BifSummary {
        frame_count: frames.len(),
        file_size: total_size,
    })
}

/// 一筆索引：影格序號與其資料起點
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BifEntry {
    pub index: u32,
    pub offset: u32,
}

/// 讀回 BIF 檔的標頭與索引表
#[derive(Debug, Clone)]
pub struct BifIndex {
    pub version: u32,
    pub interval_ms: u32,
    pub entries: Vec<BifEntry>,
    /// sentinel 記錄的檔案總長
    pub end_offset: u32,
}

impl BifIndex {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("無法開啟 BIF 檔案: {}", path.display()))?;
        let file_size = file.metadata()?.len();

        let mut header = [0u8; BIF_HEADER_SIZE as usize];
        file.read_exact(&mut header)
            .with_context(|| format!("BIF 標頭不完整: {}", path.display()))?;
        if header[0..8] != BIF_MAGIC {
            bail!("不是 BIF 檔案: {}", path.display());
        }

        let version = read_u32(&header[8..12]);
        let frame_count = read_u32(&header[12..16]);
        let interval_ms = read_u32(&header[16..20]);

        let table_len = u64::from(BIF_RECORD_SIZE) * (u64::from(frame_count) + 1);
        if u64::from(BIF_HEADER_SIZE) + table_len > file_size {
            bail!(
                "BIF 影格數超出檔案長度: 影格數={frame_count} 檔案長度={file_size} ({})",
                path.display()
            );
        }
        let table_len = usize::try_from(table_len).context("BIF 索引表過大")?;

        let mut table = vec![0u8; table_len];
        file.read_exact(&mut table)
            .with_context(|| format!("BIF 索引表不完整: {}", path.display()))?;

        let mut records = table
            .chunks_exact(BIF_RECORD_SIZE as usize)
            .map(|chunk| BifEntry {
                index: read_u32(&chunk[0..4]),
                offset: read_u32(&chunk[4..8]),
            })
            .collect::<Vec<_>>();

        let sentinel = records.pop().context("BIF 索引表缺少 sentinel")?;
        if sentinel.index != BIF_SENTINEL {
            bail!("BIF sentinel 錯誤: {:#x}", sentinel.index);
        }
        if u64::from(sentinel.offset) != file_size {
            bail!(
                "BIF 檔案長度不符: sentinel={} 實際={}",
                sentinel.offset,
                file_size
            );
        }

        Ok(Self {
            version,
            interval_ms,
            entries: records,
            end_offset: sentinel.offset,
        })
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.entries.len()
    }

    /// 各影格在檔案中的位元組範圍
    #[must_use]
    pub fn frame_ranges(&self) -> Vec<std::ops::Range<u64>> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let end = self
                    .entries
                    .get(i + 1)
                    .map_or(self.end_offset, |next| next.offset);
                u64::from(entry.offset)..u64::from(end)
            })
            .collect()
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frames(dir: &Path, interval: u32, payloads: &[&[u8]]) {
        for (i, payload) in payloads.iter().enumerate() {
            let name = format!("{:010}.jpg", i as u32 * interval);
            fs::write(dir.join(name), payload).unwrap();
        }
    }

    #[test]
    fn test_ten_frames_layout() {
        let frames_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let payloads: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i; 100 + i as usize]).collect();
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
        write_frames(frames_dir.path(), 5, &refs);

        let output = out_dir.path().join("index-sd.bif");
        let summary = write_bif(&output, frames_dir.path(), 5).unwrap();

        let total: u64 = payloads.iter().map(|p| p.len() as u64).sum();
        let expected_size = 64 + 11 * 8 + total;
        assert_eq!(summary.frame_count, 10);
        assert_eq!(summary.file_size, expected_size);

        let bytes = fs::read(&output).unwrap();
        assert_eq!(bytes.len() as u64, expected_size);
        assert_eq!(&bytes[0..8], &BIF_MAGIC);
        assert_eq!(read_u32(&bytes[8..12]), 0);
        assert_eq!(read_u32(&bytes[12..16]), 10);
        assert_eq!(read_u32(&bytes[16..20]), 5000);
        assert!(bytes[20..64].iter().all(|b| *b == 0));
        // 第一筆索引 (0, 64+88)
        assert_eq!(read_u32(&bytes[64..68]), 0);
        assert_eq!(read_u32(&bytes[68..72]), 64 + 88);
    }

    #[test]
    fn test_round_trip_frame_ranges() {
        let frames_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let payloads: [&[u8]; 3] = [b"first-jpeg", b"2nd", b"the third frame bytes"];
        write_frames(frames_dir.path(), 2, &payloads);

        let output = out_dir.path().join("index-sd.bif");
        write_bif(&output, frames_dir.path(), 2).unwrap();

        let index = BifIndex::open(&output).unwrap();
        assert_eq!(index.version, 0);
        assert_eq!(index.interval_ms, 2000);
        assert_eq!(index.frame_count(), 3);

        let bytes = fs::read(&output).unwrap();
        for (range, payload) in index.frame_ranges().into_iter().zip(payloads) {
            assert_eq!(&bytes[range.start as usize..range.end as usize], payload);
        }

        let offsets: Vec<u32> = index.entries.iter().map(|e| e.offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(u64::from(index.end_offset), bytes.len() as u64);
    }

    #[test]
    fn test_ignores_non_jpeg_and_sorts() {
        let frames_dir = tempfile::tempdir().unwrap();
        fs::write(frames_dir.path().join("0000000010.jpg"), b"b").unwrap();
        fs::write(frames_dir.path().join("0000000000.jpg"), b"a").unwrap();
        fs::write(frames_dir.path().join("notes.txt"), b"ignored").unwrap();

        let frames = list_frames(frames_dir.path()).unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["0000000000.jpg", "0000000010.jpg"]);
    }

    #[test]
    fn test_source_frames_untouched() {
        let frames_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_frames(frames_dir.path(), 5, &[b"x".as_slice(), b"y".as_slice()]);

        write_bif(&out_dir.path().join("a.bif"), frames_dir.path(), 5).unwrap();
        assert_eq!(list_frames(frames_dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let frames_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_frames(frames_dir.path(), 5, &[b"abcdef".as_slice(), b"ghijkl".as_slice()]);

        let output = out_dir.path().join("index-sd.bif");
        write_bif(&output, frames_dir.path(), 5).unwrap();

        let bytes = fs::read(&output).unwrap();
        fs::write(&output, &bytes[..bytes.len() - 3]).unwrap();
        assert!(BifIndex::open(&output).is_err());
    }

    #[test]
    fn test_open_rejects_frame_count_beyond_file() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("index-sd.bif");

        let mut header = vec![0u8; BIF_HEADER_SIZE as usize];
        header[0..8].copy_from_slice(&BIF_MAGIC);
        header[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        header[16..20].copy_from_slice(&5000u32.to_le_bytes());
        fs::write(&output, &header).unwrap();

        let err = BifIndex::open(&output).unwrap_err();
        assert!(err.to_string().contains("影格數超出檔案長度"));
    }

    #[test]
    fn test_missing_frames_dir_is_error() {
        let out_dir = tempfile::tempdir().unwrap();
        let result = write_bif(
            &out_dir.path().join("a.bif"),
            &out_dir.path().join("missing"),
            5,
        );
        assert!(result.is_err());
    }
}
