use crate::tools::remove_directories;
use log::warn;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 第一次 Ctrl-C 設定中斷旗標，讓 worker 停止領取項目並終止 ffmpeg；
/// 第二次先刪除暫存資料夾再直接結束程序
#[must_use]
pub fn setup_shutdown_signal(cleanup_dirs: Vec<PathBuf>) -> Arc<AtomicBool> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_clone = Arc::clone(&shutdown_signal);

    ctrlc::set_handler(move || {
        if signal_clone.swap(true, Ordering::SeqCst) {
            eprintln!("\n再次收到中斷信號，清理暫存資料夾後強制結束");
            remove_directories(&cleanup_dirs);
            std::process::exit(130);
        }
        warn!("收到中斷信號，等待進行中的項目結束後清理暫存資料夾...");
    })
    .expect("無法設定 Ctrl-C 處理器");

    shutdown_signal
}
