use anyhow::Result;
use log::{error, info, warn};
use preview_thumbnail_generator::component::PreviewGenerator;
use preview_thumbnail_generator::config::Settings;
use preview_thumbnail_generator::init;
use preview_thumbnail_generator::signal::setup_shutdown_signal;
use preview_thumbnail_generator::tools::{remove_directories, reset_directory};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn main() -> ExitCode {
    init::init();

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let temp_dirs = vec![
        settings.tmp_folder.clone(),
        settings.processing_folder.clone(),
    ];
    let shutdown_signal = setup_shutdown_signal(temp_dirs.clone());

    // 第一個參數：只處理路徑包含此字串的檔案
    let path_filter = std::env::args().nth(1);
    if let Some(filter) = &path_filter {
        info!("路徑篩選: {filter}");
    }
    info!("執行模式: {}", settings.run_mode);

    if let Err(e) = reset_directory(&settings.tmp_folder) {
        error!("無法清理暫存資料夾: {e:#}");
        return ExitCode::FAILURE;
    }

    let run_interval = Duration::from_secs(settings.run_interval_secs);

    let exit_code = match PreviewGenerator::from_settings(settings, shutdown_signal.clone(), path_filter)
    {
        Ok(generator) => {
            run_loop(&generator, &shutdown_signal, run_interval);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    };

    info!("正在關閉...");
    remove_directories(&temp_dirs);
    exit_code
}

fn load_settings() -> Result<Settings> {
    let settings = Settings::load()?;
    settings.validate()?;
    settings.validate_executables()?;
    Ok(settings)
}

/// 持續執行直到收到中斷信號或使用者選擇結束
fn run_loop(generator: &PreviewGenerator, shutdown_signal: &AtomicBool, run_interval: Duration) {
    while !shutdown_signal.load(Ordering::SeqCst) {
        match generator.run_once() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("本輪執行失敗，稍後重試: {e:#}"),
        }
        wait_interruptible(shutdown_signal, run_interval);
    }
}

fn wait_interruptible(shutdown_signal: &AtomicBool, duration: Duration) {
    const TICK: Duration = Duration::from_millis(200);
    let mut waited = Duration::ZERO;
    while waited < duration && !shutdown_signal.load(Ordering::SeqCst) {
        thread::sleep(TICK);
        waited += TICK;
    }
}
