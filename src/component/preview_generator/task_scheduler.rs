use super::item_processor::{ItemOutcome, ItemProcessor, SkipReason};
use super::partition::{Sublist, WorkItem};
use crate::tools::CpuMonitor;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 一批項目的處理統計
#[derive(Debug, Default)]
pub struct SublistReport {
    pub name: String,
    pub total: usize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl SublistReport {
    fn new(sublist: &Sublist) -> Self {
        Self {
            name: sublist.name.clone(),
            total: sublist.len(),
            ..Self::default()
        }
    }

    fn record(&self, outcome: &ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Completed(_) => &self.completed,
            ItemOutcome::Skipped(_) => &self.skipped,
            ItemOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// 以 worker pool 處理各批項目
pub struct TaskScheduler {
    processor: Arc<ItemProcessor>,
    cpu_monitor: Arc<CpuMonitor>,
    shutdown_signal: Arc<AtomicBool>,
    show_progress: bool,
}

impl TaskScheduler {
    #[must_use]
    pub fn new(processor: Arc<ItemProcessor>, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            processor,
            cpu_monitor: Arc::new(CpuMonitor::new()),
            shutdown_signal,
            show_progress: true,
        }
    }

    /// 不顯示進度列（測試或非互動環境）
    #[must_use]
    pub const fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// 處理單一批次，使用 `sublist.workers` 個 worker
    pub fn run_sublist(&self, sublist: &Sublist) -> Result<SublistReport> {
        if sublist.is_empty() {
            return Ok(SublistReport::new(sublist));
        }
        info!(
            "開始處理 {}：共 {} 個項目，{} 個 worker",
            sublist.name,
            sublist.len(),
            sublist.workers
        );

        let progress_bar = self.progress_bar(sublist.len());
        let report = self.process_items(sublist, &progress_bar)?;
        progress_bar.finish_with_message(format!("{} 完成", sublist.name));
        log_report(&report);
        Ok(report)
    }

    /// 多批同時處理，外層最多 `outer_workers` 批並行；共用一個進度列
    pub fn run_parallel(
        &self,
        sublists: &[Sublist],
        outer_workers: usize,
    ) -> Result<Vec<SublistReport>> {
        let sublists: Vec<&Sublist> = sublists.iter().filter(|s| !s.is_empty()).collect();
        if sublists.is_empty() {
            return Ok(Vec::new());
        }

        let total: usize = sublists.iter().map(|s| s.len()).sum();
        let outer_workers = outer_workers.clamp(1, sublists.len());
        info!(
            "開始處理 {} 批共 {total} 個項目，同時 {outer_workers} 批",
            sublists.len()
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(outer_workers)
            .thread_name(|i| format!("sublist-{i}"))
            .build()
            .context("無法建立執行緒池")?;

        let progress_bar = self.progress_bar(total);
        let reports = pool.install(|| {
            sublists
                .par_iter()
                .map(|sublist| self.process_items(sublist, &progress_bar))
                .collect::<Result<Vec<_>>>()
        })?;
        progress_bar.finish_with_message("完成");

        reports.iter().for_each(log_report);
        Ok(reports)
    }

    fn process_items(&self, sublist: &Sublist, progress_bar: &ProgressBar) -> Result<SublistReport> {
        let report = SublistReport::new(sublist);

        if sublist.workers <= 1 {
            for item in &sublist.items {
                self.process_one(item, sublist, &report, progress_bar);
            }
            return Ok(report);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(sublist.workers)
            .thread_name(|i| format!("preview-worker-{i}"))
            .build()
            .context("無法建立執行緒池")?;

        pool.install(|| {
            sublist.items.par_iter().for_each(|item| {
                self.process_one(item, sublist, &report, progress_bar);
            });
        });

        Ok(report)
    }

    fn process_one(
        &self,
        item: &WorkItem,
        sublist: &Sublist,
        report: &SublistReport,
        progress_bar: &ProgressBar,
    ) {
        let outcome = if self.shutdown_signal.load(Ordering::SeqCst) {
            ItemOutcome::Skipped(SkipReason::Cancelled)
        } else {
            self.processor.process(&item.key)
        };

        match &outcome {
            ItemOutcome::Completed(stats) => info!(
                "已產生預覽 {} [{}] HW={} TIME={}秒 SPEED={}",
                stats.video_file.display(),
                sublist.name,
                stats.hardware,
                stats.seconds,
                stats
                    .speed
                    .map_or_else(|| "?".to_string(), |speed| format!("{speed}x"))
            ),
            ItemOutcome::Failed(_) => debug!("{} ({}) 處理失敗", item.title, item.key),
            ItemOutcome::Skipped(_) => {}
        }

        report.record(&outcome);
        progress_bar.inc(1);
        progress_bar.set_message(self.cpu_monitor.status_line());
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden());
        }

        let progress_bar = ProgressBar::new(total as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message(self.cpu_monitor.status_line());
        progress_bar
    }
}

fn log_report(report: &SublistReport) {
    info!(
        "{}：完成 {}，略過 {}，失敗 {}（共 {}）",
        report.name,
        report.completed(),
        report.skipped(),
        report.failed(),
        report.total
    );
}
