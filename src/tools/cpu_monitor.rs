use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::System;

/// sysinfo 需要兩次取樣間隔至少這麼久才有意義
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

struct Sample {
    system: System,
    last_refresh: Instant,
    usage: f32,
}

/// 供進度列顯示的 CPU 使用率，可在多個 worker 之間共用
pub struct CpuMonitor {
    sample: Mutex<Sample>,
}

impl CpuMonitor {
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            sample: Mutex::new(Sample {
                system,
                last_refresh: Instant::now(),
                usage: 0.0,
            }),
        }
    }

    /// 取得目前的 CPU 使用率；距離上次取樣太近時回傳快取值
    pub fn current_usage(&self) -> f32 {
        let Ok(mut sample) = self.sample.lock() else {
            return 0.0;
        };

        if sample.last_refresh.elapsed() >= MIN_REFRESH_INTERVAL {
            sample.system.refresh_cpu_all();
            sample.usage = sample.system.global_cpu_usage();
            sample.last_refresh = Instant::now();
        }
        sample.usage
    }

    #[must_use]
    pub fn status_line(&self) -> String {
        format!("CPU: {:.1}%", self.current_usage())
    }
}

impl Default for CpuMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_in_range() {
        let monitor = CpuMonitor::new();
        std::thread::sleep(MIN_REFRESH_INTERVAL);
        let usage = monitor.current_usage();
        assert!((0.0..=100.0).contains(&usage));
        assert!(monitor.status_line().starts_with("CPU: "));
    }
}
