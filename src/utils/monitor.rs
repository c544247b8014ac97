use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

/// Per-ply timing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnStats {
    pub plies: usize,
    pub last_ply: Duration,
    pub slowest_ply: Duration,
}

impl TurnStats {
    pub fn average(&self, elapsed: Duration) -> Option<Duration> {
        (self.plies > 0).then(|| elapsed / self.plies as u32)
    }
}

#[derive(Debug)]
struct Clock {
    last_mark: Instant,
    turns: TurnStats,
}

/// Process and per-ply statistics for long sessions; engine and vision
/// calls can leak slowly over a game.
pub struct SystemMonitor {
    #[cfg(feature = "cli")]
    system: Mutex<System>,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    #[cfg(feature = "cli")]
    peak_memory: Mutex<u64>,
    start_time: Instant,
    clock: Mutex<Clock>,
    enabled: bool,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        #[cfg(feature = "cli")]
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                if enabled {
                    tracing::warn!("cannot determine own PID, process stats disabled: {}", e);
                }
                None
            }
        };

        let now = Instant::now();
        Self {
            #[cfg(feature = "cli")]
            system: Mutex::new(System::new()),
            #[cfg(feature = "cli")]
            pid,
            #[cfg(feature = "cli")]
            peak_memory: Mutex::new(0),
            start_time: now,
            clock: Mutex::new(Clock {
                last_mark: now,
                turns: TurnStats::default(),
            }),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Process stats, when enabled and available on this platform.
    #[cfg(feature = "cli")]
    pub fn get_stats(&self) -> Option<SystemStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_memory.lock().ok()?;
        *peak = (*peak).max(memory_mb);

        Some(SystemStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: *peak,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    #[cfg(not(feature = "cli"))]
    pub fn get_stats(&self) -> Option<SystemStats> {
        None
    }

    /// Marks a committed ply and returns the updated turn timing.
    pub fn record_ply(&self, ply: usize) -> Option<TurnStats> {
        if !self.enabled {
            return None;
        }
        let turns = {
            let mut clock = self.clock.lock().ok()?;
            let now = Instant::now();
            let took = now.duration_since(clock.last_mark);
            clock.last_mark = now;
            clock.turns.plies += 1;
            clock.turns.last_ply = took;
            clock.turns.slowest_ply = clock.turns.slowest_ply.max(took);
            clock.turns
        };

        match self.get_stats() {
            Some(stats) => tracing::info!(
                "📊 ply {} took {:?} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                ply,
                turns.last_ply,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb
            ),
            None => tracing::info!("📊 ply {} took {:?}", ply, turns.last_ply),
        }
        Some(turns)
    }

    pub fn turn_stats(&self) -> TurnStats {
        self.clock.lock().map(|c| c.turns).unwrap_or_default()
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let elapsed = self.start_time.elapsed();
        let turns = self.turn_stats();
        let peak = self.get_stats().map(|s| s.peak_memory_mb);
        tracing::info!(
            "📊 Session Stats - Total Time: {:?}, Plies: {}, Avg ply: {:?}, Slowest ply: {:?}, Peak Memory: {}",
            elapsed,
            turns.plies,
            turns.average(elapsed),
            turns.slowest_ply,
            peak.map_or_else(|| "n/a".to_string(), |mb| format!("{mb}MB"))
        );
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.get_stats().is_none());
        assert!(monitor.record_ply(1).is_none());
        assert_eq!(monitor.turn_stats().plies, 0);
    }

    #[test]
    fn test_plies_are_counted() {
        let monitor = SystemMonitor::new(true);
        monitor.record_ply(1);
        std::thread::sleep(Duration::from_millis(5));
        let turns = monitor.record_ply(2).unwrap();
        assert_eq!(turns.plies, 2);
        assert!(turns.slowest_ply >= turns.last_ply);
        assert!(turns.last_ply >= Duration::from_millis(5));
    }

    #[test]
    fn test_average_ply_time() {
        let turns = TurnStats {
            plies: 4,
            ..TurnStats::default()
        };
        assert_eq!(turns.average(Duration::from_secs(8)), Some(Duration::from_secs(2)));
        assert_eq!(TurnStats::default().average(Duration::from_secs(8)), None);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_enabled_monitor_tracks_peak() {
        let monitor = SystemMonitor::new(true);
        if let Some(first) = monitor.get_stats() {
            let second = monitor.get_stats().unwrap();
            assert!(second.peak_memory_mb >= first.memory_usage_mb);
        }
    }
}
