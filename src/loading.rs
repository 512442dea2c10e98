// loading.rs - 资源加载闸门：全部任务完成后只触发一次 ready

use std::time::{Duration, Instant};

pub const ENVIRONMENT_TASK: &str = "env";
pub const MODEL_TASK: &str = "model";

#[derive(Debug, Clone, PartialEq)]
pub struct LoadTask {
    pub name: String,
    pub is_complete: bool,
    pub loaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl LoadTask {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_complete: false,
            loaded_bytes: 0,
            total_bytes: None,
        }
    }

    pub fn percent(&self) -> Option<u32> {
        if self.is_complete {
            return Some(100);
        }
        let total = self.total_bytes.filter(|t| *t > 0)?;
        Some((self.loaded_bytes.saturating_mul(100) / total).min(100) as u32)
    }
}

#[derive(Debug)]
pub struct AssetLoadGate {
    tasks: Vec<LoadTask>,
    ready_fired: bool,
    started: Instant,
    stall_reported: bool,
}

impl AssetLoadGate {
    pub fn new(started: Instant) -> Self {
        Self {
            tasks: Vec::new(),
            ready_fired: false,
            started,
            stall_reported: false,
        }
    }

    /// Gate for the two assets the viewer needs.
    pub fn for_viewer(started: Instant) -> Self {
        let mut gate = Self::new(started);
        gate.register(ENVIRONMENT_TASK);
        gate.register(MODEL_TASK);
        gate
    }

    pub fn register(&mut self, name: &str) {
        if self.task(name).is_none() {
            self.tasks.push(LoadTask::new(name));
        }
    }

    pub fn task(&self, name: &str) -> Option<&LoadTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    fn task_mut(&mut self, name: &str) -> Option<&mut LoadTask> {
        self.tasks.iter_mut().find(|t| t.name == name)
    }

    pub fn is_ready(&self) -> bool {
        self.tasks.iter().all(|t| t.is_complete)
    }

    /// Returns `true` only on the call that opens the gate.
    pub fn mark_complete(&mut self, name: &str) -> bool {
        let Some(task) = self.task_mut(name) else {
            log::warn!("completion reported for unknown load task {name:?}");
            return false;
        };
        if task.is_complete {
            return false;
        }
        task.is_complete = true;
        log::info!("load task {name:?} complete");

        if !self.ready_fired && self.is_ready() {
            self.ready_fired = true;
            log::info!("all assets loaded");
            return true;
        }
        false
    }

    pub fn report_progress(&mut self, name: &str, loaded: u64, total: Option<u64>) {
        if let Some(task) = self.task_mut(name) {
            task.loaded_bytes = loaded;
            task.total_bytes = total;
        }
    }

    pub fn progress_percent(&self, name: &str) -> Option<u32> {
        self.task(name).and_then(LoadTask::percent)
    }

    /// 加载提示文本；ready 之后为 None
    pub fn loading_text(&self) -> Option<String> {
        if self.is_ready() {
            return None;
        }
        Some(match self.progress_percent(MODEL_TASK) {
            Some(p) => format!("Loading... {p}%"),
            None => "Loading...".to_string(),
        })
    }

    pub fn pending(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| !t.is_complete)
            .map(|t| t.name.clone())
            .collect()
    }

    /// Stall guard: reports pending tasks once after `timeout`. Loads keep running.
    pub fn check_stalled(&mut self, now: Instant, timeout: Duration) -> Option<Vec<String>> {
        if self.stall_reported || self.is_ready() {
            return None;
        }
        if now.saturating_duration_since(self.started) < timeout {
            return None;
        }
        self.stall_reported = true;
        Some(self.pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_regardless_of_completion_order() {
        let now = Instant::now();
        let mut a = AssetLoadGate::for_viewer(now);
        assert!(!a.mark_complete(ENVIRONMENT_TASK));
        assert!(!a.is_ready());
        assert!(a.mark_complete(MODEL_TASK));
        assert!(a.is_ready());

        let mut b = AssetLoadGate::for_viewer(now);
        assert!(!b.mark_complete(MODEL_TASK));
        assert!(!b.is_ready());
        assert!(b.mark_complete(ENVIRONMENT_TASK));
        assert!(b.is_ready());
    }

    #[test]
    fn ready_notification_fires_once() {
        let mut gate = AssetLoadGate::for_viewer(Instant::now());
        let mut fired = 0;
        for name in [MODEL_TASK, MODEL_TASK, ENVIRONMENT_TASK, ENVIRONMENT_TASK, MODEL_TASK] {
            if gate.mark_complete(name) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(gate.is_ready());
    }

    #[test]
    fn unknown_task_is_ignored() {
        let mut gate = AssetLoadGate::for_viewer(Instant::now());
        assert!(!gate.mark_complete("texture"));
        assert_eq!(gate.pending().len(), 2);
    }

    #[test]
    fn loading_text_follows_model_progress() {
        let mut gate = AssetLoadGate::for_viewer(Instant::now());
        assert_eq!(gate.loading_text().as_deref(), Some("Loading..."));

        gate.report_progress(MODEL_TASK, 512, Some(2048));
        assert_eq!(gate.loading_text().as_deref(), Some("Loading... 25%"));

        gate.report_progress(MODEL_TASK, 2047, Some(2048));
        assert_eq!(gate.loading_text().as_deref(), Some("Loading... 99%"));

        gate.mark_complete(MODEL_TASK);
        assert_eq!(gate.loading_text().as_deref(), Some("Loading... 100%"));

        gate.mark_complete(ENVIRONMENT_TASK);
        assert_eq!(gate.loading_text(), None);
    }

    #[test]
    fn zero_total_has_no_percentage() {
        let mut gate = AssetLoadGate::for_viewer(Instant::now());
        gate.report_progress(MODEL_TASK, 0, Some(0));
        assert_eq!(gate.progress_percent(MODEL_TASK), None);
    }

    #[test]
    fn stall_guard_reports_once() {
        let start = Instant::now();
        let timeout = Duration::from_secs(10);
        let mut gate = AssetLoadGate::for_viewer(start);
        gate.mark_complete(ENVIRONMENT_TASK);

        assert_eq!(gate.check_stalled(start + Duration::from_secs(5), timeout), None);
        assert_eq!(
            gate.check_stalled(start + Duration::from_secs(11), timeout),
            Some(vec![MODEL_TASK.to_string()])
        );
        assert_eq!(gate.check_stalled(start + Duration::from_secs(20), timeout), None);
    }
}
