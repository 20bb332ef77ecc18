//! Rolling notional statistics.
//!
//! One global window plus one lazily-created window per market, each a
//! FIFO-evicting sequence of recent trade notionals. The engine owns every
//! window; callers only see the query operations, which each take the
//! window's lock for the duration of the call so a concurrent `observe`
//! cannot tear a snapshot.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use whale_watch_core::DetectionConfig;

/// Identifies a statistics stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKey<'a> {
    /// The single cross-market window.
    Global,
    /// The window for one market (condition id).
    Market(&'a str),
}

#[derive(Debug)]
struct StatWindow {
    values: VecDeque<f64>,
    capacity: usize,
    min_observations: usize,
}

impl StatWindow {
    fn new(capacity: usize, min_observations: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            min_observations,
        }
    }

    fn observe(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population standard deviation over the current contents.
    fn std_dev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>()
            / self.values.len() as f64;
        variance.sqrt()
    }

    /// Standard deviations from the window mean. Returns 0 while the window
    /// holds fewer than `min_observations` values, and 0 for a degenerate
    /// constant window.
    fn z_score(&self, value: f64) -> f64 {
        if self.values.len() < self.min_observations {
            return 0.0;
        }
        let std_dev = self.std_dev();
        if std_dev == 0.0 {
            return 0.0;
        }
        (value - self.mean()) / std_dev
    }

    /// Percentile rank of `value` in 0..100: the share of window entries
    /// strictly below it. An empty window answers 50; a value above
    /// everything answers 100.
    fn percentile(&self, value: f64) -> f64 {
        if self.values.is_empty() {
            return 50.0;
        }
        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = sorted.partition_point(|v| *v < value);
        100.0 * rank as f64 / sorted.len() as f64
    }
}

/// Thread-safe rolling statistics engine.
pub struct RollingStats {
    global: Mutex<StatWindow>,
    markets: RwLock<HashMap<String, Mutex<StatWindow>>>,
    market_capacity: usize,
    min_observations: usize,
}

impl RollingStats {
    #[must_use]
    pub fn new(global_capacity: usize, market_capacity: usize, min_observations: usize) -> Self {
        Self {
            global: Mutex::new(StatWindow::new(global_capacity, min_observations)),
            markets: RwLock::new(HashMap::new()),
            market_capacity,
            min_observations,
        }
    }

    #[must_use]
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.global_window,
            config.market_window,
            config.min_observations,
        )
    }

    /// Appends `value` to the identified window, evicting the oldest entry
    /// once the window is at capacity. Market windows are created on first
    /// observation and retained for the life of the process.
    pub fn observe(&self, key: WindowKey<'_>, value: f64) {
        match key {
            WindowKey::Global => self.global.lock().observe(value),
            WindowKey::Market(id) => {
                {
                    let markets = self.markets.read();
                    if let Some(window) = markets.get(id) {
                        window.lock().observe(value);
                        return;
                    }
                }
                let mut markets = self.markets.write();
                markets
                    .entry(id.to_string())
                    .or_insert_with(|| {
                        Mutex::new(StatWindow::new(self.market_capacity, self.min_observations))
                    })
                    .get_mut()
                    .observe(value);
            }
        }
    }

    pub fn z_score(&self, key: WindowKey<'_>, value: f64) -> f64 {
        match key {
            WindowKey::Global => self.global.lock().z_score(value),
            WindowKey::Market(id) => match self.markets.read().get(id) {
                Some(window) => window.lock().z_score(value),
                None => 0.0,
            },
        }
    }

    pub fn percentile(&self, key: WindowKey<'_>, value: f64) -> f64 {
        match key {
            WindowKey::Global => self.global.lock().percentile(value),
            WindowKey::Market(id) => match self.markets.read().get(id) {
                Some(window) => window.lock().percentile(value),
                None => 50.0,
            },
        }
    }

    #[must_use]
    pub fn window_len(&self, key: WindowKey<'_>) -> usize {
        match key {
            WindowKey::Global => self.global.lock().len(),
            WindowKey::Market(id) => match self.markets.read().get(id) {
                Some(window) => window.lock().len(),
                None => 0,
            },
        }
    }

    /// Number of market windows created so far.
    #[must_use]
    pub fn market_count(&self) -> usize {
        self.markets.read().len()
    }
}
