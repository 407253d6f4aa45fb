//! Inference timing instrumentation.
//!
//! Tracks per-inference conversion and classification times over a
//! rolling window, together with admission counters, for the periodic
//! status log.

/// Rolling inference timing statistics.
#[derive(Debug)]
pub struct InferenceTiming {
    /// Per-inference YUV → RGB conversion time.
    pub convert_times: Vec<f64>,
    /// Per-inference classifier time.
    pub classify_times: Vec<f64>,
    /// Maximum number of samples to keep.
    pub window_size: usize,
    /// Completed inferences.
    pub total_inferences: u64,
    /// Inferences where the classifier saw a hand.
    pub hand_inferences: u64,
    /// Camera frames dropped at admission (mirrors the gate counter).
    pub dropped_frames: u64,
    /// Timestamps of the first and latest completed inference.
    first_ts: Option<u64>,
    last_ts: Option<u64>,
}

impl Default for InferenceTiming {
    fn default() -> Self {
        Self::new(300)
    }
}

impl InferenceTiming {
    pub fn new(window_size: usize) -> Self {
        Self {
            convert_times: Vec::with_capacity(window_size),
            classify_times: Vec::with_capacity(window_size),
            window_size: window_size.max(1),
            total_inferences: 0,
            hand_inferences: 0,
            dropped_frames: 0,
            first_ts: None,
            last_ts: None,
        }
    }

    /// Record one completed inference.
    pub fn record(&mut self, convert_ms: f64, classify_ms: f64, hand: bool, timestamp_ms: u64) {
        Self::push_sample(&mut self.convert_times, convert_ms, self.window_size);
        Self::push_sample(&mut self.classify_times, classify_ms, self.window_size);

        self.total_inferences += 1;
        if hand {
            self.hand_inferences += 1;
        }
        self.first_ts.get_or_insert(timestamp_ms);
        self.last_ts = Some(timestamp_ms);
    }

    /// Sync the dropped-frame total from the admission gate.
    pub fn record_drops(&mut self, dropped_total: u64) {
        self.dropped_frames = dropped_total;
    }

    fn push_sample(samples: &mut Vec<f64>, value: f64, window_size: usize) {
        samples.push(value);
        if samples.len() > window_size {
            samples.remove(0);
        }
    }

    /// Compute percentile from a sorted slice.
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn sorted(samples: &[f64]) -> Vec<f64> {
        let mut v = samples.to_vec();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        v
    }

    /// Effective inference rate over the whole run.
    fn rate_hz(&self) -> f64 {
        match (self.first_ts, self.last_ts) {
            (Some(first), Some(last)) if last > first && self.total_inferences > 1 => {
                (self.total_inferences - 1) as f64 * 1000.0 / (last - first) as f64
            }
            _ => 0.0,
        }
    }

    pub fn stats(&self) -> InferenceStats {
        let convert = Self::sorted(&self.convert_times);
        let classify = Self::sorted(&self.classify_times);
        let offered = self.total_inferences + self.dropped_frames;

        InferenceStats {
            convert_p50: Self::percentile(&convert, 50.0),
            convert_p99: Self::percentile(&convert, 99.0),
            classify_p50: Self::percentile(&classify, 50.0),
            classify_p99: Self::percentile(&classify, 99.0),
            rate_hz: self.rate_hz(),
            drop_pct: if offered > 0 {
                (self.dropped_frames as f64 / offered as f64) * 100.0
            } else {
                0.0
            },
            total_inferences: self.total_inferences,
            hand_inferences: self.hand_inferences,
            dropped_frames: self.dropped_frames,
        }
    }

    /// Format stats as an s-expression for the status log.
    pub fn stats_sexp(&self) -> String {
        let s = self.stats();
        format!(
            "(:convert-p50 {:.1} :convert-p99 {:.1} :classify-p50 {:.1} :classify-p99 {:.1} :rate {:.1} :drop-pct {:.1} :inferences {} :with-hand {} :dropped {})",
            s.convert_p50, s.convert_p99, s.classify_p50, s.classify_p99,
            s.rate_hz, s.drop_pct, s.total_inferences, s.hand_inferences, s.dropped_frames,
        )
    }
}

/// Computed inference statistics.
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub convert_p50: f64,
    pub convert_p99: f64,
    pub classify_p50: f64,
    pub classify_p99: f64,
    pub rate_hz: f64,
    pub drop_pct: f64,
    pub total_inferences: u64,
    pub hand_inferences: u64,
    pub dropped_frames: u64,
}
