//! Sliding window over per-tick wake-up errors.

/// Bounded ring of recent scheduling errors, in milliseconds.
///
/// Each tick pushes the signed difference between the actual wake-up and
/// the anchored deadline. Mean, standard deviation, and worst absolute
/// error are computed over whatever the window currently holds.
#[derive(Clone, Debug)]
pub struct ErrorWindow {
    /// Ring buffer of recorded errors (ms).
    window: Vec<f64>,
    /// Current write position in the ring buffer.
    pos: usize,
    /// Number of valid entries (saturates at the window size).
    filled: usize,
}

impl ErrorWindow {
    /// An empty window retaining up to `size` samples. `size` must be
    /// at least 1 (enforced by config validation upstream).
    pub fn new(size: usize) -> Self {
        Self {
            window: vec![0.0; size.max(1)],
            pos: 0,
            filled: 0,
        }
    }

    /// Record one wake-up error, evicting the oldest entry when full.
    pub fn push(&mut self, error_ms: f64) {
        self.window[self.pos] = error_ms;
        self.pos = (self.pos + 1) % self.window.len();
        self.filled = (self.filled + 1).min(self.window.len());
    }

    /// Number of recorded entries currently in the window.
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Whether no errors have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Mean error over the window; 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        self.window[..self.filled].iter().sum::<f64>() / self.filled as f64
    }

    /// Population standard deviation over the window; 0.0 when empty.
    pub fn std(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.window[..self.filled]
            .iter()
            .map(|e| {
                let d = e - mean;
                d * d
            })
            .sum::<f64>()
            / self.filled as f64;
        var.sqrt()
    }

    /// Largest absolute error in the window; 0.0 when empty.
    pub fn max_abs(&self) -> f64 {
        self.window[..self.filled]
            .iter()
            .fold(0.0f64, |acc, e| acc.max(e.abs()))
    }
}
