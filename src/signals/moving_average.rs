use std::collections::VecDeque;

/// Simple moving average over the last `window` samples.
///
/// Until the window fills, the average covers the samples seen so far.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);

        Self {
            window,
            samples: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, sample: f64) -> f64 {
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }

        self.samples.push_back(sample);
        self.sum += sample;

        self.sum / self.samples.len() as f64
    }

    pub fn value(&self) -> Option<f64> {
        (!self.samples.is_empty()).then(|| self.sum / self.samples.len() as f64)
    }
}
