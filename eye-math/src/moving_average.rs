//! Sliding-window averages with O(1) amortized updates.
//!
//! Both estimators keep the last `window` samples. While the history is
//! still filling, the average is recomputed from the held values. Once the
//! window is full, each new sample updates the running sums by removing the
//! contribution of the evicted sample. Shrinking the window drops the oldest
//! samples and marks the estimator dirty: the next `add_value` performs one
//! full recompute, after which incremental updates resume.

use std::collections::VecDeque;

use num_traits::Float;
use thiserror::Error;

/// Error types for moving average construction and resizing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MovingAverageError {
    #[error("window size must be at least 1")]
    ZeroWindow,
}

/// How the next `add_value` must update the average
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AverageState {
    /// History holds fewer than `window` values; recompute from scratch
    Filling,
    /// History holds exactly `window` values; update incrementally
    Stable,
    /// Window was shrunk; the held average is stale until the next recompute
    Dirty,
}

fn as_float<T: Float>(n: usize) -> T {
    T::from(n).unwrap_or_else(T::nan)
}

/// Arithmetic mean over the last `window` values
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage<T: Float> {
    values: VecDeque<T>,
    window: usize,
    average: T,
    state: AverageState,
}

impl<T: Float> SimpleMovingAverage<T> {
    /// Create an empty average over `window` samples.
    ///
    /// # Errors
    /// * `MovingAverageError::ZeroWindow` - if `window` is 0
    pub fn new(window: usize) -> Result<Self, MovingAverageError> {
        if window == 0 {
            return Err(MovingAverageError::ZeroWindow);
        }
        Ok(Self {
            values: VecDeque::with_capacity(window + 1),
            window,
            average: T::zero(),
            state: AverageState::Filling,
        })
    }

    /// Append a sample and update the average
    pub fn add_value(&mut self, value: T) {
        self.values.push_back(value);
        let evicted = if self.values.len() > self.window {
            self.values.pop_front()
        } else {
            None
        };

        match (self.state, evicted) {
            (AverageState::Stable, Some(oldest)) => {
                let n = as_float::<T>(self.window);
                self.average = self.average + value / n - oldest / n;
            }
            _ => self.recompute(),
        }

        self.state = if self.values.len() >= self.window {
            AverageState::Stable
        } else {
            AverageState::Filling
        };
    }

    fn recompute(&mut self) {
        let sum = self.values.iter().fold(T::zero(), |acc, &v| acc + v);
        self.average = sum / as_float(self.values.len());
    }

    /// Current mean, 0 if nothing has been added
    pub fn average(&self) -> T {
        self.average
    }

    pub fn window_size(&self) -> usize {
        self.window
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the next `add_value` will recompute after a window shrink
    pub fn is_dirty(&self) -> bool {
        self.state == AverageState::Dirty
    }

    /// Resize the window.
    ///
    /// Shrinking below the held history evicts the oldest samples and forces
    /// one full recompute on the next `add_value`. Growing only changes the
    /// target size.
    ///
    /// # Errors
    /// * `MovingAverageError::ZeroWindow` - if `window` is 0
    pub fn change_window_size(&mut self, window: usize) -> Result<(), MovingAverageError> {
        if window == 0 {
            return Err(MovingAverageError::ZeroWindow);
        }
        if window < self.window && self.values.len() > window {
            while self.values.len() > window {
                self.values.pop_front();
            }
            self.state = AverageState::Dirty;
        } else if self.state == AverageState::Stable && self.values.len() < window {
            self.state = AverageState::Filling;
        }
        self.window = window;
        Ok(())
    }
}

/// Weighted mean `Σ(v·w) / Σ(w)` over the last `window` samples
#[derive(Debug, Clone)]
pub struct WeightedMovingAverage<T: Float> {
    values: VecDeque<(T, T)>,
    window: usize,
    numerator: T,
    denominator: T,
    average: T,
    state: AverageState,
}

impl<T: Float> WeightedMovingAverage<T> {
    /// Create an empty weighted average over `window` samples.
    ///
    /// # Errors
    /// * `MovingAverageError::ZeroWindow` - if `window` is 0
    pub fn new(window: usize) -> Result<Self, MovingAverageError> {
        if window == 0 {
            return Err(MovingAverageError::ZeroWindow);
        }
        Ok(Self {
            values: VecDeque::with_capacity(window + 1),
            window,
            numerator: T::zero(),
            denominator: T::zero(),
            average: T::zero(),
            state: AverageState::Filling,
        })
    }

    /// Append a weighted sample and update the average
    pub fn add_value(&mut self, value: T, weight: T) {
        self.values.push_back((value, weight));
        let evicted = if self.values.len() > self.window {
            self.values.pop_front()
        } else {
            None
        };

        match (self.state, evicted) {
            (AverageState::Stable, Some((old_value, old_weight))) => {
                self.numerator = self.numerator - old_value * old_weight + value * weight;
                self.denominator = self.denominator - old_weight + weight;
            }
            _ => {
                self.numerator = T::zero();
                self.denominator = T::zero();
                for &(v, w) in &self.values {
                    self.numerator = self.numerator + v * w;
                    self.denominator = self.denominator + w;
                }
            }
        }

        // A window whose weights sum to zero carries no information
        self.average = if self.denominator != T::zero() {
            self.numerator / self.denominator
        } else {
            T::zero()
        };

        self.state = if self.values.len() >= self.window {
            AverageState::Stable
        } else {
            AverageState::Filling
        };
    }

    /// Current weighted mean, 0 if nothing has been added
    pub fn average(&self) -> T {
        self.average
    }

    pub fn window_size(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.state == AverageState::Dirty
    }

    /// Resize the window, with the same eviction policy as [`SimpleMovingAverage`].
    ///
    /// # Errors
    /// * `MovingAverageError::ZeroWindow` - if `window` is 0
    pub fn change_window_size(&mut self, window: usize) -> Result<(), MovingAverageError> {
        if window == 0 {
            return Err(MovingAverageError::ZeroWindow);
        }
        if window < self.window && self.values.len() > window {
            while self.values.len() > window {
                self.values.pop_front();
            }
            self.state = AverageState::Dirty;
        } else if self.state == AverageState::Stable && self.values.len() < window {
            self.state = AverageState::Filling;
        }
        self.window = window;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn naive_mean(values: &[f64], window: usize) -> f64 {
        let tail = &values[values.len().saturating_sub(window)..];
        tail.iter().sum::<f64>() / tail.len() as f64
    }

    fn naive_weighted_mean(values: &[(f64, f64)], window: usize) -> f64 {
        let tail = &values[values.len().saturating_sub(window)..];
        let num: f64 = tail.iter().map(|(v, w)| v * w).sum();
        let den: f64 = tail.iter().map(|(_, w)| w).sum();
        num / den
    }

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            SimpleMovingAverage::<f64>::new(0).unwrap_err(),
            MovingAverageError::ZeroWindow
        );
        assert_eq!(
            WeightedMovingAverage::<f64>::new(0).unwrap_err(),
            MovingAverageError::ZeroWindow
        );

        let mut sma = SimpleMovingAverage::<f64>::new(3).unwrap();
        assert_eq!(
            sma.change_window_size(0),
            Err(MovingAverageError::ZeroWindow)
        );
        assert_eq!(sma.window_size(), 3);
    }

    #[test]
    fn test_empty_average_is_zero() {
        let sma = SimpleMovingAverage::<f64>::new(4).unwrap();
        assert_eq!(sma.average(), 0.0);
        assert!(sma.is_empty());

        let wma = WeightedMovingAverage::<f32>::new(4).unwrap();
        assert_eq!(wma.average(), 0.0);
    }

    #[test]
    fn test_sma_filling_is_exact_mean() {
        let mut sma = SimpleMovingAverage::new(5).unwrap();
        let values = [2.0, 4.0, 9.0];
        for &v in &values {
            sma.add_value(v);
        }
        assert_relative_eq!(sma.average(), 5.0);
        assert_eq!(sma.len(), 3);
    }

    #[test]
    fn test_sma_matches_naive_every_step() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let window = 7;
        let mut sma = SimpleMovingAverage::new(window).unwrap();
        let mut history = Vec::new();

        for _ in 0..200 {
            let v: f64 = rng.random_range(-50.0..50.0);
            history.push(v);
            sma.add_value(v);
            assert_relative_eq!(sma.average(), naive_mean(&history, window), epsilon = 1e-9);
            assert!(sma.len() <= window);
        }
    }

    #[test]
    fn test_sma_shrink_marks_dirty_and_recomputes_once() {
        let mut sma = SimpleMovingAverage::new(6).unwrap();
        let mut history: Vec<f64> = Vec::new();
        for i in 0..10 {
            let v = (i * i) as f64;
            history.push(v);
            sma.add_value(v);
        }

        sma.change_window_size(3).unwrap();
        assert!(sma.is_dirty());
        assert_eq!(sma.len(), 3);

        history.push(1.5);
        sma.add_value(1.5);
        assert!(!sma.is_dirty());
        assert_eq!(sma.len(), 3);
        assert_relative_eq!(sma.average(), naive_mean(&history, 3), epsilon = 1e-9);

        // Incremental path afterwards stays on the new window
        for v in [7.0, -2.0, 11.0, 0.25] {
            history.push(v);
            sma.add_value(v);
            assert_relative_eq!(sma.average(), naive_mean(&history, 3), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sma_shrink_without_excess_history_is_not_dirty() {
        let mut sma = SimpleMovingAverage::new(10).unwrap();
        sma.add_value(1.0);
        sma.add_value(3.0);
        sma.change_window_size(4).unwrap();
        assert!(!sma.is_dirty());
        assert_relative_eq!(sma.average(), 2.0);
    }

    #[test]
    fn test_sma_grow_keeps_history_until_filled() {
        let mut sma = SimpleMovingAverage::new(2).unwrap();
        let mut history = Vec::new();
        for v in [1.0, 2.0, 3.0] {
            history.push(v);
            sma.add_value(v);
        }
        sma.change_window_size(4).unwrap();
        assert_eq!(sma.window_size(), 4);
        // No recompute until the next value arrives
        assert_relative_eq!(sma.average(), 2.5);

        for v in [10.0, 20.0, 30.0, 40.0] {
            history.push(v);
            sma.add_value(v);
        }
        // History before the resize held only the last two values
        assert_relative_eq!(sma.average(), naive_mean(&history, 4), epsilon = 1e-9);
    }

    #[test]
    fn test_wma_matches_naive_every_step() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let window = 5;
        let mut wma = WeightedMovingAverage::new(window).unwrap();
        let mut history = Vec::new();

        for _ in 0..150 {
            let v: f64 = rng.random_range(0.0..1.0);
            let w: f64 = rng.random_range(0.1..1.0);
            history.push((v, w));
            wma.add_value(v, w);
            assert_relative_eq!(
                wma.average(),
                naive_weighted_mean(&history, window),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_wma_shrink_then_recompute() {
        let mut wma = WeightedMovingAverage::new(8).unwrap();
        let mut history = Vec::new();
        for i in 0..12 {
            let sample = (i as f64, 1.0 + (i % 3) as f64);
            history.push(sample);
            wma.add_value(sample.0, sample.1);
        }
        wma.change_window_size(2).unwrap();
        assert!(wma.is_dirty());
        assert_eq!(wma.len(), 2);

        history.push((100.0, 0.5));
        wma.add_value(100.0, 0.5);
        assert!(!wma.is_dirty());
        assert_relative_eq!(
            wma.average(),
            naive_weighted_mean(&history, 2),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_wma_zero_weight_window_is_zero() {
        let mut wma = WeightedMovingAverage::new(3).unwrap();
        wma.add_value(5.0, 0.0);
        wma.add_value(9.0, 0.0);
        assert_eq!(wma.average(), 0.0);

        wma.add_value(2.0, 1.0);
        assert_relative_eq!(wma.average(), 2.0);
    }
}
