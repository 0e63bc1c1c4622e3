/// Recursive exponential moving average seeded with the first value (no bias adjustment).
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn with_span(span: usize) -> Self {
        Self::with_alpha(2.0 / (span.max(1) as f64 + 1.0))
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: None,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.value {
            None => value,
            Some(prev) => prev + self.alpha * (value - prev),
        };
        self.value = Some(next);
        next
    }
}

/// Wilder RSI: gains and losses smoothed with alpha = 1/period, seeded by the first change.
#[derive(Debug, Clone)]
pub struct WilderRsi {
    prev_close: Option<f64>,
    avg_gain: Ema,
    avg_loss: Ema,
}

impl WilderRsi {
    pub fn new(period: usize) -> Self {
        let alpha = 1.0 / period.max(1) as f64;
        Self {
            prev_close: None,
            avg_gain: Ema::with_alpha(alpha),
            avg_loss: Ema::with_alpha(alpha),
        }
    }

    pub fn update(&mut self, close: f64) -> f64 {
        let Some(prev) = self.prev_close.replace(close) else {
            return 50.0;
        };

        let change = close - prev;
        let (gain, loss) = if change.is_finite() {
            (change.max(0.0), (-change).max(0.0))
        } else {
            (0.0, 0.0)
        };
        let avg_gain = self.avg_gain.update(gain);
        let avg_loss = self.avg_loss.update(loss);
        rsi_from_averages(avg_gain, avg_loss)
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        if avg_gain <= 0.0 {
            return 50.0;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::{rsi_from_averages, Ema, WilderRsi};

    #[test]
    fn ema_seeds_with_first_value() {
        let mut ema = Ema::with_span(3);
        assert_eq!(ema.update(10.0), 10.0);
        // alpha = 0.5
        assert!((ema.update(20.0) - 15.0).abs() < 1e-12);
        assert!((ema.update(20.0) - 17.5).abs() < 1e-12);
    }

    #[test]
    fn rsi_saturates_without_losses() {
        let mut rsi = WilderRsi::new(14);
        rsi.update(100.0);
        for step in 1..20 {
            let value = rsi.update(100.0 + step as f64);
            assert_eq!(value, 100.0);
        }
    }

    #[test]
    fn rsi_is_neutral_without_movement() {
        let mut rsi = WilderRsi::new(14);
        assert_eq!(rsi.update(10.0), 50.0);
        assert_eq!(rsi.update(10.0), 50.0);
    }

    #[test]
    fn rsi_matches_closed_form() {
        assert!((rsi_from_averages(1.0, 1.0) - 50.0).abs() < 1e-12);
        assert!((rsi_from_averages(3.0, 1.0) - 75.0).abs() < 1e-12);
        assert_eq!(rsi_from_averages(0.0, 2.0), 0.0);
    }
}
