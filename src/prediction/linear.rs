//! Linear regression on standardised features, fitted by batch gradient descent.

use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use super::{PlayerFeatures, Predictor, TrainingSample, FEATURE_COUNT, FEATURE_NAMES};

/// Fewer samples than this and training is refused.
pub const MIN_SAMPLES: usize = 10;
/// Rows left after dropping non-finite values.
pub const MIN_VALID_ROWS: usize = 5;

type Row = ([f64; FEATURE_COUNT], f64);

#[derive(Debug, Clone)]
struct Model {
    means: [f64; FEATURE_COUNT],
    scales: [f64; FEATURE_COUNT],
    weights: [f64; FEATURE_COUNT],
    bias: f64,
}

impl Model {
    fn standardise(&self, x: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut z = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            z[j] = (x[j] - self.means[j]) / self.scales[j];
        }
        z
    }

    fn raw(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self.standardise(x);
        self.bias + z.iter().zip(&self.weights).map(|(z, w)| z * w).sum::<f64>()
    }
}

#[derive(Debug, Clone)]
pub struct LinearPredictor {
    epochs: usize,
    learning_rate: f64,
    model: Option<Model>,
}

impl Default for LinearPredictor {
    fn default() -> Self {
        Self::new(1000, 0.05)
    }
}

impl LinearPredictor {
    pub fn new(epochs: usize, learning_rate: f64) -> Self {
        Self {
            epochs,
            learning_rate,
            model: None,
        }
    }

    /// Normalised absolute weight per feature, largest first. Empty until
    /// trained.
    pub fn feature_importance(&self) -> Vec<(&'static str, f64)> {
        let Some(model) = &self.model else {
            return Vec::new();
        };

        let total: f64 = model.weights.iter().map(|w| w.abs()).sum();
        let mut importance: Vec<(&'static str, f64)> = FEATURE_NAMES
            .iter()
            .zip(&model.weights)
            .map(|(name, w)| (*name, if total > 0.0 { w.abs() / total } else { 0.0 }))
            .collect();
        importance.sort_by(|a, b| b.1.total_cmp(&a.1));
        importance
    }

    fn fit(&self, rows: &[Row]) -> Model {
        let mut means = [0.0; FEATURE_COUNT];
        let mut scales = [1.0; FEATURE_COUNT];

        for j in 0..FEATURE_COUNT {
            let column: Vec<f64> = rows.iter().map(|(x, _)| x[j]).collect();
            means[j] = column.clone().mean();
            let std_dev = column.std_dev();
            // Constant columns standardise to zero
            if std_dev.is_finite() && std_dev > 0.0 {
                scales[j] = std_dev;
            }
        }

        let targets: Vec<f64> = rows.iter().map(|(_, y)| *y).collect();
        let mut model = Model {
            means,
            scales,
            weights: [0.0; FEATURE_COUNT],
            bias: targets.mean(),
        };

        let standardised: Vec<[f64; FEATURE_COUNT]> =
            rows.iter().map(|(x, _)| model.standardise(x)).collect();
        let n = rows.len() as f64;

        for _ in 0..self.epochs {
            let mut grad_w = [0.0; FEATURE_COUNT];
            let mut grad_b = 0.0;

            for (z, (_, y)) in standardised.iter().zip(rows) {
                let prediction =
                    model.bias + z.iter().zip(&model.weights).map(|(z, w)| z * w).sum::<f64>();
                let error = prediction - y;
                grad_b += error;
                for j in 0..FEATURE_COUNT {
                    grad_w[j] += error * z[j];
                }
            }

            model.bias -= self.learning_rate * 2.0 * grad_b / n;
            for j in 0..FEATURE_COUNT {
                model.weights[j] -= self.learning_rate * 2.0 * grad_w[j] / n;
            }
        }

        model
    }
}

impl Predictor for LinearPredictor {
    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn predict(&self, features: &PlayerFeatures) -> f64 {
        let Some(model) = &self.model else {
            return f64::NAN;
        };

        let raw = model.raw(&features.to_vector());
        if raw.is_finite() {
            raw.max(0.0)
        } else {
            raw
        }
    }

    fn train(&mut self, samples: &[TrainingSample]) -> bool {
        if samples.len() < MIN_SAMPLES {
            warn!(
                samples = samples.len(),
                required = MIN_SAMPLES,
                "Insufficient data to train predictor"
            );
            return false;
        }

        let rows: Vec<Row> = samples
            .iter()
            .map(|s| (s.features.to_vector(), s.points))
            .filter(|(x, y)| y.is_finite() && x.iter().all(|v| v.is_finite()))
            .collect();

        if rows.len() < MIN_VALID_ROWS {
            warn!(
                valid = rows.len(),
                required = MIN_VALID_ROWS,
                "Insufficient valid rows after cleaning"
            );
            return false;
        }

        // Every fifth row is held out
        let (held_out, training): (Vec<(usize, &Row)>, Vec<(usize, &Row)>) =
            rows.iter().enumerate().partition(|(i, _)| i % 5 == 4);
        let training: Vec<Row> = training.into_iter().map(|(_, r)| *r).collect();

        let model = self.fit(&training);

        let mse = if held_out.is_empty() {
            0.0
        } else {
            held_out
                .iter()
                .map(|(_, (x, y))| (model.raw(x).max(0.0) - y).powi(2))
                .sum::<f64>()
                / held_out.len() as f64
        };
        info!(mse, samples = rows.len(), "Predictor trained");
        debug!(bias = model.bias, "Fitted intercept");

        self.model = Some(model);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(goals: f64, minutes: f64) -> PlayerFeatures {
        PlayerFeatures {
            opponent_difficulty: 3.0,
            minutes,
            goals_scored: goals,
            assists: 0.0,
            clean_sheet: 0.0,
            yellow_cards: 0.0,
            red_cards: 0.0,
            saves: 0.0,
            bonus: 0.0,
            bps: 0.0,
            form: 0.0,
            points_per_game: 0.0,
            selected_by_percent: 0.0,
            transfers_in: 0.0,
            transfers_out: 0.0,
        }
    }

    /// points = 2 + 4 * goals, minutes held constant
    fn linear_samples(n: usize) -> Vec<TrainingSample> {
        (0..n)
            .map(|i| {
                let goals = (i % 4) as f64;
                TrainingSample {
                    features: features(goals, 90.0),
                    points: 2.0 + 4.0 * goals,
                }
            })
            .collect()
    }

    #[test]
    fn test_untrained_predictor() {
        let predictor = LinearPredictor::default();
        assert!(!predictor.is_trained());
        assert!(predictor.predict(&features(1.0, 90.0)).is_nan());
        assert!(predictor.feature_importance().is_empty());
    }

    #[test]
    fn test_refuses_small_datasets() {
        let mut predictor = LinearPredictor::default();
        assert!(!predictor.train(&linear_samples(MIN_SAMPLES - 1)));
        assert!(!predictor.is_trained());
    }

    #[test]
    fn test_refuses_when_too_few_rows_are_finite() {
        let mut samples = linear_samples(12);
        for sample in samples.iter_mut().skip(4) {
            sample.points = f64::NAN;
        }

        let mut predictor = LinearPredictor::default();
        assert!(!predictor.train(&samples));
    }

    #[test]
    fn test_learns_linear_relationship() {
        let mut predictor = LinearPredictor::default();
        assert!(predictor.train(&linear_samples(40)));
        assert!(predictor.is_trained());

        let prediction = predictor.predict(&features(2.0, 90.0));
        assert!((prediction - 10.0).abs() < 0.1, "got {}", prediction);

        let importance = predictor.feature_importance();
        assert_eq!(importance.len(), FEATURE_COUNT);
        assert_eq!(importance[0].0, "goals_scored");
        let total: f64 = importance.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_predictions_never_negative() {
        let samples: Vec<TrainingSample> = (0..20)
            .map(|i| TrainingSample {
                features: features(0.0, i as f64 * 10.0),
                points: i as f64 - 10.0,
            })
            .collect();

        let mut predictor = LinearPredictor::default();
        assert!(predictor.train(&samples));
        assert_eq!(predictor.predict(&features(0.0, 0.0)), 0.0);
    }
}
