//! Logistic regression classifier trained on labelled fraud outcomes

use serde::{Deserialize, Serialize};

/// Gradient descent settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty on the weights (not the intercept)
    pub l2: f64,
}

/// Linear model over standardised features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticClassifier {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self { weights, intercept }
    }

    /// Full-batch gradient descent with class-balanced sample weights
    ///
    /// Deterministic: starts from zero and visits rows in order.
    pub fn fit(rows: &[Vec<f64>], labels: &[bool], params: &ClassifierParams) -> Self {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        let mut model = Self::new(vec![0.0; n_features], 0.0);
        if rows.is_empty() {
            return model;
        }

        let positives = labels.iter().filter(|&&y| y).count().max(1) as f64;
        let negatives = labels.iter().filter(|&&y| !y).count().max(1) as f64;
        let n = rows.len() as f64;
        let weight_of = |y: bool| if y { n / (2.0 * positives) } else { n / (2.0 * negatives) };

        for _ in 0..params.epochs {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (x, &y) in rows.iter().zip(labels) {
                let residual = (model.probability(x) - if y { 1.0 } else { 0.0 }) * weight_of(y);
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += residual * xi;
                }
                grad_b += residual;
            }
            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            model.intercept -= params.learning_rate * grad_b / n;
        }
        model
    }

    pub fn logit(&self, x: &[f64]) -> f64 {
        self.intercept + self.weights.iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>()
    }

    pub fn probability(&self, x: &[f64]) -> f64 {
        sigmoid(self.logit(x))
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err("classifier has non-finite coefficients".to_string());
        }
        Ok(())
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
    }

    #[test]
    fn test_fit_separates_classes() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![if i < 20 { -1.0 } else { 1.0 }]).collect();
        let labels: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let params = ClassifierParams {
            epochs: 200,
            learning_rate: 0.5,
            l2: 0.0,
        };
        let model = LogisticClassifier::fit(&rows, &labels, &params);
        assert!(model.weights[0] > 0.0);
        assert!(model.probability(&[1.0]) > 0.8);
        assert!(model.probability(&[-1.0]) < 0.2);
    }
}
