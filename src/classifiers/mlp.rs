//! Multi-layer perceptron classifier.
//!
//! Fully connected ReLU layers with a softmax output, trained with Adam on
//! mini-batches of cross-entropy loss plus an L2 penalty. With early stopping
//! enabled, a seeded 10% validation split is held out and training stops once
//! validation accuracy fails to improve by `tol` for `n_iter_no_change` epochs;
//! the best weights seen are kept.

use super::{check_training_set, check_width, Classifier};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub early_stopping: bool,
    pub validation_fraction: f64,
    pub n_iter_no_change: usize,
    pub tol: f64,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        MlpParams {
            hidden_layers: vec![512, 128],
            learning_rate: 0.001,
            alpha: 1e-4,
            max_epochs: 200,
            batch_size: 200,
            early_stopping: true,
            validation_fraction: 0.1,
            n_iter_no_change: 10,
            tol: 1e-4,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layer {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

/// Adam moment estimates for one layer.
struct Moments {
    m_w: Array2<f32>,
    v_w: Array2<f32>,
    m_b: Array1<f32>,
    v_b: Array1<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    params: MlpParams,
    layers: Vec<Layer>,
    n_classes: usize,
}

fn relu(x: &mut Array2<f32>) {
    x.mapv_inplace(|v| v.max(0.0));
}

fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

impl Mlp {
    pub fn new(params: MlpParams) -> Self {
        Mlp {
            params,
            layers: Vec::new(),
            n_classes: 0,
        }
    }

    fn init_layers(&mut self, input_dim: usize, n_classes: usize, rng: &mut StdRng) {
        let mut sizes = vec![input_dim];
        sizes.extend(&self.params.hidden_layers);
        sizes.push(n_classes);

        // Xavier initialization
        self.layers = sizes
            .windows(2)
            .map(|w| {
                let (n_in, n_out) = (w[0], w[1]);
                let limit = (6.0 / (n_in + n_out) as f32).sqrt();
                Layer {
                    weights: Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-limit..limit)),
                    bias: Array1::from_shape_fn(n_out, |_| rng.gen_range(-limit..limit)),
                }
            })
            .collect();
    }

    /// The input fed to each layer, and the softmax output of the last one.
    fn forward(&self, input: &Array2<f32>) -> (Vec<Array2<f32>>, Array2<f32>) {
        let mut layer_inputs = Vec::with_capacity(self.layers.len());
        let mut current = input.clone();
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut z = current.dot(&layer.weights) + &layer.bias;
            if idx + 1 < self.layers.len() {
                relu(&mut z);
            } else {
                softmax_rows(&mut z);
            }
            layer_inputs.push(std::mem::replace(&mut current, z));
        }
        (layer_inputs, current)
    }

    /// One Adam step on a mini-batch; returns the mean cross-entropy loss.
    fn train_batch(
        &mut self,
        x: &Array2<f32>,
        targets: &[usize],
        moments: &mut [Moments],
        step: i32,
    ) -> f64 {
        let n = x.nrows() as f32;
        let (layer_inputs, output) = self.forward(x);

        let loss = targets
            .iter()
            .enumerate()
            .map(|(i, &t)| -(output[[i, t]].max(1e-10) as f64).ln())
            .sum::<f64>()
            / n as f64;

        // dL/dz for softmax + cross-entropy
        let mut delta = output;
        for (i, &t) in targets.iter().enumerate() {
            delta[[i, t]] -= 1.0;
        }
        delta.mapv_inplace(|v| v / n);

        let (beta1, beta2, eps) = (0.9f32, 0.999f32, 1e-8f32);
        let lr = self.params.learning_rate as f32;
        let l2 = self.params.alpha as f32 / n;
        let correction1 = 1.0 - beta1.powi(step);
        let correction2 = 1.0 - beta2.powi(step);

        for layer_idx in (0..self.layers.len()).rev() {
            let prev = &layer_inputs[layer_idx];
            let grad_w = prev.t().dot(&delta) + &(&self.layers[layer_idx].weights * l2);
            let grad_b = delta.sum_axis(Axis(0));

            if layer_idx > 0 {
                let mut next_delta = delta.dot(&self.layers[layer_idx].weights.t());
                // ReLU derivative
                next_delta.zip_mut_with(prev, |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
                delta = next_delta;
            }

            let m = &mut moments[layer_idx];
            m.m_w.zip_mut_with(&grad_w, |acc, &g| *acc = beta1 * *acc + (1.0 - beta1) * g);
            m.v_w.zip_mut_with(&grad_w, |acc, &g| *acc = beta2 * *acc + (1.0 - beta2) * g * g);
            m.m_b.zip_mut_with(&grad_b, |acc, &g| *acc = beta1 * *acc + (1.0 - beta1) * g);
            m.v_b.zip_mut_with(&grad_b, |acc, &g| *acc = beta2 * *acc + (1.0 - beta2) * g * g);

            let layer = &mut self.layers[layer_idx];
            ndarray::Zip::from(&mut layer.weights)
                .and(&m.m_w)
                .and(&m.v_w)
                .for_each(|w, &mw, &vw| {
                    *w -= lr * (mw / correction1) / ((vw / correction2).sqrt() + eps);
                });
            ndarray::Zip::from(&mut layer.bias)
                .and(&m.m_b)
                .and(&m.v_b)
                .for_each(|b, &mb, &vb| {
                    *b -= lr * (mb / correction1) / ((vb / correction2).sqrt() + eps);
                });
        }

        loss
    }

    fn accuracy_on(&self, x: &Array2<f32>, y: &[usize]) -> f64 {
        let (_, proba) = self.forward(x);
        let predictions = super::argmax_rows(&proba);
        crate::metrics::accuracy(y, &predictions)
    }
}

impl Classifier for Mlp {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize]) -> Result<()> {
        let n_classes = check_training_set(x, y)?;
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let mut order: Vec<usize> = (0..x.nrows()).collect();
        order.shuffle(&mut rng);
        let n_val = if self.params.early_stopping {
            (x.nrows() as f64 * self.params.validation_fraction) as usize
        } else {
            0
        };
        let (val_idx, train_idx) = order.split_at(n_val);
        let train_idx = train_idx.to_vec();
        let val_x = x.select(Axis(0), val_idx);
        let val_y: Vec<usize> = val_idx.iter().map(|&i| y[i]).collect();
        if train_idx.is_empty() {
            return Err(Error::Empty("no samples left for MLP training".into()));
        }

        self.n_classes = n_classes;
        self.init_layers(x.ncols(), n_classes, &mut rng);
        let mut moments: Vec<Moments> = self
            .layers
            .iter()
            .map(|l| Moments {
                m_w: Array2::zeros(l.weights.raw_dim()),
                v_w: Array2::zeros(l.weights.raw_dim()),
                m_b: Array1::zeros(l.bias.len()),
                v_b: Array1::zeros(l.bias.len()),
            })
            .collect();

        let batch_size = self.params.batch_size.clamp(1, train_idx.len());
        info!(
            "Fitting MLP: {} -> {:?} -> {}, {} train / {} validation samples, batch {}",
            x.ncols(),
            self.params.hidden_layers,
            n_classes,
            train_idx.len(),
            n_val,
            batch_size
        );

        let mut shuffled = train_idx.clone();
        let mut step = 0;
        let mut best_score = f64::NEG_INFINITY;
        let mut best_layers = self.layers.clone();
        let mut no_improvement = 0;

        for epoch in 0..self.params.max_epochs {
            shuffled.shuffle(&mut rng);
            let mut total_loss = 0.0;
            let mut batches = 0;

            for batch in shuffled.chunks(batch_size) {
                step += 1;
                let batch_x = x.select(Axis(0), batch);
                let batch_y: Vec<usize> = batch.iter().map(|&i| y[i]).collect();
                total_loss += self.train_batch(&batch_x, &batch_y, &mut moments, step);
                batches += 1;
            }

            let avg_loss = total_loss / batches as f64;
            if n_val == 0 {
                if (epoch + 1) % 10 == 0 {
                    debug!("  Epoch {}/{}: Loss={:.4}", epoch + 1, self.params.max_epochs, avg_loss);
                }
                continue;
            }

            let score = self.accuracy_on(&val_x, &val_y);
            debug!(
                "  Epoch {}/{}: Loss={:.4}, Val Acc={:.2}%",
                epoch + 1,
                self.params.max_epochs,
                avg_loss,
                score * 100.0
            );
            if score > best_score + self.params.tol {
                no_improvement = 0;
            } else {
                no_improvement += 1;
            }
            if score > best_score {
                best_score = score;
                best_layers = self.layers.clone();
            }
            if no_improvement > self.params.n_iter_no_change {
                info!(
                    "Validation score did not improve for {} epochs; stopping at epoch {}",
                    self.params.n_iter_no_change,
                    epoch + 1
                );
                break;
            }
        }

        if n_val > 0 {
            self.layers = best_layers;
            info!("Best validation accuracy: {:.2}%", best_score * 100.0);
        }
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let first = self.layers.first().ok_or(Error::NotFitted("MLP"))?;
        check_width(first.weights.nrows(), x)?;
        let (_, proba) = self.forward(x);
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::blobs;
    use super::*;
    use ndarray::array;

    fn small_params() -> MlpParams {
        MlpParams {
            hidden_layers: vec![8],
            learning_rate: 0.01,
            max_epochs: 100,
            batch_size: 16,
            ..MlpParams::default()
        }
    }

    #[test]
    fn test_forward_softmax_rows_sum_to_one() {
        let mut mlp = Mlp::new(MlpParams {
            hidden_layers: vec![5],
            ..MlpParams::default()
        });
        let mut rng = StdRng::seed_from_u64(0);
        mlp.init_layers(10, 3, &mut rng);

        let (layer_inputs, output) = mlp.forward(&Array2::from_elem((4, 10), 0.5));
        assert_eq!(layer_inputs.len(), 2); // input + hidden
        assert_eq!(layer_inputs[1].dim(), (4, 5));
        assert_eq!(output.dim(), (4, 3));
        for row in output.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_learns_blobs() {
        let (x, y) = blobs(50, 4, 7);
        let mut mlp = Mlp::new(small_params());
        mlp.fit(&x, &y).unwrap();
        assert!(mlp.score(&x, &y).unwrap() > 0.95);
    }

    #[test]
    fn test_without_early_stopping() {
        let x = array![[0.0f32, 1.0], [1.0, 0.0], [0.1, 0.9], [0.9, 0.1]];
        let y = [0, 1, 0, 1];
        let mut mlp = Mlp::new(MlpParams {
            early_stopping: false,
            max_epochs: 300,
            ..small_params()
        });
        mlp.fit(&x, &y).unwrap();
        assert_eq!(mlp.predict(&x).unwrap(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_seed_reproduces_model() {
        let (x, y) = blobs(20, 3, 8);
        let mut a = Mlp::new(small_params());
        let mut b = Mlp::new(small_params());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_unfitted() {
        let mlp = Mlp::new(small_params());
        assert!(matches!(
            mlp.predict(&Array2::zeros((1, 2))),
            Err(Error::NotFitted(_))
        ));
        assert!(matches!(
            mlp.predict_proba(&Array2::zeros((1, 2))),
            Err(Error::NotFitted(_))
        ));
    }
}
