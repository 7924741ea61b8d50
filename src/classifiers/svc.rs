//! Binary support vector classifier with an RBF kernel.
//!
//! Trained with SMO using second-order working set selection. Probabilities
//! come from a Platt sigmoid fitted on the training decision values.

use super::{check_training_set, check_width, Classifier};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, info, warn};

const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvcParams {
    /// Regularization strength
    pub c: f64,
    /// RBF width; `None` means `1 / n_features`
    pub gamma: Option<f64>,
    /// Stopping tolerance on the maximal KKT violation
    pub tol: f64,
    pub max_iter: usize,
    /// Kernel row cache budget in megabytes
    pub cache_mb: usize,
}

impl Default for SvcParams {
    fn default() -> Self {
        SvcParams {
            c: 1.0,
            gamma: None,
            tol: 1e-3,
            max_iter: 100_000,
            cache_mb: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Svc {
    params: SvcParams,
    gamma: f64,
    support_vectors: Option<Array2<f32>>,
    /// `alpha_i * y_i` for each support vector
    dual_coef: Vec<f64>,
    rho: f64,
    /// Platt sigmoid `P(y=1|f) = 1 / (1 + exp(a f + b))`
    prob_a: f64,
    prob_b: f64,
}

fn rbf(gamma: f64, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f64 {
    let dist: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = (p - q) as f64;
            d * d
        })
        .sum();
    (-gamma * dist).exp()
}

/// Kernel rows computed on demand with FIFO eviction.
struct KernelCache<'a> {
    x: &'a Array2<f32>,
    gamma: f64,
    rows: HashMap<usize, Rc<Vec<f64>>>,
    order: VecDeque<usize>,
    capacity: usize,
}

impl<'a> KernelCache<'a> {
    fn new(x: &'a Array2<f32>, gamma: f64, cache_mb: usize) -> Self {
        let row_bytes = x.nrows().max(1) * std::mem::size_of::<f64>();
        let capacity = (cache_mb * 1024 * 1024 / row_bytes).max(2);
        KernelCache {
            x,
            gamma,
            rows: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn row(&mut self, i: usize) -> Rc<Vec<f64>> {
        if let Some(row) = self.rows.get(&i) {
            return Rc::clone(row);
        }
        let xi = self.x.row(i);
        let row: Rc<Vec<f64>> = Rc::new(
            self.x
                .axis_iter(Axis(0))
                .map(|xj| rbf(self.gamma, xi, xj))
                .collect(),
        );
        if self.order.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.rows.remove(&old);
            }
        }
        self.order.push_back(i);
        self.rows.insert(i, Rc::clone(&row));
        row
    }
}

struct Solution {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
}

fn solve_smo(cache: &mut KernelCache, y: &[f64], c: f64, tol: f64, max_iter: usize) -> Solution {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    let mut grad = vec![-1.0; n];
    // RBF kernel diagonal is always 1
    let qd = 1.0;

    let is_upper = |a: f64| a >= c;
    let is_lower = |a: f64| a <= 0.0;

    let mut iterations = 0;
    while iterations < max_iter {
        // Select i: maximal violator in I_up
        let mut gmax = f64::NEG_INFINITY;
        let mut i_idx = None;
        for t in 0..n {
            let up = if y[t] > 0.0 {
                !is_upper(alpha[t])
            } else {
                !is_lower(alpha[t])
            };
            if up && -y[t] * grad[t] >= gmax {
                gmax = -y[t] * grad[t];
                i_idx = Some(t);
            }
        }
        let Some(i) = i_idx else { break };
        let k_i = cache.row(i);

        // Select j: second-order gain over I_low
        let mut gmax2 = f64::NEG_INFINITY;
        let mut obj_min = f64::INFINITY;
        let mut j_idx = None;
        for t in 0..n {
            let low = if y[t] > 0.0 {
                !is_lower(alpha[t])
            } else {
                !is_upper(alpha[t])
            };
            if !low {
                continue;
            }
            let value = y[t] * grad[t];
            gmax2 = gmax2.max(value);
            let grad_diff = gmax + value;
            if grad_diff > 0.0 {
                let quad = (qd + qd - 2.0 * k_i[t]).max(TAU);
                let obj = -(grad_diff * grad_diff) / quad;
                if obj <= obj_min {
                    obj_min = obj;
                    j_idx = Some(t);
                }
            }
        }

        let Some(j) = j_idx else { break };
        if gmax + gmax2 < tol {
            break;
        }
        let k_j = cache.row(j);

        let (old_i, old_j) = (alpha[i], alpha[j]);
        let quad = (qd + qd - 2.0 * k_i[j]).max(TAU);
        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let d_i = alpha[i] - old_i;
        let d_j = alpha[j] - old_j;
        for t in 0..n {
            grad[t] += y[t] * (y[i] * k_i[t] * d_i + y[j] * k_j[t] * d_j);
        }
        iterations += 1;
    }

    // Bias from free vectors, or the midpoint of the feasible interval
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut sum_free = 0.0;
    let mut n_free = 0usize;
    for t in 0..n {
        let yg = y[t] * grad[t];
        if is_upper(alpha[t]) {
            if y[t] < 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else if is_lower(alpha[t]) {
            if y[t] > 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else {
            n_free += 1;
            sum_free += yg;
        }
    }
    let rho = if n_free > 0 {
        sum_free / n_free as f64
    } else {
        (ub + lb) / 2.0
    };

    Solution {
        alpha,
        rho,
        iterations,
    }
}

fn sigmoid_loss(dec: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    dec.iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let fapb = f * a + b;
            if fapb >= 0.0 {
                t * fapb + (1.0 + (-fapb).exp()).ln()
            } else {
                (t - 1.0) * fapb + (1.0 + fapb.exp()).ln()
            }
        })
        .sum()
}

/// Fit Platt's sigmoid with Newton's method and backtracking line search.
fn fit_platt(dec: &[f64], labels: &[f64]) -> (f64, f64) {
    let prior1 = labels.iter().filter(|&&l| l > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&l| if l > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = sigmoid_loss(dec, &targets, a, b);

    for _ in 0..100 {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (1e-12, 1e-12, 0.0, 0.0, 0.0);
        for (&f, &t) in dec.iter().zip(&targets) {
            let fapb = f * a + b;
            let (p, q) = if fapb >= 0.0 {
                let e = (-fapb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fapb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= 1e-10 {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = sigmoid_loss(dec, &targets, new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < 1e-10 {
            debug!("Platt line search failed to improve");
            break;
        }
    }
    (a, b)
}

fn platt_probability(f: f64, a: f64, b: f64) -> f64 {
    let fapb = f * a + b;
    if fapb >= 0.0 {
        (-fapb).exp() / (1.0 + (-fapb).exp())
    } else {
        1.0 / (1.0 + fapb.exp())
    }
}

impl Svc {
    pub fn new(params: SvcParams) -> Self {
        Svc {
            params,
            gamma: 0.0,
            support_vectors: None,
            dual_coef: Vec::new(),
            rho: 0.0,
            prob_a: 0.0,
            prob_b: 0.0,
        }
    }

    pub fn n_support(&self) -> usize {
        self.dual_coef.len()
    }

    /// Signed distance to the separating surface; positive means `removed`.
    pub fn decision_function(&self, x: &Array2<f32>) -> Result<Array1<f64>> {
        let sv = self.support_vectors.as_ref().ok_or(Error::NotFitted("SVC"))?;
        check_width(sv.ncols(), x)?;
        Ok(x.axis_iter(Axis(0))
            .map(|row| {
                sv.axis_iter(Axis(0))
                    .zip(&self.dual_coef)
                    .map(|(s, &coef)| coef * rbf(self.gamma, s, row))
                    .sum::<f64>()
                    - self.rho
            })
            .collect())
    }
}

impl Classifier for Svc {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize]) -> Result<()> {
        let n_classes = check_training_set(x, y)?;
        if n_classes != 2 {
            return Err(Error::InvalidInput(format!(
                "SVC is binary, got {} classes",
                n_classes
            )));
        }
        if y.iter().all(|&l| l == y[0]) {
            return Err(Error::InvalidInput(
                "SVC needs samples from both classes".into(),
            ));
        }

        self.gamma = self.params.gamma.unwrap_or(1.0 / x.ncols() as f64);
        info!(
            "Fitting SVC: rbf kernel, C={}, gamma={:.6}",
            self.params.c, self.gamma
        );

        let signs: Vec<f64> = y.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();
        let mut cache = KernelCache::new(x, self.gamma, self.params.cache_mb);
        let solution = solve_smo(
            &mut cache,
            &signs,
            self.params.c,
            self.params.tol,
            self.params.max_iter,
        );
        if solution.iterations >= self.params.max_iter {
            warn!(
                "SVC stopped after {} iterations without converging",
                solution.iterations
            );
        }

        let support: Vec<usize> = (0..signs.len())
            .filter(|&i| solution.alpha[i] > 0.0)
            .collect();
        info!(
            "SVC converged in {} iterations with {} support vectors",
            solution.iterations,
            support.len()
        );

        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = support
            .iter()
            .map(|&i| solution.alpha[i] * signs[i])
            .collect();
        self.rho = solution.rho;

        let dec = self.decision_function(x)?.to_vec();
        let (a, b) = fit_platt(&dec, &signs);
        self.prob_a = a;
        self.prob_b = b;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let dec = self.decision_function(x)?;
        let mut proba = Array2::<f32>::zeros((x.nrows(), 2));
        for (i, &f) in dec.iter().enumerate() {
            let p = platt_probability(f, self.prob_a, self.prob_b) as f32;
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        let dec = self.decision_function(x)?;
        Ok(dec.iter().map(|&f| usize::from(f > 0.0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::blobs;
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rbf_kernel() {
        let a = array![0.0f32, 0.0];
        let b = array![1.0f32, 1.0];
        assert!((rbf(0.5, a.view(), a.view()) - 1.0).abs() < 1e-12);
        assert!((rbf(0.5, a.view(), b.view()) - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_separates_blobs() {
        let (x, y) = blobs(30, 2, 4);
        let mut svc = Svc::new(SvcParams::default());
        svc.fit(&x, &y).unwrap();

        assert!(svc.n_support() > 0);
        assert_eq!(svc.score(&x, &y).unwrap(), 1.0);

        let proba = svc.predict_proba(&x).unwrap();
        for (row, &label) in proba.axis_iter(Axis(0)).zip(&y) {
            assert!((row.sum() - 1.0).abs() < 1e-5);
            assert!(row[label] > 0.5);
        }
    }

    #[test]
    fn test_xor_needs_nonlinear_kernel() {
        let x = array![[0.0f32, 0.0], [1.0, 1.0], [0.0, 1.0], [1.0, 0.0]];
        let y = [0, 0, 1, 1];
        let mut svc = Svc::new(SvcParams {
            c: 10.0,
            gamma: Some(2.0),
            ..SvcParams::default()
        });
        svc.fit(&x, &y).unwrap();
        assert_eq!(svc.predict(&x).unwrap(), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let x = Array2::<f32>::zeros((3, 2));
        let mut svc = Svc::new(SvcParams::default());
        assert!(matches!(svc.fit(&x, &[1, 1, 1]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_platt_is_monotonic() {
        let dec = [-2.0, -1.0, -0.5, 0.5, 1.0, 2.0];
        let labels = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        let (a, b) = fit_platt(&dec, &labels);
        assert!(a < 0.0);
        assert!(platt_probability(2.0, a, b) > platt_probability(-2.0, a, b));
    }
}
