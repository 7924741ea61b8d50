//! Latent semantic indexing encoder.
//!
//! Comments are turned into TF-IDF rows, then projected onto the top
//! `num_topics` right singular vectors of the training TF-IDF matrix. The
//! truncated SVD is computed with seeded randomized subspace iteration, so the
//! same training texts always yield the same projection.

use super::tfidf::{SparseRow, TfidfVectorizer};
use super::Encoder;
use crate::error::{Error, Result};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MODEL_FILE: &str = "lsi_model.json";
const OVERSAMPLES: usize = 10;
const POWER_ITERATIONS: usize = 4;
const SVD_SEED: u64 = 0x15A;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsiEncoder {
    tfidf: TfidfVectorizer,
    num_topics: usize,
    /// `vocab x num_topics` projection; columns beyond the matrix rank are zero.
    projection: Option<Array2<f32>>,
    /// Singular values of the kept topics, largest first.
    singular_values: Vec<f32>,
}

impl LsiEncoder {
    pub fn new(keep_n: usize, num_topics: usize) -> Self {
        LsiEncoder {
            tfidf: TfidfVectorizer::new(keep_n),
            num_topics,
            projection: None,
            singular_values: Vec::new(),
        }
    }

    pub fn model_path(dir: &Path) -> PathBuf {
        dir.join(MODEL_FILE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Whether this model was built with the given dictionary size and topic count.
    pub fn has_shape(&self, keep_n: usize, num_topics: usize) -> bool {
        self.tfidf.max_features == keep_n && self.num_topics == num_topics
    }

    fn tfidf_rows(&self, texts: &[String]) -> Vec<SparseRow> {
        texts.iter().map(|t| self.tfidf.transform(t)).collect()
    }
}

impl Encoder for LsiEncoder {
    fn name(&self) -> &'static str {
        "LSI"
    }

    fn dim(&self) -> usize {
        self.num_topics
    }

    fn is_fitted(&self) -> bool {
        self.projection.is_some()
    }

    fn fit(&mut self, texts: &[String]) -> Result<()> {
        if texts.is_empty() {
            return Err(Error::Empty("no texts to fit the LSI encoder on".into()));
        }
        self.tfidf.fit(texts);
        let vocab = self.tfidf.num_features();
        if vocab == 0 {
            return Err(Error::Encoding(
                "LSI dictionary is empty after filtering tokens".into(),
            ));
        }
        info!("LSI dictionary: {} tokens", vocab);

        let rows = self.tfidf_rows(texts);
        let (v, sigma) = truncated_svd(&rows, vocab, self.num_topics, SVD_SEED);
        debug!(
            "LSI kept {} of {} topics, top singular value {:.4}",
            sigma.len(),
            self.num_topics,
            sigma.first().copied().unwrap_or(0.0)
        );

        let mut projection = Array2::<f32>::zeros((vocab, self.num_topics));
        projection.slice_mut(s![.., ..v.ncols()]).assign(&v);
        self.projection = Some(projection);
        self.singular_values = sigma;
        Ok(())
    }

    fn encode(&self, texts: &[String]) -> Result<Array2<f32>> {
        let projection = self.projection.as_ref().ok_or(Error::NotFitted("LSI encoder"))?;
        let rows = self.tfidf_rows(texts);
        Ok(sparse_dot(&rows, projection))
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::model_path(dir);
        let json = serde_json::to_string(self)?;
        std::fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
        info!("LSI model saved to {}", path.display());
        Ok(())
    }
}

/// Sparse rows times dense matrix: `(n x d) * (d x k) -> n x k`.
fn sparse_dot(rows: &[SparseRow], dense: &Array2<f32>) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((rows.len(), dense.ncols()));
    for (i, row) in rows.iter().enumerate() {
        let mut target = out.row_mut(i);
        for &(j, value) in row {
            target.scaled_add(value, &dense.row(j));
        }
    }
    out
}

/// Transposed sparse rows times dense matrix: `(n x d)^T * (n x k) -> d x k`.
fn sparse_t_dot(rows: &[SparseRow], dim: usize, dense: &Array2<f32>) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((dim, dense.ncols()));
    for (i, row) in rows.iter().enumerate() {
        let source = dense.row(i);
        for &(j, value) in row {
            out.row_mut(j).scaled_add(value, &source);
        }
    }
    out
}

/// Orthonormalize the columns of `m` in place (modified Gram-Schmidt).
/// Columns that collapse to zero stay zero.
fn orthonormalize(m: &mut Array2<f32>) {
    for j in 0..m.ncols() {
        for k in 0..j {
            let prev = m.column(k).to_owned();
            let proj = m.column(j).dot(&prev);
            m.column_mut(j).scaled_add(-proj, &prev);
        }
        let norm = m.column(j).dot(&m.column(j)).sqrt();
        if norm > 1e-8 {
            m.column_mut(j).mapv_inplace(|x| x / norm);
        } else {
            m.column_mut(j).fill(0.0);
        }
    }
}

/// Eigen-decomposition of a symmetric matrix with cyclic Jacobi rotations.
/// Returns eigenvalues (descending) and matching eigenvectors as columns.
fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut a = a.clone();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        if off < 1e-22 {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let values = Array1::from_iter(order.iter().map(|&i| a[[i, i]]));
    let vectors = v.select(Axis(1), &order);
    (values, vectors)
}

/// Flip a singular vector so its largest-magnitude entry is positive.
fn canonical_sign(column: ArrayView1<f32>) -> f32 {
    let pivot = column
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Top right singular vectors (`dim x r`) and singular values of the sparse
/// `rows.len() x dim` matrix, with `r <= k` bounded by the numerical rank.
fn truncated_svd(rows: &[SparseRow], dim: usize, k: usize, seed: u64) -> (Array2<f32>, Vec<f32>) {
    let n = rows.len();
    let l = (k + OVERSAMPLES).min(n).min(dim);
    if l == 0 {
        return (Array2::zeros((dim, 0)), Vec::new());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let omega = Array2::from_shape_fn((dim, l), |_| rng.gen_range(-1.0f32..1.0));

    // Range finder on A: Q spans the dominant column space
    let mut q = sparse_dot(rows, &omega);
    orthonormalize(&mut q);
    for _ in 0..POWER_ITERATIONS {
        let mut z = sparse_t_dot(rows, dim, &q);
        orthonormalize(&mut z);
        q = sparse_dot(rows, &z);
        orthonormalize(&mut q);
    }

    // B = Q^T A  (l x dim), stored transposed as dim x l
    let bt = sparse_t_dot(rows, dim, &q);
    let b64 = bt.mapv(f64::from);
    let gram = b64.t().dot(&b64);
    let (eigenvalues, eigenvectors) = symmetric_eigen(&gram);

    let mut vectors = Vec::new();
    let mut sigma = Vec::new();
    let top = eigenvalues.get(0).copied().unwrap_or(0.0).max(0.0).sqrt();
    for (idx, &lambda) in eigenvalues.iter().enumerate().take(k) {
        let s = lambda.max(0.0).sqrt();
        if s <= top * 1e-4 || s == 0.0 {
            break;
        }
        // v = B^T u / sigma
        let v = b64.dot(&eigenvectors.column(idx)).mapv(|x| (x / s) as f32);
        let sign = canonical_sign(v.view());
        vectors.push(v.mapv(|x| x * sign));
        sigma.push(s as f32);
    }

    let mut v = Array2::<f32>::zeros((dim, vectors.len()));
    for (j, column) in vectors.iter().enumerate() {
        v.column_mut(j).assign(column);
    }
    (v, sigma)
}
