//! Random forest of Gini CART trees.
//!
//! Each tree is grown on a bootstrap sample, considering `max_features`
//! randomly chosen features at every split. Trees are fit in parallel on a
//! dedicated rayon pool of `n_jobs` threads and kept in tree-index order, so
//! a fixed seed gives the same forest regardless of scheduling.

use super::{check_training_set, check_width, Classifier};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub max_features: usize,
    pub n_jobs: usize,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        RandomForestParams {
            n_estimators: 100,
            max_depth: 100,
            max_features: 100,
            n_jobs: 8,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        proba: Vec<f32>,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f32>,
    y: &'a [usize],
    n_classes: usize,
    max_depth: usize,
    max_features: usize,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|&c| (c / total) * (c / total)).sum::<f64>()
}

impl<'a> TreeBuilder<'a> {
    fn class_counts(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1.0;
        }
        counts
    }

    fn leaf(&mut self, counts: &[f64]) -> usize {
        let total: f64 = counts.iter().sum();
        let proba = counts.iter().map(|&c| (c / total) as f32).collect();
        self.nodes.push(Node::Leaf { proba });
        self.nodes.len() - 1
    }

    fn build(&mut self, samples: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.class_counts(samples);
        let total = samples.len() as f64;
        let impurity = gini(&counts, total);

        if depth >= self.max_depth || samples.len() < 2 || impurity == 0.0 {
            return self.leaf(&counts);
        }

        let best = match self.best_split(samples, &counts, rng) {
            Some(best) if best.impurity < impurity * total - 1e-12 => best,
            _ => return self.leaf(&counts),
        };

        // Partition samples in place: left = feature value <= threshold
        let mut boundary = 0;
        for i in 0..samples.len() {
            if self.x[[samples[i], best.feature]] <= best.threshold {
                samples.swap(i, boundary);
                boundary += 1;
            }
        }

        let node = self.nodes.len();
        self.nodes.push(Node::Leaf { proba: Vec::new() });
        let (left_samples, right_samples) = samples.split_at_mut(boundary);
        let left = self.build(left_samples, depth + 1, rng);
        let right = self.build(right_samples, depth + 1, rng);
        self.nodes[node] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node
    }

    /// Best split among `max_features` random features, scored by weighted
    /// Gini impurity (`n_left * gini_left + n_right * gini_right`).
    fn best_split(&self, samples: &[usize], counts: &[f64], rng: &mut StdRng) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let candidates = sample(rng, n_features, self.max_features.min(n_features));
        let mut best: Option<BestSplit> = None;
        let mut column: Vec<(f32, usize)> = Vec::with_capacity(samples.len());

        for feature in candidates.iter() {
            column.clear();
            column.extend(samples.iter().map(|&s| (self.x[[s, feature]], self.y[s])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0.0; self.n_classes];
            let mut right = counts.to_vec();
            let total = column.len() as f64;

            for i in 0..column.len() - 1 {
                let (value, label) = column[i];
                left[label] += 1.0;
                right[label] -= 1.0;

                let next = column[i + 1].0;
                if value >= next {
                    continue;
                }

                let n_left = (i + 1) as f64;
                let n_right = total - n_left;
                let weighted = n_left * gini(&left, n_left) + n_right * gini(&right, n_right);
                if best.as_ref().map_or(true, |b| weighted < b.impurity) {
                    let mid = value + (next - value) / 2.0;
                    let threshold = if mid >= next { value } else { mid };
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity: weighted,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    fn fit(
        x: &Array2<f32>,
        y: &[usize],
        n_classes: usize,
        params: &RandomForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let n = x.nrows();
        let mut samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let mut builder = TreeBuilder {
            x,
            y,
            n_classes,
            max_depth: params.max_depth.max(1),
            max_features: params.max_features.max(1),
            nodes: Vec::new(),
        };
        builder.build(&mut samples, 0, rng);
        DecisionTree {
            nodes: builder.nodes,
        }
    }

    fn leaf_proba(&self, row: ArrayView1<f32>) -> &[f32] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: RandomForestParams,
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    pub fn new(params: RandomForestParams) -> Self {
        RandomForest {
            params,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize]) -> Result<()> {
        let n_classes = check_training_set(x, y)?;
        let params = &self.params;
        info!(
            "Fitting random forest: {} trees, max_depth={}, max_features={}, n_jobs={}",
            params.n_estimators, params.max_depth, params.max_features, params.n_jobs
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.n_jobs.max(1))
            .build()
            .map_err(|e| Error::Training(e.to_string()))?;

        let trees: Vec<DecisionTree> = pool.install(|| {
            (0..params.n_estimators)
                .into_par_iter()
                .map(|i| {
                    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                    DecisionTree::fit(x, y, n_classes, params, &mut rng)
                })
                .collect()
        });

        let total_nodes: usize = trees.iter().map(DecisionTree::node_count).sum();
        debug!("Forest built with {} nodes", total_nodes);

        self.trees = trees;
        self.n_classes = n_classes;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted("random forest"));
        }
        check_width(self.n_features, x)?;

        let mut proba = Array2::<f32>::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            for tree in &self.trees {
                for (o, &p) in out.iter_mut().zip(tree.leaf_proba(row)) {
                    *o += p;
                }
            }
        }
        let n_trees = self.trees.len() as f32;
        proba.mapv_inplace(|p| p / n_trees);
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::blobs;
    use super::*;
    use ndarray::array;

    fn params(n_estimators: usize) -> RandomForestParams {
        RandomForestParams {
            n_estimators,
            n_jobs: 2,
            ..RandomForestParams::default()
        }
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[5.0, 0.0], 5.0), 0.0);
        assert!((gini(&[2.0, 2.0], 4.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_tree_splits_threshold() {
        let x = array![[1.0f32], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let mut builder = TreeBuilder {
            x: &x,
            y: &y,
            n_classes: 2,
            max_depth: 10,
            max_features: 1,
            nodes: Vec::new(),
        };
        let mut samples: Vec<usize> = (0..6).collect();
        builder.build(&mut samples, 0, &mut rng);
        let tree = DecisionTree {
            nodes: builder.nodes,
        };

        assert_eq!(tree.node_count(), 3);
        match &tree.nodes[0] {
            Node::Split { threshold, .. } => assert_eq!(*threshold, 6.5),
            other => panic!("expected split, got {other:?}"),
        }
        assert_eq!(tree.leaf_proba(array![2.5f32].view()), &[1.0, 0.0]);
        assert_eq!(tree.leaf_proba(array![7.0f32].view()), &[0.0, 1.0]);
    }

    #[test]
    fn test_forest_separates_blobs() {
        let (x, y) = blobs(40, 4, 1);
        let mut forest = RandomForest::new(params(15));
        forest.fit(&x, &y).unwrap();

        assert!(forest.score(&x, &y).unwrap() > 0.95);
        let proba = forest.predict_proba(&x).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_seed_reproduces_forest() {
        let (x, y) = blobs(30, 3, 2);
        let mut a = RandomForest::new(params(8));
        let mut b = RandomForest::new(RandomForestParams {
            n_jobs: 1,
            ..params(8)
        });
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_unfitted_and_wrong_width() {
        let forest = RandomForest::new(params(3));
        let x = Array2::<f32>::zeros((2, 3));
        assert!(matches!(forest.predict(&x), Err(Error::NotFitted(_))));

        let (train_x, train_y) = blobs(10, 3, 3);
        let mut forest = RandomForest::new(params(3));
        forest.fit(&train_x, &train_y).unwrap();
        assert!(matches!(
            forest.predict(&Array2::zeros((1, 4))),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
