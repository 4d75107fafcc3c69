//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap sample drawn from a `ChaCha8Rng` seeded
//! with `seed + tree_index`, so a fixed seed reproduces the forest exactly.
//! Splits minimise the summed squared error of the two children.

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Regressor, check_training_set, training_error};
use crate::domain::error::LagcastError;

#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` uses all of them.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    position: usize,
    sorted: Vec<usize>,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    config: &'a ForestConfig,
    n_features: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let mean = sum / n as f64;

        let min_leaf = self.config.min_samples_leaf.max(1);
        let constant = indices.iter().all(|&i| self.y[i] == self.y[indices[0]]);
        if depth >= self.config.max_depth
            || n < self.config.min_samples_split.max(2)
            || n < 2 * min_leaf
            || constant
        {
            return Node::Leaf { value: mean };
        }

        match self.best_split(indices, sum, min_leaf, rng) {
            Some(split) => {
                let (left_idx, right_idx) = split.sorted.split_at(split.position);
                let left = self.build(left_idx, depth + 1, rng);
                let right = self.build(right_idx, depth + 1, rng);
                Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => Node::Leaf { value: mean },
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.config.max_features {
            Some(k) if k > 0 && k < self.n_features => {
                let mut features = sample(rng, self.n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split(
        &self,
        indices: &[usize],
        total: f64,
        min_leaf: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let n = indices.len();
        // Maximising sum_l²/n_l + sum_r²/n_r minimises the children's SSE.
        let parent_score = total * total / n as f64;
        let mut best_score = parent_score;
        let mut best: Option<BestSplit> = None;

        for feature in self.candidate_features(rng) {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            let mut found: Option<(f64, usize)> = None;
            for k in 1..n {
                left_sum += self.y[sorted[k - 1]];
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[sorted[k - 1]][feature];
                let hi = self.x[sorted[k]][feature];
                if lo == hi {
                    continue;
                }
                let right_sum = total - left_sum;
                let score =
                    left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
                if score > best_score && found.is_none_or(|(s, _)| score > s) {
                    found = Some((score, k));
                }
            }

            if let Some((score, k)) = found {
                let lo = self.x[sorted[k - 1]][feature];
                let hi = self.x[sorted[k]][feature];
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best_score = score;
                best = Some(BestSplit {
                    feature,
                    threshold,
                    position: k,
                    sorted,
                });
            }
        }

        best
    }
}

#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    trees: Vec<Node>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(config: ForestConfig) -> Self {
        RandomForestRegressor {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(Node::depth).max().unwrap_or(0)
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), LagcastError> {
        let n_features = check_training_set(x, y)?;
        if self.config.n_trees == 0 {
            return Err(training_error("forest needs at least one tree"));
        }

        let builder = TreeBuilder {
            x,
            y,
            config: &self.config,
            n_features,
        };
        let n = x.len();

        self.trees = (0..self.config.n_trees)
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if self.config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                builder.build(&indices, 0, &mut rng)
            })
            .collect();
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, LagcastError> {
        if self.trees.is_empty() {
            return Err(training_error("random forest has not been fitted"));
        }
        x.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(training_error(format!(
                        "expected {} features, got {}",
                        self.n_features,
                        row.len()
                    )));
                }
                let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
                Ok(total / self.trees.len() as f64)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { 5.0 }).collect();
        (x, y)
    }

    #[test]
    fn single_tree_learns_step() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 1,
            bootstrap: false,
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();

        let preds = forest.predict(&[vec![3.0], vec![35.0]]).unwrap();
        assert_eq!(preds, vec![1.0, 5.0]);
        assert_eq!(forest.max_tree_depth(), 2);
    }

    #[test]
    fn forest_is_deterministic_for_seed() {
        let (x, y) = step_data();
        let config = ForestConfig {
            n_trees: 15,
            max_depth: 4,
            seed: 7,
            ..Default::default()
        };
        let mut a = RandomForestRegressor::new(config.clone());
        let mut b = RandomForestRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let points: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 + 0.5]).collect();
        let pa = a.predict(&points).unwrap();
        let pb = b.predict(&points).unwrap();
        assert_eq!(
            pa.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            pb.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
        assert_eq!(a.n_trees(), 15);
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 10,
            max_features: Some(1),
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();
        for p in forest.predict(&[vec![-50.0, 0.0], vec![500.0, 6.0]]).unwrap() {
            assert!((100.0..=129.0).contains(&p));
        }
    }

    #[test]
    fn constant_target_gives_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![4.0, 4.0, 4.0];
        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 3,
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.predict_one(&[10.0]).unwrap(), 4.0);
        assert_eq!(forest.max_tree_depth(), 1);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 1,
            bootstrap: false,
            min_samples_leaf: 25,
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();
        // no split can leave 25 rows on both sides of 40
        assert_eq!(forest.max_tree_depth(), 1);
    }

    #[test]
    fn predict_before_fit_fails() {
        let forest = RandomForestRegressor::new(ForestConfig::default());
        assert!(forest.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn wrong_width_fails() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 2,
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();
        assert!(forest.predict(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn zero_trees_fails() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_trees: 0,
            ..Default::default()
        });
        assert!(forest.fit(&x, &y).is_err());
    }
}
