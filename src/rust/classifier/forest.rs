use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::ClassifierError;
use super::model::{Capability, SignModel};

/// Marker used in `children_left` / `children_right` for leaf nodes.
const TREE_LEAF: i64 = -1;

/// One decision tree in the parallel-array layout of scikit-learn's `tree_`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f32>,
    /// Per-node class counts (or weights), `[n_nodes][n_classes]`
    pub value: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestSpec {
    pub n_features_in: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    pub trees: Vec<TreeArrays>,
}

#[derive(Debug, Clone)]
enum Node {
    Split { feature: usize, threshold: f32, left: usize, right: usize },
    Leaf { probabilities: Array1<f32> },
}

#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn from_arrays(
        index: usize,
        arrays: &TreeArrays,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, ClassifierError> {
        let invalid = |msg: String| ClassifierError::LoadError(format!("Tree {}: {}", index, msg));

        let n_nodes = arrays.children_left.len();
        if n_nodes == 0 {
            return Err(invalid("tree has no nodes".into()));
        }
        if [
            arrays.children_right.len(),
            arrays.feature.len(),
            arrays.threshold.len(),
            arrays.value.len(),
        ]
        .iter()
        .any(|&len| len != n_nodes)
        {
            return Err(invalid("node arrays have different lengths".into()));
        }

        let mut nodes = Vec::with_capacity(n_nodes);
        for i in 0..n_nodes {
            let (left, right) = (arrays.children_left[i], arrays.children_right[i]);
            if left == TREE_LEAF {
                let counts = &arrays.value[i];
                if counts.len() != n_classes {
                    return Err(invalid(format!(
                        "leaf {} has {} class values, expected {}",
                        i,
                        counts.len(),
                        n_classes
                    )));
                }
                nodes.push(Node::Leaf { probabilities: normalize_counts(counts) });
                continue;
            }

            // Children always come after their parent, which also rules out cycles
            let child = |c: i64| usize::try_from(c).ok().filter(|&c| c > i && c < n_nodes);
            let (Some(left), Some(right)) = (child(left), child(right)) else {
                return Err(invalid(format!("node {} has invalid children", i)));
            };
            let feature = usize::try_from(arrays.feature[i])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| invalid(format!("node {} splits on invalid feature", i)))?;

            nodes.push(Node::Split { feature, threshold: arrays.threshold[i], left, right });
        }
        Ok(Self { nodes })
    }

    fn leaf_for(&self, row: ArrayView1<'_, f32>) -> &Array1<f32> {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { probabilities } => return probabilities,
                Node::Split { feature, threshold, left, right } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn normalize_counts(counts: &[f32]) -> Array1<f32> {
    let total: f32 = counts.iter().sum();
    if total > 0.0 {
        Array1::from_iter(counts.iter().map(|c| c / total))
    } else {
        Array1::from_elem(counts.len(), 1.0 / counts.len() as f32)
    }
}

/// An ensemble of decision trees whose probabilities are averaged.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
    max_depth: Option<usize>,
}

impl RandomForest {
    pub fn from_spec(spec: &ForestSpec) -> Result<Self, ClassifierError> {
        let first = spec
            .trees
            .first()
            .ok_or_else(|| ClassifierError::LoadError("Random forest has no trees".into()))?;
        let n_classes = first.value.first().map(Vec::len).unwrap_or(0);
        if n_classes == 0 {
            return Err(ClassifierError::LoadError("Random forest has no classes".into()));
        }

        let trees = spec
            .trees
            .iter()
            .enumerate()
            .map(|(i, arrays)| DecisionTree::from_arrays(i, arrays, spec.n_features_in, n_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { trees, n_features: spec.n_features_in, n_classes, max_depth: spec.max_depth })
    }
}

impl SignModel for RandomForest {
    fn model_type(&self) -> &str {
        "RandomForestClassifier"
    }

    fn capability(&self) -> Capability {
        Capability::Probabilities
    }

    fn predict_probabilities(&self, row: ArrayView2<'_, f32>) -> Result<Array1<f32>, ClassifierError> {
        if row.ncols() != self.n_features || row.nrows() != 1 {
            return Err(ClassifierError::PredictionError(format!(
                "Random forest expects a [1, {}] row, got {:?}",
                self.n_features,
                row.shape()
            )));
        }
        let row = row.row(0);
        let mut sum = Array1::<f32>::zeros(self.n_classes);
        for tree in &self.trees {
            sum += tree.leaf_for(row);
        }
        Ok(sum / self.trees.len() as f32)
    }

    fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("n_estimators".into(), json!(self.trees.len()));
        details.insert("n_features_in".into(), json!(self.n_features));
        details.insert("max_depth".into(), json!(self.max_depth));
        details
    }
}
