//! Exact path-dependent TreeSHAP (Lundberg et al., 2020).
//!
//! For each tree the recursion keeps the set of unique features on the path
//! from the root, together with the fraction of "zero" paths (feature absent,
//! follow cover proportions) and "one" paths (feature present, follow the
//! row) that flow through each of them.

use ndarray::{Array2, ArrayView1};

use crate::models::ensemble::{EnsembleMember, OutputRoute};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64;
        } else if zero_fraction != 0.0 {
            total += path[i].weight / (zero_fraction * (depth - i) as f64);
        }
    }
    total * (depth + 1) as f64
}

/// Add one member tree's attributions for `row` into `phi`
/// (shape `(n_features, n_outputs)`).
pub(crate) fn accumulate_tree(member: &EnsembleMember<'_>, row: ArrayView1<f64>, phi: &mut Array2<f64>) {
    if member.tree.nodes().is_empty() {
        return;
    }
    let mut walker = Walker { member, row, phi };
    walker.recurse(0, Vec::new(), 1.0, 1.0, None);
}

struct Walker<'a, 'r, 'p> {
    member: &'a EnsembleMember<'a>,
    row: ArrayView1<'r, f64>,
    phi: &'p mut Array2<f64>,
}

impl Walker<'_, '_, '_> {
    fn recurse(
        &mut self,
        node_id: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend(&mut path, zero_fraction, one_fraction, feature);
        let member = self.member;
        let nodes = member.tree.nodes();
        let node = &nodes[node_id];

        let Some(split) = &node.split else {
            for i in 1..path.len() {
                let element = path[i];
                let Some(f) = element.feature else { continue };
                let contribution = unwound_sum(&path, i)
                    * (element.one_fraction - element.zero_fraction)
                    * member.scale;
                match member.output {
                    OutputRoute::All => {
                        for (o, v) in node.value.iter().enumerate() {
                            self.phi[[f, o]] += contribution * v;
                        }
                    }
                    OutputRoute::Single(k) => {
                        self.phi[[f, k]] += contribution * node.value[0];
                    }
                }
            }
            return;
        };

        let (hot, cold) = if self.row[split.feature] <= split.threshold {
            (split.left, split.right)
        } else {
            (split.right, split.left)
        };

        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(k) = path.iter().position(|e| e.feature == Some(split.feature)) {
            incoming_zero = path[k].zero_fraction;
            incoming_one = path[k].one_fraction;
            unwind(&mut path, k);
        }

        let hot_zero = nodes[hot].cover / node.cover;
        let cold_zero = nodes[cold].cover / node.cover;
        self.recurse(
            hot,
            path.clone(),
            hot_zero * incoming_zero,
            incoming_one,
            Some(split.feature),
        );
        self.recurse(cold, path, cold_zero * incoming_zero, 0.0, Some(split.feature));
    }
}
