use ndarray::{Array2, ArrayView1};

/// In-place row-wise softmax over raw margins.
pub fn softmax_rows(z: &mut Array2<f64>) {
    for mut row in z.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

/// Index of the largest entry; ties resolve to the lowest index.
pub fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

pub fn argmax_rows(p: &Array2<f64>) -> Vec<usize> {
    p.rows().into_iter().map(argmax).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn softmax_rows_sum_to_one() {
        let mut z = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 0.0]];
        softmax_rows(&mut z);
        for row in z.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((z[[1, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax_rows(&array![[0.4, 0.4, 0.2], [0.1, 0.2, 0.7]]), vec![0, 2]);
    }
}
