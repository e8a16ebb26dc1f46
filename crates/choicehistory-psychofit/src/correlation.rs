//! Rank correlation and the comparison of two correlations that share a
//! variable.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// A correlation coefficient with its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub rho: f64,
    /// `None` when the t distribution is undefined (fewer than three pairs).
    pub p_value: Option<f64>,
    /// Pairs used after dropping missing values.
    pub n: usize,
}

/// Two-sided p-value of a t statistic.
fn two_sided_p(t: f64, df: f64) -> Option<f64> {
    if !(df > 0.0) || t.is_nan() {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some((2.0 * dist.sf(t.abs())).min(1.0))
}

/// Ranks starting at 1, with ties sharing their average rank.
pub fn rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end.
        let shared = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = shared;
        }
        start = end;
    }
    ranks
}

/// Pearson correlation coefficient, `None` when either side is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        None
    } else {
        Some((cov / denom).clamp(-1.0, 1.0))
    }
}

/// Spearman rank correlation over the pairs where both values are present
/// and finite.
///
/// The p-value uses the t approximation with `n - 2` degrees of freedom.
pub fn spearman(x: &[Option<f64>], y: &[Option<f64>]) -> Option<Correlation> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .unzip();
    let n = xs.len();
    let rho = pearson(&rank(&xs), &rank(&ys))?;

    let df = n as f64 - 2.0;
    let p_value = if rho.abs() >= 1.0 {
        (df > 0.0).then_some(0.0)
    } else {
        let t = rho * (df / ((1.0 + rho) * (1.0 - rho))).sqrt();
        two_sided_p(t, df)
    };
    Some(Correlation { rho, p_value, n })
}

/// Steiger's test of two dependent correlations sharing one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DependentCorrelationTest {
    pub t: f64,
    pub p_value: f64,
    pub df: f64,
}

/// Compare `r(x, y)` against `r(x, z)` given `r(y, z)` over `n` observations
/// (Steiger 1980, equation 7, two-tailed).
///
/// Returns `None` with fewer than four observations or when the correlation
/// matrix is singular.
pub fn steiger_dependent(xy: f64, xz: f64, yz: f64, n: usize) -> Option<DependentCorrelationTest> {
    if n < 4 || ![xy, xz, yz].iter().all(|r| r.is_finite()) {
        return None;
    }
    let n = n as f64;
    let d = xy - xz;
    let determinant = 1.0 - xy * xy - xz * xz - yz * yz + 2.0 * xy * xz * yz;
    let average = (xy + xz) / 2.0;
    let cube = (1.0 - yz).powi(3);

    let denom = (2.0 * (n - 1.0) / (n - 3.0)) * determinant + average * average * cube;
    if !(denom > 0.0) {
        return None;
    }
    let t = d * ((n - 1.0) * (1.0 + yz) / denom).sqrt();
    let df = n - 3.0;
    Some(DependentCorrelationTest {
        t,
        p_value: two_sided_p(t, df)?,
        df,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_rank_averages_ties() {
        assert_eq!(rank(&[10.0, 30.0, 20.0, 20.0]), vec![1.0, 4.0, 2.5, 2.5]);
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn test_pearson_constant_is_none() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_monotone() {
        let x = some(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = some(&[1.0, 4.0, 9.0, 16.0, 100.0]);
        let c = spearman(&x, &y).unwrap();
        assert!((c.rho - 1.0).abs() < 1e-12);
        assert_eq!(c.p_value, Some(0.0));
        assert_eq!(c.n, 5);

        let rev: Vec<Option<f64>> = y.iter().rev().copied().collect();
        assert!((spearman(&x, &rev).unwrap().rho + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_known_value() {
        // rank(y) = [2, 1, 4, 3, 5]: rho = 1 - 6 * 4 / 120 = 0.8.
        let x = some(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = some(&[0.6, 0.5, 0.8, 0.7, 0.9]);
        let c = spearman(&x, &y).unwrap();
        assert!((c.rho - 0.8).abs() < 1e-12);
        // t = 0.8 * sqrt(3 / 0.36) = 2.309; two-sided p with 3 df is 0.104.
        let p = c.p_value.unwrap();
        assert!((p - 0.104).abs() < 2e-3, "p = {p}");
    }

    #[test]
    fn test_spearman_omits_missing_pairs() {
        let x = vec![Some(1.0), None, Some(3.0), Some(f64::NAN), Some(5.0), Some(6.0)];
        let y = vec![Some(2.0), Some(9.0), Some(4.0), Some(1.0), None, Some(7.0)];
        let c = spearman(&x, &y).unwrap();
        assert_eq!(c.n, 3);
        assert!((c.rho - 1.0).abs() < 1e-12);
        // One degree of freedom remains.
        assert_eq!(c.p_value, Some(0.0));
    }

    #[test]
    fn test_spearman_too_few_pairs() {
        assert!(spearman(&[Some(1.0)], &[Some(2.0)]).is_none());
        let two = spearman(&some(&[1.0, 2.0]), &some(&[1.0, 3.0])).unwrap();
        assert_eq!(two.p_value, None);
    }

    #[test]
    fn test_steiger_equal_correlations() {
        let test = steiger_dependent(0.4, 0.4, 0.3, 30).unwrap();
        assert_eq!(test.t, 0.0);
        assert!((test.p_value - 1.0).abs() < 1e-9);
        assert_eq!(test.df, 27.0);
    }

    #[test]
    fn test_steiger_direction_and_significance() {
        let strong = steiger_dependent(0.7, 0.1, 0.2, 60).unwrap();
        assert!(strong.t > 0.0);
        assert!(strong.p_value < 0.01);

        let flipped = steiger_dependent(0.1, 0.7, 0.2, 60).unwrap();
        assert!((flipped.t + strong.t).abs() < 1e-12);
        assert!((flipped.p_value - strong.p_value).abs() < 1e-12);

        let weak = steiger_dependent(0.3, 0.2, 0.2, 10).unwrap();
        assert!(weak.p_value > 0.5);
    }

    #[test]
    fn test_steiger_rejects_small_samples() {
        assert!(steiger_dependent(0.5, 0.1, 0.2, 3).is_none());
        assert!(steiger_dependent(f64::NAN, 0.1, 0.2, 30).is_none());
    }
}
