//! Information criteria for comparing fitted models.

/// Akaike information criterion `2k - 2 log L`.
///
/// Returns `None` when the log-likelihood is unavailable or not finite.
pub fn aic(n_params: usize, log_likelihood: Option<f64>) -> Option<f64> {
    let logp = log_likelihood.filter(|v| v.is_finite())?;
    Some(2.0 * n_params as f64 - 2.0 * logp)
}

/// Bayesian information criterion `-2 log L + k ln n`.
///
/// Returns `None` when the log-likelihood is unavailable or not finite, or
/// when there are no observations.
pub fn bic(n_params: usize, n_observations: usize, log_likelihood: Option<f64>) -> Option<f64> {
    let logp = log_likelihood.filter(|v| v.is_finite())?;
    if n_observations == 0 {
        return None;
    }
    Some(-2.0 * logp + n_params as f64 * (n_observations as f64).ln())
}

/// Subtract the baseline's criterion from each model's (`None` stays `None`).
pub fn deltas(values: &[Option<f64>], baseline: Option<f64>) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| -> Option<f64> { Some((*v)? - baseline?) })
        .collect()
}
