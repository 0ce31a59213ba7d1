//! # Ordinary Least Squares with HC1 Robust Inference
//!
//! The fit is solved through a thin SVD of the design matrix, which also gives
//! the numerical rank. A rank-deficient design is an error: no column is ever
//! dropped or absorbed into a pseudo-inverse silently.
//!
//! The coefficient covariance is the heteroskedasticity-consistent HC1
//! sandwich
//!
//! ```text
//! V = n / (n - k) · (XᵀX)⁻¹ Xᵀ diag(e²) X (XᵀX)⁻¹
//! ```
//!
//! and every inferential quantity (standard errors, z-statistics, p-values,
//! confidence bounds, the joint F-statistic) is derived from `V`.

use crate::linalg::{FaerCholesky, FaerThinSvd, LinalgError};
use crate::stats::{Z_975, two_sided_p};
use faer::Side;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitError {
    #[error(
        "Only {observations} complete observations for {parameters} parameters; the model has no residual degrees of freedom."
    )]
    TooFewObservations {
        observations: usize,
        parameters: usize,
    },
    #[error(
        "The design matrix is rank-deficient (rank {rank} of {parameters} columns). A regressor is constant or collinear with the others."
    )]
    RankDeficient { rank: usize, parameters: usize },
    #[error("The design matrix has {rows} rows but the response has {responses} values.")]
    DimensionMismatch { rows: usize, responses: usize },
    #[error("Linear algebra failure: {0}")]
    Linalg(#[from] LinalgError),
}

/// A fitted model with HC1 inference. Per-coefficient arrays follow the
/// column order of the design matrix.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coef: Array1<f64>,
    pub std_err: Array1<f64>,
    pub z: Array1<f64>,
    pub p: Array1<f64>,
    pub conf_lower: Array1<f64>,
    pub conf_upper: Array1<f64>,
    pub robust_cov: Array2<f64>,
    pub n_obs: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub r_squared_adj: f64,
    /// Robust Wald statistic for all non-intercept coefficients being zero.
    pub f_statistic: f64,
    /// Mean of the squared residuals.
    pub mse: f64,
    pub rmse: f64,
}

/// Fits `y ~ x` by least squares with HC1 standard errors.
///
/// The first column of `x` must be the intercept; it is excluded from the
/// joint F-test.
pub fn fit_ols_hc1(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<OlsFit, FitError> {
    let (n, k) = x.dim();
    if y.len() != n {
        return Err(FitError::DimensionMismatch {
            rows: n,
            responses: y.len(),
        });
    }
    if n <= k {
        return Err(FitError::TooFewObservations {
            observations: n,
            parameters: k,
        });
    }

    let svd = x.thin_svd()?;
    let s_max = svd.s.iter().copied().fold(0.0_f64, f64::max);
    let tolerance = s_max * (n.max(k) as f64) * f64::EPSILON;
    let rank = svd.s.iter().filter(|&&sv| sv > tolerance).count();
    log::debug!("OLS design {n}x{k}, rank {rank}, largest singular value {s_max:.4e}");
    if rank < k {
        return Err(FitError::RankDeficient { rank, parameters: k });
    }

    let inv_s = svd.s.mapv(|sv| 1.0 / sv);
    let coef = svd.v.dot(&(svd.u.t().dot(&y) * &inv_s));
    // (XᵀX)⁻¹ = V diag(1/s²) Vᵀ
    let bread = (&svd.v * &inv_s.mapv(|v| v * v)).dot(&svd.v.t());

    let resid = &y - &x.dot(&coef);
    let scored = &x * &resid.view().insert_axis(Axis(1));
    let meat = scored.t().dot(&scored);
    let df_resid = n - k;
    let small_sample = n as f64 / df_resid as f64;
    let robust_cov = bread.dot(&meat).dot(&bread) * small_sample;

    let std_err = robust_cov.diag().mapv(|v| v.max(0.0).sqrt());
    let z = &coef / &std_err;
    let p = z.mapv(two_sided_p);
    let conf_lower = &coef - &(&std_err * Z_975);
    let conf_upper = &coef + &(&std_err * Z_975);

    let ssr = resid.dot(&resid);
    let y_mean = y.mean().unwrap_or(f64::NAN);
    let tss = y.iter().map(|&v| (v - y_mean).powi(2)).sum::<f64>();
    let r_squared = 1.0 - ssr / tss;
    let r_squared_adj = 1.0 - (n - 1) as f64 / df_resid as f64 * (1.0 - r_squared);

    let f_statistic = robust_wald_f(&coef, &robust_cov);
    let mse = ssr / n as f64;

    Ok(OlsFit {
        coef,
        std_err,
        z,
        p,
        conf_lower,
        conf_upper,
        robust_cov,
        n_obs: n,
        df_resid,
        r_squared,
        r_squared_adj,
        f_statistic,
        mse,
        rmse: mse.sqrt(),
    })
}

/// `(Rβ)ᵀ (R V Rᵀ)⁻¹ (Rβ) / q` where `R` selects every coefficient after the
/// intercept.
fn robust_wald_f(coef: &Array1<f64>, cov: &Array2<f64>) -> f64 {
    let q = coef.len().saturating_sub(1);
    if q == 0 {
        return f64::NAN;
    }
    let restricted = coef.slice(s![1..]).to_owned();
    let restricted_cov = cov.slice(s![1.., 1..]);
    match restricted_cov.cholesky(Side::Lower) {
        Ok(factor) => restricted.dot(&factor.solve_vec(&restricted)) / q as f64,
        Err(e) => {
            log::warn!("Robust covariance of the slopes is not positive definite ({e}); F-statistic is undefined.");
            f64::NAN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{Array2, array};

    /// Twenty points with an independent closed-form reference, computed in
    /// exact rational arithmetic.
    fn reference_design() -> (Array2<f64>, Array1<f64>) {
        let y = array![
            3.1, 3.6, 5.1, 5.3, 7.2, 7.7, 10.2, 10.9, 12.9, 14.3, 17.0, 17.8, 20.2, 22.6, 23.7,
            27.4, 29.1, 31.9, 33.8, 37.4
        ];
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { 1.0 } else { (i + 1) as f64 });
        (x, y)
    }

    #[test]
    fn simple_regression_matches_closed_form_hc1() {
        let (x, y) = reference_design();
        let fit = fit_ols_hc1(x.view(), y.view()).unwrap();

        assert_eq!(fit.n_obs, 20);
        assert_eq!(fit.df_resid, 18);
        assert_abs_diff_eq!(fit.coef[0], -1.835_263_157_894_737, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.coef[1], 1.799_548_872_180_451_1, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.std_err[0], 0.931_813_222_549_036_4, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.std_err[1], 0.080_925_365_401_026_24, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.z[0], -1.969_561_188_318_677_9, epsilon = 1e-8);
        assert_abs_diff_eq!(fit.z[1], 22.237_142_375_110_37, epsilon = 1e-8);
        assert_relative_eq!(fit.p[0], 0.048_888_683_446_334_87, max_relative = 1e-6);
        assert_relative_eq!(fit.p[1], 1.502_239_729_447_489_5e-109, max_relative = 1e-6);
        assert_abs_diff_eq!(fit.conf_lower[0], -3.661_583_514_409_054_3, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.conf_upper[0], -0.008_942_801_380_419_363, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.conf_lower[1], 1.640_938_070_558_696, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.conf_upper[1], 1.958_159_673_802_206_2, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.r_squared_adj, 0.976_110_289_432_772_8, epsilon = 1e-10);
        assert_relative_eq!(fit.f_statistic, 494.490_501_010_929_1, max_relative = 1e-9);
        assert_abs_diff_eq!(fit.mse, 2.493_393_233_082_706_7, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.rmse, 1.579_048_204_800_191_3, epsilon = 1e-10);
    }

    #[test]
    fn single_slope_wald_f_is_squared_z() {
        let (x, y) = reference_design();
        let fit = fit_ols_hc1(x.view(), y.view()).unwrap();
        assert_relative_eq!(fit.f_statistic, fit.z[1] * fit.z[1], max_relative = 1e-10);
    }

    #[test]
    fn exact_linear_response_is_recovered() {
        let x = Array2::from_shape_fn((12, 3), |(i, j)| match j {
            0 => 1.0,
            1 => i as f64,
            _ => ((i * i) % 7) as f64,
        });
        let truth = array![0.5, -1.25, 2.0];
        let y = x.dot(&truth);
        let fit = fit_ols_hc1(x.view(), y.view()).unwrap();
        for (estimate, expected) in fit.coef.iter().zip(truth.iter()) {
            assert_abs_diff_eq!(estimate, expected, epsilon = 1e-10);
        }
        assert_abs_diff_eq!(fit.mse, 0.0, epsilon = 1e-18);
        assert_abs_diff_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn robust_covariance_is_symmetric() {
        let x = Array2::from_shape_fn((15, 3), |(i, j)| match j {
            0 => 1.0,
            1 => (i as f64).sin(),
            _ => (i % 4) as f64,
        });
        let y = Array1::from_shape_fn(15, |i| (i as f64 * 0.7).cos() + 0.1 * i as f64);
        let fit = fit_ols_hc1(x.view(), y.view()).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(
                    fit.robust_cov[(i, j)],
                    fit.robust_cov[(j, i)],
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn collinear_columns_are_rejected() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| match j {
            0 => 1.0,
            1 => i as f64,
            _ => 2.0 * i as f64 + 1.0,
        });
        let y = Array1::from_shape_fn(10, |i| i as f64);
        match fit_ols_hc1(x.view(), y.view()) {
            Err(FitError::RankDeficient { rank, parameters }) => {
                assert_eq!(rank, 2);
                assert_eq!(parameters, 3);
            }
            other => panic!("Expected RankDeficient, got {:?}", other),
        }
    }

    #[test]
    fn zero_column_is_rejected() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| match j {
            0 => 1.0,
            1 => i as f64,
            _ => 0.0,
        });
        let y = Array1::from_shape_fn(10, |i| (i % 3) as f64);
        assert!(matches!(
            fit_ols_hc1(x.view(), y.view()),
            Err(FitError::RankDeficient { rank: 2, parameters: 3 })
        ));
    }

    #[test]
    fn too_few_observations_are_rejected() {
        let x = Array2::ones((3, 3));
        let y = Array1::zeros(3);
        assert!(matches!(
            fit_ols_hc1(x.view(), y.view()),
            Err(FitError::TooFewObservations {
                observations: 3,
                parameters: 3
            })
        ));

        let empty = Array2::zeros((0, 2));
        assert!(matches!(
            fit_ols_hc1(empty.view(), Array1::zeros(0).view()),
            Err(FitError::TooFewObservations { .. })
        ));
    }
}
