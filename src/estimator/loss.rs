use ndarray::ArrayViewMut1;
use serde::{Deserialize, Serialize};

/// Robust loss functions applied to the residuals of a data set.
///
/// All variants return a transformed residual $\tilde r$ so that the
/// cost is still the sum of squares $\sum_i\tilde r_i^2$.
#[derive(Clone, Debug, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Loss {
    #[default]
    Linear,
    SoftL1(f64),
    Huber(f64),
    Cauchy(f64),
    Arctan(f64),
}

impl Loss {
    pub fn softl1(scaling_factor: f64) -> Self {
        Self::SoftL1(scaling_factor)
    }
    pub fn huber(scaling_factor: f64) -> Self {
        Self::Huber(scaling_factor)
    }
    pub fn cauchy(scaling_factor: f64) -> Self {
        Self::Cauchy(scaling_factor)
    }
    pub fn arctan(scaling_factor: f64) -> Self {
        Self::Arctan(scaling_factor)
    }

    /// Transform a single residual. The sign of the residual is kept.
    pub fn apply_scalar(&self, ri: f64) -> f64 {
        let rho = match *self {
            Self::Linear => return ri,
            Self::SoftL1(s) => {
                let s2 = s * s;
                s2 * 2.0 * ((ri * ri / s2 + 1.0).sqrt() - 1.0)
            }
            Self::Huber(s) => {
                if ri * ri <= s * s {
                    return ri;
                }
                s * s * (2.0 * (ri / s).abs() - 1.0)
            }
            Self::Cauchy(s) => {
                let s2 = s * s;
                s2 * (ri * ri / s2).ln_1p()
            }
            Self::Arctan(s) => {
                let s2 = s * s;
                s2 * (ri * ri / s2).atan()
            }
        };
        rho.sqrt().copysign(ri)
    }

    pub fn apply(&self, res: &mut ArrayViewMut1<f64>) {
        res.mapv_inplace(|ri| self.apply_scalar(ri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn small_residuals_are_unchanged() {
        for loss in [
            Loss::Linear,
            Loss::softl1(1.0),
            Loss::huber(1.0),
            Loss::cauchy(1.0),
            Loss::arctan(1.0),
        ] {
            assert_relative_eq!(loss.apply_scalar(1e-4), 1e-4, max_relative = 1e-6);
            assert_relative_eq!(loss.apply_scalar(-1e-4), -1e-4, max_relative = 1e-6);
        }
    }

    #[test]
    fn outliers_are_damped() {
        let r = 10.0;
        assert_eq!(Loss::Linear.apply_scalar(r), r);
        assert_relative_eq!(Loss::huber(1.0).apply_scalar(r), 19f64.sqrt());
        let expected = (2.0 * (101f64.sqrt() - 1.0)).sqrt();
        assert_relative_eq!(Loss::softl1(1.0).apply_scalar(r), expected);
        assert_relative_eq!(Loss::cauchy(1.0).apply_scalar(r), 101f64.ln().sqrt());
        assert!(Loss::arctan(1.0).apply_scalar(r) < (std::f64::consts::FRAC_PI_2).sqrt());
    }

    #[test]
    fn apply_to_array() {
        let mut res = arr1(&[0.5, -3.0]);
        Loss::huber(1.0).apply(&mut res.view_mut());
        assert_relative_eq!(res, arr1(&[0.5, -(5f64.sqrt())]));
    }

    #[test]
    fn deserialize() {
        let loss: Loss = serde_json::from_str(r#"{"Huber": 0.5}"#).unwrap();
        assert_eq!(loss, Loss::Huber(0.5));
    }
}
