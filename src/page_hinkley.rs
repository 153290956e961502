use serde::{Deserialize, Serialize};

/// Result of feeding one residual into the drift test
///
/// # Fields
///
/// - `increase` - Current value of the increase statistic `U_t - m_t`
/// - `decrease` - Current value of the decrease statistic `M_t - T_t`
/// - `alarm` - True when either statistic reached the alarm threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftStatus {
    pub increase: f64,
    pub decrease: f64,
    pub alarm: bool,
}

/// Two-sided Page-Hinkley test for drift in a residual stream.
///
/// Maintains the cumulative sums `U_t` (sensitive to mean increases) and
/// `T_t` (sensitive to mean decreases) together with their running extremes.
/// An alarm is raised as soon as `U_t - min(U) >= lambda` or
/// `max(T) - T_t >= lambda`.
///
/// # Example
///
/// ```rust
/// use fuzzyreg::PageHinkley;
///
/// let mut ph = PageHinkley::new(0.0, 0.05, 0.05, 1.0);
/// let mut alarmed = false;
/// for _ in 0..100 {
///     alarmed |= ph.update(0.5).alarm;
/// }
/// assert!(alarmed);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageHinkley {
    /// Expected residual mean under the no-change hypothesis.
    mu_0: f64,
    /// Allowed drift magnitude before an increase counts.
    nu_inc: f64,
    /// Allowed drift magnitude before a decrease counts.
    nu_dec: f64,
    /// Alarm threshold.
    lambda: f64,
    u_t: f64,
    t_t: f64,
    min_u: f64,
    max_t: f64,
}

impl PageHinkley {
    pub fn new(mu_0: f64, nu_inc: f64, nu_dec: f64, lambda: f64) -> Self {
        PageHinkley {
            mu_0,
            nu_inc,
            nu_dec,
            lambda,
            u_t: 0.0,
            t_t: 0.0,
            min_u: 0.0,
            max_t: 0.0,
        }
    }

    /// Feeds one residual and returns the updated drift statistics
    pub fn update(&mut self, residual: f64) -> DriftStatus {
        self.u_t += residual - self.mu_0 - 0.5 * self.nu_inc;
        self.t_t += residual - self.mu_0 + 0.5 * self.nu_dec;
        if self.u_t < self.min_u {
            self.min_u = self.u_t;
        }
        if self.t_t > self.max_t {
            self.max_t = self.t_t;
        }
        let increase = self.u_t - self.min_u;
        let decrease = self.max_t - self.t_t;
        DriftStatus {
            increase,
            decrease,
            alarm: increase >= self.lambda || decrease >= self.lambda,
        }
    }

    /// Clears the accumulated statistics, keeping the parameters
    pub fn reset(&mut self) {
        self.u_t = 0.0;
        self.t_t = 0.0;
        self.min_u = 0.0;
        self.max_t = 0.0;
    }
}
