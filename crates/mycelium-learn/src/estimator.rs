//! Full-info estimator (§4.5 "optional full-info estimator"), grounded on
//! `ewlearning.py`'s `estimator`/`estimator_v2_single_token`/`estimator_v2`.
//!
//! Both versions map an arm's expected CPU pressure to an expected elapsed
//! time, then run it through [`calculate_v`] exactly like an observed
//! sample would be. `f_max` grows monotonically (`ewlearning.py` clamps it
//! up whenever a sample exceeds it) so later gains stay comparable to
//! earlier ones.

pub const GOOD_ELAPSED: f64 = 0.5;
pub const TOLERANCE: f64 = 1.2;

/// `v = (f_max - elapsed) / f_max`, optionally importance-weighted by
/// `1/x[k_t]` for the observed (bandit) gain. `f_max` is widened in place
/// if `elapsed_time` exceeds it.
pub fn calculate_v(f_max: &mut f64, elapsed_time: f64, importance_weight: Option<f64>) -> f64 {
    if elapsed_time > *f_max {
        *f_max = elapsed_time;
    }
    let v = (*f_max - elapsed_time) / *f_max;
    match importance_weight {
        Some(w) if w > 0.0 => v / w,
        _ => v,
    }
}

/// Piecewise-linear estimate: comfortably served (`ratio <= 1`) maps to
/// `GOOD_ELAPSED`; overloaded past `tolerance` maps to `f_max`; in between,
/// linear interpolation.
pub fn estimator_v1(f_max: &mut f64, used_est: f64, total_capacity: f64) -> f64 {
    if total_capacity <= 0.0 {
        return calculate_v(f_max, *f_max, None);
    }
    let ratio = used_est / total_capacity;
    let elapsed_est = piecewise(ratio, GOOD_ELAPSED, *f_max);
    calculate_v(f_max, elapsed_est, None)
}

/// Single-token latency estimate for one arm at its current availability.
/// Demand below 100 mips is cheap enough to ignore the discount the
/// original applies to heavier workloads.
pub fn estimator_v2_single_token(avail_cpu: f64, burn_mips: f64) -> f64 {
    let mips = if burn_mips >= 100.0 { burn_mips / 5.0 } else { burn_mips };
    if avail_cpu <= 0.0 {
        return 1.0;
    }
    0.25 + mips / avail_cpu
}

/// Same piecewise shape as [`estimator_v1`] but anchored on the per-arm
/// single-token estimate instead of the fixed `GOOD_ELAPSED` constant.
pub fn estimator_v2(f_max: &mut f64, burn_mips: f64, avail_cpu: f64, used_est: f64, total_capacity: f64) -> f64 {
    let good = estimator_v2_single_token(avail_cpu, burn_mips);
    if total_capacity <= 0.0 {
        return calculate_v(f_max, *f_max, None);
    }
    let ratio = used_est / total_capacity;
    let elapsed_est = piecewise(ratio, good, *f_max);
    calculate_v(f_max, elapsed_est, None)
}

fn piecewise(ratio: f64, good: f64, bad: f64) -> f64 {
    if ratio <= 1.0 {
        good
    } else if ratio >= TOLERANCE {
        bad
    } else {
        let frac = (ratio - 1.0) / (TOLERANCE - 1.0);
        good + frac * (bad - good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_v_widens_f_max_when_exceeded() {
        let mut f_max = 5.0;
        let v = calculate_v(&mut f_max, 8.0, None);
        assert_eq!(f_max, 8.0);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn estimator_v1_maxes_out_good_elapsed_under_capacity() {
        let mut f_max = 5.0;
        let v_good = estimator_v1(&mut f_max, 50.0, 100.0);
        let mut f_max2 = 5.0;
        let v_overloaded = estimator_v1(&mut f_max2, 200.0, 100.0);
        assert!(v_good > v_overloaded);
    }

    #[test]
    fn estimator_v2_single_token_discounts_heavy_workloads() {
        let light = estimator_v2_single_token(1000.0, 50.0);
        let heavy = estimator_v2_single_token(1000.0, 500.0);
        assert!(heavy > light);
    }
}
