//! Pair selection: assign minute/hour roles to two hand candidates.

use super::hands::HandCandidate;
use super::{angular_error_deg, normalize_deg};

/// Expected (minute, hour) hand angles for a requested time, clock
/// convention, degrees in [0, 360).
pub fn expected_angles(hour: u32, minute: u32) -> (f64, f64) {
    let m = f64::from(minute % 60);
    let h = f64::from(hour % 12);
    (normalize_deg(m * 6.0), normalize_deg(h * 30.0 + m * 0.5))
}

/// Choose the (minute, hour) assignment minimizing the summed angular error
/// over every unordered candidate pair and both role assignments.
///
/// Falls back to the two longest candidates (same minimum-error role rule)
/// when no pair produces a finite cost. Returns `None` with fewer than two
/// candidates.
pub fn select_pair(
    candidates: &[HandCandidate],
    expected_minute_deg: f64,
    expected_hour_deg: f64,
) -> Option<(HandCandidate, HandCandidate)> {
    if candidates.len() < 2 {
        return None;
    }

    let cost = |minute: &HandCandidate, hour: &HandCandidate| {
        angular_error_deg(minute.angle_deg, expected_minute_deg)
            + angular_error_deg(hour.angle_deg, expected_hour_deg)
    };

    let mut best: Option<(usize, usize, f64)> = None;
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            for (mi, hi) in [(i, j), (j, i)] {
                let c = cost(&candidates[mi], &candidates[hi]);
                if c.is_finite() && best.map_or(true, |(_, _, b)| c < b) {
                    best = Some((mi, hi, c));
                }
            }
        }
    }

    if let Some((mi, hi, _)) = best {
        return Some((candidates[mi], candidates[hi]));
    }

    // Degenerate costs across the board: take the two longest and still
    // pick roles by minimum error.
    let mut by_length: Vec<&HandCandidate> = candidates.iter().collect();
    by_length.sort_by(|a, b| b.length.partial_cmp(&a.length).unwrap());
    let (a, b) = (*by_length[0], *by_length[1]);
    if cost(&a, &b) <= cost(&b, &a) {
        Some((a, b))
    } else {
        Some((b, a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::hands::HandStrategy;
    use approx::assert_relative_eq;

    fn cand(angle_deg: f64, length: f64) -> HandCandidate {
        HandCandidate {
            origin: [0.0, 0.0],
            far: [0.0, 0.0],
            length,
            angle_deg,
            strategy: HandStrategy::Component,
        }
    }

    #[test]
    fn expected_angles_for_ten_past_ten() {
        let (minute, hour) = expected_angles(10, 10);
        assert_relative_eq!(minute, 60.0);
        assert_relative_eq!(hour, 305.0);
    }

    #[test]
    fn expected_angles_wrap_hours_and_minutes() {
        let (minute, hour) = expected_angles(23, 60);
        // 23h → 11 on the dial; 60min wraps to 0.
        assert_relative_eq!(minute, 0.0);
        assert_relative_eq!(hour, 330.0);
        let (m2, h2) = expected_angles(12, 0);
        assert_relative_eq!(m2, 0.0);
        assert_relative_eq!(h2, 0.0);
    }

    #[test]
    fn roles_follow_minimum_error_not_order() {
        // Expected 10:10 → minute 60°, hour 305°.
        let cands = vec![cand(303.0, 80.0), cand(62.0, 120.0)];
        let (minute, hour) = select_pair(&cands, 60.0, 305.0).unwrap();
        assert_relative_eq!(minute.angle_deg, 62.0);
        assert_relative_eq!(hour.angle_deg, 303.0);
    }

    #[test]
    fn swap_is_considered() {
        // Both candidates nearer the "wrong" role in listed order.
        let cands = vec![cand(0.0, 50.0), cand(180.0, 50.0)];
        let (minute, hour) = select_pair(&cands, 180.0, 0.0).unwrap();
        assert_relative_eq!(minute.angle_deg, 180.0);
        assert_relative_eq!(hour.angle_deg, 0.0);
    }

    #[test]
    fn single_candidate_yields_none() {
        assert!(select_pair(&[cand(0.0, 10.0)], 0.0, 0.0).is_none());
    }

    #[test]
    fn best_pair_among_many_candidates() {
        let cands = vec![
            cand(10.0, 60.0),
            cand(59.0, 100.0),
            cand(200.0, 40.0),
            cand(306.0, 70.0),
        ];
        let (minute, hour) = select_pair(&cands, 60.0, 305.0).unwrap();
        assert_relative_eq!(minute.angle_deg, 59.0);
        assert_relative_eq!(hour.angle_deg, 306.0);
    }
}
