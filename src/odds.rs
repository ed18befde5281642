/// Odd paid for a predicted score line.
///
/// Each goal of difference between the two predicted scores adds 0.1 to the
/// base odd of 1.0, so a predicted draw always pays even money. Callers reject
/// negative predictions before getting here.
pub fn calculate_odd(home_score: i32, away_score: i32) -> f64 {
    let difference = (home_score - away_score).abs();
    if difference == 0 {
        return 1.0;
    }
    1.0 + 0.1 * f64::from(difference)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_draw_is_even() {
        for score in 0..50 {
            assert_eq!(calculate_odd(score, score), 1.0);
        }
    }

    #[test]
    fn test_symmetric() {
        for a in 0..30 {
            for b in 0..30 {
                assert_eq!(calculate_odd(a, b), calculate_odd(b, a));
            }
        }
    }

    #[test]
    fn test_linear_in_difference() {
        for a in 0..30i32 {
            for b in (0..30).filter(|b| *b != a) {
                let expected = 1.0 + 0.1 * f64::from((a - b).abs());
                assert!(approx_eq(calculate_odd(a, b), expected));
            }
        }
    }

    #[test]
    fn test_known_values() {
        assert!(approx_eq(calculate_odd(2, 0), 1.2));
        assert!(approx_eq(calculate_odd(0, 3), 1.3));
        assert!(approx_eq(calculate_odd(7, 2), 1.5));
    }
}
