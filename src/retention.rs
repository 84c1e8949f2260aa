//! Post-match retention: the probability that a player queues up again
//! instead of logging off, as a logistic over recent experience.

use crate::config::RetentionConfig;
use crate::outcome::logistic;
use crate::types::MatchExperience;

/// `P(continue) = sigma(base + theta . z)` over the last
/// `experience_window` matches, clamped to `[continue_floor, 1]`.
///
/// The floor keeps a brutal losing streak from disconnecting the whole
/// population; with no history the base logit alone decides.
pub fn continue_probability(config: &RetentionConfig, experience: &[MatchExperience]) -> f64 {
    let logit = if experience.is_empty() {
        config.base_logit
    } else {
        let window = config.experience_window.min(experience.len());
        let recent = &experience[experience.len() - window..];
        let n = recent.len() as f64;

        let avg_delta_ping = recent.iter().map(|e| e.delta_ping).sum::<f64>() / n;
        let avg_search_time = recent.iter().map(|e| e.search_time_secs).sum::<f64>() / n;
        let blowout_rate = recent.iter().filter(|e| e.blowout).count() as f64 / n;
        let win_rate = recent.iter().filter(|e| e.won).count() as f64 / n;
        let avg_performance = recent.iter().map(|e| e.performance).sum::<f64>() / n;

        config.base_logit
            + config.theta_ping * avg_delta_ping
            + config.theta_search_time * avg_search_time
            + config.theta_blowout * blowout_rate
            + config.theta_win_rate * win_rate
            + config.theta_performance * avg_performance
    };

    let p = logistic(logit);
    let p = if p.is_finite() { p } else { 0.5 };
    p.clamp(config.continue_floor, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience(delta_ping: f64, search: f64, blowout: bool, won: bool, perf: f64) -> MatchExperience {
        MatchExperience {
            delta_ping,
            search_time_secs: search,
            blowout,
            won,
            performance: perf,
        }
    }

    #[test]
    fn empty_history_uses_the_base_logit() {
        let config = RetentionConfig::default();
        let p = continue_probability(&config, &[]);
        assert_eq!(p, logistic(config.base_logit).max(config.continue_floor));
    }

    #[test]
    fn bad_experience_lowers_retention() {
        let config = RetentionConfig::default();
        let good = vec![experience(5.0, 20.0, false, true, 0.8); 5];
        let laggy = vec![experience(90.0, 20.0, false, true, 0.8); 5];
        let slow = vec![experience(5.0, 300.0, false, true, 0.8); 5];
        let stomped = vec![experience(5.0, 20.0, true, false, 0.2); 5];

        let p_good = continue_probability(&config, &good);
        assert!(p_good > continue_probability(&config, &laggy));
        assert!(p_good > continue_probability(&config, &slow));
        assert!(p_good > continue_probability(&config, &stomped));
    }

    #[test]
    fn winning_raises_retention() {
        let config = RetentionConfig::default();
        let losses = vec![experience(10.0, 30.0, false, false, 0.4); 5];
        let wins = vec![experience(10.0, 30.0, false, true, 0.7); 5];
        assert!(
            continue_probability(&config, &wins) > continue_probability(&config, &losses)
        );
    }

    #[test]
    fn probability_never_drops_below_the_floor() {
        let config = RetentionConfig::default();
        let awful = vec![experience(500.0, 2000.0, true, false, 0.0); 5];
        let p = continue_probability(&config, &awful);
        assert_eq!(p, config.continue_floor);
    }

    #[test]
    fn only_the_window_counts() {
        let mut config = RetentionConfig::default();
        config.experience_window = 2;
        // Old garbage followed by two clean matches: only the clean
        // tail should matter.
        let mut history = vec![experience(400.0, 1500.0, true, false, 0.0); 8];
        history.push(experience(5.0, 20.0, false, true, 0.8));
        history.push(experience(5.0, 20.0, false, true, 0.8));
        let clean = vec![experience(5.0, 20.0, false, true, 0.8); 2];
        assert_eq!(
            continue_probability(&config, &history),
            continue_probability(&config, &clean)
        );
    }
}
