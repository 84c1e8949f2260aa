//! Match outcome model: logistic win probability, blowout scoring, and
//! per-player performance indices.

use crate::config::EngineConfig;
use crate::types::BlowoutSeverity;
use rand::Rng;

/// Result of resolving a finished match.
#[derive(Clone, Copy, Debug)]
pub struct MatchOutcome {
    /// Index into the match's team list.
    pub winning_team: usize,
    /// Signed skill difference fed to the logistic model.
    pub skill_diff: f64,
    /// Win probability of the reference team.
    pub win_probability: f64,
    /// `Some` iff the match classified as a blowout.
    pub blowout: Option<BlowoutSeverity>,
}

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `P(A wins) = sigma(gamma * (s_a - s_b))`, guarded against non-finite
/// inputs collapsing the draw.
pub fn win_probability(gamma: f64, s_a: f64, s_b: f64) -> f64 {
    let p = logistic(gamma * (s_a - s_b));
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Blowout score from the normalized skill gap and the win-probability
/// deviation. Monotone non-decreasing in both arguments.
pub fn blowout_score(config: &EngineConfig, skill_diff_abs: f64, win_prob: f64) -> f64 {
    let skill_term = ((skill_diff_abs - 0.1) / 0.4).max(0.0);
    let imbalance_term = 2.0 * (win_prob - 0.5).abs();
    config.blowout_skill_coefficient * skill_term
        + config.blowout_imbalance_coefficient * imbalance_term
}

/// Threshold classification; a match is "a blowout" iff the score
/// reaches the mild threshold.
pub fn classify_blowout(config: &EngineConfig, score: f64) -> Option<BlowoutSeverity> {
    if score >= config.blowout_severe_threshold {
        Some(BlowoutSeverity::Severe)
    } else if score >= config.blowout_moderate_threshold {
        Some(BlowoutSeverity::Moderate)
    } else if score >= config.blowout_mild_threshold {
        Some(BlowoutSeverity::Mild)
    } else {
        None
    }
}

/// Resolve a match given its per-team average raw skills.
///
/// Two-team modes draw the winner from the logistic directly. FFA pits
/// the top-skill player against the field average: on a win they take
/// the match, otherwise the winner is drawn uniformly from the rest.
pub fn decide_outcome(
    config: &EngineConfig,
    team_skills: &[f64],
    rng: &mut impl Rng,
) -> MatchOutcome {
    match team_skills.len() {
        0 | 1 => MatchOutcome {
            winning_team: 0,
            skill_diff: 0.0,
            win_probability: 0.5,
            blowout: None,
        },
        2 => {
            let skill_diff = team_skills[0] - team_skills[1];
            let p = win_probability(config.gamma, team_skills[0], team_skills[1]);
            let winning_team = if rng.gen_bool(p) { 0 } else { 1 };
            let score = blowout_score(config, skill_diff.abs(), p);
            MatchOutcome {
                winning_team,
                skill_diff,
                win_probability: p,
                blowout: classify_blowout(config, score),
            }
        }
        n => {
            // FFA: reference "team" is the strongest player.
            let top = team_skills
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap().then(b.0.cmp(&a.0)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let rest_avg = team_skills
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != top)
                .map(|(_, &s)| s)
                .sum::<f64>()
                / (n - 1) as f64;
            let skill_diff = team_skills[top] - rest_avg;
            let p = win_probability(config.gamma, team_skills[top], rest_avg);
            let winning_team = if rng.gen_bool(p) {
                top
            } else {
                let mut pick = rng.gen_range(0..n - 1);
                if pick >= top {
                    pick += 1;
                }
                pick
            };
            let score = blowout_score(config, skill_diff.abs(), p);
            MatchOutcome {
                winning_team,
                skill_diff,
                win_probability: p,
                blowout: classify_blowout(config, score),
            }
        }
    }
}

/// Deterministic part of the performance model:
/// base + own-skill term + advantage over the lobby average.
pub fn expected_performance(skill: f64, lobby_avg_skill: f64) -> f64 {
    let advantage = skill - lobby_avg_skill;
    (0.3 + (skill + 1.0) / 2.0 * 0.4 + advantage * 0.2).clamp(0.0, 1.0)
}

/// Noisy observed performance in [0, 1]; uniform noise spanning ±3
/// standard deviations.
pub fn performance_sample(
    rng: &mut impl Rng,
    noise_std: f64,
    skill: f64,
    lobby_avg_skill: f64,
) -> f64 {
    let advantage = skill - lobby_avg_skill;
    let base = 0.3 + (skill + 1.0) / 2.0 * 0.4 + advantage * 0.2;
    let noise = if noise_std > 0.0 {
        let span = noise_std * 3.0;
        rng.gen_range(-span..span)
    } else {
        0.0
    };
    (base + noise).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn equal_teams_are_a_coin_flip() {
        assert!((win_probability(2.0, 0.3, 0.3) - 0.5).abs() < 1e-12);
        assert!(win_probability(2.0, 0.9, -0.9) > 0.9);
        assert!(win_probability(2.0, -0.9, 0.9) < 0.1);
    }

    #[test]
    fn blowout_score_is_monotone() {
        let config = EngineConfig::default();
        let mut last = -1.0;
        for diff in [0.0, 0.05, 0.1, 0.3, 0.6, 1.2] {
            let score = blowout_score(&config, diff, 0.5);
            assert!(score >= last);
            last = score;
        }
        let mut last = -1.0;
        for p in [0.5, 0.6, 0.75, 0.9, 0.99] {
            let score = blowout_score(&config, 0.0, p);
            assert!(score >= last);
            last = score;
        }
        // Below the dead zone the skill term contributes nothing.
        assert_eq!(blowout_score(&config, 0.05, 0.5), 0.0);
    }

    #[test]
    fn classification_bands_are_ordered() {
        let config = EngineConfig::default();
        assert_eq!(classify_blowout(&config, 0.0), None);
        assert_eq!(classify_blowout(&config, 0.2), Some(BlowoutSeverity::Mild));
        assert_eq!(
            classify_blowout(&config, 0.4),
            Some(BlowoutSeverity::Moderate)
        );
        assert_eq!(
            classify_blowout(&config, 0.9),
            Some(BlowoutSeverity::Severe)
        );
    }

    #[test]
    fn lopsided_matches_classify_as_blowouts() {
        let config = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = decide_outcome(&config, &[0.9, -0.9], &mut rng);
        assert!(outcome.blowout.is_some());
        assert!(outcome.win_probability > 0.95);

        let outcome = decide_outcome(&config, &[0.1, 0.1], &mut rng);
        assert_eq!(outcome.blowout, None);
    }

    #[test]
    fn stronger_team_wins_more_often() {
        let config = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let wins = (0..2000)
            .filter(|_| decide_outcome(&config, &[0.5, -0.5], &mut rng).winning_team == 0)
            .count();
        assert!(wins > 1600, "strong team won only {wins}/2000");
    }

    #[test]
    fn ffa_winner_is_always_in_range() {
        let config = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let skills: Vec<f64> = (0..12).map(|i| i as f64 / 12.0 - 0.5).collect();
        for _ in 0..500 {
            let outcome = decide_outcome(&config, &skills, &mut rng);
            assert!(outcome.winning_team < 12);
        }
    }

    #[test]
    fn performance_stays_in_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..1000 {
            let skill = rng.gen_range(-1.0..1.0);
            let lobby = rng.gen_range(-1.0..1.0);
            let y = performance_sample(&mut rng, 0.15, skill, lobby);
            assert!((0.0..=1.0).contains(&y));
        }
        // Expectation matches the noiseless sample.
        assert_eq!(
            expected_performance(0.4, 0.1),
            performance_sample(&mut rng, 0.0, 0.4, 0.1)
        );
    }
}
