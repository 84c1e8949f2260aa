//! Per-tick lobby construction: seed+greedy growth over a ranked
//! candidate list, with time-relaxing feasibility constraints.

use crate::config::EngineConfig;
use crate::types::*;
use std::collections::HashSet;
use std::hash::Hash;

/// A fully constructed lobby, ready for the engine to commit.
#[derive(Clone, Debug)]
pub struct PendingLobby {
    pub playlist: Playlist,
    pub data_center_id: DataCenterId,
    pub search_ids: Vec<SearchId>,
    pub player_ids: Vec<PlayerId>,
    /// Percentile range across the lobby's searches.
    pub skill_disparity: f64,
    pub avg_delta_ping: f64,
    pub quality: f64,
}

pub struct Matchmaker<'a> {
    config: &'a EngineConfig,
}

impl<'a> Matchmaker<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Recompute every live search's admissible DC set for the current
    /// tick. A DC qualifies only if every member tolerates it: ping
    /// within the member's relaxed delta-ping window and under the hard
    /// regional ping ceiling.
    pub fn refresh_admissible_dcs(
        &self,
        current_tick: u64,
        searches: &mut [SearchObject],
        players: &[Player],
        data_centers: &[DataCenter],
    ) {
        for search in searches.iter_mut() {
            let wait = search.wait_secs(current_tick, self.config.tick_interval);
            search.admissible_dcs = data_centers
                .iter()
                .filter(|dc| {
                    search.player_ids.iter().all(|&pid| {
                        let player = &players[pid];
                        let allowed_delta =
                            self.config.region_delta_ping_backoff(player.region, wait);
                        match player.ping_to(dc.id) {
                            Some(ping) => {
                                ping <= player.best_ping + allowed_delta
                                    && ping <= self.config.region_max_ping(player.region)
                            }
                            None => false,
                        }
                    })
                })
                .map(|dc| dc.id)
                .collect();
        }
    }

    /// One full matchmaking pass over all playlists. Searches consumed
    /// by a committed lobby are skipped for the rest of the tick; the
    /// engine removes them afterwards.
    pub fn run_pass(
        &self,
        current_tick: u64,
        searches: &[SearchObject],
        players: &[Player],
        data_centers: &[DataCenter],
    ) -> Vec<PendingLobby> {
        let mut lobbies = Vec::new();
        let mut consumed: HashSet<SearchId> = HashSet::new();

        // Oldest first, SearchID as the deterministic tiebreaker.
        let mut order: Vec<usize> = (0..searches.len()).collect();
        order.sort_by_key(|&i| (searches[i].started_at, searches[i].id));

        for playlist in ALL_PLAYLISTS {
            let eligible: Vec<usize> = order
                .iter()
                .copied()
                .filter(|&i| searches[i].accepted_playlists.contains(&playlist))
                .collect();
            if eligible.is_empty() {
                continue;
            }

            // Not enough queued players to ever fill this playlist: skip
            // the per-seed ranking work entirely.
            let queued: usize = eligible
                .iter()
                .filter(|&&i| !consumed.contains(&searches[i].id))
                .map(|&i| searches[i].size())
                .sum();
            if queued < playlist.required_players() && !self.config.allow_underfull_lobbies {
                continue;
            }

            for &seed_idx in &eligible {
                if consumed.contains(&searches[seed_idx].id) {
                    continue;
                }
                if let Some(lobby) = self.grow_lobby(
                    current_tick,
                    playlist,
                    seed_idx,
                    &eligible,
                    searches,
                    players,
                    data_centers,
                    &consumed,
                ) {
                    consumed.extend(lobby.search_ids.iter().copied());
                    lobbies.push(lobby);
                }
            }
        }

        lobbies
    }

    /// Greedily grow a lobby around one seed. Returns a lobby only when
    /// it can be committed (full, or under-full once allowed).
    #[allow(clippy::too_many_arguments)]
    fn grow_lobby(
        &self,
        current_tick: u64,
        playlist: Playlist,
        seed_idx: usize,
        eligible: &[usize],
        searches: &[SearchObject],
        players: &[Player],
        data_centers: &[DataCenter],
        consumed: &HashSet<SearchId>,
    ) -> Option<PendingLobby> {
        let required = playlist.required_players();
        let seed = &searches[seed_idx];
        if seed.size() > required {
            return None;
        }

        // Rank the other eligible searches by distance from the seed and
        // keep the top K.
        let mut candidates: Vec<(usize, f64)> = eligible
            .iter()
            .copied()
            .filter(|&i| i != seed_idx && !consumed.contains(&searches[i].id))
            .map(|i| (i, self.distance(seed, &searches[i])))
            .collect();
        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap()
                .then(searches[a.0].id.cmp(&searches[b.0].id))
        });
        candidates.truncate(self.config.top_k_candidates);

        let mut lobby = vec![seed_idx];
        let mut lobby_size = seed.size();

        for (cand_idx, _) in candidates {
            if lobby_size >= required {
                break;
            }
            let candidate = &searches[cand_idx];
            if lobby_size + candidate.size() > required {
                continue;
            }
            let trial: Vec<&SearchObject> = lobby
                .iter()
                .map(|&i| &searches[i])
                .chain(std::iter::once(candidate))
                .collect();
            if self.feasible(current_tick, playlist, &trial, data_centers) {
                lobby.push(cand_idx);
                lobby_size += candidate.size();
            }
        }

        let members: Vec<&SearchObject> = lobby.iter().map(|&i| &searches[i]).collect();
        let full = lobby_size == required;
        if !full && !self.underfull_commit_allowed(current_tick, lobby_size, &members) {
            return None;
        }
        if !self.feasible(current_tick, playlist, &members, data_centers) {
            return None;
        }

        let common = self.common_dcs(&members);
        let player_ids: Vec<PlayerId> = members
            .iter()
            .flat_map(|s| s.player_ids.iter().copied())
            .collect();
        let dc = self.select_dc(playlist, &common, &player_ids, players, data_centers)?;

        let avg_delta_ping = average_delta_ping(&player_ids, players, dc);
        let (lo, hi) = percentile_range(&members);
        let wait_secs: Vec<f64> = members
            .iter()
            .map(|s| s.wait_secs(current_tick, self.config.tick_interval))
            .collect();
        let quality = self.quality(&members, avg_delta_ping, &wait_secs);

        Some(PendingLobby {
            playlist,
            data_center_id: dc,
            search_ids: members.iter().map(|s| s.id).collect(),
            player_ids,
            skill_disparity: hi - lo,
            avg_delta_ping,
            quality,
        })
    }

    /// Weighted distance between two searches; lower is a better fit.
    pub fn distance(&self, a: &SearchObject, b: &SearchObject) -> f64 {
        let geo = a.avg_location.distance_km(&b.avg_location) / 20_000.0;
        let skill = (a.avg_skill_percentile - b.avg_skill_percentile).abs();
        let input = mismatch_fraction(&a.input_devices, &b.input_devices);
        let platform = mismatch_fraction(&a.platforms, &b.platforms);
        self.config.weight_geo * geo
            + self.config.weight_skill * skill
            + self.config.weight_input * input
            + self.config.weight_platform * platform
    }

    /// The five feasibility checks of a candidate lobby, in order;
    /// rejects on the first violation.
    pub fn feasible(
        &self,
        current_tick: u64,
        playlist: Playlist,
        lobby: &[&SearchObject],
        data_centers: &[DataCenter],
    ) -> bool {
        let total: usize = lobby.iter().map(|s| s.size()).sum();
        if total > playlist.required_players() {
            return false;
        }

        let (lo, hi) = percentile_range(lobby);
        let range = hi - lo;
        for search in lobby {
            let wait = search.wait_secs(current_tick, self.config.tick_interval);
            if range > 2.0 * self.config.skill_similarity_backoff(wait) {
                return false;
            }
        }
        for search in lobby {
            let wait = search.wait_secs(current_tick, self.config.tick_interval);
            if range > self.config.skill_disparity_backoff(wait) {
                return false;
            }
        }

        let common = self.common_dcs(lobby);
        if common.is_empty() {
            return false;
        }
        if self.config.enforce_server_capacity
            && !common
                .iter()
                .any(|&dc| data_centers[dc].has_capacity(playlist))
        {
            return false;
        }
        true
    }

    /// Intersection of the lobby's admissible DC sets, ascending by id.
    fn common_dcs(&self, lobby: &[&SearchObject]) -> Vec<DataCenterId> {
        let Some((first, rest)) = lobby.split_first() else {
            return Vec::new();
        };
        let mut common = first.admissible_dcs.clone();
        for search in rest {
            common.retain(|dc| search.admissible_dcs.contains(dc));
        }
        common
    }

    /// Choose the committed DC: minimum average delta ping across the
    /// lobby, smallest id on ties, skipping DCs at capacity.
    fn select_dc(
        &self,
        playlist: Playlist,
        common: &[DataCenterId],
        player_ids: &[PlayerId],
        players: &[Player],
        data_centers: &[DataCenter],
    ) -> Option<DataCenterId> {
        common
            .iter()
            .copied()
            .filter(|&dc| {
                !self.config.enforce_server_capacity || data_centers[dc].has_capacity(playlist)
            })
            .map(|dc| (dc, average_delta_ping(player_ids, players, dc)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)))
            .map(|(dc, _)| dc)
    }

    fn underfull_commit_allowed(
        &self,
        current_tick: u64,
        lobby_size: usize,
        members: &[&SearchObject],
    ) -> bool {
        self.config.allow_underfull_lobbies
            && lobby_size >= 2
            && members.iter().all(|s| {
                s.wait_secs(current_tick, self.config.tick_interval)
                    >= self.config.underfull_wait_floor_secs
            })
    }

    /// Match quality in [0, 1]: low delta ping, tight skill spread, and
    /// credit for clearing long waits.
    fn quality(&self, lobby: &[&SearchObject], avg_delta_ping: f64, wait_secs: &[f64]) -> f64 {
        let ping_quality = 1.0 - (avg_delta_ping / self.config.max_ping).clamp(0.0, 1.0);

        let n = lobby.len() as f64;
        let mean = lobby.iter().map(|s| s.avg_skill_percentile).sum::<f64>() / n;
        let variance = lobby
            .iter()
            .map(|s| (s.avg_skill_percentile - mean).powi(2))
            .sum::<f64>()
            / n;
        let balance_quality = 1.0 - (variance * 4.0).min(1.0);

        let avg_wait = wait_secs.iter().sum::<f64>() / wait_secs.len().max(1) as f64;
        let wait_quality = (avg_wait / 60.0).min(1.0);

        self.config.quality_weight_ping * ping_quality
            + self.config.quality_weight_skill_balance * balance_quality
            + self.config.quality_weight_wait_time * wait_quality
    }
}

/// Fraction of cross-member pairs whose tag differs, in [0, 1].
fn mismatch_fraction<K: Eq + Hash>(
    a: &std::collections::HashMap<K, usize>,
    b: &std::collections::HashMap<K, usize>,
) -> f64 {
    let na: usize = a.values().sum();
    let nb: usize = b.values().sum();
    if na == 0 || nb == 0 {
        return 0.0;
    }
    let matched: usize = a
        .iter()
        .map(|(k, &ca)| ca * b.get(k).copied().unwrap_or(0))
        .sum();
    1.0 - matched as f64 / (na * nb) as f64
}

fn percentile_range(lobby: &[&SearchObject]) -> (f64, f64) {
    let lo = lobby
        .iter()
        .map(|s| s.avg_skill_percentile)
        .fold(f64::MAX, f64::min);
    let hi = lobby
        .iter()
        .map(|s| s.avg_skill_percentile)
        .fold(f64::MIN, f64::max);
    (lo, hi)
}

fn average_delta_ping(player_ids: &[PlayerId], players: &[Player], dc: DataCenterId) -> f64 {
    if player_ids.is_empty() {
        return 0.0;
    }
    let total: f64 = player_ids
        .iter()
        .filter_map(|&pid| players[pid].delta_ping_to(dc))
        .sum();
    total / player_ids.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn solo_search(id: SearchId, percentile: f64, started_at: u64) -> SearchObject {
        SearchObject {
            id,
            player_ids: vec![id as PlayerId],
            avg_skill_percentile: percentile,
            avg_location: Location::new(0.0, 0.0),
            platforms: HashMap::from([(Platform::PC, 1)]),
            input_devices: HashMap::from([(InputDevice::Controller, 1)]),
            accepted_playlists: HashSet::from([Playlist::TeamDeathmatch]),
            started_at,
            admissible_dcs: vec![0],
        }
    }

    fn test_players(count: usize) -> Vec<Player> {
        (0..count)
            .map(|id| {
                let mut p = Player::new(id, Location::new(0.0, 0.0), 0.0);
                p.dc_pings = HashMap::from([(0, 30.0), (1, 80.0)]);
                p.best_dc = Some(0);
                p.best_ping = 30.0;
                p
            })
            .collect()
    }

    #[test]
    fn fresh_searches_with_wide_skill_gap_are_infeasible() {
        let config = EngineConfig::default();
        let mm = Matchmaker::new(&config);
        let dcs = crate::population::default_data_centers();
        let a = solo_search(0, 0.40, 0);
        let b = solo_search(1, 0.60, 0);
        // Range 0.2 exceeds both fresh windows (2 * 0.05) at wait 0.
        assert!(!mm.feasible(0, Playlist::TeamDeathmatch, &[&a, &b], &dcs));
        // After enough waiting the windows relax and the pair qualifies.
        assert!(mm.feasible(100, Playlist::TeamDeathmatch, &[&a, &b], &dcs));
    }

    #[test]
    fn disparity_cap_gates_lobbies_the_similarity_window_admits() {
        // Wide similarity window: 2 * 0.3 easily admits a 0.2 range.
        let mut config = EngineConfig::default();
        config.skill_similarity_initial = 0.3;
        // Disparity curve pinned below the range, with no relaxation.
        config.max_skill_disparity_initial = 0.1;
        config.max_skill_disparity_rate = 0.0;
        config.max_skill_disparity_max = 0.1;

        let a = solo_search(0, 0.40, 0);
        let b = solo_search(1, 0.60, 0);
        let dcs = crate::population::default_data_centers();

        let mm = Matchmaker::new(&config);
        assert!(
            !mm.feasible(0, Playlist::TeamDeathmatch, &[&a, &b], &dcs),
            "disparity cap of 0.1 must reject a 0.2 range"
        );

        // Loosening only the disparity curve admits the same pair, so
        // the rejection above came from the disparity check alone.
        let mut loose = config.clone();
        loose.max_skill_disparity_initial = 0.3;
        loose.max_skill_disparity_max = 0.3;
        let mm = Matchmaker::new(&loose);
        assert!(mm.feasible(0, Playlist::TeamDeathmatch, &[&a, &b], &dcs));
    }

    #[test]
    fn disjoint_dc_sets_are_infeasible() {
        let config = EngineConfig::default();
        let mm = Matchmaker::new(&config);
        let dcs = crate::population::default_data_centers();
        let a = solo_search(0, 0.50, 0);
        let mut b = solo_search(1, 0.50, 0);
        b.admissible_dcs = vec![1];
        assert!(!mm.feasible(0, Playlist::TeamDeathmatch, &[&a, &b], &dcs));
    }

    #[test]
    fn hard_max_ping_gate_survives_any_wait() {
        // The only other DC sits 500 ms above best ping, far over the
        // 200 ms ceiling: the admissible set must collapse to the best
        // DC no matter how long the search has aged.
        let config = EngineConfig::default();
        let mm = Matchmaker::new(&config);
        let mut players = test_players(1);
        players[0].dc_pings = HashMap::from([(0, 30.0), (1, 530.0)]);
        let dcs = crate::population::default_data_centers();
        let mut searches = vec![solo_search(0, 0.5, 0)];

        mm.refresh_admissible_dcs(1_000_000, &mut searches, &players, &dcs);
        assert_eq!(searches[0].admissible_dcs, vec![0]);

        // And if even the best DC is over the ceiling, nothing remains.
        players[0].dc_pings = HashMap::from([(0, 230.0), (1, 530.0)]);
        players[0].best_ping = 230.0;
        mm.refresh_admissible_dcs(1_000_000, &mut searches, &players, &dcs);
        assert!(searches[0].admissible_dcs.is_empty());
    }

    #[test]
    fn delta_ping_window_widens_with_wait() {
        let config = EngineConfig::default();
        let mm = Matchmaker::new(&config);
        let players = test_players(1);
        let dcs = crate::population::default_data_centers();
        let mut searches = vec![solo_search(0, 0.5, 0)];

        // Fresh: delta 50 over best exceeds the initial 10 ms window.
        mm.refresh_admissible_dcs(0, &mut searches, &players, &dcs);
        assert_eq!(searches[0].admissible_dcs, vec![0]);

        // 10 ticks * 5 s * 2 ms/s = 110 ms allowance: DC 1 joins.
        mm.refresh_admissible_dcs(10, &mut searches, &players, &dcs);
        assert_eq!(searches[0].admissible_dcs, vec![0, 1]);
    }

    #[test]
    fn full_lobby_commits_with_min_delta_ping_dc() {
        let config = EngineConfig::default();
        let mm = Matchmaker::new(&config);
        let players = test_players(12);
        let dcs = crate::population::default_data_centers();
        let searches: Vec<SearchObject> =
            (0..12).map(|i| solo_search(i, 0.5, i % 3)).collect();

        let lobbies = mm.run_pass(10, &searches, &players, &dcs);
        assert_eq!(lobbies.len(), 1);
        let lobby = &lobbies[0];
        assert_eq!(lobby.player_ids.len(), 12);
        assert_eq!(lobby.data_center_id, 0);
        assert_eq!(lobby.search_ids.len(), 12);
        assert!(lobby.avg_delta_ping.abs() < 1e-9);
    }

    #[test]
    fn underfull_lobby_needs_flag_and_aged_members() {
        let mut config = EngineConfig::default();
        let players = test_players(4);
        let dcs = crate::population::default_data_centers();
        let searches: Vec<SearchObject> = (0..4).map(|i| solo_search(i, 0.5, 0)).collect();

        // 4 of 12 players: no commit by default.
        let mm = Matchmaker::new(&config);
        assert!(mm.run_pass(100, &searches, &players, &dcs).is_empty());

        config.allow_underfull_lobbies = true;
        let mm = Matchmaker::new(&config);
        // Wait floor (120 s = 24 ticks) not yet met.
        assert!(mm.run_pass(10, &searches, &players, &dcs).is_empty());
        // Aged past the floor: the partial lobby goes out.
        let lobbies = mm.run_pass(100, &searches, &players, &dcs);
        assert_eq!(lobbies.len(), 1);
        assert_eq!(lobbies[0].player_ids.len(), 4);
    }

    #[test]
    fn mismatch_fraction_bounds() {
        let all_pc = HashMap::from([(Platform::PC, 2)]);
        let all_xbox = HashMap::from([(Platform::Xbox, 3)]);
        let mixed = HashMap::from([(Platform::PC, 1), (Platform::Xbox, 1)]);
        assert_eq!(mismatch_fraction(&all_pc, &all_pc), 0.0);
        assert_eq!(mismatch_fraction(&all_pc, &all_xbox), 1.0);
        assert!((mismatch_fraction(&all_pc, &mixed) - 0.5).abs() < 1e-9);
        assert_eq!(mismatch_fraction(&all_pc, &HashMap::new()), 0.0);
    }

    #[test]
    fn candidate_ranking_prefers_similar_skill() {
        let mut config = EngineConfig::default();
        config.weight_geo = 0.0;
        config.weight_input = 0.0;
        config.weight_platform = 0.0;
        let mm = Matchmaker::new(&config);
        let near = solo_search(1, 0.52, 0);
        let far = solo_search(2, 0.90, 0);
        let seed = solo_search(0, 0.50, 0);
        assert!(mm.distance(&seed, &near) < mm.distance(&seed, &far));
    }

    #[test]
    fn oldest_search_seeds_first() {
        let config = EngineConfig::default();
        let mm = Matchmaker::new(&config);
        let players = test_players(13);
        let dcs = crate::population::default_data_centers();
        // 13 candidates for a 12-player lobby; the newest (highest
        // started_at) search should be the one left out.
        let mut searches: Vec<SearchObject> =
            (0..12).map(|i| solo_search(i, 0.5, 0)).collect();
        searches.push(solo_search(12, 0.5, 50));

        let lobbies = mm.run_pass(60, &searches, &players, &dcs);
        assert_eq!(lobbies.len(), 1);
        assert!(!lobbies[0].search_ids.contains(&12));
    }
}
