//! The simulation engine: arena-held world state and the five-phase
//! tick loop (arrivals, search starts, matchmaking, completions,
//! statistics). All mutation happens here; the read accessors only
//! copy data out.

use crate::balance::balance_teams;
use crate::config::{ConfigError, EngineConfig};
use crate::matchmaker::{Matchmaker, PendingLobby};
use crate::outcome::{decide_outcome, expected_performance, performance_sample};
use crate::population;
use crate::retention::continue_probability;
use crate::rng::{partial_shuffle, poisson};
use crate::stats::{
    histogram, histogram_fixed, BucketStat, EngineStats, HistBin, StatsSnapshot, TickSnapshot,
    HISTOGRAM_BINS,
};
use crate::types::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Probability that an in-lobby player starts searching each tick.
const SEARCH_START_PROB: f64 = 0.3;
/// Auto-scaled arrival rate: fraction of the population per tick.
const AUTO_ARRIVAL_FRACTION: f64 = 0.002;

/// Entry-point misuse, surfaced as a structured result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("population has not been generated; call generate_population first")]
    PopulationNotGenerated,

    #[error("population of {existing} players already generated; cannot regenerate with {requested}")]
    PopulationMismatch { existing: usize, requested: usize },
}

/// A complete simulation world. One instance owns all state; a single
/// `tick()` call advances logical time by `tick_interval` seconds.
pub struct Engine {
    config: EngineConfig,
    rng: ChaCha8Rng,
    tick: u64,

    players: Vec<Player>,
    data_centers: Vec<DataCenter>,
    parties: HashMap<PartyId, Party>,
    searches: Vec<SearchObject>,
    matches: Vec<Match>,

    next_search_id: SearchId,
    next_match_id: MatchId,
    population_generated: bool,
    completions_since_rank_refresh: usize,

    stats: EngineStats,
}

impl Engine {
    /// Validate the configuration and build an empty world.
    pub fn new(config: EngineConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            players: Vec::new(),
            data_centers: population::default_data_centers(),
            parties: HashMap::new(),
            searches: Vec::new(),
            matches: Vec::new(),
            next_search_id: 0,
            next_match_id: 0,
            population_generated: false,
            completions_since_rank_refresh: 0,
            stats: EngineStats::default(),
        })
    }

    /// Generate the player population. Idempotent per engine instance:
    /// repeating the same size is a no-op, a different size is an error.
    pub fn generate_population(&mut self, count: usize) -> Result<(), EngineError> {
        if self.population_generated {
            if self.players.len() == count {
                debug!(count, "population already generated; ignoring");
                return Ok(());
            }
            return Err(EngineError::PopulationMismatch {
                existing: self.players.len(),
                requested: count,
            });
        }

        if count == 0 {
            warn!("generating an empty population; no matches will ever form");
        }
        self.players = population::generate_players(&mut self.rng, &self.data_centers, count);
        population::assign_percentiles(&mut self.players, self.config.num_skill_buckets);
        self.parties = population::assign_parties(&mut self.rng, &self.config, &mut self.players);
        self.population_generated = true;
        info!(count, parties = self.parties.len(), "population generated");
        Ok(())
    }

    /// Advance one tick: arrivals, search starts, matchmaking,
    /// completions, statistics, in that order.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        if !self.population_generated {
            return Err(EngineError::PopulationNotGenerated);
        }

        self.phase_arrivals();
        self.phase_search_starts();
        self.phase_matchmaking();
        self.phase_completions();
        self.phase_snapshot();

        #[cfg(debug_assertions)]
        self.check_invariants();

        self.tick += 1;
        Ok(())
    }

    /// Run `ticks` consecutive ticks.
    pub fn run(&mut self, ticks: u64) -> Result<(), EngineError> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase A: arrivals
    // ------------------------------------------------------------------

    fn phase_arrivals(&mut self) {
        let rate = self
            .config
            .arrival_rate
            .unwrap_or(self.players.len() as f64 * AUTO_ARRIVAL_FRACTION);
        let k = poisson(&mut self.rng, rate);
        if k == 0 {
            return;
        }

        let mut offline: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.state == PlayerState::Offline)
            .map(|p| p.id)
            .collect();
        let k = k.min(offline.len());
        partial_shuffle(&mut self.rng, &mut offline, k);
        for &pid in &offline[..k] {
            self.players[pid].state = PlayerState::InLobby;
        }
    }

    // ------------------------------------------------------------------
    // Phase B: search starts
    // ------------------------------------------------------------------

    fn phase_search_starts(&mut self) {
        for pid in 0..self.players.len() {
            if self.players[pid].state != PlayerState::InLobby {
                continue;
            }
            if !self.rng.gen_bool(SEARCH_START_PROB) {
                continue;
            }
            self.start_search(pid);
        }
    }

    /// Queue a search for a player. Solo players queue alone; party
    /// members queue as one unit once the leader rolls the start and
    /// every member is in the lobby.
    fn start_search(&mut self, pid: PlayerId) {
        let member_ids: Vec<PlayerId> = match self.players[pid].party_id {
            Some(party_id) => {
                let party = &self.parties[&party_id];
                if party.leader_id != pid {
                    return;
                }
                let all_ready = party
                    .player_ids
                    .iter()
                    .all(|&m| self.players[m].state == PlayerState::InLobby);
                if !all_ready {
                    return;
                }
                party.player_ids.clone()
            }
            None => vec![pid],
        };

        for &m in &member_ids {
            let player = &mut self.players[m];
            player.state = PlayerState::Searching;
            player.search_started_at = Some(self.tick);
        }
        let search = self.build_search(member_ids);
        self.searches.push(search);
    }

    /// Build a search object with aggregates computed from the live
    /// player table, so evolved skills are reflected at queue time.
    fn build_search(&mut self, member_ids: Vec<PlayerId>) -> SearchObject {
        let members: Vec<&Player> = member_ids.iter().map(|&m| &self.players[m]).collect();
        let n = members.len() as f64;

        let mut platforms: HashMap<Platform, usize> = HashMap::new();
        let mut input_devices: HashMap<InputDevice, usize> = HashMap::new();
        for member in &members {
            *platforms.entry(member.platform).or_insert(0) += 1;
            *input_devices.entry(member.input_device).or_insert(0) += 1;
        }

        let mut accepted_playlists = members[0].preferred_playlists.clone();
        for member in &members[1..] {
            accepted_playlists.retain(|m| member.preferred_playlists.contains(m));
        }

        // Starting DC set: every DC under the hard ping ceiling for all
        // members. The matchmaking phase narrows this every tick.
        let admissible_dcs: Vec<DataCenterId> = self
            .data_centers
            .iter()
            .filter(|dc| {
                members.iter().all(|m| {
                    m.ping_to(dc.id)
                        .map(|ping| ping <= self.config.region_max_ping(m.region))
                        .unwrap_or(false)
                })
            })
            .map(|dc| dc.id)
            .collect();

        let locations: Vec<Location> = members.iter().map(|m| m.location).collect();
        let avg_skill_percentile =
            members.iter().map(|m| m.skill_percentile).sum::<f64>() / n;

        let search = SearchObject {
            id: self.next_search_id,
            player_ids: member_ids,
            avg_skill_percentile,
            avg_location: centroid(&locations),
            platforms,
            input_devices,
            accepted_playlists,
            started_at: self.tick,
            admissible_dcs,
        };
        self.next_search_id += 1;
        search
    }

    // ------------------------------------------------------------------
    // Phase C: matchmaking
    // ------------------------------------------------------------------

    fn phase_matchmaking(&mut self) {
        let lobbies = {
            let mm = Matchmaker::new(&self.config);
            mm.refresh_admissible_dcs(
                self.tick,
                &mut self.searches,
                &self.players,
                &self.data_centers,
            );
            mm.run_pass(self.tick, &self.searches, &self.players, &self.data_centers)
        };
        for lobby in lobbies {
            self.commit_lobby(lobby);
        }
    }

    fn commit_lobby(&mut self, lobby: PendingLobby) {
        let teams = balance_teams(
            lobby.playlist,
            &lobby.player_ids,
            &self.players,
            self.config.use_exact_team_balancing,
        );
        let team_skills: Vec<f64> = teams
            .iter()
            .map(|team| {
                team.iter().map(|&pid| self.players[pid].skill).sum::<f64>() / team.len() as f64
            })
            .collect();

        let jitter = self.rng.gen_range(0.8..1.2);
        let duration_secs = lobby.playlist.nominal_duration_secs() * jitter;
        let duration_ticks = ((duration_secs / self.config.tick_interval).round() as u64).max(1);

        let match_id = self.next_match_id;
        self.next_match_id += 1;

        self.data_centers[lobby.data_center_id].reserve(lobby.playlist);

        for &pid in &lobby.player_ids {
            let search_time = {
                let player = &self.players[pid];
                player
                    .search_started_at
                    .map(|start| (self.tick - start) as f64 * self.config.tick_interval)
                    .unwrap_or(0.0)
            };
            let delta_ping = self.players[pid]
                .delta_ping_to(lobby.data_center_id)
                .unwrap_or(0.0);

            let player = &mut self.players[pid];
            push_capped(&mut player.recent_search_times, search_time, HISTORY_WINDOW);
            push_capped(&mut player.recent_delta_pings, delta_ping, HISTORY_WINDOW);
            player.state = PlayerState::InMatch;
            player.current_match = Some(match_id);
            player.search_started_at = None;

            self.stats.search_times.push(search_time);
            self.stats.delta_pings.push(delta_ping);
        }

        self.stats
            .record_match_created(lobby.playlist, lobby.skill_disparity, lobby.quality);

        debug!(
            match_id,
            playlist = ?lobby.playlist,
            dc = lobby.data_center_id,
            players = lobby.player_ids.len(),
            disparity = lobby.skill_disparity,
            "match created"
        );

        self.matches.push(Match {
            id: match_id,
            playlist: lobby.playlist,
            data_center_id: lobby.data_center_id,
            teams,
            team_skills,
            started_at: self.tick,
            duration_ticks,
            skill_disparity: lobby.skill_disparity,
            avg_delta_ping: lobby.avg_delta_ping,
            quality: lobby.quality,
        });

        self.searches
            .retain(|s| !lobby.search_ids.contains(&s.id));
    }

    // ------------------------------------------------------------------
    // Phase D: match completions
    // ------------------------------------------------------------------

    fn phase_completions(&mut self) {
        let all_matches = std::mem::take(&mut self.matches);
        for m in all_matches {
            if self.tick >= m.started_at + m.duration_ticks {
                self.complete_match(m);
            } else {
                self.matches.push(m);
            }
        }
    }

    fn complete_match(&mut self, m: Match) {
        self.data_centers[m.data_center_id].release(m.playlist);

        let outcome = decide_outcome(&self.config, &m.team_skills, &mut self.rng);
        let is_blowout = outcome.blowout.is_some();
        self.stats.record_blowout(m.playlist, outcome.blowout);

        let all_players: Vec<PlayerId> = m.player_ids().collect();
        let lobby_avg_skill = if all_players.is_empty() {
            0.0
        } else {
            all_players
                .iter()
                .map(|&pid| self.players[pid].skill)
                .sum::<f64>()
                / all_players.len() as f64
        };

        // First pass: draw performances (and evolve skill when enabled).
        let mut performances: HashMap<PlayerId, f64> = HashMap::new();
        for &pid in &all_players {
            let skill = self.players[pid].skill;
            let perf = performance_sample(
                &mut self.rng,
                self.config.performance_noise_std,
                skill,
                lobby_avg_skill,
            );
            performances.insert(pid, perf);

            let player = &mut self.players[pid];
            push_capped(&mut player.recent_performance, perf, HISTORY_WINDOW);
            if self.config.enable_skill_evolution {
                let expected = expected_performance(skill, lobby_avg_skill);
                let delta = self.config.skill_learning_rate * (perf - expected);
                player.skill = (player.skill + delta).clamp(-1.0, 1.0);
            }
        }

        // Second pass: record results and decide continue vs. quit.
        for (team_idx, team) in m.teams.iter().enumerate() {
            let won = team_idx == outcome.winning_team;
            for &pid in team {
                let player = &mut self.players[pid];
                player.matches_played += 1;
                if won {
                    player.wins += 1;
                } else {
                    player.losses += 1;
                }
                push_capped(&mut player.recent_blowouts, is_blowout, HISTORY_WINDOW);
                player.current_match = None;

                let experience = MatchExperience {
                    delta_ping: player.recent_delta_pings.last().copied().unwrap_or(0.0),
                    search_time_secs: player.recent_search_times.last().copied().unwrap_or(0.0),
                    blowout: is_blowout,
                    won,
                    performance: performances.get(&pid).copied().unwrap_or(0.5),
                };
                push_capped(
                    &mut player.recent_experience,
                    experience,
                    self.config.retention.experience_window,
                );

                let p_continue =
                    continue_probability(&self.config.retention, &player.recent_experience);
                self.players[pid].state = if self.rng.gen_bool(p_continue) {
                    PlayerState::InLobby
                } else {
                    PlayerState::Offline
                };
            }
        }

        if self.config.enable_skill_evolution {
            self.completions_since_rank_refresh += 1;
            if self.completions_since_rank_refresh >= self.config.skill_update_batch_size {
                population::assign_percentiles(&mut self.players, self.config.num_skill_buckets);
                self.completions_since_rank_refresh = 0;
                debug!(tick = self.tick, "skill percentiles recomputed");
            }
        }

        debug!(
            match_id = m.id,
            playlist = ?m.playlist,
            winning_team = outcome.winning_team,
            blowout = ?outcome.blowout,
            "match completed"
        );
    }

    // ------------------------------------------------------------------
    // Phase E: statistics snapshot
    // ------------------------------------------------------------------

    fn phase_snapshot(&mut self) {
        let (offline, in_lobby, searching, in_match) = self.state_counts();
        self.stats.push_snapshot(TickSnapshot {
            tick: self.tick,
            time_seconds: self.tick as f64 * self.config.tick_interval,
            players_offline: offline,
            players_in_lobby: in_lobby,
            players_searching: searching,
            players_in_match: in_match,
            active_searches: self.searches.len(),
            active_matches: self.matches.len(),
            rolling_avg_search_time: self.stats.search_times.mean(),
            rolling_avg_delta_ping: self.stats.delta_pings.mean(),
        });
    }

    fn state_counts(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for player in &self.players {
            match player.state {
                PlayerState::Offline => counts.0 += 1,
                PlayerState::InLobby => counts.1 += 1,
                PlayerState::Searching => counts.2 += 1,
                PlayerState::InMatch => counts.3 += 1,
            }
        }
        counts
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    /// Aggregate counters and percentiles as a plain record.
    pub fn get_stats(&self) -> StatsSnapshot {
        let (offline, in_lobby, searching, in_match) = self.state_counts();
        let s = &self.stats;
        StatsSnapshot {
            tick: self.tick,
            time_seconds: self.tick as f64 * self.config.tick_interval,
            total_players: self.players.len(),
            players_offline: offline,
            players_in_lobby: in_lobby,
            players_searching: searching,
            players_in_match: in_match,
            active_searches: self.searches.len(),
            active_matches: self.matches.len(),
            total_matches: s.total_matches,
            avg_search_time: s.search_times.mean(),
            search_time_p50: s.search_times.percentile(0.50),
            search_time_p90: s.search_times.percentile(0.90),
            search_time_p99: s.search_times.percentile(0.99),
            avg_delta_ping: s.delta_pings.mean(),
            delta_ping_p50: s.delta_pings.percentile(0.50),
            delta_ping_p90: s.delta_pings.percentile(0.90),
            delta_ping_p99: s.delta_pings.percentile(0.99),
            avg_skill_disparity: s.skill_disparities.mean(),
            avg_match_quality: s.quality_scores.mean(),
            blowout_count: s.blowout_count,
            blowout_rate: if s.total_matches > 0 {
                s.blowout_count as f64 / s.total_matches as f64
            } else {
                0.0
            },
            mild_blowouts: s.severity(BlowoutSeverity::Mild),
            moderate_blowouts: s.severity(BlowoutSeverity::Moderate),
            severe_blowouts: s.severity(BlowoutSeverity::Severe),
            per_playlist: s.playlist_rows(),
        }
    }

    /// One row per skill bucket, computed on demand from the player
    /// table and each player's experience rings.
    pub fn get_bucket_stats(&self) -> Vec<BucketStat> {
        let mut rows = Vec::new();
        for bucket in 1..=self.config.num_skill_buckets {
            let members: Vec<&Player> = self
                .players
                .iter()
                .filter(|p| p.skill_bucket == bucket)
                .collect();
            if members.is_empty() {
                continue;
            }

            let ring_mean = |ring: &Vec<f64>| -> Option<f64> {
                if ring.is_empty() {
                    None
                } else {
                    Some(ring.iter().sum::<f64>() / ring.len() as f64)
                }
            };
            let mean_of = |values: Vec<f64>| -> f64 {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            };

            let avg_search_time = mean_of(
                members
                    .iter()
                    .filter_map(|p| ring_mean(&p.recent_search_times))
                    .collect(),
            );
            let avg_delta_ping = mean_of(
                members
                    .iter()
                    .filter_map(|p| ring_mean(&p.recent_delta_pings))
                    .collect(),
            );
            let total_wins: usize = members.iter().map(|p| p.wins).sum();
            let total_matches: usize = members.iter().map(|p| p.matches_played).sum();

            rows.push(BucketStat {
                bucket,
                player_count: members.len(),
                avg_search_time,
                avg_delta_ping,
                win_rate: if total_matches > 0 {
                    total_wins as f64 / total_matches as f64
                } else {
                    0.0
                },
                matches_played: total_matches,
            });
        }
        rows
    }

    /// Histogram of raw skill over the fixed [-1, 1] range.
    pub fn get_skill_distribution(&self) -> Vec<HistBin> {
        histogram_fixed(
            self.players.iter().map(|p| p.skill),
            -1.0,
            1.0,
            HISTOGRAM_BINS,
        )
    }

    pub fn get_search_time_histogram(&self) -> Vec<HistBin> {
        histogram(self.stats.search_times.iter(), HISTOGRAM_BINS)
    }

    pub fn get_delta_ping_histogram(&self) -> Vec<HistBin> {
        histogram(self.stats.delta_pings.iter(), HISTOGRAM_BINS)
    }

    /// The bounded per-tick time series, oldest first.
    pub fn get_time_series(&self) -> Vec<TickSnapshot> {
        self.stats.time_series.iter().copied().collect()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn population_size(&self) -> usize {
        self.players.len()
    }

    pub fn active_search_count(&self) -> usize {
        self.searches.len()
    }

    pub fn active_match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the player arena.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Read-only view of the live search queue.
    pub fn searches(&self) -> &[SearchObject] {
        &self.searches
    }

    /// Read-only view of the live match table.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    // ------------------------------------------------------------------
    // Invariant sweep (debug builds)
    // ------------------------------------------------------------------

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        use std::collections::HashSet;

        let (offline, in_lobby, searching, in_match) = self.state_counts();
        assert_eq!(
            offline + in_lobby + searching + in_match,
            self.players.len(),
            "state counts must partition the population"
        );

        let mut searching_members: HashSet<PlayerId> = HashSet::new();
        for search in &self.searches {
            for &pid in &search.player_ids {
                assert!(
                    searching_members.insert(pid),
                    "player {pid} is in two live searches"
                );
                assert_eq!(
                    self.players[pid].state,
                    PlayerState::Searching,
                    "search member {pid} is not Searching"
                );
            }
        }
        assert_eq!(
            searching_members.len(),
            searching,
            "every Searching player must be in exactly one live search"
        );

        let mut match_members: HashSet<PlayerId> = HashSet::new();
        for m in &self.matches {
            let mut partition: HashSet<PlayerId> = HashSet::new();
            for team in &m.teams {
                assert!(!team.is_empty(), "match {} has an empty team", m.id);
                for &pid in team {
                    assert!(
                        partition.insert(pid),
                        "match {} team partition repeats player {pid}",
                        m.id
                    );
                    assert!(
                        match_members.insert(pid),
                        "player {pid} is in two live matches"
                    );
                    assert_eq!(self.players[pid].current_match, Some(m.id));
                }
            }
            assert_eq!(
                partition.len(),
                m.player_count(),
                "match {} team partition must cover exactly its player set",
                m.id
            );
        }
        for player in &self.players {
            assert_eq!(
                player.current_match.is_some(),
                player.state == PlayerState::InMatch,
                "current_match must be set iff InMatch (player {})",
                player.id
            );
        }

        // Busy counters pair one reserve per live match with one release
        // at completion; equality with the live match table implies they
        // can never have gone negative.
        for dc in &self.data_centers {
            for (&playlist, &busy) in &dc.busy_servers {
                let live = self
                    .matches
                    .iter()
                    .filter(|m| m.data_center_id == dc.id && m.playlist == playlist)
                    .count();
                assert_eq!(
                    busy, live,
                    "DC {} busy counter for {playlist:?} out of step with its live matches",
                    dc.id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(population: usize) -> Engine {
        let mut engine = Engine::new(EngineConfig::default(), 0xC0D).unwrap();
        engine.generate_population(population).unwrap();
        engine
    }

    #[test]
    fn tick_before_population_is_rejected() {
        let mut engine = Engine::new(EngineConfig::default(), 1).unwrap();
        assert_eq!(engine.tick(), Err(EngineError::PopulationNotGenerated));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = EngineConfig::default();
        config.tick_interval = 0.0;
        assert!(Engine::new(config, 1).is_err());
    }

    #[test]
    fn population_generation_is_idempotent() {
        let mut engine = engine_with(100);
        engine.generate_population(100).unwrap();
        assert_eq!(engine.population_size(), 100);
        assert_eq!(
            engine.generate_population(200),
            Err(EngineError::PopulationMismatch {
                existing: 100,
                requested: 200
            })
        );
    }

    #[test]
    fn zero_population_tick_is_a_noop_except_time_series() {
        let mut engine = engine_with(0);
        engine.run(5).unwrap();
        assert_eq!(engine.current_tick(), 5);
        assert_eq!(engine.get_stats().total_matches, 0);
        assert_eq!(engine.get_time_series().len(), 5);
        assert_eq!(engine.active_search_count(), 0);
    }

    #[test]
    fn small_world_forms_matches_and_holds_invariants() {
        let mut engine = engine_with(400);
        engine.run(200).unwrap();
        let stats = engine.get_stats();
        assert!(stats.total_matches > 0, "no matches after 200 ticks");
        assert_eq!(
            stats.players_offline
                + stats.players_in_lobby
                + stats.players_searching
                + stats.players_in_match,
            400
        );
    }

    #[test]
    fn match_lifecycle_returns_players() {
        let mut engine = engine_with(400);
        // Long enough for at least one full match cycle (600 s at 5 s
        // per tick is 120 ticks, plus queue time).
        engine.run(400).unwrap();
        let stats = engine.get_stats();
        assert!(stats.total_matches > 0);
        // Some players finished at least one match.
        assert!(engine.players().iter().any(|p| p.matches_played > 0));
        // Wins and losses tally per finished match.
        let wins: usize = engine.players().iter().map(|p| p.wins).sum();
        let losses: usize = engine.players().iter().map(|p| p.losses).sum();
        assert!(wins > 0);
        assert!(losses > 0);
    }

    #[test]
    fn parties_queue_and_play_together() {
        let mut config = EngineConfig::default();
        config.party_player_fraction = 0.5;
        let mut engine = Engine::new(config, 0xC0D).unwrap();
        engine.generate_population(600).unwrap();
        assert!(engine.party_count() > 0);
        engine.run(100).unwrap();

        // Any queued party search carries the whole party.
        for search in engine.searches() {
            if let Some(party_id) = engine.players()[search.player_ids[0]].party_id {
                let party_size = search
                    .player_ids
                    .iter()
                    .filter(|&&p| engine.players()[p].party_id == Some(party_id))
                    .count();
                assert_eq!(party_size, search.player_ids.len());
            }
        }
    }

    #[test]
    fn snapshot_counts_match_accessors() {
        let mut engine = engine_with(300);
        engine.run(50).unwrap();
        let stats = engine.get_stats();
        assert_eq!(stats.active_searches, engine.active_search_count());
        assert_eq!(stats.active_matches, engine.active_match_count());
        assert_eq!(stats.total_players, 300);
        let series = engine.get_time_series();
        assert_eq!(series.len(), 50);
        assert_eq!(series.last().unwrap().tick, 49);
    }
}
