//! Rolling statistics: bounded sample rings, per-tick time series, and
//! the plain-record snapshots handed to the host.

use crate::types::{BlowoutSeverity, Playlist, ALL_PLAYLISTS};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Cap on each rolling sample buffer.
pub const SAMPLE_RING_CAP: usize = 1_000;
/// Cap on the per-tick time-series ring.
pub const TIME_SERIES_CAP: usize = 200;
/// Bin count for the exported histograms.
pub const HISTOGRAM_BINS: usize = 20;

/// Bounded rolling sample buffer; newest sample wins once full.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleRing {
    samples: VecDeque<f64>,
    cap: usize,
}

impl SampleRing {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap.min(SAMPLE_RING_CAP)),
            cap,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.samples.iter().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }

    /// Percentile by copy-then-sort of the bounded buffer; `p` in [0, 1].
    /// Returns 0.0 on an empty ring.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
        sorted[idx]
    }
}

/// One per-tick record in the bounded time series.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub time_seconds: f64,
    pub players_offline: usize,
    pub players_in_lobby: usize,
    pub players_searching: usize,
    pub players_in_match: usize,
    pub active_searches: usize,
    pub active_matches: usize,
    pub rolling_avg_search_time: f64,
    pub rolling_avg_delta_ping: f64,
}

/// Aggregate counters and percentiles, as a plain JSON-exportable record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub tick: u64,
    pub time_seconds: f64,
    pub total_players: usize,

    pub players_offline: usize,
    pub players_in_lobby: usize,
    pub players_searching: usize,
    pub players_in_match: usize,
    pub active_searches: usize,
    pub active_matches: usize,

    pub total_matches: usize,
    pub avg_search_time: f64,
    pub search_time_p50: f64,
    pub search_time_p90: f64,
    pub search_time_p99: f64,
    pub avg_delta_ping: f64,
    pub delta_ping_p50: f64,
    pub delta_ping_p90: f64,
    pub delta_ping_p99: f64,
    pub avg_skill_disparity: f64,
    pub avg_match_quality: f64,

    pub blowout_count: usize,
    pub blowout_rate: f64,
    pub mild_blowouts: usize,
    pub moderate_blowouts: usize,
    pub severe_blowouts: usize,

    pub per_playlist: Vec<PlaylistStat>,
}

/// Per-playlist match/blowout totals.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlaylistStat {
    pub playlist: Playlist,
    pub matches: usize,
    pub blowouts: usize,
}

/// Lazily computed per-skill-bucket aggregate row.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BucketStat {
    pub bucket: usize,
    pub player_count: usize,
    pub avg_search_time: f64,
    pub avg_delta_ping: f64,
    pub win_rate: f64,
    pub matches_played: usize,
}

/// One histogram bin over `[lo, hi)`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HistBin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Histogram over `[0, max]` with `bins` equal-width bins; the bin width
/// is floored at 1.0 so degenerate sample sets stay readable.
pub fn histogram(samples: impl Iterator<Item = f64> + Clone, bins: usize) -> Vec<HistBin> {
    if samples.clone().next().is_none() {
        return Vec::new();
    }
    let max = samples.clone().fold(0.0_f64, f64::max);
    let width = (max / bins as f64).max(1.0);
    let mut counts = vec![0usize; bins];
    for sample in samples {
        let bin = ((sample / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HistBin {
            lo: i as f64 * width,
            hi: (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// Fixed-range histogram over `[lo, hi]`, for the skill distribution.
pub fn histogram_fixed(
    samples: impl Iterator<Item = f64>,
    lo: f64,
    hi: f64,
    bins: usize,
) -> Vec<HistBin> {
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for sample in samples {
        let bin = (((sample - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HistBin {
            lo: lo + i as f64 * width,
            hi: lo + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// Accumulated run statistics. Mutated only by the tick phases; the
/// read accessors on `Engine` copy out of here.
#[derive(Clone, Debug)]
pub struct EngineStats {
    pub search_times: SampleRing,
    pub delta_pings: SampleRing,
    pub skill_disparities: SampleRing,
    pub quality_scores: SampleRing,

    pub total_matches: usize,
    pub blowout_count: usize,
    pub severity_counts: HashMap<BlowoutSeverity, usize>,
    pub per_playlist_matches: HashMap<Playlist, usize>,
    pub per_playlist_blowouts: HashMap<Playlist, usize>,

    pub time_series: VecDeque<TickSnapshot>,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            search_times: SampleRing::with_capacity(SAMPLE_RING_CAP),
            delta_pings: SampleRing::with_capacity(SAMPLE_RING_CAP),
            skill_disparities: SampleRing::with_capacity(SAMPLE_RING_CAP),
            quality_scores: SampleRing::with_capacity(SAMPLE_RING_CAP),
            total_matches: 0,
            blowout_count: 0,
            severity_counts: HashMap::new(),
            per_playlist_matches: HashMap::new(),
            per_playlist_blowouts: HashMap::new(),
            time_series: VecDeque::with_capacity(TIME_SERIES_CAP),
        }
    }
}

impl EngineStats {
    /// Record a freshly created match.
    pub fn record_match_created(&mut self, playlist: Playlist, disparity: f64, quality: f64) {
        self.total_matches += 1;
        *self.per_playlist_matches.entry(playlist).or_insert(0) += 1;
        self.skill_disparities.push(disparity);
        self.quality_scores.push(quality);
    }

    /// Record a completion's blowout classification, if any.
    pub fn record_blowout(&mut self, playlist: Playlist, severity: Option<BlowoutSeverity>) {
        if let Some(severity) = severity {
            self.blowout_count += 1;
            *self.severity_counts.entry(severity).or_insert(0) += 1;
            *self.per_playlist_blowouts.entry(playlist).or_insert(0) += 1;
        }
    }

    /// Append a per-tick snapshot, pruning the ring at its cap.
    pub fn push_snapshot(&mut self, snapshot: TickSnapshot) {
        if self.time_series.len() == TIME_SERIES_CAP {
            self.time_series.pop_front();
        }
        self.time_series.push_back(snapshot);
    }

    pub fn severity(&self, severity: BlowoutSeverity) -> usize {
        self.severity_counts.get(&severity).copied().unwrap_or(0)
    }

    /// Per-playlist totals in fixed playlist order.
    pub fn playlist_rows(&self) -> Vec<PlaylistStat> {
        ALL_PLAYLISTS
            .iter()
            .map(|&playlist| PlaylistStat {
                playlist,
                matches: self.per_playlist_matches.get(&playlist).copied().unwrap_or(0),
                blowouts: self
                    .per_playlist_blowouts
                    .get(&playlist)
                    .copied()
                    .unwrap_or(0),
            })
            .collect()
    }
}
