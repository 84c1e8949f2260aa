use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Dense arena index of a player; players are never destroyed.
pub type PlayerId = usize;
/// Monotone id of a queued search object.
pub type SearchId = u64;
/// Monotone id of an active match.
pub type MatchId = u64;
/// Index into the fixed data-center table.
pub type DataCenterId = usize;
/// Monotone id of a pre-made party.
pub type PartyId = usize;

/// Cap on the per-player experience rings (recent pings, waits, blowouts).
pub const HISTORY_WINDOW: usize = 10;

/// Geographic coordinates in degrees.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle (haversine) distance in kilometers.
    pub fn distance_km(&self, other: &Location) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
    }
}

/// Centroid of a non-empty slice of locations.
pub fn centroid(points: &[Location]) -> Location {
    let n = points.len().max(1) as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.lon).sum::<f64>() / n;
    Location::new(lat, lon)
}

/// Coarse geographic region, used for per-region config overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
    SouthAmerica,
    Other,
}

impl Region {
    /// Region tag for a coordinate, by bounding box.
    pub fn from_location(loc: Location) -> Region {
        let (lat, lon) = (loc.lat, loc.lon);
        if (25.0..=70.0).contains(&lat) && (-130.0..=-50.0).contains(&lon) {
            Region::NorthAmerica
        } else if (35.0..=70.0).contains(&lat) && (-10.0..=40.0).contains(&lon) {
            Region::Europe
        } else if (-50.0..=50.0).contains(&lat)
            && ((100.0..=180.0).contains(&lon) || (-180.0..=-120.0).contains(&lon))
        {
            Region::AsiaPacific
        } else if (-60.0..=15.0).contains(&lat) && (-90.0..=-30.0).contains(&lon) {
            Region::SouthAmerica
        } else {
            Region::Other
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    PC,
    PlayStation,
    Xbox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputDevice {
    Controller,
    MouseKeyboard,
}

/// Player lifecycle state; exactly one at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Offline,
    InLobby,
    Searching,
    InMatch,
}

/// Closed set of game modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Playlist {
    TeamDeathmatch,
    SearchAndDestroy,
    Domination,
    GroundWar,
    FreeForAll,
}

/// Fixed processing order for per-playlist matchmaking passes.
pub const ALL_PLAYLISTS: [Playlist; 5] = [
    Playlist::TeamDeathmatch,
    Playlist::SearchAndDestroy,
    Playlist::Domination,
    Playlist::GroundWar,
    Playlist::FreeForAll,
];

impl Playlist {
    /// Total players needed to fill a match.
    pub fn required_players(&self) -> usize {
        match self {
            Playlist::GroundWar => 64,
            _ => 12,
        }
    }

    pub fn team_count(&self) -> usize {
        match self {
            Playlist::FreeForAll => 12,
            _ => 2,
        }
    }

    /// Nominal match length; actual durations are jittered ±20%.
    pub fn nominal_duration_secs(&self) -> f64 {
        match self {
            Playlist::SearchAndDestroy => 900.0,
            Playlist::GroundWar => 1200.0,
            _ => 600.0,
        }
    }

    /// Per-DC server capacity for the optional capacity guard.
    pub fn server_capacity(&self) -> usize {
        match self {
            Playlist::GroundWar => 50,
            _ => 200,
        }
    }
}

/// A game-server site. The busy counters are the only capacity-shared
/// resource in the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataCenter {
    pub id: DataCenterId,
    pub name: String,
    pub location: Location,
    pub region: Region,
    pub busy_servers: HashMap<Playlist, usize>,
}

impl DataCenter {
    pub fn new(id: DataCenterId, name: &str, location: Location, region: Region) -> Self {
        Self {
            id,
            name: name.to_string(),
            location,
            region,
            busy_servers: ALL_PLAYLISTS.iter().map(|&p| (p, 0)).collect(),
        }
    }

    pub fn busy(&self, playlist: Playlist) -> usize {
        self.busy_servers.get(&playlist).copied().unwrap_or(0)
    }

    pub fn has_capacity(&self, playlist: Playlist) -> bool {
        self.busy(playlist) < playlist.server_capacity()
    }

    pub fn reserve(&mut self, playlist: Playlist) {
        *self.busy_servers.entry(playlist).or_insert(0) += 1;
    }

    /// Saturating release; the counter never goes negative.
    pub fn release(&mut self, playlist: Playlist) {
        if let Some(busy) = self.busy_servers.get_mut(&playlist) {
            *busy = busy.saturating_sub(1);
        }
    }
}

/// One match worth of experience as seen by a single player. Feeds the
/// retention model.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MatchExperience {
    pub delta_ping: f64,
    pub search_time_secs: f64,
    pub blowout: bool,
    pub won: bool,
    pub performance: f64,
}

/// A simulated player. Created at population generation, never destroyed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub location: Location,
    pub region: Region,
    pub platform: Platform,
    pub input_device: InputDevice,

    /// Raw skill in [-1, 1]; static unless skill evolution is enabled.
    pub skill: f64,
    /// Global percentile rank in (0, 1).
    pub skill_percentile: f64,
    /// Bucket in 1..=B derived from the percentile.
    pub skill_bucket: usize,

    pub state: PlayerState,
    pub current_match: Option<MatchId>,
    pub party_id: Option<PartyId>,
    pub preferred_playlists: HashSet<Playlist>,

    /// Milliseconds to each data center, fixed at generation.
    pub dc_pings: HashMap<DataCenterId, f64>,
    pub best_dc: Option<DataCenterId>,
    pub best_ping: f64,

    /// Tick at which the current search began, if searching.
    pub search_started_at: Option<u64>,

    pub matches_played: usize,
    pub wins: usize,
    pub losses: usize,

    // Experience rings, newest last, capped at HISTORY_WINDOW.
    pub recent_delta_pings: Vec<f64>,
    pub recent_search_times: Vec<f64>,
    pub recent_blowouts: Vec<bool>,
    pub recent_performance: Vec<f64>,

    /// Rolling experience window for the retention model (its own cap).
    pub recent_experience: Vec<MatchExperience>,
}

impl Player {
    pub fn new(id: PlayerId, location: Location, skill: f64) -> Self {
        Self {
            id,
            location,
            region: Region::from_location(location),
            platform: Platform::PC,
            input_device: InputDevice::Controller,
            skill,
            skill_percentile: 0.5,
            skill_bucket: 1,
            state: PlayerState::Offline,
            current_match: None,
            party_id: None,
            preferred_playlists: HashSet::from([Playlist::TeamDeathmatch]),
            dc_pings: HashMap::new(),
            best_dc: None,
            best_ping: f64::MAX,
            search_started_at: None,
            matches_played: 0,
            wins: 0,
            losses: 0,
            recent_delta_pings: Vec::new(),
            recent_search_times: Vec::new(),
            recent_blowouts: Vec::new(),
            recent_performance: Vec::new(),
            recent_experience: Vec::new(),
        }
    }

    pub fn ping_to(&self, dc: DataCenterId) -> Option<f64> {
        self.dc_pings.get(&dc).copied()
    }

    /// Delta ping for a DC: ping minus the player's best available ping.
    pub fn delta_ping_to(&self, dc: DataCenterId) -> Option<f64> {
        self.ping_to(dc).map(|p| p - self.best_ping)
    }

    pub fn assign_bucket(&mut self, num_buckets: usize) {
        self.skill_bucket =
            ((self.skill_percentile * num_buckets as f64).floor() as usize + 1).min(num_buckets);
    }
}

/// Push onto a ring kept as a Vec: newest last, oldest dropped at cap.
pub fn push_capped<T>(ring: &mut Vec<T>, value: T, cap: usize) {
    ring.push(value);
    if ring.len() > cap {
        ring.remove(0);
    }
}

/// A pre-made group that queues and plays together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub player_ids: Vec<PlayerId>,
    pub leader_id: PlayerId,
    pub avg_skill: f64,
    pub avg_skill_percentile: f64,
    pub percentile_disparity: f64,
    pub preferred_playlists: HashSet<Playlist>,
    pub avg_location: Location,
}

impl Party {
    /// Build a party and its aggregates from member snapshots. Members
    /// must be non-empty; playlists are the intersection of all members'.
    pub fn from_members(id: PartyId, members: &[&Player]) -> Self {
        debug_assert!(!members.is_empty());
        let n = members.len() as f64;
        let avg_skill = members.iter().map(|p| p.skill).sum::<f64>() / n;
        let avg_skill_percentile = members.iter().map(|p| p.skill_percentile).sum::<f64>() / n;
        let lo = members
            .iter()
            .map(|p| p.skill_percentile)
            .fold(f64::MAX, f64::min);
        let hi = members
            .iter()
            .map(|p| p.skill_percentile)
            .fold(f64::MIN, f64::max);

        let mut preferred_playlists = members[0].preferred_playlists.clone();
        for member in &members[1..] {
            preferred_playlists.retain(|m| member.preferred_playlists.contains(m));
        }

        let locations: Vec<Location> = members.iter().map(|p| p.location).collect();

        Self {
            id,
            player_ids: members.iter().map(|p| p.id).collect(),
            leader_id: members[0].id,
            avg_skill,
            avg_skill_percentile,
            percentile_disparity: hi - lo,
            preferred_playlists,
            avg_location: centroid(&locations),
        }
    }

    pub fn size(&self) -> usize {
        self.player_ids.len()
    }
}

/// A queued matchmaking unit: one solo player or one whole party.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchObject {
    pub id: SearchId,
    pub player_ids: Vec<PlayerId>,
    pub avg_skill_percentile: f64,
    pub avg_location: Location,
    /// Member counts per platform, for the mismatch fraction.
    pub platforms: HashMap<Platform, usize>,
    pub input_devices: HashMap<InputDevice, usize>,
    pub accepted_playlists: HashSet<Playlist>,
    /// Tick at which the search was queued.
    pub started_at: u64,
    /// Currently admissible data centers, ascending by id. Refreshed
    /// every tick as the ping backoff widens.
    pub admissible_dcs: Vec<DataCenterId>,
}

impl SearchObject {
    pub fn size(&self) -> usize {
        self.player_ids.len()
    }

    /// Wait time in seconds; backoff curves are functions of this.
    pub fn wait_secs(&self, current_tick: u64, tick_interval: f64) -> f64 {
        current_tick.saturating_sub(self.started_at) as f64 * tick_interval
    }
}

/// Blowout severity bands, ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlowoutSeverity {
    Mild,
    Moderate,
    Severe,
}

/// An active match, created by the matchmaker and destroyed at expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub playlist: Playlist,
    pub data_center_id: DataCenterId,
    /// Team partition of the match's player set.
    pub teams: Vec<Vec<PlayerId>>,
    /// Average raw skill per team, aligned with `teams`.
    pub team_skills: Vec<f64>,
    pub started_at: u64,
    pub duration_ticks: u64,
    pub skill_disparity: f64,
    pub avg_delta_ping: f64,
    pub quality: f64,
}

impl Match {
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.teams.iter().flatten().copied()
    }

    pub fn player_count(&self) -> usize {
        self.teams.iter().map(|t| t.len()).sum()
    }
}
