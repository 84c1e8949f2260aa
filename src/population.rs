//! World initialization: data centers, player generation, the ping
//! model, percentile ranking, and party assignment.

use crate::config::EngineConfig;
use crate::rng::{approx_standard_normal, weighted_index};
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;
use tracing::info;

/// The fixed data-center table used for every run.
pub fn default_data_centers() -> Vec<DataCenter> {
    let sites = [
        ("US-East", 39.0, -77.0, Region::NorthAmerica),
        ("US-West", 37.0, -122.0, Region::NorthAmerica),
        ("US-Central", 41.0, -96.0, Region::NorthAmerica),
        ("EU-West", 51.0, 0.0, Region::Europe),
        ("EU-Central", 50.0, 8.0, Region::Europe),
        ("EU-North", 59.0, 18.0, Region::Europe),
        ("Asia-East", 35.0, 139.0, Region::AsiaPacific),
        ("Asia-SE", 1.0, 103.0, Region::AsiaPacific),
        ("Australia", -33.0, 151.0, Region::AsiaPacific),
        ("South-America", -23.0, -46.0, Region::SouthAmerica),
    ];
    sites
        .iter()
        .enumerate()
        .map(|(id, &(name, lat, lon, region))| {
            DataCenter::new(id, name, Location::new(lat, lon), region)
        })
        .collect()
}

/// Regional population centers and their mixture weights.
const REGION_CENTERS: [(f64, f64, f64); 5] = [
    (39.0, -95.0, 0.35),  // North America
    (50.0, 10.0, 0.30),   // Europe
    (35.0, 105.0, 0.20),  // Asia-Pacific
    (-25.0, 135.0, 0.08), // Oceania
    (-15.0, -55.0, 0.07), // South America
];

/// Generate `count` players with ids `0..count`, all `Offline`.
/// Percentiles are not assigned here; call `assign_percentiles` after.
pub fn generate_players(
    rng: &mut impl Rng,
    data_centers: &[DataCenter],
    count: usize,
) -> Vec<Player> {
    let weights: Vec<f64> = REGION_CENTERS.iter().map(|c| c.2).collect();
    let mut players = Vec::with_capacity(count);

    for id in 0..count {
        let (center_lat, center_lon, _) = REGION_CENTERS[weighted_index(rng, &weights)];
        let location = Location::new(
            center_lat + rng.gen_range(-10.0..10.0),
            center_lon + rng.gen_range(-15.0..15.0),
        );

        let platform = match rng.gen_range(0..3) {
            0 => Platform::PC,
            1 => Platform::PlayStation,
            _ => Platform::Xbox,
        };
        let input_device = if rng.gen_bool(0.6) {
            InputDevice::Controller
        } else {
            InputDevice::MouseKeyboard
        };

        let skill = (approx_standard_normal(rng) / 3.0).clamp(-1.0, 1.0);

        let mut player = Player::new(id, location, skill);
        player.platform = platform;
        player.input_device = input_device;

        if rng.gen_bool(0.4) {
            player.preferred_playlists.insert(Playlist::Domination);
        }
        if rng.gen_bool(0.2) {
            player.preferred_playlists.insert(Playlist::SearchAndDestroy);
        }
        if rng.gen_bool(0.15) {
            player.preferred_playlists.insert(Playlist::GroundWar);
        }
        if rng.gen_bool(0.1) {
            player.preferred_playlists.insert(Playlist::FreeForAll);
        }

        // Ping model: ~1 ms per 100 km of great-circle distance plus a
        // fixed base and uniform jitter, floored at 10 ms.
        for dc in data_centers {
            let base = location.distance_km(&dc.location) / 100.0 + 15.0;
            let ping = (base + rng.gen_range(-7.5..7.5)).max(10.0);
            player.dc_pings.insert(dc.id, ping);
        }
        if let Some((&dc, &ping)) = player
            .dc_pings
            .iter()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap().then(a.0.cmp(b.0)))
        {
            player.best_dc = Some(dc);
            player.best_ping = ping;
        }

        players.push(player);
    }

    players
}

/// Assign global percentile ranks by sorted skill order (rank i becomes
/// `(i + 0.5) / n`) and derive buckets. Ties break by player id so the
/// ranking is total and reproducible.
pub fn assign_percentiles(players: &mut [Player], num_buckets: usize) {
    let n = players.len();
    if n == 0 {
        return;
    }
    let mut order: Vec<(PlayerId, f64)> = players.iter().map(|p| (p.id, p.skill)).collect();
    order.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    for (rank, (id, _)) in order.into_iter().enumerate() {
        let player = &mut players[id];
        player.skill_percentile = (rank as f64 + 0.5) / n as f64;
        player.assign_bucket(num_buckets);
    }
}

/// Group roughly `party_player_fraction` of the population into parties
/// of 2-4. Members get their `party_id` set; aggregates are computed
/// from the already-ranked players.
pub fn assign_parties(
    rng: &mut impl Rng,
    config: &EngineConfig,
    players: &mut [Player],
) -> HashMap<PartyId, Party> {
    let mut parties = HashMap::new();
    let target_fraction = config.party_player_fraction.clamp(0.0, 1.0);
    if target_fraction <= 0.0 || players.len() < 2 {
        return parties;
    }

    let mut ids: Vec<PlayerId> = (0..players.len()).collect();
    crate::rng::partial_shuffle(rng, &mut ids, players.len());

    let target_players = (players.len() as f64 * target_fraction).round() as usize;
    let mut grouped = 0usize;
    let mut cursor = 0usize;
    let mut next_party_id: PartyId = 0;

    while cursor + 1 < ids.len() && grouped < target_players {
        let remaining = ids.len() - cursor;
        let size = match remaining.min(4) {
            0 | 1 => break,
            2 => 2,
            3 => {
                if rng.gen_bool(0.6) {
                    3
                } else {
                    2
                }
            }
            _ => {
                // Bias toward small parties.
                let r: f64 = rng.gen();
                if r < 0.5 {
                    2
                } else if r < 0.85 {
                    3
                } else {
                    4
                }
            }
        };

        let member_ids = &ids[cursor..cursor + size];
        let members: Vec<&Player> = member_ids.iter().map(|&id| &players[id]).collect();
        let party = Party::from_members(next_party_id, &members);
        for &id in member_ids {
            players[id].party_id = Some(party.id);
        }
        parties.insert(party.id, party);
        next_party_id += 1;
        grouped += size;
        cursor += size;
    }

    info!(
        parties = parties.len(),
        players_in_parties = grouped,
        "assigned pre-made parties"
    );
    parties
}
