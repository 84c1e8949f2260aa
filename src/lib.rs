//! # queuesim
//!
//! A discrete-time, agent-based matchmaking simulator for competitive
//! online shooters. The engine models a player population, a queue of
//! search objects with time-relaxing feasibility constraints, a
//! seed+greedy matchmaker, team balancing, a logistic outcome model,
//! and post-match retention, and exposes a reproducible stream of
//! wait-time / delta-ping / skill-fairness statistics.
//!
//! ```no_run
//! use queuesim::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default(), 0xC0D).unwrap();
//! engine.generate_population(5_000).unwrap();
//! engine.run(500).unwrap();
//! let stats = engine.get_stats();
//! println!("p90 wait: {:.1}s", stats.search_time_p90);
//! ```
//!
//! Two engines built with the same configuration, seed, and population
//! size produce bit-identical statistics at every tick: all randomness
//! flows through one seeded stream and every collection is iterated in
//! a deterministic order.

mod balance;
mod config;
mod engine;
mod matchmaker;
mod outcome;
mod population;
mod retention;
mod rng;
mod stats;
mod types;

pub use config::{ConfigError, EngineConfig, RegionOverrides, RetentionConfig};
pub use engine::{Engine, EngineError};
pub use stats::{BucketStat, HistBin, PlaylistStat, StatsSnapshot, TickSnapshot};
pub use types::{
    BlowoutSeverity, DataCenter, DataCenterId, InputDevice, Location, Match, MatchExperience,
    MatchId, Party, PartyId, Platform, Player, PlayerId, PlayerState, Playlist, Region,
    SearchId, SearchObject, ALL_PLAYLISTS,
};
