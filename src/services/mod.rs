//! Services layer for ComponentVault
//!
//! Business logic that sits between route handlers and the document store.
//!
//! ## Services
//!
//! - **Leaderboard**: per-user stats and ranked boards
//! - **Stats**: sitewide counts, totals and trending components
//! - **Achievements**: static rule table evaluated per user
//! - **Activity**: best-effort per-user event log
//! - **Media**: storage-service cleanup of component images

pub mod achievements;
pub mod activity;
pub mod leaderboard;
pub mod media;
pub mod stats;

pub use achievements::{AchievementMeta, AchievementReport, UserSnapshot, ACHIEVEMENTS};
pub use leaderboard::{LeaderboardEntry, LeaderboardSummary, LeaderboardType, RankChange};
pub use media::{HttpMediaStore, MediaStore, NoopMediaStore};
pub use stats::{PlatformStats, TrendingComponent};
