//! Leaderboard ranking
//!
//! Per-user stats are derived from public components, users without any
//! component are dropped, and the remainder is ranked by the selected
//! metric. The `change` indicator is a placeholder computed from rank
//! position only.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::db::schemas::{ComponentDoc, Timestamp, UserDoc, COMPONENT_COLLECTION, USER_COLLECTION};
use crate::db::{fetch_all, DocumentStore, Query};
use crate::types::VaultError;

/// Default number of leaderboard entries
pub const DEFAULT_LIMIT: usize = 10;

/// Maximum number of leaderboard entries
pub const MAX_LIMIT: usize = 100;

/// Accounts younger than this qualify for the rising board
pub const RISING_WINDOW_DAYS: i64 = 90;

/// Ranking metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardType {
    Contributors,
    Downloads,
    Rated,
    Rising,
}

impl LeaderboardType {
    /// Parse the `type` query parameter; unknown values rank contributors
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("downloads") => Self::Downloads,
            Some("rated") => Self::Rated,
            Some("rising") => Self::Rising,
            _ => Self::Contributors,
        }
    }
}

/// Coarse rank-position indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankChange {
    Up,
    Same,
    Down,
}

impl RankChange {
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            1..=3 => Self::Up,
            4..=7 => Self::Same,
            _ => Self::Down,
        }
    }
}

/// Derived statistics for one contributor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub component_count: i64,
    pub total_downloads: i64,
    pub total_likes: i64,
    pub avg_rating: f64,
    #[serde(skip)]
    pub created_at: Option<Timestamp>,
}

impl UserStats {
    /// Weighted score used by the rising board
    pub fn rising_score(&self) -> f64 {
        10.0 * self.component_count as f64
            + self.total_downloads as f64 / 100.0
            + 5.0 * self.avg_rating
    }
}

/// Ranked leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub stats: UserStats,
    pub change: RankChange,
}

/// Sitewide leaderboard aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSummary {
    pub total_contributors: usize,
    pub total_components: i64,
    pub total_downloads: i64,
    pub average_rating: f64,
}

/// Parse and clamp the `limit` query parameter
pub fn parse_limit(value: Option<&str>, default: usize, max: usize) -> usize {
    value
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
        .clamp(1, max)
}

/// Derive per-user stats; users with no components are excluded
pub fn compute_user_stats(users: &[UserDoc], components: &[ComponentDoc]) -> Vec<UserStats> {
    let mut by_author: HashMap<&str, Vec<&ComponentDoc>> = HashMap::new();
    for component in components {
        by_author
            .entry(component.author_id.as_str())
            .or_default()
            .push(component);
    }

    users
        .iter()
        .filter_map(|user| {
            let authored = by_author.get(user.id.as_str())?;
            if authored.is_empty() {
                return None;
            }
            let count = authored.len() as i64;
            let rating_sum: f64 = authored.iter().map(|c| c.effective_rating()).sum();
            Some(UserStats {
                user_id: user.id.clone(),
                display_name: user
                    .display_name
                    .clone()
                    .or_else(|| user.username.clone())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                username: user.username.clone(),
                avatar: user.avatar.clone(),
                component_count: count,
                total_downloads: authored.iter().map(|c| c.effective_downloads()).sum(),
                total_likes: authored.iter().map(|c| c.likes).sum(),
                avg_rating: rating_sum / count as f64,
                created_at: user.created_at,
            })
        })
        .collect()
}

fn desc_f64(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn contributors_order(a: &UserStats, b: &UserStats) -> Ordering {
    b.component_count
        .cmp(&a.component_count)
        .then_with(|| b.total_downloads.cmp(&a.total_downloads))
        .then_with(|| desc_f64(a.avg_rating, b.avg_rating))
}

/// Rank stats by the selected metric and keep the top `limit`
pub fn rank(
    mut stats: Vec<UserStats>,
    kind: LeaderboardType,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    match kind {
        LeaderboardType::Downloads => {
            stats.sort_by(|a, b| b.total_downloads.cmp(&a.total_downloads));
        }
        LeaderboardType::Rated => {
            stats.sort_by(|a, b| desc_f64(a.avg_rating, b.avg_rating));
        }
        LeaderboardType::Rising => {
            let cutoff = now - Duration::days(RISING_WINDOW_DAYS);
            stats.retain(|s| {
                s.created_at
                    .map(|created| created.to_datetime() >= cutoff)
                    .unwrap_or(false)
            });
            stats.sort_by(|a, b| desc_f64(a.rising_score(), b.rising_score()));
        }
        LeaderboardType::Contributors => {
            stats.sort_by(contributors_order);
        }
    }

    stats
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, stats)| LeaderboardEntry {
            rank: i + 1,
            stats,
            change: RankChange::from_rank(i + 1),
        })
        .collect()
}

/// Aggregate contributor stats into a summary
pub fn summarize(stats: &[UserStats]) -> LeaderboardSummary {
    if stats.is_empty() {
        return LeaderboardSummary::default();
    }
    LeaderboardSummary {
        total_contributors: stats.len(),
        total_components: stats.iter().map(|s| s.component_count).sum(),
        total_downloads: stats.iter().map(|s| s.total_downloads).sum(),
        average_rating: stats.iter().map(|s| s.avg_rating).sum::<f64>() / stats.len() as f64,
    }
}

async fn load_user_stats(store: &dyn DocumentStore) -> Result<Vec<UserStats>, VaultError> {
    let users: Vec<UserDoc> = fetch_all(store, USER_COLLECTION, &Query::all()).await?;
    let components: Vec<ComponentDoc> = fetch_all(
        store,
        COMPONENT_COLLECTION,
        &Query::all().where_eq("isPublic", true),
    )
    .await?;
    debug!(
        users = users.len(),
        components = components.len(),
        "Loaded leaderboard inputs"
    );
    Ok(compute_user_stats(&users, &components))
}

/// Fetch and rank. Read failures propagate.
pub async fn leaderboard(
    store: &dyn DocumentStore,
    kind: LeaderboardType,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, VaultError> {
    let stats = load_user_stats(store).await?;
    Ok(rank(stats, kind, limit, Utc::now()))
}

/// Fetch and summarize. Read failures yield a zeroed summary.
pub async fn summary(store: &dyn DocumentStore) -> LeaderboardSummary {
    match load_user_stats(store).await {
        Ok(stats) => summarize(&stats),
        Err(e) => {
            warn!(error = %e, "Leaderboard summary unavailable, returning zeros");
            LeaderboardSummary::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(id: &str, created_secs: Option<i64>) -> UserDoc {
        UserDoc {
            id: id.into(),
            display_name: Some(id.to_uppercase()),
            created_at: created_secs.map(Timestamp::from_secs),
            ..Default::default()
        }
    }

    fn component(author: &str, downloads: i64, rating: f64) -> ComponentDoc {
        ComponentDoc {
            author_id: author.into(),
            downloads: Some(downloads),
            rating: Some(rating),
            is_public: true,
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_type_and_limit() {
        assert_eq!(LeaderboardType::parse(Some("rated")), LeaderboardType::Rated);
        assert_eq!(LeaderboardType::parse(Some("bogus")), LeaderboardType::Contributors);
        assert_eq!(LeaderboardType::parse(None), LeaderboardType::Contributors);
        assert_eq!(parse_limit(None, DEFAULT_LIMIT, MAX_LIMIT), 10);
        assert_eq!(parse_limit(Some("0"), DEFAULT_LIMIT, MAX_LIMIT), 1);
        assert_eq!(parse_limit(Some("500"), DEFAULT_LIMIT, MAX_LIMIT), 100);
        assert_eq!(parse_limit(Some("abc"), DEFAULT_LIMIT, MAX_LIMIT), 10);
    }

    #[test]
    fn test_users_without_components_excluded() {
        let users = vec![user("a", None), user("b", None)];
        let components = vec![component("a", 1, 4.0)];
        let stats = compute_user_stats(&users, &components);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].user_id, "a");
    }

    #[test]
    fn test_more_components_always_wins() {
        let users = vec![user("few", None), user("many", None)];
        let components = vec![
            component("few", 10_000, 5.0),
            component("many", 0, 0.0),
            component("many", 0, 0.0),
        ];
        let ranked = rank(
            compute_user_stats(&users, &components),
            LeaderboardType::Contributors,
            10,
            now(),
        );
        assert_eq!(ranked[0].stats.user_id, "many");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].stats.user_id, "few");
    }

    #[test]
    fn test_contributors_tie_breaks() {
        let users = vec![user("a", None), user("b", None), user("c", None)];
        let components = vec![
            component("a", 10, 3.0),
            component("b", 10, 4.0),
            component("c", 20, 1.0),
        ];
        let ranked = rank(
            compute_user_stats(&users, &components),
            LeaderboardType::Contributors,
            10,
            now(),
        );
        let order: Vec<_> = ranked.iter().map(|e| e.stats.user_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_rising_excludes_old_accounts() {
        let ninety_one_days = 91 * 86_400;
        let users = vec![
            user("veteran", Some(1_700_000_000 - ninety_one_days)),
            user("newbie", Some(1_700_000_000 - 86_400)),
            user("unknown", None),
        ];
        let mut components = vec![component("newbie", 1, 1.0)];
        for _ in 0..20 {
            components.push(component("veteran", 5000, 5.0));
        }
        components.push(component("unknown", 5000, 5.0));

        let ranked = rank(
            compute_user_stats(&users, &components),
            LeaderboardType::Rising,
            10,
            now(),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].stats.user_id, "newbie");
    }

    #[test]
    fn test_rising_score() {
        let stats = compute_user_stats(&[user("a", None)], &[component("a", 200, 4.0)]);
        assert_eq!(stats[0].rising_score(), 10.0 + 2.0 + 20.0);
    }

    #[test]
    fn test_change_indicator_and_limit() {
        let users: Vec<_> = (0..9).map(|i| user(&format!("u{}", i), None)).collect();
        let components: Vec<_> = (0..9)
            .map(|i| component(&format!("u{}", i), 100 - i as i64, 1.0))
            .collect();
        let ranked = rank(
            compute_user_stats(&users, &components),
            LeaderboardType::Downloads,
            8,
            now(),
        );
        assert_eq!(ranked.len(), 8);
        assert_eq!(ranked[0].change, RankChange::Up);
        assert_eq!(ranked[3].change, RankChange::Same);
        assert_eq!(ranked[7].change, RankChange::Down);
    }

    #[test]
    fn test_entry_serialization() {
        let stats = compute_user_stats(&[user("a", None)], &[component("a", 3, 2.0)]);
        let ranked = rank(stats, LeaderboardType::Contributors, 1, now());
        let value = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(value["rank"], 1);
        assert_eq!(value["userId"], "a");
        assert_eq!(value["totalDownloads"], 3);
        assert_eq!(value["change"], "up");
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]), LeaderboardSummary::default());
        let stats = compute_user_stats(
            &[user("a", None), user("b", None)],
            &[component("a", 10, 4.0), component("b", 30, 2.0), component("b", 0, 4.0)],
        );
        let summary = summarize(&stats);
        assert_eq!(summary.total_contributors, 2);
        assert_eq!(summary.total_components, 3);
        assert_eq!(summary.total_downloads, 40);
        assert_eq!(summary.average_rating, 3.5);
    }
}
