//! Achievement evaluation
//!
//! A static table of definitions, each pairing display metadata with a
//! predicate over a [`UserSnapshot`]. Nothing is persisted; unlocked
//! achievements are recomputed on every request.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::schemas::{ComponentDoc, UserDoc, COMPONENT_COLLECTION, USER_COLLECTION};
use crate::db::{fetch, fetch_all, DocumentStore, Query};
use crate::types::VaultError;

/// Per-user numbers the predicates look at
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub components: i64,
    pub downloads: i64,
    pub views: i64,
    pub favorites_received: i64,
    pub followers: i64,
    pub account_age_days: i64,
}

impl UserSnapshot {
    /// Build from the user record and every component they authored
    pub fn build(user: &UserDoc, components: &[ComponentDoc], now: DateTime<Utc>) -> Self {
        Self {
            components: components.len() as i64,
            downloads: components.iter().map(ComponentDoc::effective_downloads).sum(),
            views: components.iter().map(|c| c.views).sum(),
            favorites_received: components.iter().map(|c| c.likes).sum(),
            followers: user.followers,
            account_age_days: user
                .created_at
                .map(|created| created.days_until(now).max(0))
                .unwrap_or(0),
        }
    }
}

/// Serializable achievement metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementMeta {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

/// Definition: metadata plus unlock rule
pub struct Achievement {
    pub meta: AchievementMeta,
    pub unlocked: fn(&UserSnapshot) -> bool,
}

const fn def(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    unlocked: fn(&UserSnapshot) -> bool,
) -> Achievement {
    Achievement {
        meta: AchievementMeta {
            id,
            name,
            description,
            icon,
        },
        unlocked,
    }
}

/// Every achievement, in display order
pub static ACHIEVEMENTS: &[Achievement] = &[
    def("first-upload", "First Upload", "Upload your first component", "upload", |s| s.components >= 1),
    def("prolific-creator", "Prolific Creator", "Upload 10 components", "layers", |s| s.components >= 10),
    def("component-master", "Component Master", "Upload 50 components", "crown", |s| s.components >= 50),
    def("popular", "Popular", "Reach 100 downloads", "download", |s| s.downloads >= 100),
    def("viral", "Viral", "Reach 1,000 downloads", "trending-up", |s| s.downloads >= 1000),
    def("seen", "Seen", "Reach 1,000 views", "eye", |s| s.views >= 1000),
    def("loved", "Loved", "Receive 10 favorites", "heart", |s| s.favorites_received >= 10),
    def("fan-favorite", "Fan Favorite", "Receive 100 favorites", "star", |s| s.favorites_received >= 100),
    def("influencer", "Influencer", "Gain 10 followers", "users", |s| s.followers >= 10),
    def("celebrity", "Celebrity", "Gain 100 followers", "award", |s| s.followers >= 100),
    def("veteran", "Veteran", "Member for a year", "calendar", |s| s.account_age_days >= 365),
];

/// Evaluation result returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementReport {
    pub achievements: Vec<AchievementMeta>,
    pub unlocked: usize,
    pub total: usize,
    pub stats: UserSnapshot,
}

/// Definitions whose predicate holds, in table order
pub fn evaluate(snapshot: &UserSnapshot) -> Vec<AchievementMeta> {
    ACHIEVEMENTS
        .iter()
        .filter(|a| (a.unlocked)(snapshot))
        .map(|a| a.meta)
        .collect()
}

/// Load a user's snapshot and evaluate it. Missing users get 404.
pub async fn for_user(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<AchievementReport, VaultError> {
    let user: UserDoc = fetch(store, USER_COLLECTION, user_id)
        .await?
        .ok_or_else(|| VaultError::NotFound("User not found".into()))?;
    let components: Vec<ComponentDoc> = fetch_all(
        store,
        COMPONENT_COLLECTION,
        &Query::all().where_eq("authorId", user_id),
    )
    .await?;

    let stats = UserSnapshot::build(&user, &components, Utc::now());
    let achievements = evaluate(&stats);
    Ok(AchievementReport {
        unlocked: achievements.len(),
        total: ACHIEVEMENTS.len(),
        achievements,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Timestamp;
    use chrono::TimeZone;

    fn ids(snapshot: &UserSnapshot) -> Vec<&'static str> {
        evaluate(snapshot).iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_nothing_unlocked_for_new_user() {
        assert!(ids(&UserSnapshot::default()).is_empty());
    }

    #[test]
    fn test_thresholds_in_table_order() {
        let snapshot = UserSnapshot {
            components: 10,
            downloads: 100,
            views: 999,
            favorites_received: 10,
            followers: 100,
            account_age_days: 365,
        };
        assert_eq!(
            ids(&snapshot),
            vec![
                "first-upload",
                "prolific-creator",
                "popular",
                "loved",
                "influencer",
                "celebrity",
                "veteran"
            ]
        );
    }

    #[test]
    fn test_table_ids_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(ACHIEVEMENTS.iter().all(|a| seen.insert(a.meta.id)));
        assert_eq!(ACHIEVEMENTS.len(), 11);
    }

    #[test]
    fn test_snapshot_build() {
        let user = UserDoc {
            id: "u1".into(),
            followers: 4,
            created_at: Some(Timestamp::from_secs(0)),
            ..Default::default()
        };
        let components = vec![
            ComponentDoc {
                copies: Some(30),
                views: 10,
                likes: 2,
                ..Default::default()
            },
            ComponentDoc {
                downloads: Some(5),
                views: 1,
                likes: 1,
                ..Default::default()
            },
        ];
        let now = Utc.timestamp_opt(400 * 86_400, 0).unwrap();
        let snapshot = UserSnapshot::build(&user, &components, now);
        assert_eq!(snapshot.components, 2);
        assert_eq!(snapshot.downloads, 35);
        assert_eq!(snapshot.views, 11);
        assert_eq!(snapshot.favorites_received, 3);
        assert_eq!(snapshot.followers, 4);
        assert_eq!(snapshot.account_age_days, 400);
    }

    #[test]
    fn test_predicate_not_serialized() {
        let report = AchievementReport {
            achievements: evaluate(&UserSnapshot {
                components: 1,
                ..Default::default()
            }),
            unlocked: 1,
            total: ACHIEVEMENTS.len(),
            stats: UserSnapshot::default(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["achievements"][0]["id"], "first-upload");
        assert_eq!(value["total"], 11);
        assert_eq!(
            value["achievements"][0].as_object().unwrap().len(),
            4
        );
    }
}
