// src/ranks.rs
//
// Gamification tier derived from lifetime spend over delivered, paid
// orders. Recomputed from the order store on every trigger rather than
// incrementally, so it self-heals after any missed event.

use serde::Serialize;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::db;
use crate::error::ShopError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rank {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

pub const RANK_LADDER: [(Rank, i64); 6] = [
    (Rank::Iron, 0),
    (Rank::Bronze, 5_000_000),
    (Rank::Silver, 15_000_000),
    (Rank::Gold, 30_000_000),
    (Rank::Platinum, 50_000_000),
    (Rank::Diamond, 80_000_000),
];

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Iron => "IRON",
            Rank::Bronze => "BRONZE",
            Rank::Silver => "SILVER",
            Rank::Gold => "GOLD",
            Rank::Platinum => "PLATINUM",
            Rank::Diamond => "DIAMOND",
        }
    }

    pub fn threshold(&self) -> i64 {
        RANK_LADDER
            .iter()
            .find(|(r, _)| r == self)
            .map(|(_, t)| *t)
            .unwrap_or(0)
    }

    pub fn next(&self) -> Option<Rank> {
        let idx = RANK_LADDER.iter().position(|(r, _)| r == self)?;
        RANK_LADDER.get(idx + 1).map(|(r, _)| *r)
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IRON" => Ok(Rank::Iron),
            "BRONZE" => Ok(Rank::Bronze),
            "SILVER" => Ok(Rank::Silver),
            "GOLD" => Ok(Rank::Gold),
            "PLATINUM" => Ok(Rank::Platinum),
            "DIAMOND" => Ok(Rank::Diamond),
            other => Err(format!("unknown rank: {other}")),
        }
    }
}

pub fn determine_rank(total_spent: i64) -> Rank {
    RANK_LADDER
        .iter()
        .rev()
        .find(|(_, threshold)| total_spent >= *threshold)
        .map(|(rank, _)| *rank)
        .unwrap_or(Rank::Iron)
}

/// Progress toward the next tier, 0..=100.
pub fn rank_progress(total_spent: i64, current: Rank) -> i64 {
    let Some(next) = current.next() else {
        return 100;
    };
    let lower = current.threshold();
    let upper = next.threshold();
    let progress = (total_spent - lower) * 100 / (upper - lower);
    progress.clamp(0, 100)
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankSummary {
    pub current: Rank,
    pub next: Option<Rank>,
    pub next_threshold: Option<i64>,
    pub total_spent: i64,
    pub progress: i64,
    pub last_upgrade: Option<chrono::DateTime<chrono::Utc>>,
}

/// Recomputes the user's tier from the order store and upserts the rank
/// row; the upgrade timestamp moves only when the tier strictly
/// increases.
pub async fn recalculate(pool: &PgPool, user_id: &str) -> Result<RankSummary, ShopError> {
    let total_spent = db::total_delivered_paid(pool, user_id).await?;
    let new_rank = determine_rank(total_spent);

    let existing = sqlx::query("SELECT current_rank, last_rank_upgrade FROM user_ranks WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let (old_rank, last_upgrade) = match &existing {
        Some(r) => {
            let rank: String = r.get("current_rank");
            (
                rank.parse::<Rank>()
                    .map_err(|e| sqlx::Error::Decode(e.into()))?,
                r.get::<Option<chrono::DateTime<chrono::Utc>>, _>("last_rank_upgrade"),
            )
        }
        None => (Rank::Iron, None),
    };

    let upgraded = new_rank > old_rank;
    let last_upgrade = if upgraded { Some(chrono::Utc::now()) } else { last_upgrade };

    sqlx::query(
        r#"INSERT INTO user_ranks (user_id, current_rank, total_spent, last_rank_upgrade, updated_at)
           VALUES ($1, $2, $3, $4, NOW())
           ON CONFLICT (user_id)
           DO UPDATE SET current_rank = $2, total_spent = $3, last_rank_upgrade = $4, updated_at = NOW()"#,
    )
    .bind(user_id)
    .bind(new_rank.as_str())
    .bind(total_spent)
    .bind(last_upgrade)
    .execute(pool)
    .await?;

    Ok(RankSummary {
        current: new_rank,
        next: new_rank.next(),
        next_threshold: new_rank.next().map(|r| r.threshold()),
        total_spent,
        progress: rank_progress(total_spent, new_rank),
        last_upgrade,
    })
}
