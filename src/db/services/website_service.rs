//! Persistence of registered websites.
//!
//! The in-memory registry is authoritative while the process runs; this table
//! is what it is seeded from on the next start.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, DeleteResult, EntityTrait, QueryOrder, Set,
    Unchanged,
};
use tracing::warn;

use crate::db::entities::{prelude::*, website};
use crate::monitor::target::{
    Target, TargetError, ValidationPattern, interval_from_seconds, normalize_url,
};

pub async fn get_all_websites(db: &DatabaseConnection) -> Result<Vec<website::Model>, DbErr> {
    Website::find()
        .order_by_asc(website::Column::Id)
        .all(db)
        .await
}

pub fn model_to_target(model: website::Model) -> Result<Target, TargetError> {
    let pattern = match model.regexp_pattern.as_deref() {
        Some(p) => ValidationPattern::parse(p)?,
        None => None,
    };
    Ok(Target {
        id: model.id,
        url: normalize_url(&model.url)?,
        interval: interval_from_seconds(model.interval_seconds)?,
        pattern,
    })
}

/// Stored websites that can be monitored, plus the highest id in the table.
/// Skipped rows still count towards `highest_id` so new ids never collide.
#[derive(Debug)]
pub struct StoredTargets {
    pub targets: Vec<Target>,
    pub highest_id: i32,
}

/// Loads every stored website as a monitor target. Rows that no longer pass
/// validation are skipped with a warning rather than failing startup.
pub async fn load_targets(db: &DatabaseConnection) -> Result<StoredTargets, DbErr> {
    let models = get_all_websites(db).await?;
    let highest_id = models.iter().map(|m| m.id).max().unwrap_or(0);
    let mut targets = Vec::with_capacity(models.len());
    for model in models {
        let website_id = model.id;
        match model_to_target(model) {
            Ok(target) => targets.push(target),
            Err(e) => warn!(website_id, error = %e, "Skipping stored website with invalid definition."),
        }
    }
    Ok(StoredTargets { targets, highest_id })
}

pub async fn insert_website(
    db: &DatabaseConnection,
    target: &Target,
) -> Result<website::Model, DbErr> {
    let now = Utc::now();
    website::ActiveModel {
        id: Set(target.id),
        url: Set(target.url.clone()),
        interval_seconds: Set(target.interval_seconds()),
        regexp_pattern: Set(target.pattern_str().map(str::to_string)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

/// Writes the target's current interval and pattern.
pub async fn update_website(
    db: &DatabaseConnection,
    target: &Target,
) -> Result<website::Model, DbErr> {
    website::ActiveModel {
        id: Unchanged(target.id),
        interval_seconds: Set(target.interval_seconds()),
        regexp_pattern: Set(target.pattern_str().map(str::to_string)),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .update(db)
    .await
}

/// Deletes a website; its results go with it through the cascading foreign key.
pub async fn delete_website(db: &DatabaseConnection, website_id: i32) -> Result<DeleteResult, DbErr> {
    Website::delete_by_id(website_id).exec(db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::time::Duration;

    fn model(url: &str, interval_seconds: i32, pattern: Option<&str>) -> website::Model {
        website::Model {
            id: 3,
            url: url.to_string(),
            interval_seconds,
            regexp_pattern: pattern.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_model_to_target() {
        let target = model_to_target(model("https://example.com/", 15, Some("OK"))).unwrap();
        assert_eq!(target.id, 3);
        assert_eq!(target.interval, Duration::from_secs(15));
        assert_eq!(target.pattern_str(), Some("OK"));
    }

    #[test]
    fn test_model_with_empty_pattern_has_no_pattern() {
        let target = model_to_target(model("https://example.com/", 15, Some(""))).unwrap();
        assert!(target.pattern.is_none());
    }

    #[tokio::test]
    async fn test_load_targets_skips_invalid_rows_but_reports_their_ids() {
        let mut valid = model("https://example.com/", 15, None);
        valid.id = 4;
        let mut invalid = model("https://broken.example/", 0, None);
        invalid.id = 5;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![valid, invalid]])
            .into_connection();

        let stored = load_targets(&db).await.unwrap();

        assert_eq!(stored.targets.len(), 1);
        assert_eq!(stored.targets[0].id, 4);
        assert_eq!(stored.highest_id, 5);
    }

    #[test]
    fn test_invalid_model_is_rejected() {
        assert!(model_to_target(model("https://example.com/", 0, None)).is_err());
        assert!(model_to_target(model("not a url", 10, None)).is_err());
    }
}
