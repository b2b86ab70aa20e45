//! Append-only storage and querying of check results.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

use crate::db::entities::{prelude::*, website_result};
use crate::monitor::checker::CheckResult;

const DEFAULT_RESULTS_LIMIT: u64 = 1000;

pub fn to_active_model(result: &CheckResult) -> website_result::ActiveModel {
    website_result::ActiveModel {
        website_id: Set(result.website_id),
        request_timestamp: Set(result.request_timestamp),
        response_timestamp: Set(result.response_timestamp),
        response_time_ms: Set(result.response_time.map(|d| d.as_millis() as i64)),
        http_status_code: Set(result.http_status_code.map(i32::from)),
        is_regex_pattern_compliant: Set(result.compliance.as_option()),
        ..Default::default()
    }
}

/// Inserts a batch of results in one statement. Returns the number of rows written.
pub async fn insert_results<C: ConnectionTrait>(
    db: &C,
    results: &[CheckResult],
) -> Result<u64, DbErr> {
    if results.is_empty() {
        return Ok(0);
    }
    WebsiteResult::insert_many(results.iter().map(to_active_model))
        .exec_without_returning(db)
        .await
}

pub async fn get_results_for_website(
    db: &DatabaseConnection,
    website_id: i32,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    limit: Option<u64>,
) -> Result<Vec<website_result::Model>, DbErr> {
    let mut query = WebsiteResult::find()
        .filter(website_result::Column::WebsiteId.eq(website_id));
    if let Some(start) = start_time {
        query = query.filter(website_result::Column::RequestTimestamp.gte(start));
    }
    if let Some(end) = end_time {
        query = query.filter(website_result::Column::RequestTimestamp.lte(end));
    }
    query
        .order_by_desc(website_result::Column::RequestTimestamp)
        .limit(limit.unwrap_or(DEFAULT_RESULTS_LIMIT))
        .all(db)
        .await
}

pub async fn get_latest_result(
    db: &DatabaseConnection,
    website_id: i32,
) -> Result<Option<website_result::Model>, DbErr> {
    WebsiteResult::find()
        .filter(website_result::Column::WebsiteId.eq(website_id))
        .order_by_desc(website_result::Column::RequestTimestamp)
        .one(db)
        .await
}

/// Latest result per website, for every id in `website_ids` that has one.
pub async fn get_latest_results(
    db: &DatabaseConnection,
    website_ids: Vec<i32>,
) -> Result<HashMap<i32, website_result::Model>, DbErr> {
    if website_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let latest = WebsiteResult::find()
        .from_raw_sql(sea_orm::Statement::from_sql_and_values(
            db.get_database_backend(),
            r#"
            SELECT DISTINCT ON (website_id) *
            FROM website_results
            WHERE website_id = ANY($1)
            ORDER BY website_id, request_timestamp DESC
            "#,
            [website_ids.into()],
        ))
        .all(db)
        .await?;
    Ok(latest.into_iter().map(|r| (r.website_id, r)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::checker::{Compliance, ProbeFailure};
    use chrono::Duration as ChronoDuration;
    use sea_orm::ActiveValue;
    use std::time::Duration;

    #[test]
    fn test_active_model_from_successful_result() {
        let request = Utc::now();
        let result = CheckResult {
            website_id: 4,
            request_timestamp: request,
            response_timestamp: Some(request + ChronoDuration::milliseconds(250)),
            response_time: Some(Duration::from_millis(250)),
            http_status_code: Some(200),
            compliance: Compliance::NonCompliant,
            failure: None,
        };

        let model = to_active_model(&result);

        assert_eq!(model.website_id, ActiveValue::Set(4));
        assert_eq!(model.response_time_ms, ActiveValue::Set(Some(250)));
        assert_eq!(model.http_status_code, ActiveValue::Set(Some(200)));
        assert_eq!(model.is_regex_pattern_compliant, ActiveValue::Set(Some(false)));
        assert_eq!(model.id, ActiveValue::NotSet);
    }

    #[test]
    fn test_response_time_survives_wall_clock_step_back() {
        let request = Utc::now();
        let result = CheckResult {
            website_id: 4,
            request_timestamp: request,
            // The system clock was set back while the request was in flight.
            response_timestamp: Some(request - ChronoDuration::seconds(2)),
            response_time: Some(Duration::from_millis(80)),
            http_status_code: Some(200),
            compliance: Compliance::Unknown,
            failure: None,
        };

        let model = to_active_model(&result);

        assert_eq!(model.response_time_ms, ActiveValue::Set(Some(80)));
    }

    #[test]
    fn test_active_model_from_failed_result_leaves_fields_null() {
        let result = CheckResult::failed(4, Utc::now(), ProbeFailure::Timeout(Duration::from_secs(30)));

        let model = to_active_model(&result);

        assert_eq!(model.response_timestamp, ActiveValue::Set(None));
        assert_eq!(model.response_time_ms, ActiveValue::Set(None));
        assert_eq!(model.http_status_code, ActiveValue::Set(None));
        assert_eq!(model.is_regex_pattern_compliant, ActiveValue::Set(None));
    }
}
