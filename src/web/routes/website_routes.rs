use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::services::{website_result_service, website_service};
use crate::monitor::{NewTarget, TargetUpdate};
use crate::web::models::website_models::{
    CreateWebsite, UpdateWebsite, WebsiteDetails, WebsiteResultDetails,
};
use crate::web::{AppError, AppState};

pub fn create_website_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_websites).post(create_website))
        .route(
            "/{id}",
            get(get_website).patch(update_website).delete(delete_website),
        )
        .route("/{id}/results", get(get_website_results))
}

#[axum::debug_handler]
async fn list_websites(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<WebsiteDetails>>, AppError> {
    let mut targets = app_state.registry.list();
    targets.sort_by_key(|t| t.id);
    let ids = targets.iter().map(|t| t.id).collect();
    let mut latest = website_result_service::get_latest_results(&app_state.db_pool, ids).await?;
    let websites = targets
        .iter()
        .map(|t| WebsiteDetails::from_target(t, latest.remove(&t.id)))
        .collect();
    Ok(Json(websites))
}

#[axum::debug_handler]
async fn create_website(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateWebsite>,
) -> Result<(StatusCode, Json<WebsiteDetails>), AppError> {
    let new_target = NewTarget::parse(
        &payload.url,
        payload.interval_seconds,
        payload.regexp_pattern.as_deref(),
    )?;
    let _guard = app_state.mutation_lock.lock().await;
    let target = app_state.registry.add(new_target)?;

    if let Err(e) = website_service::insert_website(&app_state.db_pool, &target).await {
        error!(website_id = target.id, error = %e, "Failed to persist new website, rolling back registration.");
        if let Err(rollback) = app_state.registry.remove(target.id) {
            error!(website_id = target.id, error = %rollback, "Rollback of website registration failed.");
        }
        return Err(e.into());
    }

    info!(website_id = target.id, url = %target.url, "Website registered.");
    Ok((
        StatusCode::CREATED,
        Json(WebsiteDetails::from_target(&target, None)),
    ))
}

#[axum::debug_handler]
async fn get_website(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<WebsiteDetails>, AppError> {
    let target = app_state.registry.get(id)?;
    let last_result = website_result_service::get_latest_result(&app_state.db_pool, id).await?;
    Ok(Json(WebsiteDetails::from_target(&target, last_result)))
}

#[axum::debug_handler]
async fn update_website(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateWebsite>,
) -> Result<Json<WebsiteDetails>, AppError> {
    let update = TargetUpdate::parse(payload.interval_seconds, payload.regexp_pattern.as_deref())?;
    if update.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one of intervalSeconds or regexpPattern must be provided".to_string(),
        ));
    }
    let _guard = app_state.mutation_lock.lock().await;
    let (previous, updated) = app_state.registry.update(id, &update)?;

    if let Err(e) = website_service::update_website(&app_state.db_pool, &updated).await {
        error!(website_id = id, error = %e, "Failed to persist website update, rolling back.");
        match app_state.registry.revert_update(&updated, previous) {
            Ok(true) => {}
            Ok(false) => warn!(website_id = id, "Website changed again before rollback, keeping the newer state."),
            Err(rollback) => {
                error!(website_id = id, error = %rollback, "Rollback of website update failed.")
            }
        }
        return Err(e.into());
    }

    info!(
        website_id = id,
        interval_seconds = updated.interval_seconds(),
        pattern = updated.pattern_str().unwrap_or(""),
        "Website updated."
    );
    Ok(Json(WebsiteDetails::from_target(&updated, None)))
}

#[axum::debug_handler]
async fn delete_website(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let _guard = app_state.mutation_lock.lock().await;
    let removed = app_state.registry.remove(id)?;

    if let Err(e) = website_service::delete_website(&app_state.db_pool, id).await {
        error!(website_id = id, error = %e, "Failed to delete website from database, restoring it.");
        if let Err(rollback) = app_state.registry.restore(removed) {
            error!(website_id = id, error = %rollback, "Restoring deleted website failed.");
        }
        return Err(e.into());
    }

    info!(website_id = id, "Website unregistered.");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct WebsiteResultsQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

#[axum::debug_handler]
async fn get_website_results(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<WebsiteResultsQuery>,
) -> Result<Json<Vec<WebsiteResultDetails>>, AppError> {
    app_state.registry.get(id)?;
    let results = website_result_service::get_results_for_website(
        &app_state.db_pool,
        id,
        query.start_time,
        query.end_time,
        query.limit,
    )
    .await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}
