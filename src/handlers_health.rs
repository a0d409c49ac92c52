use serde_json::json;
use std::convert::Infallible;
use std::time::Instant;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::Catalog;
use crate::warp_helpers::{with_catalog, with_started_at, DatabaseError};

pub async fn health_check(started_at: Instant) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": started_at.elapsed().as_secs_f64()
    })))
}

pub async fn ready_check(catalog: Catalog) -> Result<impl Reply, Rejection> {
    match sqlx::query("SELECT 1").execute(catalog.pool()).await {
        Ok(_) => Ok(warp::reply::json(&json!({
            "status": "ready",
            "database": "connected",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))),
        Err(e) => {
            log::error!("Database connection failed: {}", e);
            Err(reject::custom(DatabaseError {
                message: "Database connection failed".to_string(),
            }))
        }
    }
}

pub fn build_health_routes(
    catalog: Catalog,
    started_at: Instant,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("api")
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_started_at(started_at))
        .and_then(health_check);

    let ready = warp::path("api")
        .and(warp::path("ready"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_catalog(catalog))
        .and_then(ready_check);

    health.or(ready)
}
