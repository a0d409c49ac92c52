use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use warp::filters::BoxedFilter;
use warp::path::Peek;
use warp::{Filter, Rejection, Reply};

use crate::config::{CorsPolicy, FailureReporting, RateLimit};
use crate::db::Catalog;
use crate::handlers_health::build_health_routes;
use crate::handlers_photo::build_photo_routes;
use crate::handlers_static::build_static_routes;
use crate::handlers_upload::build_upload_routes;
use crate::ingest::Ingestor;
use crate::rate_limit::{rate_limit, RateLimiter};
use crate::warp_helpers::{cors, handle_rejection, security_headers};

/// Everything the route tree needs, built once in `main`.
pub struct AppState {
    pub catalog: Catalog,
    pub ingestor: Arc<Ingestor>,
    pub started_at: Instant,
    pub failure_reporting: FailureReporting,
    pub static_dir: Option<PathBuf>,
    pub cors: CorsPolicy,
    pub api_rate_limit: RateLimit,
    pub upload_rate_limit: RateLimit,
}

/// Matches requests under `/api` without consuming the segment.
fn api_scope() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path::peek()
        .and_then(|peek: Peek| async move {
            if peek.segments().next() == Some("api") {
                Ok(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one()
}

fn boxed<F, R>(filter: F) -> BoxedFilter<(Box<dyn Reply>,)>
where
    F: Filter<Extract = (R,), Error = Rejection> + Clone + Send + Sync + 'static,
    R: Reply + 'static,
{
    filter
        .map(|reply: R| Box::new(reply) as Box<dyn Reply>)
        .boxed()
}

/// The complete route tree: rate-limited API, optional static client, CORS,
/// request logging, JSON error bodies and security headers.
pub fn build_routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let api_routes = build_health_routes(state.catalog.clone(), state.started_at)
        .or(build_upload_routes(
            state.ingestor.clone(),
            state.failure_reporting,
            RateLimiter::new(state.upload_rate_limit),
        ))
        .or(build_photo_routes(state.catalog, state.ingestor));

    let api = api_scope()
        .and(rate_limit(RateLimiter::new(state.api_rate_limit)))
        .and(api_routes);

    let routes = api.or(build_static_routes(state.static_dir));

    let routes = match cors(&state.cors) {
        Some(cors) => boxed(routes.with(cors)),
        None => boxed(routes),
    };

    routes
        .with(warp::log("photo_sync"))
        .recover(handle_rejection)
        .with(warp::reply::with::headers(security_headers()))
}
