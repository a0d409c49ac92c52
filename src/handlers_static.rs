use std::path::PathBuf;
use warp::filters::BoxedFilter;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

const STATIC_CACHE_CONTROL: &str = "public, max-age=86400";

/// Paths the client-side router owns. Anything under `/api` stays a real 404.
fn is_client_route(path: &str) -> bool {
    path != "/api" && !path.starts_with("/api/")
}

/// Serves the web client from `static_dir`. Unknown non-API paths get
/// `index.html` so deep links into the client app still load.
fn serve_client(
    static_dir: PathBuf,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index = static_dir.join("index.html");

    let files = warp::get().and(warp::fs::dir(static_dir));

    let fallback = warp::get()
        .and(warp::path::full())
        .and_then(|path: FullPath| async move {
            if is_client_route(path.as_str()) {
                Ok(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one()
        .and(warp::fs::file(index));

    files
        .or(fallback)
        .unify()
        .map(|file| warp::reply::with_header(file, "cache-control", STATIC_CACHE_CONTROL))
}

/// Without a configured directory the filter never matches.
pub fn build_static_routes(static_dir: Option<PathBuf>) -> BoxedFilter<(Box<dyn Reply>,)> {
    match static_dir {
        Some(dir) => {
            log::info!("Serving web client from {}", dir.display());
            serve_client(dir)
                .map(|reply| Box::new(reply) as Box<dyn Reply>)
                .boxed()
        }
        None => warp::any()
            .and_then(|| async { Err::<Box<dyn Reply>, Rejection>(warp::reject::not_found()) })
            .boxed(),
    }
}
