use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse, Responder};
use lru::LruCache;
use parking_lot::Mutex;

use crate::assemble::{assemble, AssembleError};
use crate::debug_dump::{DebugSink, Timings};
use crate::domain::optimize::{optimize, OptimizeError};
use crate::domain::solver::Solver;
use crate::models::OptimizeRequest;
use crate::objective::validate_objective;
use crate::report::{basket_rows, render_csv};
use crate::store::{CostSpec, ProductFrame, ProductStore, StoreError};

/// Response header carrying the binding constraints as JSON.
pub const ACTIVE_CONSTRAINTS_HEADER: &str = "X-Active-Constraints";

/// Cached selections are keyed by (sorted locations, nutrient ids in request
/// order, cost column or expression source). The store is immutable for the
/// process lifetime, so entries never need invalidation.
type SelectionKey = (Vec<i64>, Vec<String>, String);

pub struct AppState {
    store: ProductStore,
    solver: Box<dyn Solver>,
    cache: Mutex<LruCache<SelectionKey, Arc<ProductFrame>>>,
    debug_sink: Option<DebugSink>,
}

impl AppState {
    pub fn new(
        store: ProductStore,
        solver: Box<dyn Solver>,
        cache_size: usize,
        debug_sink: Option<DebugSink>,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        AppState {
            store,
            solver,
            cache: Mutex::new(LruCache::new(capacity)),
            debug_sink,
        }
    }
}

// ---------- Route handlers ----------

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message.into() }))
}

fn unprocessable(message: impl Into<String>) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(serde_json::json!({ "error": message.into() }))
}

fn internal_error(message: impl Into<String>) -> HttpResponse {
    let message = message.into();
    log::error!("{message}");
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": message }))
}

/// POST /optimize.csv
pub async fn optimize_csv(
    state: web::Data<AppState>,
    req: web::Json<OptimizeRequest>,
) -> impl Responder {
    let req = req.into_inner();

    // Input validation, all before any data is touched.
    if req.bounds.is_empty() {
        return bad_request("no nutrients selected");
    }
    if req.location_ids.is_empty() {
        return bad_request("no locations selected");
    }
    let (cost, cost_key) = match (req.currency, req.objective.as_deref()) {
        (Some(_), Some(_)) => {
            return bad_request("provide either a currency or an objective, not both")
        }
        (None, None) => return bad_request("no currency or objective provided"),
        (Some(currency), None) => (
            CostSpec::Currency(currency),
            format!("currency:{}", currency.cost_column()),
        ),
        (None, Some(source)) => match validate_objective(source, &state.store) {
            Ok(expr) => (CostSpec::Expression(expr), format!("expr:{source}")),
            Err(e) => return bad_request(e.to_string()),
        },
    };

    let nutrient_ids: Vec<String> = req
        .bounds
        .iter()
        .map(|bound| bound.nutrient_id.clone())
        .collect();

    // Candidate selection, through the LRU cache.
    let started = Instant::now();
    let mut sorted_locations = req.location_ids.clone();
    sorted_locations.sort_unstable();
    sorted_locations.dedup();
    let key: SelectionKey = (sorted_locations, nutrient_ids.clone(), cost_key);

    let frame = match state.cache.lock().get(&key).cloned() {
        Some(frame) => frame,
        None => {
            let frame = match state.store.select(&req.location_ids, &nutrient_ids, &cost) {
                Ok(frame) => Arc::new(frame),
                Err(
                    e @ (StoreError::NoLocationsSelected
                    | StoreError::UnknownColumn(_)
                    | StoreError::Objective(_)),
                ) => return bad_request(e.to_string()),
                Err(e) => return internal_error(format!("product selection failed: {e}")),
            };
            state.cache.lock().put(key, frame.clone());
            frame
        }
    };
    let query_time = started.elapsed().as_secs_f64();

    if frame.is_empty() {
        return unprocessable("no candidate products for the selected locations and nutrients");
    }

    // Dense arrays.
    let started = Instant::now();
    let lp = match assemble(&req.bounds, &frame) {
        Ok(lp) => lp,
        Err(e @ (AssembleError::NoBoundsSelected | AssembleError::InvalidBound { .. })) => {
            return bad_request(e.to_string())
        }
        Err(e @ AssembleError::MissingColumn(_)) => {
            return internal_error(format!("constraint assembly failed: {e}"))
        }
    };
    let array_time = started.elapsed().as_secs_f64();

    // Solve.
    let started = Instant::now();
    let solution = match optimize(&lp, state.solver.as_ref()) {
        Ok(solution) => solution,
        Err(e @ OptimizeError::NoSolution { .. }) => return unprocessable(e.to_string()),
        Err(OptimizeError::Solver(message)) => {
            return internal_error(format!("solver failure: {message}"))
        }
    };
    let optimization_time = started.elapsed().as_secs_f64();

    let timings = Timings {
        query_time,
        array_time,
        optimization_time,
        num_products: lp.num_products(),
        num_nutrients: lp.num_nutrients(),
    };
    log::info!(
        "optimize: solver={} query={:.3}s arrays={:.3}s solve={:.3}s products={} nutrients={} cost={:.2}",
        state.solver.name(),
        timings.query_time,
        timings.array_time,
        timings.optimization_time,
        timings.num_products,
        timings.num_nutrients,
        solution.objective_value,
    );

    let rows = basket_rows(&frame, &lp, &solution);
    let csv = match render_csv(&lp, &rows) {
        Ok(csv) => csv,
        Err(e) => return internal_error(format!("failed to render result: {e}")),
    };

    if let Some(sink) = &state.debug_sink {
        sink.dump(&req, &timings, &csv);
    }

    let active_json = serde_json::to_string(&solution.active).unwrap_or_else(|_| "[]".to_string());
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((ACTIVE_CONSTRAINTS_HEADER, active_json))
        .body(csv)
}

/// GET /health
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// GET /docs
pub async fn docs() -> impl Responder {
    let docs_html = include_str!("../static/docs.html");
    HttpResponse::Ok().content_type("text/html").body(docs_html)
}

/// GET / - Redirect to docs
pub async fn root_redirect() -> impl Responder {
    HttpResponse::Found()
        .append_header(("Location", "/docs"))
        .finish()
}

/// Route table, shared by the binary and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root_redirect))
        .route("/optimize.csv", web::post().to(optimize_csv))
        .route("/health", web::get().to(health_check))
        .route("/docs", web::get().to(docs));
}
