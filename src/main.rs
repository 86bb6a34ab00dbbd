use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use std::env;
use std::io;
use std::path::PathBuf;

use diet_optimizer::debug_dump::DebugSink;
use diet_optimizer::domain::solver_factory::{create_solver, SolverType};
use diet_optimizer::server::{configure, AppState};
use diet_optimizer::store::ProductStore;

// ---------- Server bootstrap ----------
fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    // Sentry wants to be initialized before the async runtime starts; the
    // guard must stay alive for the process lifetime.
    let _sentry_guard = env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(9000);

    let json_limit = env::var("JSON_PAYLOAD_LIMIT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(2 * 1024 * 1024); // default 2 MB

    let cache_size = env::var("TABLE_CACHE_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(32);

    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let products_path = data_dir.join("products.csv");
    let store = ProductStore::load(&products_path).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to load {}: {e}", products_path.display()),
        )
    })?;
    log::info!(
        "loaded {} candidate products from {}",
        store.len(),
        products_path.display()
    );

    let solver_name = env::var("SOLVER").unwrap_or_else(|_| "minilp".to_string());
    let solver_type = SolverType::from_str(&solver_name).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unknown solver {solver_name}"),
        )
    })?;
    let solver = create_solver(solver_type);
    log::info!("using solver {}", solver.name());

    let state = web::Data::new(AppState::new(
        store,
        solver,
        cache_size,
        DebugSink::from_env(),
    ));

    log::info!("starting server on http://127.0.0.1:{port}");
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(sentry_actix::Sentry::new())
                .wrap(Logger::default())
                .app_data(state.clone())
                .app_data(
                    web::JsonConfig::default()
                        .limit(json_limit)
                        .error_handler(|err, _| {
                            let err_string = err.to_string();
                            actix_web::error::InternalError::from_response(
                                err,
                                HttpResponse::BadRequest()
                                    .json(serde_json::json!({ "error": err_string })),
                            )
                            .into()
                        }),
                )
                .configure(configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    })
}
