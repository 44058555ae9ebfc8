use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use card_ledger::SystemClock;
use gateway::{handlers, AppState, Config};
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway=debug,actix_web=info".into()),
        )
        .init();

    info!("Starting GiftRail gateway...");

    let config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => Config::from_file(&path).expect("failed to load configuration file"),
        Err(_) => Config::from_env(),
    };
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let (state, event_rx) = AppState::build(config, Arc::new(SystemClock));
    let state = web::Data::new(state);

    // Completed marketplace transactions feed the commission engine
    info!("Starting commission event loop");
    tokio::spawn(state.commission.clone().run_event_loop(event_rx));

    info!("Starting HTTP server on {}", bind_address);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(handlers::routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
