mod api;
mod app;
mod cache;
mod config;
mod constants;
mod errors;
mod ledger;
mod models;
mod resources;
mod services;
mod tasks;

use actix_web::middleware::Logger;
use actix_web::{web, App as ActixWebApp, HttpServer};
use anyhow::Context;
use app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::new().await.context("Could not initialize app")?;
    let port = app.port();

    app.init();

    if app.config.reconcile.enabled {
        tasks::reconcile_task(app.reconciler.clone(), app.config.reconcile.interval()).await;
    }

    let app_web_data = web::Data::new(app);

    HttpServer::new(move || {
        ActixWebApp::new()
            .wrap(Logger::new("%a %r %s %b %T"))
            .app_data(app_web_data.clone())
            .configure(api::configure)
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("Could not bind to port {}", port))?
    .run()
    .await
    .with_context(|| format!("Could not run server on port {}", port))?;

    Ok(())
}
