use crate::api::types::Response;
use crate::app::App;
use actix_web::{post, web, HttpResponse};

/// Trigger for an external scheduler, e.g. `POST /jobs/like_reconcile`. A run skipped
/// because another instance holds the lock is still a success.
#[post("/{handler}")]
pub async fn run_job(app: web::Data<App>, handler: web::Path<String>) -> Response {
    let outcome = app.reconciler.handle(&handler).await?;

    Ok(HttpResponse::Ok().json(outcome))
}
