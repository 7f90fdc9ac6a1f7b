pub mod interaction_api;
pub mod job_api;
pub mod request;
pub mod types;

pub use interaction_api::*;
pub use job_api::*;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/interactions")
            .service(count_batch)
            .service(toggle_on)
            .service(toggle_off)
            .service(get_count)
            .service(get_active)
            .service(get_members)
            .service(get_pending),
    )
    .service(web::scope("/jobs").service(run_job));
}
