pub mod health;
pub mod job;
pub mod validation;

use actix_web::web;

/// Mount every route the service exposes
pub fn configure(config: &mut web::ServiceConfig) {
    config
        .configure(health::health_config)
        .configure(job::handlers::job_config);
}
