use actix_web::{
    HttpResponse, get, post,
    web::{Data, Path, ServiceConfig, scope},
};
use actix_web_validator::Json;

use super::models::SubmitFibJob;
use super::service::{JobService, ServiceError};

/// Look up or create the job for `fib_num`.
/// 201 when a new request was recorded, 200 when an existing one matched.
#[post("")]
async fn submit_job(
    service: Data<JobService>,
    job: Json<SubmitFibJob>,
) -> Result<HttpResponse, ServiceError> {
    let (response, created) = service.submit(&job).await?;
    if created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

#[get("/{id}")]
async fn get_job(
    service: Data<JobService>,
    id: Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.get(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/{id}/result")]
async fn get_job_result(
    service: Data<JobService>,
    id: Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.result(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/{id}/retry")]
async fn retry_job(
    service: Data<JobService>,
    id: Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.retry(id.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(response))
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        scope("/jobs")
            .service(submit_job)
            .service(get_job)
            .service(get_job_result)
            .service(retry_job),
    );
}
