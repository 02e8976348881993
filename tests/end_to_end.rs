use std::sync::Arc;

use actix_web::{
    App,
    http::StatusCode,
    test,
    web::Data,
};
use serde_json::json;
use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep, timeout, Duration};

use fib_jobs::api::{self, job::{FibJobResponse, JobResultResponse, JobService}, validation};
use fib_jobs::db::{JobRepository, JobRequestRecord, JobStatus, MemoryJobRepository};
use fib_jobs::pipeline::{CalcFib, OutputConfig, Target, Task, TaskRegistry};
use fib_jobs::worker::{process_job, JobWorker};

struct Harness {
    _dir: tempfile::TempDir,
    output: OutputConfig,
    memory: Arc<MemoryJobRepository>,
    repo: Arc<dyn JobRepository>,
    registry: Arc<TaskRegistry>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig::new(dir.path());
        let memory = Arc::new(MemoryJobRepository::new());
        let repo: Arc<dyn JobRepository> = memory.clone();
        let registry = Arc::new(TaskRegistry::with_defaults(output.clone()));
        Self {
            _dir: dir,
            output,
            memory,
            repo,
            registry,
        }
    }

    fn service(&self) -> Data<JobService> {
        Data::new(JobService::new(self.repo.clone(), self.registry.clone()))
    }

    fn target(&self, fib_num: i64) -> Box<dyn Target> {
        CalcFib::new(fib_num, self.output.clone()).output()
    }
}

macro_rules! app {
    ($harness:expr) => {
        test::init_service(
            App::new()
                .app_data($harness.service())
                .app_data(validation::json_config())
                .app_data(validation::path_config())
                .configure(api::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn submit_execute_and_resubmit() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({"fib_num": 10}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let job: FibJobResponse = test::read_body_json(resp).await;
    assert_eq!(job.fib_num, 10);
    assert_eq!(job.url, format!("{}/", job.id));
    assert_eq!(job.user, None);
    assert_eq!(job.expected_runtime, 0);
    assert_eq!(job.resources_cpu_cores, 1);
    assert_eq!(job.resources_ram_mb, 2000);
    assert_eq!(job.status, JobStatus::New);

    // recording the request does not run the task
    let target = h.target(10);
    assert_eq!(target.key(), "fib_10");
    assert!(!target.exists());

    let claimed = h.repo.acquire_next_job().await.unwrap().unwrap();
    assert_eq!(claimed.id(), job.id);
    assert_eq!(
        process_job(h.repo.as_ref(), &h.registry, claimed).await,
        JobStatus::Success
    );

    assert!(target.exists());
    let content = target.read().unwrap().unwrap();
    assert!(content.contains("10"));
    assert!(content.contains("55"));

    let req = test::TestRequest::get()
        .uri(&format!("/jobs/{}/result", job.id))
        .to_request();
    let result: JobResultResponse = test::call_and_read_body_json(&app, req).await;
    assert!(result.complete);
    assert_eq!(result.status, JobStatus::Success);
    assert_eq!(result.content.as_deref(), Some("10 number in fib sequence is 55"));

    // same parameters, same job, no second row
    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({"fib_num": 10, "user": "someone-else"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let again: FibJobResponse = test::read_body_json(resp).await;
    assert_eq!(again.id, job.id);
    assert_eq!(again.user, None);
    assert_eq!(h.memory.len().await, 1);
    assert!(h.repo.acquire_next_job().await.unwrap().is_none());
}

#[actix_web::test]
async fn get_job_by_id() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({"fib_num": 7, "user": "alice"}))
        .to_request();
    let created: FibJobResponse = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get()
        .uri(&format!("/jobs/{}", created.id))
        .to_request();
    let fetched: FibJobResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(fetched, created);
    assert_eq!(fetched.user.as_deref(), Some("alice"));
}

#[actix_web::test]
async fn invalid_requests_are_rejected() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({"fib_num": -1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: validation::ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "Validation failed");
    assert!(body.fields.get("fib_num").is_some());

    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({"user": "alice"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/jobs/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/jobs/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    assert!(h.memory.is_empty().await);
}

#[actix_web::test]
async fn failed_job_can_be_retried() {
    let h = Harness::new();
    let app = app!(h);

    // beyond the supported index range: accepted as a job, fails when run
    let req = test::TestRequest::post()
        .uri("/jobs")
        .set_json(json!({"fib_num": 500}))
        .to_request();
    let job: FibJobResponse = test::call_and_read_body_json(&app, req).await;

    let claimed = h.repo.acquire_next_job().await.unwrap().unwrap();
    assert_eq!(
        process_job(h.repo.as_ref(), &h.registry, claimed).await,
        JobStatus::Failed
    );
    assert!(!h.target(500).exists());

    let req = test::TestRequest::get()
        .uri(&format!("/jobs/{}/result", job.id))
        .to_request();
    let result: JobResultResponse = test::call_and_read_body_json(&app, req).await;
    assert!(!result.complete);
    assert_eq!(result.status, JobStatus::Failed);

    let req = test::TestRequest::post()
        .uri(&format!("/jobs/{}/retry", job.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let retried: FibJobResponse = test::read_body_json(resp).await;
    assert_eq!(retried.status, JobStatus::New);

    // a job that is not failed cannot be retried
    let req = test::TestRequest::post()
        .uri(&format!("/jobs/{}/retry", job.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn health_endpoints_report_store() {
    let h = Harness::new();
    let app = app!(h);

    for uri in ["/health", "/ready", "/live"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn workers_drain_queue_and_stop_on_shutdown() {
    let h = Harness::new();
    let fib_nums = [0, 1, 10, 20, 30];
    for n in fib_nums {
        h.repo
            .get_or_create_fib(&fib_jobs::db::NewFibJob::new(n))
            .await
            .unwrap();
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let semaphore = Arc::new(Semaphore::new(2));
    let handles: Vec<_> = (1..=2)
        .map(|worker_id| {
            let worker = JobWorker::new(
                h.repo.clone(),
                h.registry.clone(),
                Duration::from_millis(20),
            );
            let semaphore = semaphore.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move { worker.run(worker_id, semaphore, shutdown_rx).await })
        })
        .collect();

    let drained = timeout(Duration::from_secs(10), async {
        loop {
            let mut done = 0;
            for n in fib_nums {
                let job = h.repo.find_fib_by_num(n).await.unwrap().unwrap();
                if job.request.status == JobStatus::Success {
                    done += 1;
                }
            }
            if done == fib_nums.len() {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "workers did not finish all jobs");

    assert_eq!(
        h.target(30).read().unwrap().as_deref(),
        Some("30 number in fib sequence is 832040")
    );
    assert_eq!(
        h.target(0).read().unwrap().as_deref(),
        Some("0 number in fib sequence is 0")
    );

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
