/**
 * API REST GOLEM - Serveur HTTP du control plane
 *
 * RÔLE :
 * Expose le pilotage d'un provider Golem sur l'hôte : bootstrap complet,
 * start/stop, statut, identité, réglages, logs, diagnostics.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, réponses JSON
 * - Échecs de commandes / scripts : HTTP 200 avec `status: "error"`,
 *   message, détails et sorties capturées
 * - Corps de requête invalide : rejet 4xx par l'extracteur Axum
 *
 * SÉCURITÉ :
 * - Si GOLEM_API_KEY est défini, header x-api-key obligatoire sauf /health
 * - Sinon API ouverte
 */

use crate::models::{command_error, provider_error, timestamp, unix_now, LogQuery, StatusView};
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use golem_host::bootstrap::BootstrapReport;
use golem_host::capabilities;
use golem_host::provider::{LogKind, SettingsUpdate, StartOutcome, StopOutcome};
use golem_host::scripts::{run_hello_world, ScriptError};
use golem_host::{Bootstrapper, CommandRunner, GolemProvider, HostConfig, ScriptFetcher};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn CommandRunner>,
    pub fetcher: Arc<dyn ScriptFetcher>,
    pub host: Arc<HostConfig>,
    pub api_key: Option<String>,
}

impl AppState {
    fn provider(&self) -> GolemProvider {
        GolemProvider::new(self.runner.clone(), (*self.host).clone())
    }

    fn bootstrapper(&self) -> Bootstrapper {
        Bootstrapper::new(self.runner.clone(), self.fetcher.clone(), (*self.host).clone())
    }
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path();

    // Health check toujours accessible
    if path.starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("Rejected {} without a valid x-api-key", path);
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/bootstrap", post(bootstrap))
        .route("/golem-status", get(golem_status))
        .route("/start-golem", post(start_golem))
        .route("/stop-golem", post(stop_golem))
        .route("/node-id", get(node_id))
        .route("/golem-settings", get(golem_settings))
        .route("/edit-golem", post(edit_golem))
        .route("/check-requirements", get(check_requirements))
        .route("/verify-installation", get(verify_installation))
        .route("/golem-log", get(golem_log))
        .route("/ya-provider-log", get(ya_provider_log))
        .route("/golem-uptime", get(golem_uptime))
        .route("/hello-world", get(hello_world))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// POST /bootstrap (provisioning complet, peut durer plusieurs minutes)
async fn bootstrap(State(app): State<AppState>) -> Json<BootstrapReport> {
    info!("Bootstrap requested");
    Json(app.bootstrapper().run().await)
}

// GET /golem-status
async fn golem_status(State(app): State<AppState>) -> Json<Value> {
    match app.provider().status().await {
        Ok(snapshot) => Json(json!({
            "status": "success",
            "golem_status": StatusView { timestamp: unix_now(), snapshot },
        })),
        Err(e) => Json(provider_error("Could not get Golem status", &e)),
    }
}

// POST /start-golem (idempotent)
async fn start_golem(State(app): State<AppState>) -> Json<Value> {
    let log_file = app.host.paths.agent_output_log.display().to_string();
    match app.provider().start().await {
        Ok(StartOutcome::AlreadyRunning) => Json(json!({
            "status": "success",
            "message": "Golem provider is already running",
            "log_file": log_file,
        })),
        Ok(StartOutcome::Started { pid }) => Json(json!({
            "status": "success",
            "message": "Golem provider starting in background",
            "log_file": log_file,
            "pid": pid,
            "note": "Use /golem-status to check if fully started",
        })),
        Err(e) => Json(provider_error("Could not start Golem provider", &e)),
    }
}

// POST /stop-golem (idempotent)
async fn stop_golem(State(app): State<AppState>) -> Json<Value> {
    match app.provider().stop().await {
        Ok(StopOutcome::NotRunning) => Json(json!({
            "status": "success",
            "message": "Golem provider is not running",
        })),
        Ok(StopOutcome::Stopped { output }) => Json(json!({
            "status": "success",
            "message": "Golem provider stopped",
            "output": output.stdout,
        })),
        Err(e) => Json(provider_error("Could not stop Golem provider", &e)),
    }
}

// GET /node-id
async fn node_id(State(app): State<AppState>) -> Json<Value> {
    match app.provider().node_identity().await {
        Ok(node_data) => Json(json!({
            "status": "success",
            "message": "Node ID retrieved",
            "node_data": node_data,
        })),
        Err(e) => Json(provider_error("Could not get node ID", &e)),
    }
}

// GET /golem-settings
async fn golem_settings(State(app): State<AppState>) -> Json<Value> {
    match app.provider().settings().await {
        Ok(settings) => Json(json!({ "status": "success", "golem_settings": settings })),
        Err(e) => Json(provider_error("Could not get Golem settings", &e)),
    }
}

// POST /edit-golem
async fn edit_golem(State(app): State<AppState>, Json(update): Json<SettingsUpdate>) -> Json<Value> {
    match app.provider().update_settings(&update).await {
        Ok(applied) => Json(json!({
            "status": "success",
            "message": "Golem settings updated",
            "updated_settings": update,
            "command": applied.command,
            "output": applied.output,
        })),
        Err(e) => Json(provider_error("Could not update Golem settings", &e)),
    }
}

// GET /check-requirements
async fn check_requirements(State(app): State<AppState>) -> Json<Value> {
    let requirements = capabilities::check_requirements(app.runner.as_ref(), &app.host).await;
    Json(json!({ "status": "success", "requirements": requirements }))
}

// GET /verify-installation
async fn verify_installation(State(app): State<AppState>) -> Json<Value> {
    let report = capabilities::verify_installation(app.runner.as_ref(), &app.host).await;
    let all_good = report.all_systems_go();
    Json(json!({
        "status": if all_good { "success" } else { "warning" },
        "message": "Installation verification completed",
        "all_systems_go": all_good,
        "verification": report,
        "timestamp": timestamp(),
    }))
}

async fn tail(app: &AppState, kind: LogKind, lines: usize, context: &str) -> Json<Value> {
    match app.provider().tail_log(kind, lines).await {
        Ok(tail) => Json(json!({
            "status": "success",
            "log": tail.lines.join("\n"),
            "log_file": tail.log_file,
        })),
        Err(e) => Json(provider_error(context, &e)),
    }
}

// GET /golem-log?lines=N
async fn golem_log(State(app): State<AppState>, Query(query): Query<LogQuery>) -> Json<Value> {
    tail(&app, LogKind::Golem, query.lines(), "Could not fetch Golem logs").await
}

// GET /ya-provider-log?lines=N
async fn ya_provider_log(State(app): State<AppState>, Query(query): Query<LogQuery>) -> Json<Value> {
    tail(&app, LogKind::Provider, query.lines(), "Could not fetch ya-provider logs").await
}

// GET /golem-uptime
async fn golem_uptime(State(app): State<AppState>) -> Json<Value> {
    match app.provider().uptime().await {
        Ok(uptime) => Json(json!({
            "status": "success",
            "uptime": uptime.uptime,
            "uptime_seconds": uptime.seconds,
            "timestamp": timestamp(),
        })),
        Err(e) => Json(provider_error("Could not get Golem uptime", &e)),
    }
}

// GET /hello-world (diagnostic de la chaîne download → exécution)
async fn hello_world(State(app): State<AppState>) -> Json<Value> {
    let url = &app.host.scripts.hello_world;
    let result = run_hello_world(app.fetcher.as_ref(), app.runner.as_ref(), &app.host.commands.shell, url).await;

    match result {
        Ok(run) => Json(json!({
            "status": "success",
            "message": run.message,
            "script_url": run.script_url,
            "fallback_used": run.fallback_used,
            "timestamp": timestamp(),
            "script_content_preview": run.script_content_preview,
        })),
        Err(ScriptError::Download(e)) => Json(json!({
            "status": "error",
            "message": "Could not download hello world script",
            "script_url": e.url(),
            "details": e.to_string(),
        })),
        Err(ScriptError::Execution(e)) => Json(command_error("Could not execute hello world script", &e)),
        Err(ScriptError::Write(e)) => Json(json!({
            "status": "error",
            "message": "Could not write temporary script",
            "details": e.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use golem_devkit::{fixtures, Reply, StubFetcher, StubRunner};
    use golem_host::config::{BootstrapTiming, ScriptUrls};
    use tower::ServiceExt;

    fn test_host() -> HostConfig {
        let mut host = HostConfig::default();
        host.platform = Some("linux".to_string());
        host.bootstrap = BootstrapTiming::immediate();
        host.scripts = ScriptUrls::from_base("http://scripts.test");
        host
    }

    fn app_with(runner: &StubRunner, fetcher: &StubFetcher, host: HostConfig, api_key: Option<&str>) -> Router {
        build_router(AppState {
            runner: Arc::new(runner.clone()),
            fetcher: Arc::new(fetcher.clone()),
            host: Arc::new(host),
            api_key: api_key.map(str::to_string),
        })
    }

    fn app(runner: &StubRunner) -> Router {
        app_with(runner, &StubFetcher::new(), test_host(), None)
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, parsed)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn test_health_bypasses_api_key() {
        let app = app_with(&StubRunner::new(), &StubFetcher::new(), test_host(), Some("secret"));
        let response = app.oneshot(get_req("/health")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let runner = StubRunner::new();
        runner.on("golemsp status", Reply::ok(fixtures::STATUS_RUNNING));

        let app = app_with(&runner, &StubFetcher::new(), test_host(), Some("secret"));
        let (status, _) = call(app.clone(), get_req("/golem-status")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/golem-status")
            .header("x-api-key", "secret")
            .body(Body::empty())
            .expect("request");
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_golem_status() {
        let runner = StubRunner::new();
        runner.on("golemsp status", Reply::ok(fixtures::STATUS_RUNNING));

        let (status, body) = call(app(&runner), get_req("/golem-status")).await;
        assert_eq!(status, StatusCode::OK);
        let golem = &body["golem_status"];
        assert_eq!(golem["service_status"], "running");
        assert_eq!(golem["earnings"]["network"], "mainnet");
        assert!(golem["timestamp"].is_i64());
        assert!(golem["raw_output"].as_str().unwrap_or_default().contains("Node Name"));
    }

    #[tokio::test]
    async fn test_command_failure_is_reported_in_body() {
        let runner = StubRunner::new();
        runner.on("golemsp status", Reply::fail(1, "yagna daemon unreachable"));

        let (status, body) = call(app(&runner), get_req("/golem-status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Could not get Golem status");
        assert_eq!(body["stderr"], "yagna daemon unreachable");
    }

    #[tokio::test]
    async fn test_edit_golem_single_flag() {
        let runner = StubRunner::new();
        runner.on("golemsp settings set", Reply::ok("updated\n"));

        let (_, body) = call(app(&runner), post_json("/edit-golem", r#"{"cores": 4}"#)).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["command"], "golemsp settings set --cores 4");
        assert_eq!(body["updated_settings"], json!({ "cores": 4 }));
    }

    #[tokio::test]
    async fn test_edit_golem_without_fields() {
        let runner = StubRunner::new();
        let (_, body) = call(app(&runner), post_json("/edit-golem", "{}")).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["available_settings"].as_array().map(Vec::len), Some(7));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_golem_ignores_unknown_fields() {
        let runner = StubRunner::new();
        let (status, body) = call(app(&runner), post_json("/edit-golem", r#"{"gpu": 1}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["available_settings"].as_array().map(Vec::len), Some(7));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_golem_unknown_field_next_to_known_one() {
        let runner = StubRunner::new();
        runner.on("golemsp settings set", Reply::ok("updated\n"));

        let (_, body) = call(app(&runner), post_json("/edit-golem", r#"{"gpu": 1, "memory": "8GiB"}"#)).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["command"], "golemsp settings set --memory 8GiB");
    }

    #[tokio::test]
    async fn test_edit_golem_malformed_body() {
        let (status, _) = call(app(&StubRunner::new()), post_json("/edit-golem", r#"{"cores": "four"}"#)).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_node_id_requires_running_provider() {
        let runner = StubRunner::new();
        runner.on("golemsp status", Reply::ok(fixtures::STATUS_NOT_RUNNING));

        let (_, body) = call(app(&runner), get_req("/node-id")).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Golem provider is not running");
    }

    #[tokio::test]
    async fn test_node_id_includes_raw_output() {
        let runner = StubRunner::new();
        runner.on("golemsp status", Reply::ok(fixtures::STATUS_RUNNING));
        runner.on("yagna id show", Reply::ok(fixtures::ID_SHOW));

        let (_, body) = call(app(&runner), get_req("/node-id")).await;
        assert_eq!(body["status"], "success");
        let node_data = &body["node_data"];
        assert_eq!(node_data["nodeId"], "0x2f5c8a1e0b9d4c7e6a3f1b2d8e9c0a4b5d6e7f80");
        assert_eq!(node_data["raw_output"], fixtures::ID_SHOW.trim());
    }

    #[tokio::test]
    async fn test_bootstrap_reports_first_failure() {
        let runner = StubRunner::new();
        runner.on("grep", Reply::ok("0\n"));

        let (status, body) = call(app(&runner), post_json("/bootstrap", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["failed_step"], 1);
        assert_eq!(body["steps_completed"], 0);
        assert_eq!(body["steps"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_verify_installation_warning() {
        let runner = StubRunner::new();
        runner.on("which golemsp", Reply::ok("/home/golem/.local/bin/golemsp\n"));

        let (_, body) = call(app(&runner), get_req("/verify-installation")).await;
        assert_eq!(body["status"], "warning");
        assert_eq!(body["all_systems_go"], false);
        assert_eq!(body["verification"]["golem_path"], "/home/golem/.local/bin/golemsp");
        assert!(body["verification"]["kvm_device"].is_null());
    }

    #[tokio::test]
    async fn test_golem_log_tail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut host = test_host();
        host.paths.golem_log = dir.path().join("yagna_rCURRENT.log");
        std::fs::write(&host.paths.golem_log, "a\nb\nc\n").expect("write log");

        let app = app_with(&StubRunner::new(), &StubFetcher::new(), host, None);
        let (_, body) = call(app.clone(), get_req("/golem-log?lines=2")).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["log"], "b\nc");

        let (_, body) = call(app, get_req("/ya-provider-log")).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Log file not found");
    }

    #[tokio::test]
    async fn test_golem_uptime() {
        let runner = StubRunner::new();
        runner
            .on("golemsp status", Reply::ok(fixtures::STATUS_RUNNING))
            .on("ps -eo", Reply::ok(fixtures::PS_OUTPUT));

        let (_, body) = call(app(&runner), get_req("/golem-uptime")).await;
        assert_eq!(body["uptime"], "01:05:12");
        assert_eq!(body["uptime_seconds"], 3912);
    }

    #[tokio::test]
    async fn test_hello_world_fallback() {
        let runner = StubRunner::new();
        runner.on("bash", Reply::ok("Hello World from Local Fallback!\n"));

        let (_, body) = call(app(&runner), get_req("/hello-world")).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["fallback_used"], true);
        assert_eq!(body["script_url"], "http://scripts.test/hello-world.sh");
    }

    #[tokio::test]
    async fn test_hello_world_download_error() {
        let fetcher = StubFetcher::new();
        fetcher.unreachable("http://scripts.test/hello-world.sh");

        let app = app_with(&StubRunner::new(), &fetcher, test_host(), None);
        let (_, body) = call(app, get_req("/hello-world")).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["script_url"], "http://scripts.test/hello-world.sh");
    }
}
