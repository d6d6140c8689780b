mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{Sandbox, ScriptedRunner};
use dropship_core::context::GatewayContext;
use dropship_core::error::{ErrorClass, GatewayError};
use dropship_core::gateway::{ManageRequest, ProcessOutcome, ProcessService};
use dropship_core::supervisor::{InMemoryDaemon, ProcessState};

fn service(sandbox: &Sandbox, daemon: Arc<InMemoryDaemon>) -> ProcessService {
    GatewayContext::with_services(sandbox.config.clone(), Arc::new(ScriptedRunner::succeeding()), daemon)
        .process_service()
}

fn manage(sandbox: &Sandbox, action: &str, project: Option<&str>, script: Option<&str>) -> ManageRequest {
    ManageRequest {
        identity: Some("alice".to_string()),
        private_key: Some(common::stage_private_key(sandbox.staging(), "alice")),
        action: Some(action.to_string()),
        project_name: project.map(str::to_string),
        script_path: script.map(str::to_string),
    }
}

#[tokio::test]
async fn stopping_unknown_project_is_not_found() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new());

    let err = service(&sandbox, daemon.clone())
        .manage(manage(&sandbox, "stop", Some("ghost"), None))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::NotFound(ref name) if name == "ghost"));
    assert_eq!(err.status_code(), 404);
    assert_eq!(daemon.connect_count(), 1);
    assert_eq!(daemon.disconnect_count(), 1);
}

#[tokio::test]
async fn listing_an_empty_supervisor_succeeds() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new());

    let outcome = service(&sandbox, daemon.clone())
        .manage(manage(&sandbox, "list", None, None))
        .await
        .unwrap();

    assert_eq!(outcome, ProcessOutcome::Listed { processes: vec![] });
    assert!(!daemon.is_connected());
}

#[tokio::test]
async fn start_resolves_script_under_first_root() {
    let sandbox = Sandbox::new(&[("alice", &["alice", "shared"])]);
    let daemon = Arc::new(InMemoryDaemon::new());

    let outcome = service(&sandbox, daemon.clone())
        .manage(manage(&sandbox, "start", Some("api"), Some("api/server.js")))
        .await
        .unwrap();

    let ProcessOutcome::Started { created, processes, .. } = &outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(created);
    assert_eq!(processes[0].status, ProcessState::Online);
    assert_eq!(
        daemon.script_of("api"),
        Some(sandbox.uploads().join("alice/api/server.js"))
    );
    assert_eq!(outcome.message(), "New project api started successfully");
}

#[tokio::test]
async fn starting_new_project_without_script_is_bad_input() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new());

    let err = service(&sandbox, daemon.clone())
        .manage(manage(&sandbox, "start", Some("api"), None))
        .await
        .unwrap_err();

    assert_eq!(err.public_message(), "Script path is required for new project");
    assert_eq!(daemon.disconnect_count(), 1);
}

#[tokio::test]
async fn traversing_script_path_is_bad_input() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new());

    let err = service(&sandbox, daemon.clone())
        .manage(manage(&sandbox, "start", Some("api"), Some("../bob/server.js")))
        .await
        .unwrap_err();

    assert_eq!(err.public_message(), "Invalid script path");
    assert_eq!(daemon.connect_count(), 0);
}

#[tokio::test]
async fn script_path_without_roots_is_unauthorized() {
    let sandbox = Sandbox::new(&[("alice", &[])]);
    let daemon = Arc::new(InMemoryDaemon::new());

    let err = service(&sandbox, daemon.clone())
        .manage(manage(&sandbox, "start", Some("api"), Some("server.js")))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Unauthorized);
    assert_eq!(err.status_code(), 403);
    assert_eq!(daemon.connect_count(), 0);
}

#[tokio::test]
async fn status_reports_uptime_for_running_process() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new().with_stopped_process("api", PathBuf::from("/srv/api.js")));
    let service = service(&sandbox, daemon.clone());

    service
        .manage(manage(&sandbox, "start", Some("api"), None))
        .await
        .unwrap();
    let outcome = service
        .manage(manage(&sandbox, "status", Some("api"), None))
        .await
        .unwrap();

    let ProcessOutcome::Status { processes, .. } = outcome else {
        panic!("unexpected outcome");
    };
    assert_eq!(processes[0].status, ProcessState::Online);
    assert!(processes[0].uptime_ms.is_some());
    assert_eq!(daemon.connect_count(), 2);
    assert_eq!(daemon.disconnect_count(), 2);
}

#[tokio::test]
async fn invalid_action_and_missing_project_are_bad_input() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new());
    let service = service(&sandbox, daemon.clone());

    let err = service
        .manage(manage(&sandbox, "reboot", Some("api"), None))
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "Invalid action");

    let err = service
        .manage(manage(&sandbox, "restart", None, None))
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "Project name is required");

    assert_eq!(daemon.connect_count(), 0);
}

#[tokio::test]
async fn unreachable_supervisor_is_upstream_failure() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);

    let err = service(&sandbox, Arc::new(InMemoryDaemon::unreachable()))
        .manage(manage(&sandbox, "list", None, None))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::UpstreamFailure);
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn wrong_key_never_reaches_supervisor() {
    let sandbox = Sandbox::new(&[("alice", &["alice"])]);
    let daemon = Arc::new(InMemoryDaemon::new());
    let mut request = manage(&sandbox, "list", None, None);
    request.private_key = Some(common::stage_private_key(sandbox.staging(), "bob"));

    let err = service(&sandbox, daemon.clone()).manage(request).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Unauthenticated);
    assert_eq!(daemon.connect_count(), 0);
    assert_eq!(sandbox.staged_count(), 0);
}
