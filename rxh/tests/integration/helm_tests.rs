use std::sync::Arc;

use rxh::{DeployOptions, HelmHelper};
use rxh_common::{
    FieldValue, HelmConfig, HelperError, MockMachine, MockResponse, OsFlavor, evaluate_success,
};

use crate::common::fixtures::{
    HELM_LIST_ALL, HELM_LIST_DB, HELM_LIST_STALE, HELM_REPO_LIST, HELM_VERSION,
};
use crate::common::init_test_logging;

fn helm(mock: &Arc<MockMachine>) -> HelmHelper {
    HelmHelper::new(&HelmConfig::default(), Box::new(Arc::clone(mock)))
}

#[test]
fn test_absent_release_probe_and_raise() {
    init_test_logging();
    crate::test_log!("TEST START: test_absent_release_probe_and_raise");

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("helm status", MockResponse::completed(1, "", None)),
    );
    let helper = helm(&mock);

    assert!(!evaluate_success(1, "", false));
    assert!(!helper.is_chart_present("myapp", "prod").unwrap());
    assert_eq!(
        mock.last_command().unwrap(),
        "helm status myapp -n prod --output json"
    );

    match helper.release_status("myapp", "prod").unwrap_err() {
        HelperError::CommandExecution {
            operation,
            exit_code,
            ..
        } => {
            assert_eq!(operation, "status");
            assert_eq!(exit_code, 1);
        }
        other => panic!("expected CommandExecution, got {other:?}"),
    }

    crate::test_log!("TEST PASS: test_absent_release_probe_and_raise");
}

#[test]
fn test_present_release() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix).respond(
        "helm status",
        MockResponse::ok(r#"{"name":"myapp","namespace":"prod","version":1,"info":{"status":"deployed"}}"#),
    ));
    assert!(helm(&mock).is_chart_present("myapp", "prod").unwrap());
}

#[test]
fn test_probe_does_not_hide_connection_errors() {
    init_test_logging();

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .named("k8s-master")
            .with_default(MockResponse::connection_failure("Connection timed out")),
    );
    let err = helm(&mock).is_chart_present("myapp", "prod").unwrap_err();
    assert!(matches!(err, HelperError::Connection { ref host, .. } if host == "k8s-master"));
}

#[test]
fn test_add_repo_replaces_existing_entry() {
    init_test_logging();

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix).respond("repo list", MockResponse::ok(HELM_REPO_LIST)),
    );
    helm(&mock).add_repo().unwrap();

    assert_eq!(
        mock.commands(),
        vec![
            "helm repo list",
            "helm repo remove bitnami",
            "helm repo add bitnami 'https://charts.bitnami.com/bitnami'",
            "helm repo update",
        ]
    );
}

#[test]
fn test_add_repo_without_any_repositories() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix).respond(
        "repo list",
        MockResponse::failure(1, "Error: no repositories to show"),
    ));
    let config = HelmConfig {
        repo_path: "https://charts.jetstack.io".to_string(),
        repo_name: Some("jetstack".to_string()),
        ..HelmConfig::default()
    };
    HelmHelper::new(&config, Box::new(Arc::clone(&mock)))
        .add_repo()
        .unwrap();

    let commands = mock.commands();
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|c| !c.contains("repo remove")));
    assert_eq!(
        commands[1],
        "helm repo add jetstack 'https://charts.jetstack.io'"
    );
}

#[test]
fn test_add_repo_failure_raises() {
    init_test_logging();

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("repo list", MockResponse::ok(HELM_REPO_LIST))
            .respond(
                "repo add",
                MockResponse::failure(1, "Error: looks like the URL is not a valid chart repository"),
            ),
    );
    let err = helm(&mock).add_repo().unwrap_err();
    assert!(matches!(err, HelperError::CommandExecution { ref operation, .. } if operation == "repo_add"));
    assert!(err.to_string().contains("not a valid chart repository"));
}

#[test]
fn test_deploy_passes_set_values_verbatim() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix));
    helm(&mock)
        .deploy_app(
            "mysql",
            "db",
            &DeployOptions::new().set("auth.rootPassword=Secr3t").wait(true),
        )
        .unwrap();
    assert_eq!(
        mock.last_command().unwrap(),
        "helm install mysql bitnami/mysql -n db --create-namespace --set auth.rootPassword=Secr3t --wait"
    );
}

#[test]
fn test_cleanup_app() {
    init_test_logging();

    let absent = Arc::new(
        MockMachine::new(OsFlavor::Unix).respond("helm status", MockResponse::failure(1, "Error: release: not found")),
    );
    assert!(!helm(&absent).cleanup_app("redis", "cache").unwrap());
    assert!(absent.commands().iter().all(|c| !c.contains("uninstall")));

    let present = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("helm status", MockResponse::ok(r#"{"name":"redis","namespace":"cache"}"#)),
    );
    assert!(helm(&present).cleanup_app("redis", "cache").unwrap());
    assert_eq!(
        present.last_command().unwrap(),
        "helm uninstall redis -n cache"
    );
}

#[test]
fn test_version_info() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix).respond("version", MockResponse::ok(HELM_VERSION)));
    let fields = helm(&mock).version_info().unwrap();
    assert_eq!(fields["Version"], FieldValue::Text("v3.14.2".to_string()));
    assert_eq!(fields["GoVersion"], FieldValue::Text("go1.21.7".to_string()));
}

#[test]
fn test_verify_binary_missing() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix).respond(
        "version",
        MockResponse::failure(127, "sh: 1: helm: not found"),
    ));
    let err = helm(&mock).verify_binary().unwrap_err();
    assert!(matches!(err, HelperError::CommandExecution { exit_code: 127, .. }));
}

#[test]
fn test_list_and_collect() {
    init_test_logging();

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("list -A", MockResponse::ok(HELM_LIST_ALL))
            .respond("list -n db", MockResponse::ok(HELM_LIST_DB)),
    );
    let helper = helm(&mock);

    let all = helper.list_releases(None).unwrap();
    assert_eq!(
        all,
        vec![
            ("mysql".to_string(), "db".to_string()),
            ("redis".to_string(), "cache".to_string()),
        ]
    );
    assert_eq!(helper.list_releases(Some("db")).unwrap().len(), 1);
    assert_eq!(helper.collect("helm list -A").unwrap(), all);
}

#[test]
fn test_verify_releases_listed() {
    init_test_logging();

    let consistent = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("list -A", MockResponse::ok(HELM_LIST_ALL))
            .respond("list -n", MockResponse::ok(HELM_LIST_DB)),
    );
    helm(&consistent).verify_releases_listed(&["db"]).unwrap();

    let stale = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("list -A", MockResponse::ok(HELM_LIST_ALL))
            .respond("list -n", MockResponse::ok(HELM_LIST_STALE)),
    );
    match helm(&stale).verify_releases_listed(&["db"]).unwrap_err() {
        HelperError::ReleaseMismatch(message) => {
            assert!(message.contains("ghost (db)"), "{message}");
            assert!(!message.contains("mysql"), "{message}");
        }
        other => panic!("expected ReleaseMismatch, got {other:?}"),
    }
}
