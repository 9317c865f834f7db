use std::sync::Arc;

use rxh::{FailoverHelper, FailoverType};
use rxh_common::{
    FailoverConfig, FieldValue, HelperError, MockMachine, MockResponse, OsFlavor,
};

use crate::common::fixtures::NODE_INFO;
use crate::common::init_test_logging;

fn failover(mock: &Arc<MockMachine>, config: FailoverConfig) -> FailoverHelper {
    FailoverHelper::new(&config, Box::new(Arc::clone(mock)))
}

#[test]
fn test_node_info() {
    init_test_logging();
    crate::test_log!("TEST START: test_node_info");

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix).respond("getnodeinfo", MockResponse::ok(NODE_INFO)),
    );
    let info = failover(&mock, FailoverConfig::default()).node_info().unwrap();

    assert_eq!(info["Node Name"], FieldValue::Text("nodeA".to_string()));
    assert_eq!(info["Node Role"], FieldValue::Text("Production".to_string()));
    assert_eq!(info["Last Failover Time"], FieldValue::Null);

    crate::test_log!("TEST PASS: test_node_info");
}

#[test]
fn test_is_synced() {
    init_test_logging();

    let mock = Arc::new(
        MockMachine::new(OsFlavor::Unix)
            .respond("-node nodeB", MockResponse::ok("Sync Status : Synced"))
            .respond("-node nodeC", MockResponse::failure(2, "Node is not in sync")),
    );
    let helper = failover(&mock, FailoverConfig::default());

    assert!(helper.is_synced("nodeB").unwrap());
    assert!(!helper.is_synced("nodeC").unwrap());
    assert_eq!(
        mock.last_command().unwrap(),
        "/opt/commvault/Base/cvfailover -op syncstatus -node nodeC"
    );
}

#[test]
fn test_failover_failure_raises() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix).with_default(MockResponse::completed(
        1,
        "Failover request rejected",
        Some("destination node is not reachable"),
    )));
    let err = failover(&mock, FailoverConfig::default())
        .failover("nodeB", FailoverType::Unplanned)
        .unwrap_err();

    match err {
        HelperError::CommandExecution {
            operation,
            output,
            exception,
            ..
        } => {
            assert_eq!(operation, "failover");
            assert_eq!(output, "Failover request rejected");
            assert_eq!(exception.as_deref(), Some("destination node is not reachable"));
        }
        other => panic!("expected CommandExecution, got {other:?}"),
    }
}

#[test]
fn test_install_dir_with_spaces_is_quoted_on_unix() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Unix));
    let config = FailoverConfig {
        install_dir: Some("/opt/my apps/commvault".to_string()),
        debug: true,
        ..Default::default()
    };
    failover(&mock, config)
        .failover("node B", FailoverType::Undo)
        .unwrap();
    assert_eq!(
        mock.last_command().unwrap(),
        "'/opt/my apps/commvault'/Base/cvfailover -op failover -destnode 'node B' -type Undo -debug"
    );
}

#[test]
fn test_windows_failover_command() {
    init_test_logging();

    let mock = Arc::new(MockMachine::new(OsFlavor::Windows));
    failover(&mock, FailoverConfig::default())
        .failover("nodeB", FailoverType::Test)
        .unwrap();
    assert_eq!(
        mock.last_command().unwrap(),
        r#""C:\Program Files\Commvault\ContentStore\Base\CvFailover.exe" -op failover -destnode nodeB -type Test"#
    );
}
