use std::time::Duration;

use rxh::{CommandHelper, HelperOptions, Outcome, machine_from_config};
use rxh_common::{
    FailurePolicy, HelperError, LocalMachine, Parameters, RxhConfig, TemplateSet, parse_tabular,
};

use crate::common::init_test_logging;

fn shell_templates() -> TemplateSet {
    let mut templates = TemplateSet::new();
    templates.register_all("echo", "echo {word}");
    templates.register_all("table", "printf 'NAME NAMESPACE\\n{name} {ns}\\n'");
    templates.register_all("silent", "true");
    templates.register_all("fail", "echo {message} >&2; exit {code}");
    templates.register_all("sleep", "sleep {secs}");
    templates
}

fn local_helper(options: HelperOptions) -> CommandHelper {
    CommandHelper::new(shell_templates(), Box::new(LocalMachine::new()), options)
}

#[test]
fn test_default_config_targets_local_machine() {
    init_test_logging();

    let machine = machine_from_config(&RxhConfig::default()).unwrap();
    assert_eq!(machine.describe(), "local");
}

#[cfg(unix)]
#[test]
fn test_local_success() {
    init_test_logging();
    crate::test_log!("TEST START: test_local_success");

    let helper = local_helper(HelperOptions::default());
    let result = helper
        .run_operation("echo", &Parameters::new().set("word", "hello"))
        .unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.formatted_output(), vec!["hello"]);

    crate::test_log!("TEST PASS: test_local_success");
}

#[cfg(unix)]
#[test]
fn test_local_parse() {
    init_test_logging();

    let helper = local_helper(HelperOptions::default());
    let rows = helper
        .run_and_parse(
            "table",
            &Parameters::from([("name", "traefik"), ("ns", "ingress")]),
            |out| parse_tabular(out, true),
        )
        .unwrap();
    assert_eq!(rows, vec![("traefik".to_string(), "ingress".to_string())]);
}

#[cfg(unix)]
#[test]
fn test_empty_output_is_not_success() {
    init_test_logging();

    let helper = local_helper(HelperOptions::default());
    assert!(!helper.probe_exists("silent", &Parameters::new()).unwrap());
    assert!(matches!(
        helper.run_operation("silent", &Parameters::new()),
        Err(HelperError::CommandExecution { exit_code: 0, .. })
    ));
}

#[cfg(unix)]
#[test]
fn test_local_failure_under_both_policies() {
    init_test_logging();

    let helper = local_helper(HelperOptions::default());
    let params = Parameters::from([("message", "boom"), ("code", "3")]);

    let outcome = helper
        .execute_operation("fail", &params, FailurePolicy::Sentinel)
        .unwrap();
    match outcome {
        Outcome::Failed(result) => {
            assert_eq!(result.exit_code, 3);
            assert_eq!(result.exception_message(), Some("boom"));
        }
        Outcome::Succeeded(result) => panic!("unexpected success: {result:?}"),
    }

    let err = helper.run_operation("fail", &params).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Operation 'fail' failed with exit code 3: boom"
    );
}

#[cfg(unix)]
#[test]
fn test_local_timeout() {
    init_test_logging();

    let helper = local_helper(HelperOptions::new().with_timeout(Some(Duration::from_millis(200))));
    let outcome = helper
        .execute_operation("sleep", &Parameters::new().set("secs", "5"), FailurePolicy::Sentinel)
        .unwrap();
    let result = outcome.result();
    assert!(result.timed_out);
    assert_eq!(result.exit_code, 124);
    assert!(result.duration < Duration::from_secs(5));
}

#[test]
fn test_missing_parameter_never_runs() {
    init_test_logging();

    let helper = local_helper(HelperOptions::default());
    let err = helper
        .execute_operation("echo", &Parameters::new(), FailurePolicy::Sentinel)
        .unwrap_err();
    assert_eq!(err.code().code_str(), "RXH-E010");
}
