//! Helm CLI helper.
//!
//! Every command is OS independent and gets the configured
//! `--kubeconfig` and `--debug` flags appended.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::info;

use rxh_common::{
    ExecutionResult, FailurePolicy, FieldValue, HelmConfig, HelperError, KEY_VALUE_PATTERN,
    Machine, OsFlavor, Parameters, Result, RxhConfig, TemplateSet, parse_json, parse_keyvalue,
    parse_tabular, quote_arg,
};

use crate::helper::{CommandHelper, HelperOptions};
use crate::machine_from_config;

const VERSION: &str = "version";
const REPO_LIST: &str = "repo_list";
const REPO_REMOVE: &str = "repo_remove";
const REPO_ADD: &str = "repo_add";
const REPO_UPDATE: &str = "repo_update";
const INSTALL: &str = "install";
const UNINSTALL: &str = "uninstall";
const STATUS: &str = "status";
const LIST_NAMESPACE: &str = "list_namespace";
const LIST_ALL: &str = "list_all";

fn helm_templates() -> TemplateSet {
    let mut templates = TemplateSet::new();
    templates.register_all(VERSION, "{helm} version");
    templates.register_all(REPO_LIST, "{helm} repo list");
    templates.register_all(REPO_REMOVE, "{helm} repo remove {repo_name}");
    templates.register_all(REPO_ADD, "{helm} repo add {repo_name} {repo_path}");
    templates.register_all(REPO_UPDATE, "{helm} repo update");
    templates.register_all(INSTALL, "{helm} install {app} {chart} -n {ns}{options}");
    templates.register_all(UNINSTALL, "{helm} uninstall {app} -n {ns}");
    templates.register_all(STATUS, "{helm} status {app} -n {ns} --output json");
    templates.register_all(LIST_NAMESPACE, "{helm} list -n {ns}");
    templates.register_all(LIST_ALL, "{helm} list -A");
    templates
}

/// Options for [`HelmHelper::deploy_app`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// `key=value` overrides, each passed as `--set`.
    pub set_values: Vec<String>,
    /// Values file passed with `-f`.
    pub values_file: Option<PathBuf>,
    /// Chart reference; defaults to `<repo_name>/<app>`.
    pub chart: Option<String>,
    /// Chart version constraint.
    pub version: Option<String>,
    pub create_namespace: bool,
    /// Wait until all resources are ready.
    pub wait: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            set_values: Vec::new(),
            values_file: None,
            chart: None,
            version: None,
            create_namespace: true,
            wait: false,
        }
    }
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, value: impl Into<String>) -> Self {
        self.set_values.push(value.into());
        self
    }

    pub fn values_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.values_file = Some(path.into());
        self
    }

    pub fn chart(mut self, chart: impl Into<String>) -> Self {
        self.chart = Some(chart.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn create_namespace(mut self, create: bool) -> Self {
        self.create_namespace = create;
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Extra `helm install` arguments, each value quoted for `flavor`.
    fn to_args(&self, flavor: OsFlavor) -> String {
        let mut args = String::new();
        if self.create_namespace {
            args.push_str(" --create-namespace");
        }
        if let Some(version) = &self.version {
            args.push_str(&format!(" --version {}", quote_arg(flavor, version)));
        }
        if let Some(file) = &self.values_file {
            args.push_str(&format!(" -f {}", quote_arg(flavor, &file.to_string_lossy())));
        }
        for value in &self.set_values {
            args.push_str(&format!(" --set {}", quote_arg(flavor, value)));
        }
        if self.wait {
            args.push_str(" --wait");
        }
        args
    }
}

/// Release details from `helm status --output json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReleaseStatus {
    pub name: String,
    pub namespace: String,
    /// Release revision.
    #[serde(rename = "version", default)]
    pub revision: u32,
    #[serde(default)]
    pub info: ReleaseInfo,
    #[serde(default)]
    pub chart: Option<ReleaseChart>,
    /// User-supplied values.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReleaseInfo {
    pub status: String,
    pub description: String,
    pub first_deployed: Option<String>,
    pub last_deployed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseChart {
    pub metadata: ChartMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
}

impl ReleaseStatus {
    pub fn is_deployed(&self) -> bool {
        self.info.status.eq_ignore_ascii_case("deployed")
    }
}

/// Drives the `helm` CLI on one machine.
#[derive(Debug)]
pub struct HelmHelper {
    helper: CommandHelper,
    binary: String,
    repo_name: String,
    repo_path: String,
}

impl HelmHelper {
    pub fn new(config: &HelmConfig, machine: Box<dyn Machine>) -> Self {
        let flavor = machine.os_flavor();
        let mut options = HelperOptions::new().with_timeout(config.timeout);
        if let Some(kubeconfig) = &config.kubeconfig {
            options = options.with_suffix(format!(
                " --kubeconfig {}",
                quote_arg(flavor, &kubeconfig.to_string_lossy())
            ));
        }
        if config.debug {
            options = options.with_suffix(" --debug");
        }

        Self {
            helper: CommandHelper::new(helm_templates(), machine, options),
            binary: quote_arg(flavor, &config.binary),
            repo_name: config.repo_name(),
            repo_path: config.repo_path.clone(),
        }
    }

    /// Helper for the configured target and Helm settings.
    pub fn from_config(config: &RxhConfig) -> Result<Self> {
        Ok(Self::new(&config.helm_settings(), machine_from_config(config)?))
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    fn params(&self) -> Parameters {
        Parameters::new().set("helm", self.binary.as_str())
    }

    fn release_params(&self, app: &str, namespace: &str) -> Parameters {
        let flavor = self.helper.flavor();
        self.params()
            .set("app", quote_arg(flavor, app))
            .set("ns", quote_arg(flavor, namespace))
    }

    /// Check that the Helm binary runs on the target.
    pub fn verify_binary(&self) -> Result<()> {
        self.helper.run_operation(VERSION, &self.params())?;
        info!(machine = %self.helper.machine().describe(), "Helm binary is available");
        Ok(())
    }

    /// Fields of `helm version` (`Version`, `GitCommit`, `GoVersion`, ...).
    pub fn version_info(&self) -> Result<BTreeMap<String, FieldValue>> {
        self.helper
            .run_and_parse(VERSION, &self.params(), |output| {
                parse_keyvalue(output, &KEY_VALUE_PATTERN)
            })
    }

    /// Register the chart repository, replacing a stale entry of the same
    /// name, then refresh the repository index.
    pub fn add_repo(&self) -> Result<()> {
        let flavor = self.helper.flavor();
        let params = self
            .params()
            .set("repo_name", quote_arg(flavor, &self.repo_name))
            .set("repo_path", quote_arg(flavor, &self.repo_path));

        // `helm repo list` fails when no repository is configured at all.
        let listing = self
            .helper
            .execute_operation(REPO_LIST, &params, FailurePolicy::Sentinel)?;
        if listing.is_success() {
            let repos = parse_tabular(&listing.result().output, true)?;
            if repos.iter().any(|(name, _)| *name == self.repo_name) {
                info!(repo = %self.repo_name, "Removing existing Helm repository");
                self.helper.run_operation(REPO_REMOVE, &params)?;
            }
        }

        info!(repo = %self.repo_name, url = %self.repo_path, "Adding Helm repository");
        self.helper.run_operation(REPO_ADD, &params)?;
        self.helper.run_operation(REPO_UPDATE, &params)?;
        Ok(())
    }

    /// Install `app` into `namespace`.
    pub fn deploy_app(
        &self,
        app: &str,
        namespace: &str,
        options: &DeployOptions,
    ) -> Result<ExecutionResult> {
        let flavor = self.helper.flavor();
        let chart = options
            .chart
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.repo_name, app));
        let params = self
            .release_params(app, namespace)
            .set("chart", quote_arg(flavor, &chart))
            .set("options", options.to_args(flavor));

        info!(%app, %namespace, %chart, "Deploying Helm release");
        self.helper.run_operation(INSTALL, &params)
    }

    /// Whether a release named `app` exists in `namespace`.
    pub fn is_chart_present(&self, app: &str, namespace: &str) -> Result<bool> {
        self.helper
            .probe_exists(STATUS, &self.release_params(app, namespace))
    }

    /// Uninstall `app` if it is present. Returns whether anything was removed.
    pub fn cleanup_app(&self, app: &str, namespace: &str) -> Result<bool> {
        if !self.is_chart_present(app, namespace)? {
            info!(%app, %namespace, "Helm release not present, nothing to clean up");
            return Ok(false);
        }
        info!(%app, %namespace, "Uninstalling Helm release");
        self.helper
            .run_operation(UNINSTALL, &self.release_params(app, namespace))?;
        Ok(true)
    }

    pub fn release_status(&self, app: &str, namespace: &str) -> Result<ReleaseStatus> {
        self.helper
            .run_and_parse(STATUS, &self.release_params(app, namespace), parse_json)
    }

    /// `(name, namespace)` of each release, in one namespace or cluster-wide.
    pub fn list_releases(&self, namespace: Option<&str>) -> Result<Vec<(String, String)>> {
        let flavor = self.helper.flavor();
        let (name, params) = match namespace {
            Some(ns) => (LIST_NAMESPACE, self.params().set("ns", quote_arg(flavor, ns))),
            None => (LIST_ALL, self.params()),
        };
        self.helper
            .run_and_parse(name, &params, |output| parse_tabular(output, true))
    }

    /// Run an arbitrary Helm listing command and return its first two
    /// columns.
    pub fn collect(&self, command: &str) -> Result<Vec<(String, String)>> {
        let command = self.helper.append_suffixes(command);
        let outcome = self
            .helper
            .run_command("collect", &command, FailurePolicy::Raise)?;
        parse_tabular(&outcome.result().output, true)
    }

    /// Check that every release listed per namespace also shows up in the
    /// cluster-wide listing.
    pub fn verify_releases_listed(&self, namespaces: &[&str]) -> Result<()> {
        let cluster: BTreeSet<(String, String)> = self.list_releases(None)?.into_iter().collect();

        for namespace in namespaces {
            let missing: Vec<String> = self
                .list_releases(Some(namespace))?
                .into_iter()
                .filter(|row| !cluster.contains(row))
                .map(|(name, ns)| format!("{name} ({ns})"))
                .collect();
            if !missing.is_empty() {
                return Err(HelperError::ReleaseMismatch(format!(
                    "listed in namespace '{namespace}' but not cluster-wide: {}",
                    missing.join(", ")
                )));
            }
        }
        info!(namespaces = namespaces.len(), "Helm release listings agree");
        Ok(())
    }
}
