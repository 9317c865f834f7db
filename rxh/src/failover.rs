//! Failover agent helper (`cvfailover` / `CvFailover.exe`).

use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use rxh_common::{
    ExecutionResult, FailoverConfig, FieldValue, Machine, OsFlavor, Parameters, Result,
    RxhConfig, TemplateSet, parse_key_value_lines, quote_arg,
};

use crate::helper::{CommandHelper, HelperOptions};
use crate::machine_from_config;

const FAILOVER: &str = "failover";
const NODE_INFO: &str = "node_info";
const SYNC_STATUS: &str = "sync_status";

fn failover_templates() -> TemplateSet {
    let unix = "{install_dir}/Base/cvfailover";
    let windows = r#""{install_dir}\Base\CvFailover.exe""#;

    let mut templates = TemplateSet::new();
    for (flavor, binary) in [(OsFlavor::Unix, unix), (OsFlavor::Windows, windows)] {
        templates.register(
            FAILOVER,
            flavor,
            &format!("{binary} -op failover -destnode {{dest_node}} -type {{failover_type}}"),
        );
        templates.register(NODE_INFO, flavor, &format!("{binary} -op getnodeinfo"));
        templates.register(
            SYNC_STATUS,
            flavor,
            &format!("{binary} -op syncstatus -node {{node}}"),
        );
    }
    templates
}

/// Kind of failover to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailoverType {
    Production,
    Test,
    Planned,
    Unplanned,
    /// Return to the original production node.
    Undo,
}

impl FailoverType {
    /// Spelling expected by the agent's `-type` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Test => "Test",
            Self::Planned => "Planned",
            Self::Unplanned => "Unplanned",
            Self::Undo => "Undo",
        }
    }
}

impl std::fmt::Display for FailoverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown failover type: '{0}'")]
pub struct ParseFailoverTypeError(String);

impl FromStr for FailoverType {
    type Err = ParseFailoverTypeError;

    /// Accepts the bare name or the UI label, case-insensitively
    /// (`planned`, `Planned Failover`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let name = lower.strip_suffix(" failover").unwrap_or(&lower).trim();
        match name {
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            "planned" => Ok(Self::Planned),
            "unplanned" => Ok(Self::Unplanned),
            "undo" => Ok(Self::Undo),
            _ => Err(ParseFailoverTypeError(s.to_string())),
        }
    }
}

/// Drives the failover agent on one node.
#[derive(Debug)]
pub struct FailoverHelper {
    helper: CommandHelper,
    install_dir: String,
}

impl FailoverHelper {
    pub fn new(config: &FailoverConfig, machine: Box<dyn Machine>) -> Self {
        let flavor = machine.os_flavor();
        // The Windows template quotes the executable path itself.
        let install_dir = match flavor {
            OsFlavor::Unix => quote_arg(flavor, config.install_dir(flavor)),
            OsFlavor::Windows => config.install_dir(flavor).to_string(),
        };
        let mut options = HelperOptions::new().with_timeout(config.timeout);
        if config.debug {
            options = options.with_suffix(" -debug");
        }

        Self {
            helper: CommandHelper::new(failover_templates(), machine, options),
            install_dir,
        }
    }

    pub fn from_config(config: &RxhConfig) -> Result<Self> {
        Ok(Self::new(
            &config.failover_settings(),
            machine_from_config(config)?,
        ))
    }

    fn params(&self) -> Parameters {
        Parameters::new().set("install_dir", self.install_dir.as_str())
    }

    /// Fail over to `dest_node`.
    pub fn failover(&self, dest_node: &str, failover_type: FailoverType) -> Result<ExecutionResult> {
        let params = self
            .params()
            .set("dest_node", quote_arg(self.helper.flavor(), dest_node))
            .set("failover_type", failover_type.as_str());
        info!(%dest_node, %failover_type, "Starting failover");
        self.helper.run_operation(FAILOVER, &params)
    }

    /// `Key : Value` details reported by the agent for this node.
    pub fn node_info(&self) -> Result<BTreeMap<String, FieldValue>> {
        self.helper
            .run_and_parse(NODE_INFO, &self.params(), |output| {
                Ok(parse_key_value_lines(output, ':'))
            })
    }

    /// Whether `node` reports a successful sync status.
    pub fn is_synced(&self, node: &str) -> Result<bool> {
        let params = self
            .params()
            .set("node", quote_arg(self.helper.flavor(), node));
        self.helper.probe_exists(SYNC_STATUS, &params)
    }
}
