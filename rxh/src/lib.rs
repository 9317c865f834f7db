//! Remote Execution Helper.
//!
//! Test-automation helpers that drive command-line tools on local or remote
//! machines: [`CommandHelper`] implements the generic flow, and
//! [`HelmHelper`] and [`FailoverHelper`] wrap concrete tools on top of it.

pub mod failover;
pub mod helm;
pub mod helper;

pub use failover::{FailoverHelper, FailoverType, ParseFailoverTypeError};
pub use helm::{ChartMetadata, DeployOptions, HelmHelper, ReleaseChart, ReleaseInfo, ReleaseStatus};
pub use helper::{CommandHelper, HelperOptions, Outcome, execute_request};

use rxh_common::{Machine, OsFlavor, Result, RxhConfig, Target, machine_for};

/// Machine for the configured target.
///
/// The flavor comes from the `os` descriptor when set. Otherwise a local
/// target uses the flavor of this process and a remote one is assumed to
/// be Unix.
pub fn machine_from_config(config: &RxhConfig) -> Result<Box<dyn Machine>> {
    let target = config.target()?;
    let flavor = match (config.os_flavor()?, &target) {
        (Some(flavor), _) => flavor,
        (None, Target::Local) => OsFlavor::host(),
        (None, Target::Remote(_)) => OsFlavor::Unix,
    };
    Ok(machine_for(&target, flavor))
}
