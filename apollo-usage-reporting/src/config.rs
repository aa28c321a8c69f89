//! Configuration for usage reporting.
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::Error;
use crate::proto::ReportHeader;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The graph reports are sent for, as `graph-id@variant`.
    /// Defaults to the `APOLLO_GRAPH_REF` environment variable.
    pub graph_ref: Option<String>,

    /// Identifier of the executable schema the operations ran against.
    pub schema_id: String,

    /// Version of the service sending reports.
    pub service_version: Option<String>,

    /// Overrides the host name reported in the report header.
    pub hostname: Option<String>,
}

fn apollo_graph_reference() -> Option<String> {
    std::env::var("APOLLO_GRAPH_REF").ok()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph_ref: apollo_graph_reference(),
            schema_id: "<no_schema_id>".to_string(),
            service_version: None,
            hostname: None,
        }
    }
}

impl Config {
    /// The header metadata every report built with this configuration carries.
    pub fn report_header(&self) -> Result<ReportHeader, Error> {
        let hostname = match &self.hostname {
            Some(hostname) => hostname.clone(),
            None => sys_info::hostname()?,
        };
        Ok(ReportHeader {
            graph_ref: self.graph_ref.clone().unwrap_or_default(),
            hostname,
            agent_version: format!(
                "{}@{}",
                std::env!("CARGO_PKG_NAME"),
                std::env!("CARGO_PKG_VERSION")
            ),
            service_version: self.service_version.clone().unwrap_or_default(),
            runtime_version: "rust".to_string(),
            uname: get_uname()?,
            executable_schema_id: self.schema_id.clone(),
        })
    }
}

#[cfg(unix)]
pub(crate) fn get_uname() -> Result<String, std::io::Error> {
    let u = uname::uname()?;
    Ok(format!(
        "{}, {}, {}, {}, {}",
        u.sysname, u.nodename, u.release, u.version, u.machine
    ))
}

#[cfg(not(unix))]
pub(crate) fn get_uname() -> Result<String, std::io::Error> {
    // No uname outside unix; sys-info covers the parts it can
    let sysname = sys_info::os_type().unwrap_or_else(|_| "Windows".to_owned());
    let nodename = sys_info::hostname().unwrap_or_else(|_| "unknown".to_owned());
    let release = sys_info::os_release().unwrap_or_else(|_| "unknown".to_owned());
    let version = "unknown";
    let machine = std::env::consts::ARCH;
    Ok(format!(
        "{}, {}, {}, {}, {}",
        sysname, nodename, release, version, machine
    ))
}
