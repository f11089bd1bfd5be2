//! Environment diagnostics: which adapter binaries are reachable on `PATH`,
//! what runtime scanforge is executing under, and OS/arch. Backs the CLI's
//! `doctor` subcommand and the path an adapter's own `ToolMissing` check
//! could reuse before attempting `execute`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use sf_adapters::default_registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorOutput {
    pub schema_version: String,
    pub emitted_at: DateTime<Utc>,
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

/// Binary name each built-in adapter shells out to, kept here rather than on
/// `CapabilityDescriptor` since it's a `doctor`-only concern — adapters
/// resolve their own binary internally via `sf_adapters::common::find_binary`.
const ADAPTER_BINARIES: &[(&str, &str)] = &[
    ("semgrep", "semgrep"),
    ("trivy", "trivy"),
    ("osv_scanner", "osv-scanner"),
    ("zap_baseline", "zap-baseline.py"),
    ("gitleaks", "gitleaks"),
];

pub struct DoctorCommand;

impl DoctorCommand {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every check. `strict` treats warnings as failures for the
    /// returned `ok` flag (the CLI maps that to a non-zero exit code).
    #[must_use]
    pub fn run(&self, strict: bool) -> DoctorOutput {
        let mut checks: Vec<DoctorCheck> = ADAPTER_BINARIES
            .iter()
            .map(|(tool_id, binary)| Self::check_adapter_binary(tool_id, binary))
            .collect();

        checks.push(Self::check_registry());
        checks.push(Self::check_runtime());
        checks.push(Self::check_platform());

        checks.sort_by(|a, b| a.name.cmp(&b.name));

        let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
        let has_warn = checks.iter().any(|c| c.status == CheckStatus::Warn);
        let ok = !has_fail && (!strict || !has_warn);

        DoctorOutput {
            schema_version: "1".to_string(),
            emitted_at: Utc::now(),
            ok,
            checks,
        }
    }

    fn check_adapter_binary(tool_id: &str, binary: &str) -> DoctorCheck {
        match which::which(binary) {
            Ok(path) => DoctorCheck {
                name: format!("adapter_binary_{tool_id}"),
                status: CheckStatus::Pass,
                details: format!("found {binary} at {}", path.display()),
            },
            Err(_) => DoctorCheck {
                name: format!("adapter_binary_{tool_id}"),
                status: CheckStatus::Warn,
                details: format!(
                    "{binary} not found on PATH; workflows selecting tool_id \"{tool_id}\" will fail at the initialize node"
                ),
            },
        }
    }

    fn check_registry() -> DoctorCheck {
        let registry = default_registry();
        let count = registry.list().len();
        DoctorCheck {
            name: "default_registry".to_string(),
            status: CheckStatus::Pass,
            details: format!("{count} built-in adapter(s) registered"),
        }
    }

    fn check_runtime() -> DoctorCheck {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => DoctorCheck {
                name: "tokio_runtime".to_string(),
                status: CheckStatus::Pass,
                details: format!("{:?}", handle.runtime_flavor()),
            },
            Err(_) => DoctorCheck {
                name: "tokio_runtime".to_string(),
                status: CheckStatus::Warn,
                details: "no tokio runtime on the calling thread".to_string(),
            },
        }
    }

    fn check_platform() -> DoctorCheck {
        let mut system = System::new();
        system.refresh_cpu_all();
        let cpus = system.cpus().len();
        DoctorCheck {
            name: "platform".to_string(),
            status: CheckStatus::Pass,
            details: format!(
                "os={} arch={} logical_cpus={}",
                std::env::consts::OS,
                std::env::consts::ARCH,
                cpus
            ),
        }
    }
}

impl Default for DoctorCommand {
    fn default() -> Self {
        Self::new()
    }
}
