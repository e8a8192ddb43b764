use super::{capture, compile, strip_ansi};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    Running,
    NotRunning,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    Valid,
    Invalid,
    #[default]
    Unknown,
}

/// Parsed `golemsp status`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusRecord {
    pub service_status: ServiceStatus,
    pub version: Option<String>,
    pub commit: Option<String>,
    pub build_date: Option<String>,
    pub build_number: Option<String>,
    pub node_name: Option<String>,
    pub subnet: Option<String>,
    pub vm_status: VmStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earnings: Option<Earnings>,
}

/// Earnings block; unmatched fields are left out of the JSON entirely
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Earnings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_total: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_onchain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_polygon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<String>,
}

impl Earnings {
    fn is_empty(&self) -> bool {
        *self == Earnings::default()
    }
}

#[derive(Debug, Clone, Copy)]
enum StatusField {
    Service,
    Version,
    Commit,
    Date,
    Build,
    NodeName,
    Subnet,
    Vm,
}

#[derive(Debug, Clone, Copy)]
enum EarningsField {
    Network,
    AmountTotal,
    AmountOnchain,
    AmountPolygon,
    Pending,
    Issued,
}

const STATUS_PATTERNS: &[(StatusField, &str)] = &[
    (StatusField::Service, r"Service\s+(is not running|is running)"),
    (StatusField::Version, r"Version\s+([\d\.]+)"),
    (StatusField::Commit, r"Commit\s+([a-f0-9]+)"),
    (StatusField::Date, r"Date\s+([\d\-]+)"),
    (StatusField::Build, r"Build\s+(\d+)"),
    (StatusField::NodeName, r"Node Name\s+(.+)"),
    (StatusField::Subnet, r"Subnet\s+(\w+)"),
    (StatusField::Vm, r"VM\s+(valid|invalid)"),
];

const EARNINGS_PATTERNS: &[(EarningsField, &str)] = &[
    (EarningsField::Network, r"network\s+([a-zA-Z0-9]+)"),
    (EarningsField::AmountTotal, r"amount \(total\)\s+([\d\.]+ GLM)"),
    (EarningsField::AmountOnchain, r"\(on-chain\)\s+([\d\.]+ GLM)"),
    (EarningsField::AmountPolygon, r"\(polygon\)\s+([\d\.]+ GLM)"),
    (EarningsField::Pending, r"pending\s+([\d\.]+ GLM \(\d+\))"),
    (EarningsField::Issued, r"issued\s+([\d\.]+ GLM \(\d+\))"),
];

fn status_rules() -> &'static [(StatusField, Regex)] {
    static RULES: OnceLock<Vec<(StatusField, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| compile(STATUS_PATTERNS))
}

fn earnings_rules() -> &'static [(EarningsField, Regex)] {
    static RULES: OnceLock<Vec<(EarningsField, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| compile(EARNINGS_PATTERNS))
}

/// Parses `golemsp status` output. Never fails: unmatched fields stay empty.
pub fn parse_status(output: &str) -> StatusRecord {
    let text = strip_ansi(output);
    let mut record = StatusRecord::default();

    for (field, re) in status_rules() {
        let value = capture(re, &text);
        match field {
            StatusField::Service => {
                record.service_status = match value.as_deref() {
                    Some("is running") => ServiceStatus::Running,
                    Some("is not running") => ServiceStatus::NotRunning,
                    _ => ServiceStatus::Unknown,
                }
            }
            StatusField::Version => record.version = value,
            StatusField::Commit => record.commit = value,
            StatusField::Date => record.build_date = value,
            StatusField::Build => record.build_number = value,
            StatusField::NodeName => record.node_name = value,
            StatusField::Subnet => record.subnet = value,
            StatusField::Vm => {
                record.vm_status = match value.as_deref() {
                    Some("valid") => VmStatus::Valid,
                    Some("invalid") => VmStatus::Invalid,
                    _ => VmStatus::Unknown,
                }
            }
        }
    }

    let mut earnings = Earnings::default();
    for (field, re) in earnings_rules() {
        let value = capture(re, &text);
        match field {
            EarningsField::Network => earnings.network = value,
            EarningsField::AmountTotal => earnings.amount_total = value,
            EarningsField::AmountOnchain => earnings.amount_onchain = value,
            EarningsField::AmountPolygon => earnings.amount_polygon = value,
            EarningsField::Pending => earnings.pending = value,
            EarningsField::Issued => earnings.issued = value,
        }
    }
    if !earnings.is_empty() {
        record.earnings = Some(earnings);
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING: &str = "\
Status
  Service    is running
  Version    0.15.2
  Commit     8b1f5d4c
  Date       2024-06-11
  Build      402

  Node Name  pure-alley
  Subnet     public
  VM         valid

  network          mainnet
  amount (total)   1.25 GLM
      (on-chain)   0.25 GLM
      (polygon)    1.00 GLM

  pending          0.10 GLM (2)
  issued           0.05 GLM (1)
";

    #[test]
    fn parses_full_status() {
        let record = parse_status(RUNNING);
        assert_eq!(record.service_status, ServiceStatus::Running);
        assert_eq!(record.version.as_deref(), Some("0.15.2"));
        assert_eq!(record.commit.as_deref(), Some("8b1f5d4c"));
        assert_eq!(record.build_date.as_deref(), Some("2024-06-11"));
        assert_eq!(record.build_number.as_deref(), Some("402"));
        assert_eq!(record.node_name.as_deref(), Some("pure-alley"));
        assert_eq!(record.subnet.as_deref(), Some("public"));
        assert_eq!(record.vm_status, VmStatus::Valid);

        let earnings = record.earnings.expect("earnings block");
        assert_eq!(earnings.network.as_deref(), Some("mainnet"));
        assert_eq!(earnings.amount_total.as_deref(), Some("1.25 GLM"));
        assert_eq!(earnings.amount_onchain.as_deref(), Some("0.25 GLM"));
        assert_eq!(earnings.amount_polygon.as_deref(), Some("1.00 GLM"));
        assert_eq!(earnings.pending.as_deref(), Some("0.10 GLM (2)"));
        assert_eq!(earnings.issued.as_deref(), Some("0.05 GLM (1)"));
    }

    #[test]
    fn unrecognised_text_yields_empty_record() {
        let record = parse_status("nothing to see here\n\n");
        assert_eq!(record, StatusRecord::default());
        assert_eq!(record.service_status, ServiceStatus::Unknown);
        assert_eq!(record.vm_status, VmStatus::Unknown);
        assert!(record.earnings.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("earnings").is_none());
        assert!(json["version"].is_null());
        assert_eq!(json["service_status"], "unknown");
    }

    #[test]
    fn not_running_service() {
        let record = parse_status("Service    is not running\nVM         invalid\n");
        assert_eq!(record.service_status, ServiceStatus::NotRunning);
        assert_eq!(record.vm_status, VmStatus::Invalid);
        assert_eq!(serde_json::to_value(record.service_status).unwrap(), "not-running");
    }

    #[test]
    fn escape_sequences_do_not_change_the_result() {
        let coloured = RUNNING
            .replace("is running", "\x1b[32mis running\x1b[0m")
            .replace("Version", "\x1b[1mVersion\x1b[0m")
            .replace("valid", "\x1b[32;1mvalid\x1b[0m")
            .replace("1.25 GLM", "\x1b[33m1.25 GLM\x1b[0m");
        assert_ne!(coloured, RUNNING);
        assert_eq!(parse_status(&coloured), parse_status(RUNNING));
    }

    #[test]
    fn partial_earnings_omit_missing_fields() {
        let record = parse_status("network  holesky\n");
        let earnings = record.earnings.clone().expect("network alone is enough");
        assert_eq!(earnings.network.as_deref(), Some("holesky"));

        let json = serde_json::to_value(&record).unwrap();
        let block = json["earnings"].as_object().unwrap();
        assert_eq!(block.len(), 1);
        assert!(!block.contains_key("pending"));
    }
}
