use serde::{Deserialize, Serialize};

/// Partial update for `golemsp settings set`; only present fields become flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_per_hour: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_per_hour: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl SettingsUpdate {
    /// Field names accepted in an update body
    pub const AVAILABLE: [&'static str; 7] = [
        "cores",
        "memory",
        "disk",
        "starting_fee",
        "env_per_hour",
        "cpu_per_hour",
        "account",
    ];

    /// CLI flags in fixed order: cores, memory, disk, starting fee, env/h, cpu/h, account.
    pub fn to_flags(&self) -> Vec<String> {
        let cores = self.cores.map(|c| c.to_string());
        let fields = [
            ("--cores", cores.as_deref()),
            ("--memory", self.memory.as_deref()),
            ("--disk", self.disk.as_deref()),
            ("--starting-fee", self.starting_fee.as_deref()),
            ("--env-per-hour", self.env_per_hour.as_deref()),
            ("--cpu-per-hour", self.cpu_per_hour.as_deref()),
            ("--account", self.account.as_deref()),
        ];

        fields
            .into_iter()
            .filter_map(|(flag, value)| value.map(|v| [flag.to_string(), v.to_string()]))
            .flatten()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_field_single_flag() {
        let update: SettingsUpdate = serde_json::from_str(r#"{"cores": 4}"#).unwrap();
        assert_eq!(update.to_flags(), vec!["--cores", "4"]);
    }

    #[test]
    fn test_flag_order_is_fixed() {
        let update = SettingsUpdate {
            account: Some("0xabc".into()),
            cpu_per_hour: Some("0.1".into()),
            memory: Some("8gib".into()),
            cores: Some(2),
            ..Default::default()
        };
        assert_eq!(
            update.to_flags(),
            vec!["--cores", "2", "--memory", "8gib", "--cpu-per-hour", "0.1", "--account", "0xabc"]
        );
    }

    #[test]
    fn test_empty_update() {
        let update: SettingsUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
        assert!(update.to_flags().is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let update: SettingsUpdate = serde_json::from_str(r#"{"gpu": 1}"#).unwrap();
        assert!(update.is_empty());

        let update: SettingsUpdate = serde_json::from_str(r#"{"gpu": 1, "disk": "50gib"}"#).unwrap();
        assert_eq!(update.to_flags(), vec!["--disk", "50gib"]);
    }
}
