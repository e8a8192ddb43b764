use super::{strip_ansi, ParseError};
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::OnceLock;

/// Parsed `golemsp settings show`
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SettingsRecord {
    pub raw_output: String,
    pub name: Option<String>,
    pub cpu_cores: Option<String>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    pub account: Option<String>,
    pub presets: Presets,
}

/// Pricing for one preset, categories kept in text order
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    prices: Vec<(String, f64)>,
}

impl Preset {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), prices: Vec::new() }
    }

    pub fn price(&self, category: &str) -> Option<f64> {
        self.prices.iter().find(|(key, _)| key == category).map(|(_, value)| *value)
    }

    pub fn prices(&self) -> impl Iterator<Item = (&str, f64)> {
        self.prices.iter().map(|(key, value)| (key.as_str(), *value))
    }

    fn set_price(&mut self, category: String, value: f64) {
        match self.prices.iter_mut().find(|(key, _)| *key == category) {
            Some(slot) => slot.1 = value,
            None => self.prices.push((category, value)),
        }
    }
}

/// Presets in the order their headers appeared; serialized as a JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presets(Vec<Preset>);

impl Presets {
    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Starts (or restarts) a preset and returns its index. A repeated header
    /// clears the earlier prices but keeps the original position.
    fn begin(&mut self, name: &str) -> usize {
        match self.0.iter().position(|p| p.name == name) {
            Some(index) => {
                self.0[index].prices.clear();
                index
            }
            None => {
                self.0.push(Preset::new(name));
                self.0.len() - 1
            }
        }
    }
}

impl Serialize for Preset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.prices.len()))?;
        for (key, value) in self.prices() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

impl Serialize for Presets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for preset in &self.0 {
            map.serialize_entry(&preset.name, preset)?;
        }
        map.end()
    }
}

#[derive(Debug, PartialEq)]
enum SettingsLine<'a> {
    Cores(&'a str),
    Memory(&'a str),
    Disk(&'a str),
    PresetHeader(Option<&'a str>),
    Pricing(&'a str),
    Account(&'a str),
    Name(&'a str),
    Other,
}

fn quoted_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("preset pattern must compile"))
}

fn after_colon(line: &str) -> &str {
    line.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or("")
}

/// Ordered rule chain: the first rule that matches a line wins.
fn classify(line: &str, preset_active: bool) -> SettingsLine<'_> {
    if line.starts_with("cores:") {
        SettingsLine::Cores(after_colon(line))
    } else if line.starts_with("memory:") {
        SettingsLine::Memory(after_colon(line))
    } else if line.starts_with("disk:") {
        SettingsLine::Disk(after_colon(line))
    } else if line.contains("Pricing for preset") {
        let name = quoted_name()
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        SettingsLine::PresetHeader(name)
    } else if line.contains("GLM") && preset_active {
        SettingsLine::Pricing(line)
    } else if line.contains("account:") || line.contains("wallet:") {
        SettingsLine::Account(after_colon(line))
    } else if line.to_lowercase().starts_with("name:") {
        SettingsLine::Name(after_colon(line))
    } else {
        SettingsLine::Other
    }
}

/// `"0.025 GLM per cpu hour"` → `("per_cpu_hour", 0.025)`
fn parse_pricing(line: &str) -> Result<(String, f64), ParseError> {
    let (price, description) = line.split_once("GLM").unwrap_or((line, ""));
    let price = price.trim();
    let value = price.parse::<f64>().map_err(|_| ParseError::InvalidPrice {
        line: line.to_string(),
        value: price.to_string(),
    })?;
    let key = description.trim().to_lowercase().replace(' ', "_");
    Ok((key, value))
}

/// Parses `golemsp settings show` output.
///
/// Fails only on a pricing line whose amount is not a number.
pub fn parse_settings(output: &str) -> Result<SettingsRecord, ParseError> {
    let text = strip_ansi(output);
    let mut record = SettingsRecord {
        raw_output: output.to_string(),
        ..SettingsRecord::default()
    };
    let mut current: Option<usize> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match classify(line, current.is_some()) {
            SettingsLine::Cores(value) => record.cpu_cores = Some(value.to_string()),
            SettingsLine::Memory(value) => record.memory = Some(value.to_string()),
            SettingsLine::Disk(value) => record.disk = Some(value.to_string()),
            SettingsLine::PresetHeader(Some(name)) => current = Some(record.presets.begin(name)),
            SettingsLine::PresetHeader(None) => {}
            SettingsLine::Pricing(line) => {
                let (key, value) = parse_pricing(line)?;
                if let Some(index) = current {
                    record.presets.0[index].set_price(key, value);
                }
            }
            SettingsLine::Account(value) => record.account = Some(value.to_string()),
            SettingsLine::Name(value) => record.name = Some(value.to_string()),
            SettingsLine::Other => {}
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"
Shared resource setup:
        cores:  7
        memory: 12.5 GiB
        disk:   100 GiB

Pricing for preset "vm":
        0.025 GLM per cpu hour
        0.005 GLM per hour
        0 GLM for start

Pricing for preset "wasmtime":
        0.1 GLM per cpu hour
        0.02 GLM per hour
        0 GLM for start

Wallet:
        account: 0x63fc2ad3d021a4af7e1a71b9a3e1d1c2a7b2d1ff
"#;

    #[test]
    fn parses_resources_and_presets() {
        let record = parse_settings(SETTINGS).unwrap();
        assert_eq!(record.cpu_cores.as_deref(), Some("7"));
        assert_eq!(record.memory.as_deref(), Some("12.5 GiB"));
        assert_eq!(record.disk.as_deref(), Some("100 GiB"));
        assert_eq!(
            record.account.as_deref(),
            Some("0x63fc2ad3d021a4af7e1a71b9a3e1d1c2a7b2d1ff")
        );
        assert_eq!(record.raw_output, SETTINGS);

        assert_eq!(record.presets.names().collect::<Vec<_>>(), vec!["vm", "wasmtime"]);
        let vm = record.presets.get("vm").unwrap();
        assert_eq!(vm.price("per_cpu_hour"), Some(0.025));
        assert_eq!(vm.price("per_hour"), Some(0.005));
        assert_eq!(vm.price("for_start"), Some(0.0));
        assert_eq!(record.presets.get("wasmtime").unwrap().price("per_cpu_hour"), Some(0.1));
    }

    #[test]
    fn pricing_line_attributed_to_latest_header() {
        let record = parse_settings("Pricing for preset \"preset-a\":\n0.025 GLM per cpu hour\n").unwrap();
        assert_eq!(record.presets.get("preset-a").unwrap().price("per_cpu_hour"), Some(0.025));
    }

    #[test]
    fn pricing_before_any_header_is_dropped() {
        let record = parse_settings("0.5 GLM per cpu hour\nPricing for preset \"late\":\n").unwrap();
        assert_eq!(record.presets.len(), 1);
        assert!(record.presets.get("late").unwrap().prices().next().is_none());
    }

    #[test]
    fn invalid_price_fails_the_parse() {
        let err = parse_settings("Pricing for preset \"vm\":\nfree GLM per cpu hour\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidPrice {
                line: "free GLM per cpu hour".to_string(),
                value: "free".to_string(),
            }
        );
    }

    #[test]
    fn escape_sequences_do_not_change_settings() {
        let coloured = SETTINGS
            .replace("Pricing for preset \"vm\"", "\x1b[1mPricing for preset \x1b[33m\"vm\"\x1b[0m")
            .replace("0.025 GLM per cpu hour", "\x1b[32m0.025\x1b[0m GLM per cpu hour")
            .replace("cores:  7", "\x1b[1mcores:\x1b[0m  7")
            .replace("account: 0x63fc", "account: \x1b[36m0x63fc");
        assert_ne!(coloured, SETTINGS);

        let plain = parse_settings(SETTINGS).unwrap();
        let parsed = parse_settings(&coloured).unwrap();
        assert_eq!(parsed.presets, plain.presets);
        assert_eq!(parsed.cpu_cores, plain.cpu_cores);
        assert_eq!(parsed.memory, plain.memory);
        assert_eq!(parsed.account, plain.account);
        assert_eq!(parsed.presets.get("vm").unwrap().price("per_cpu_hour"), Some(0.025));
    }

    #[test]
    fn rule_order_resource_beats_pricing() {
        // `cores:` wins even though the line mentions GLM
        assert_eq!(classify("cores: 4 GLM", true), SettingsLine::Cores("4 GLM"));
        assert_eq!(classify("0.1 GLM per hour", false), SettingsLine::Other);
        assert_eq!(classify("wallet: 0xabc", false), SettingsLine::Account("0xabc"));
        assert_eq!(classify("Name: provider-1", false), SettingsLine::Name("provider-1"));
    }

    #[test]
    fn presets_serialize_in_text_order() {
        let record = parse_settings(SETTINGS).unwrap();
        let json = serde_json::to_string(&record.presets).unwrap();
        assert!(json.find("\"vm\"").unwrap() < json.find("\"wasmtime\"").unwrap());
        assert!(json.contains("\"per_cpu_hour\":0.025"));
    }

    #[test]
    fn repeated_header_resets_prices_in_place() {
        let text = "Pricing for preset \"a\":\n1 GLM per hour\nPricing for preset \"b\":\nPricing for preset \"a\":\n2 GLM for start\n";
        let record = parse_settings(text).unwrap();
        assert_eq!(record.presets.names().collect::<Vec<_>>(), vec!["a", "b"]);
        let a = record.presets.get("a").unwrap();
        assert_eq!(a.price("per_hour"), None);
        assert_eq!(a.price("for_start"), Some(2.0));
    }
}
