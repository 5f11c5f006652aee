//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn section_keys(&self, section: &str) -> Vec<String> {
        // configparser folds section names and keys to lower case
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[engine]
symbols = XAUUSD, EURUSD
interval_seconds = 30

[model]
path = models/softmax.json
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("engine", "symbols"),
            Some("XAUUSD, EURUSD".to_string())
        );
        assert_eq!(
            adapter.get_string("model", "path"),
            Some("models/softmax.json".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[engine]\nsymbols = XAUUSD\n").unwrap();
        assert_eq!(adapter.get_string("engine", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[engine]\nmax_daily_trades = 5\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("engine", "max_daily_trades", 0), 5);
        assert_eq!(adapter.get_int("engine", "missing", 42), 42);
        assert_eq!(adapter.get_int("engine", "bad", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[risk]\nrisk_per_trade = 0.015\nmin_free_margin = lots\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("risk", "risk_per_trade", 0.0), 0.015);
        assert_eq!(adapter.get_double("risk", "missing", 99.9), 99.9);
        assert_eq!(adapter.get_double("risk", "min_free_margin", 99.9), 99.9);
    }

    #[test]
    fn get_bool_values() {
        let adapter =
            FileConfigAdapter::from_string("[paper]\na = true\nb = no\nc = 1\n").unwrap();
        assert!(adapter.get_bool("paper", "a", false));
        assert!(!adapter.get_bool("paper", "b", true));
        assert!(adapter.get_bool("paper", "c", false));
        assert!(adapter.get_bool("paper", "missing", true));
    }

    #[test]
    fn section_keys_lists_sorted_lowercase_keys() {
        let adapter = FileConfigAdapter::from_string(
            "[atr_multipliers]\nXAUUSD = 2.0\nBTCUSD = 3.0\nEURUSD = 1.5\n",
        )
        .unwrap();
        assert_eq!(
            adapter.section_keys("atr_multipliers"),
            vec!["btcusd", "eurusd", "xauusd"]
        );
        assert!(adapter.section_keys("missing").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\npath = /var/lib/fusetrader/bars\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/var/lib/fusetrader/bars".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
