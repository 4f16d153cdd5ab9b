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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[sqlite]
path = /var/lib/marketscan/bars.db

[scan]
lookback = 60
concurrency = 8

[bollinger]
multiplier = 2.0
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/marketscan/bars.db".to_string())
        );
        assert_eq!(adapter.get_int("scan", "lookback", 0), 60);
        assert_eq!(adapter.get_double("bollinger", "multiplier", 0.0), 2.0);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[scan]\nlookback = 60\n").unwrap();
        assert_eq!(adapter.get_string("scan", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_default_for_missing_or_bad() {
        let adapter = FileConfigAdapter::from_string("[scan]\nlookback = abc\n").unwrap();
        assert_eq!(adapter.get_int("scan", "lookback", 42), 42);
        assert_eq!(adapter.get_int("scan", "missing", 7), 7);
    }

    #[test]
    fn get_double_returns_value_and_default() {
        let adapter =
            FileConfigAdapter::from_string("[volume]\nfactor = 1.5\nbad = x\n").unwrap();
        assert_eq!(adapter.get_double("volume", "factor", 0.0), 1.5);
        assert_eq!(adapter.get_double("volume", "bad", 9.5), 9.5);
    }

    #[test]
    fn get_bool_parses_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[scan]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("scan", "a", false));
        assert!(adapter.get_bool("scan", "b", false));
        assert!(adapter.get_bool("scan", "c", false));
        assert!(!adapter.get_bool("scan", "d", true));
        assert!(!adapter.get_bool("scan", "e", true));
        assert!(!adapter.get_bool("scan", "f", true));
        assert!(adapter.get_bool("scan", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[csv]\npath = /data/bars\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("csv", "path"),
            Some("/data/bars".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
