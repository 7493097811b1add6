//! Persisted CLI configuration
//!
//! A flat YAML key/value file. Resolution order:
//! `$XDG_CONFIG_HOME/rbzk/config.yml`, then
//! `$HOME/.config/rbzk/config.yml`, then `./.rbzk.yml`. The first
//! existing file wins; writes go to the first resolvable location.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub ip: String,
    pub port: u16,
    /// Per-operation timeout in seconds
    pub timeout: u64,
    pub password: u32,
    pub verbose: bool,
    pub force_udp: bool,
    pub no_ping: bool,
    pub encoding: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            ip: "192.168.1.201".to_string(),
            port: 4370,
            timeout: 60,
            password: 0,
            verbose: false,
            force_udp: false,
            no_ping: false,
            encoding: "utf-8".to_string(),
        }
    }
}

/// Candidate config locations, most specific first.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            paths.push(Path::new(&xdg).join("rbzk").join("config.yml"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            paths.push(Path::new(&home).join(".config").join("rbzk").join("config.yml"));
        }
    }
    paths.push(PathBuf::from(".rbzk.yml"));

    paths
}

impl CliConfig {
    /// Load the first config file that exists; defaults otherwise.
    /// Returns the file the config came from, if any.
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        for path in candidate_paths() {
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Where a fresh config should be written.
    pub fn default_path() -> PathBuf {
        candidate_paths().into_iter().next().unwrap_or_else(|| PathBuf::from(".rbzk.yml"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Set one key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "ip" => self.ip = value.to_string(),
            "port" => self.port = value.parse().context("port must be a number")?,
            "timeout" => self.timeout = value.parse().context("timeout must be a number")?,
            "password" => self.password = value.parse().context("password must be a number")?,
            "verbose" => self.verbose = parse_bool(value)?,
            "force_udp" => self.force_udp = parse_bool(value)?,
            "no_ping" => self.no_ping = parse_bool(value)?,
            "encoding" => self.encoding = value.to_string(),
            other => bail!(
                "unknown key '{other}' (known: ip, port, timeout, password, verbose, force_udp, no_ping, encoding)"
            ),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.port, 4370);
        assert_eq!(config.timeout, 60);
        assert_eq!(config.encoding, "utf-8");
        assert!(!config.force_udp);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rbzk").join("config.yml");

        let mut config = CliConfig::default();
        config.ip = "10.1.2.3".to_string();
        config.password = 4242;
        config.save(&path).unwrap();

        let back = CliConfig::load_from(&path).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "ip: 172.16.0.9\nport: 14370\n").unwrap();

        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.ip, "172.16.0.9");
        assert_eq!(config.port, 14370);
        assert_eq!(config.timeout, 60); // default
    }

    #[test]
    fn test_set_keys() {
        let mut config = CliConfig::default();
        config.set("ip", "10.0.0.5").unwrap();
        config.set("port", "4371").unwrap();
        config.set("force_udp", "yes").unwrap();
        config.set("verbose", "off").unwrap();

        assert_eq!(config.ip, "10.0.0.5");
        assert_eq!(config.port, 4371);
        assert!(config.force_udp);
        assert!(!config.verbose);

        assert!(config.set("port", "not-a-number").is_err());
        assert!(config.set("nope", "1").is_err());
    }
}
