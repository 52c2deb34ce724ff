//! Stream configuration: a small INI-style file format and the typed media
//! stream settings read out of its `[media]` section.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Parsed configuration text: `key = value` lines grouped by `[section]`
/// headers. Lines before any header land in the sectionless globals; `#`
/// starts a comment line.
#[derive(Debug, Default)]
pub struct Config {
    sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// Parses configuration text.
    pub fn parse(content: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current = line[1..line.len() - 1].to_string();
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();
                sections.entry(current.clone()).or_default().insert(key, value);
            }
        }

        Config { sections }
    }

    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Error reading file {}: {e}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Gets a section value, falling back to the sectionless globals.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .or_else(|| self.sections.get("").and_then(|sec| sec.get(key)))
            .map(|s| s.as_str())
    }

    /// `get`, parsed as an integer.
    #[must_use]
    pub fn get_u64(&self, section: &str, key: &str) -> Option<u64> {
        self.get(section, key).and_then(|s| s.parse().ok())
    }
}

/// Tunable parameters of one media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaStreamConfig {
    /// Per-datagram payload budget: MTU minus RTP header and auth overhead.
    pub payload_size: usize,
    /// How long a partially received frame may sit before a late packet drops it.
    pub pkt_max_delay_ms: u64,
    /// Minimum wall-clock spacing between garbage collection sweeps.
    pub gc_interval_ms: u64,
    /// Age at which a stalled in-progress frame is reaped.
    pub lost_frame_timeout_ms: u64,
}

impl Default for MediaStreamConfig {
    fn default() -> Self {
        Self {
            payload_size: 1200,
            pkt_max_delay_ms: 100,
            gc_interval_ms: 100,
            lost_frame_timeout_ms: 500,
        }
    }
}

impl MediaStreamConfig {
    /// Reads the `[media]` section of a parsed config, falling back to
    /// defaults.
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            payload_size: cfg
                .get_u64("media", "payload_size")
                .map(|v| v as usize)
                .unwrap_or(d.payload_size),
            pkt_max_delay_ms: cfg
                .get_u64("media", "pkt_max_delay_ms")
                .unwrap_or(d.pkt_max_delay_ms),
            gc_interval_ms: cfg
                .get_u64("media", "gc_interval_ms")
                .unwrap_or(d.gc_interval_ms),
            lost_frame_timeout_ms: cfg
                .get_u64("media", "lost_frame_timeout_ms")
                .unwrap_or(d.lost_frame_timeout_ms),
        }
    }

    /// Loads the `[media]` section from a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, String> {
        Ok(Self::from_config(&Config::load(path)?))
    }
}
