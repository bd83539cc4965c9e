//! Engine configuration: memory region sizes and collector tuning.
//!
//! Files may be TOML, YAML or JSON (picked by extension) and only need to name
//! the keys they change. `SMVM_*` environment variables win over the file.

use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_OPERAND_STACK_WORDS: usize = 1 << 20;
pub const DEFAULT_CALL_STACK_WORDS: usize = 1 << 20;
pub const DEFAULT_GC_THRESHOLD: usize = 4096;
pub const DEFAULT_ENTRY_ARGS: usize = 2;

/// Smallest call stack that can hold one frame record.
const MIN_CALL_STACK_WORDS: usize = 4;

pub const ENV_OPERAND_STACK: &str = "SMVM_OPERAND_STACK";
pub const ENV_CALL_STACK: &str = "SMVM_CALL_STACK";
pub const ENV_GC_THRESHOLD: &str = "SMVM_GC_THRESHOLD";
pub const ENV_GC_STRESS: &str = "SMVM_GC_STRESS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmConfig {
    /// Words in the block shared by the operand stack and the global area.
    pub operand_stack_words: usize,
    pub call_stack_words: usize,
    /// Live objects that trigger the first collection.
    pub gc_threshold: usize,
    pub gc_stress: bool,
    /// Boxed zeros pushed below the entry frame (`main(argc, argv)`).
    pub entry_args: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            operand_stack_words: DEFAULT_OPERAND_STACK_WORDS,
            call_stack_words: DEFAULT_CALL_STACK_WORDS,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_stress: false,
            entry_args: DEFAULT_ENTRY_ARGS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawVmConfig {
    #[serde(default)]
    operand_stack_words: Option<usize>,
    #[serde(default)]
    call_stack_words: Option<usize>,
    #[serde(default)]
    gc_threshold: Option<usize>,
    #[serde(default)]
    gc_stress: Option<bool>,
    #[serde(default)]
    entry_args: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            other => bail!("unsupported config format '{other}' for {}", path.display()),
        }
    }
}

impl VmConfig {
    /// Defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        debug!(target: "smvm::config", ?config, "resolved vm config");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)?;
        let text =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text, format).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self> {
        let raw: RawVmConfig = match format {
            ConfigFormat::Toml => toml::from_str(text)?,
            ConfigFormat::Yaml if text.trim().is_empty() => RawVmConfig::default(),
            ConfigFormat::Yaml => serde_yaml::from_str(text)?,
            ConfigFormat::Json => serde_json::from_str(text)?,
        };
        let mut config = Self::default();
        config.merge(raw);
        Ok(config)
    }

    fn merge(&mut self, raw: RawVmConfig) {
        if let Some(v) = raw.operand_stack_words {
            self.operand_stack_words = v;
        }
        if let Some(v) = raw.call_stack_words {
            self.call_stack_words = v;
        }
        if let Some(v) = raw.gc_threshold {
            self.gc_threshold = v;
        }
        if let Some(v) = raw.gc_stress {
            self.gc_stress = v;
        }
        if let Some(v) = raw.entry_args {
            self.entry_args = v;
        }
    }

    /// Apply `SMVM_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let size = |key: &str| -> Result<Option<usize>> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<usize>()
                    .map(Some)
                    .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
                None => Ok(None),
            }
        };
        if let Some(v) = size(ENV_OPERAND_STACK)? {
            self.operand_stack_words = v;
        }
        if let Some(v) = size(ENV_CALL_STACK)? {
            self.call_stack_words = v;
        }
        if let Some(v) = size(ENV_GC_THRESHOLD)? {
            self.gc_threshold = v;
        }
        if let Some(raw) = lookup(ENV_GC_STRESS) {
            self.gc_stress = parse_flag(&raw).with_context(|| format!("invalid {ENV_GC_STRESS}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.operand_stack_words > self.entry_args + 1,
            "operand_stack_words ({}) cannot hold {} entry arguments and the guard slot",
            self.operand_stack_words,
            self.entry_args
        );
        ensure!(
            self.call_stack_words >= MIN_CALL_STACK_WORDS,
            "call_stack_words must be at least {MIN_CALL_STACK_WORDS}, got {}",
            self.call_stack_words
        );
        ensure!(self.gc_threshold > 0, "gc_threshold must be positive");
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean flag, got '{other}'"),
    }
}
