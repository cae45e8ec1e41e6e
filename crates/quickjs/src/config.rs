use crate::error::{Error, Result};

pub const ENV_MEMORY_LIMIT: &str = "SCRIPTCORE_MEMORY_LIMIT";
pub const ENV_MAX_STACK_SIZE: &str = "SCRIPTCORE_MAX_STACK_SIZE";
pub const ENV_GC_THRESHOLD: &str = "SCRIPTCORE_GC_THRESHOLD";

/// Limits applied to every isolate created after init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickJsConfig {
    /// Heap limit in bytes. Zero disables the limit.
    pub memory_limit: usize,
    /// Native stack budget in bytes. Zero disables the check.
    pub max_stack_size: usize,
    /// Allocation threshold that triggers a collection. Zero keeps the
    /// engine default.
    pub gc_threshold: usize,
}

impl QuickJsConfig {
    pub const DEFAULT: Self = Self {
        memory_limit: 64 * 1024 * 1024,
        max_stack_size: 2 * 1024 * 1024,
        gc_threshold: 0,
    };

    /// Sets one option by its key.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys or values that are not a byte
    /// count.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (key, slot) = match key {
            "memory_limit" => ("memory_limit", &mut self.memory_limit),
            "max_stack_size" => ("max_stack_size", &mut self.max_stack_size),
            "gc_threshold" => ("gc_threshold", &mut self.gc_threshold),
            _ => return Err(Error::UnknownConfig(key.to_string())),
        };
        *slot = parse_size(value).ok_or_else(|| Error::InvalidConfig {
            key,
            value: value.to_string(),
        })?;
        Ok(())
    }

    /// Applies overrides from the `SCRIPTCORE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to something unparsable.
    pub fn apply_env(&mut self) -> Result<()> {
        for (var, key) in [
            (ENV_MEMORY_LIMIT, "memory_limit"),
            (ENV_MAX_STACK_SIZE, "max_stack_size"),
            (ENV_GC_THRESHOLD, "gc_threshold"),
        ] {
            if let Ok(value) = std::env::var(var) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }
}

impl Default for QuickJsConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parses a byte count with an optional `k`, `m` or `g` suffix (binary).
fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    let (digits, shift) = match value.as_bytes().last()?.to_ascii_lowercase() {
        b'k' => (&value[..value.len() - 1], 10),
        b'm' => (&value[..value.len() - 1], 20),
        b'g' => (&value[..value.len() - 1], 30),
        _ => (value, 0),
    };
    let base: usize = digits.trim().parse().ok()?;
    base.checked_mul(1 << shift)
}
