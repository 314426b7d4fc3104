use tracing::warn;

pub const DEFAULT_ALIGNMENT_BYTES: usize = 16;

/// Knobs for allocation and code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Every allocation offset and size is a multiple of this. Must be a power of two.
    pub alignment_bytes: usize,
    /// Reject obligations still unresolved at generation time instead of warning.
    pub strict_obligations: bool,
    /// Re-check the no-overlap invariant after allocation.
    pub verify_layout: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            alignment_bytes: DEFAULT_ALIGNMENT_BYTES,
            strict_obligations: false,
            verify_layout: cfg!(debug_assertions),
        }
    }
}

impl CodegenConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            alignment_bytes: read_alignment("KERNELFORGE_ALIGNMENT", defaults.alignment_bytes),
            strict_obligations: read_bool(
                "KERNELFORGE_STRICT_OBLIGATIONS",
                defaults.strict_obligations,
            ),
            verify_layout: read_bool("KERNELFORGE_VERIFY_LAYOUT", defaults.verify_layout),
        }
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment_bytes: usize) -> Self {
        self.alignment_bytes = alignment_bytes;
        self
    }

    #[must_use]
    pub fn with_strict_obligations(mut self, strict: bool) -> Self {
        self.strict_obligations = strict;
        self
    }

    #[must_use]
    pub fn with_verify_layout(mut self, verify: bool) -> Self {
        self.verify_layout = verify;
        self
    }
}

fn read_bool(key: &str, default_value: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(default_value)
}

fn read_alignment(key: &str, default_value: usize) -> usize {
    let Ok(raw) = std::env::var(key) else {
        return default_value;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value.is_power_of_two() => value,
        _ => {
            warn!(key, value = %raw, default_value, "ignoring invalid alignment override");
            default_value
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::CodegenConfig;

    #[test]
    fn config_is_readable_from_environment_defaults() {
        let config = CodegenConfig::from_env();
        assert!(config.alignment_bytes.is_power_of_two());
        if cfg!(debug_assertions) {
            assert!(CodegenConfig::default().verify_layout);
        }
    }

    #[test]
    fn setters_override_defaults() {
        let config = CodegenConfig::default()
            .with_alignment(64)
            .with_strict_obligations(true)
            .with_verify_layout(false);
        assert_eq!(config.alignment_bytes, 64);
        assert!(config.strict_obligations);
        assert!(!config.verify_layout);
    }
}
