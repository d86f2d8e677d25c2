use crate::foundation::error::{SvmError, SvmResult};

/// Compiler configuration shared by every shader of a batch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompilerOpts {
    /// Slots in the runtime register file.
    pub stack_size: u32,
    /// Closures the runtime can hold per shader evaluation.
    pub max_closures: u32,
    /// Compile shaders on a worker pool.
    pub parallel: bool,
    /// Worker count; `None` lets rayon decide.
    pub threads: Option<usize>,
}

impl Default for CompilerOpts {
    fn default() -> Self {
        Self {
            stack_size: 255,
            max_closures: 64,
            parallel: true,
            threads: None,
        }
    }
}

impl CompilerOpts {
    pub fn from_json(s: &str) -> SvmResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| SvmError::config(format!("parse compiler opts: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> SvmResult<()> {
        if self.stack_size == 0 || self.stack_size > u32::from(u16::MAX) {
            return Err(SvmError::config(format!(
                "stack_size must be in 1..={}, got {}",
                u16::MAX,
                self.stack_size
            )));
        }
        if self.max_closures == 0 {
            return Err(SvmError::config("max_closures must be >= 1"));
        }
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(SvmError::config("threads must be >= 1 when set"));
        }
        Ok(())
    }

    pub(crate) fn stack_capacity(&self) -> u16 {
        u16::try_from(self.stack_size).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/opts.rs"]
mod tests;
