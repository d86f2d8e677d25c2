use crate::program::compiled::Variant;
use std::fmt::Write as _;

/// Telemetry for one compiled variant.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VariantSummary {
    pub variant: Variant,
    pub instrs: usize,
    pub peak_stack: u16,
    pub closures: u32,
    pub time_ms: f64,
    pub degraded: bool,
}

/// Per-shader compile telemetry. Not needed for correctness.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CompileSummary {
    pub variants: Vec<VariantSummary>,
    pub total_instrs: usize,
    pub peak_stack: u16,
    pub time_total_ms: f64,
}

impl CompileSummary {
    pub(crate) fn record(&mut self, v: VariantSummary) {
        self.total_instrs = self.total_instrs.saturating_add(v.instrs);
        self.peak_stack = self.peak_stack.max(v.peak_stack);
        self.variants.push(v);
    }

    pub fn variant(&self, v: Variant) -> Option<&VariantSummary> {
        self.variants.iter().find(|s| s.variant == v)
    }

    pub fn closures(&self) -> u32 {
        self.variants
            .iter()
            .fold(0u32, |acc, v| acc.saturating_add(v.closures))
    }

    pub fn full_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Shader summary:");
        let _ = writeln!(out, "  Peak stack usage:     {}", self.peak_stack);
        let _ = writeln!(out, "  Instruction count:    {}", self.total_instrs);
        let _ = writeln!(out, "  Closures:             {}", self.closures());
        let _ = writeln!(out, "  Total time:           {:.3} ms", self.time_total_ms);
        for v in &self.variants {
            let _ = writeln!(
                out,
                "  {:<13} instrs={:<5} peak={:<4} closures={:<3} {:.3} ms{}",
                v.variant.as_str(),
                v.instrs,
                v.peak_stack,
                v.closures,
                v.time_ms,
                if v.degraded { " (degraded)" } else { "" }
            );
        }
        out
    }
}
