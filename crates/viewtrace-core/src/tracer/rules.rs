/*!
# Declaration Macros

Core trait for macros attached to declarations, and their execution statistics.
*/

use crate::ast::ViewDecl;
use crate::instrument::{Expansion, InstrumentError};

use super::TransformationContext;

/// A macro attached to declarations through an attribute
///
/// Expansion is pure: the macro computes the generated members from the declaration
/// and the tracer decides whether and how to splice them.
pub trait DeclarationMacro: Send + Sync {
    /// Human-readable name for this macro
    fn name(&self) -> &'static str;

    /// Detailed description of what this macro generates
    fn description(&self) -> &'static str;

    /// Attribute name that attaches this macro, without the `@`
    fn attribute(&self) -> &str;

    /// Priority for macro ordering (higher priority runs first)
    fn priority(&self) -> u32 {
        100
    }

    /// Check if this macro applies to the given declaration
    fn matches(&self, decl: &ViewDecl) -> bool {
        decl.has_attribute(self.attribute())
    }

    /// Compute the expansion for one declaration
    fn expand(
        &self,
        decl: &ViewDecl,
        context: &TransformationContext,
    ) -> Result<Expansion, InstrumentError>;
}

/// Macro execution statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MacroStats {
    pub macro_name: String,
    pub applications: u64,
    pub expansions: u64,
    pub errors: u64,
    pub total_time_us: u64,
}

impl MacroStats {
    pub fn new(macro_name: impl Into<String>) -> Self {
        Self {
            macro_name: macro_name.into(),
            ..Self::default()
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            (self.expansions as f64) / (self.applications as f64)
        }
    }

    pub fn average_time_us(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            (self.total_time_us as f64) / (self.applications as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_of_unused_macro_are_zero() {
        let stats = MacroStats::new("TrackPerformance");
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.average_time_us(), 0.0);
    }

    #[test]
    fn test_success_rate() {
        let stats = MacroStats {
            macro_name: "TrackPerformance".to_string(),
            applications: 4,
            expansions: 3,
            errors: 1,
            total_time_us: 40,
        };
        assert_eq!(stats.success_rate(), 0.75);
        assert_eq!(stats.average_time_us(), 10.0);
    }
}
