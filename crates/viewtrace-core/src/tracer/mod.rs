/*!
# ViewTracer - Declaration Expansion

Drives declaration macros over parsed source files, the way a compiler plugin host
would: every declaration carrying a registered macro's attribute is expanded, and the
generated members are spliced back into the declaration.

## Overview

Two entry points:

1. **ViewTracer**: expands the declarations of an in-memory [`SourceFile`](crate::ast::SourceFile)
2. **FileTracer**: reads serialized source files from disk, expands them and writes the
   instrumented source plus the emitted metadata

## Architecture

- `DeclarationMacro`: trait for macros attached to declarations by attribute
- `ViewTracer`: expansion engine with macro registration and per-macro statistics
- `FileTracer`: file and directory driver around a `ViewTracer`

## Example Usage

```rust,ignore
use viewtrace_core::tracer::{FileTracer, ViewTracer};
use viewtrace_core::config::InstrumentConfig;

let mut tracer = ViewTracer::for_config(InstrumentConfig::default());
let summary = tracer.expand_file(&mut source_file);

let mut file_tracer = FileTracer::new(ViewTracer::for_config(InstrumentConfig::default()));
file_tracer.transform_path("views/", "build/instrumented")?;
```
*/

pub mod file_tracer;
pub mod rules;
pub mod view_tracer;

pub use file_tracer::{FileExpansionSummary, FileTracer};
pub use rules::{DeclarationMacro, MacroStats};
pub use view_tracer::{Diagnostic, ExpansionSummary, ViewTracer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationContext {
    pub source_file: Option<String>,
    pub declaration: Option<String>,
    pub depth: usize,
}

impl Default for TransformationContext {
    fn default() -> Self {
        Self {
            source_file: None,
            declaration: None,
            depth: 0,
        }
    }
}

impl TransformationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    pub fn with_declaration(mut self, name: impl Into<String>) -> Self {
        self.declaration = Some(name.into());
        self
    }

    /// Context for a declaration nested inside the current one
    pub fn descend(&self, name: impl Into<String>) -> Self {
        Self {
            source_file: self.source_file.clone(),
            declaration: Some(name.into()),
            depth: self.depth + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descend_keeps_file_and_bumps_depth() {
        let context = TransformationContext::new()
            .with_source_file("Views.json")
            .with_declaration("Outer");
        let nested = context.descend("Inner");
        assert_eq!(nested.source_file.as_deref(), Some("Views.json"));
        assert_eq!(nested.declaration.as_deref(), Some("Inner"));
        assert_eq!(nested.depth, 1);
    }
}
