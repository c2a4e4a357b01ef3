//! Indentation-aware writer for human-readable descriptor dumps.
//!
//! ```text
//! servers (x2):
//!   - kind: [inet, http]
//!     network: tcp
//!     host: 0.0.0.0
//!   - kind: [unix, http]
//!     network: unix
//!     addr: /run/app.sock
//! ```

use std::fmt;

use crate::config::defaults::Defaults;

const INDENT_UNIT: &str = "  ";

/// Dump state. Carries the defaults used to render unset values.
#[derive(Debug, Clone, Default)]
pub struct DumpCtx {
    depth: usize,
    list_item: bool,
    defaults: Defaults,
}

impl DumpCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: &Defaults) -> Self {
        Self {
            defaults: defaults.clone(),
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn indent(&self) -> String {
        INDENT_UNIT.repeat(self.depth)
    }

    pub fn enter(&mut self) {
        self.depth += 1;
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Runs `f` one level deeper.
    pub fn wrap<F>(&mut self, f: F) -> fmt::Result
    where
        F: FnOnce(&mut DumpCtx) -> fmt::Result,
    {
        self.enter();
        let result = f(self);
        self.leave();
        result
    }

    /// Runs `f` as a list item: the next [`emit_prefix`](Self::emit_prefix)
    /// writes the `- ` marker.
    pub fn wrap_list<F>(&mut self, f: F) -> fmt::Result
    where
        F: FnOnce(&mut DumpCtx) -> fmt::Result,
    {
        self.enter();
        self.list_item = true;
        let result = f(self);
        self.list_item = false;
        self.leave();
        result
    }

    pub fn emit_prefix(&mut self, w: &mut dyn fmt::Write) -> fmt::Result {
        w.write_str(&self.indent())?;
        if std::mem::take(&mut self.list_item) {
            w.write_str("- ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_items_align_with_nested_fields() {
        let mut ctx = DumpCtx::new();
        let mut out = String::new();

        ctx.wrap_list(|ctx| {
            ctx.emit_prefix(&mut out)?;
            out.push_str("kind: unix\n");
            ctx.wrap(|ctx| {
                out.push_str(&format!("{}addr: /tmp/a.sock\n", ctx.indent()));
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(out, "  - kind: unix\n    addr: /tmp/a.sock\n");
        assert_eq!(ctx.depth(), 0);
    }
}
