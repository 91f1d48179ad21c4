//! Rewrites LaTeX-style math markup in model output into Unicode glyphs.
//!
//! This is a best-effort literal substitution over an ordered table, not a
//! LaTeX parser. Rules run in table order and each one replaces every
//! non-overlapping occurrence in the text produced by the rules before it, so
//! an earlier replacement may create a match for a later rule. Subscript and
//! superscript rules are not scoped to math: `item_2` becomes `item₂`.

mod stream;
mod table;

pub use stream::LineNormalizer;
pub use table::{ReplacementRule, ReplacementTable, TableError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextNormalizer {
    table: ReplacementTable,
}

impl TextNormalizer {
    pub fn new(table: ReplacementTable) -> Self {
        Self { table }
    }

    pub fn physics() -> Self {
        Self::new(ReplacementTable::physics())
    }

    pub fn table(&self) -> &ReplacementTable {
        &self.table
    }

    pub fn normalize(&self, input: &str) -> String {
        self.table.apply(input)
    }

    pub fn line_stream(&self) -> LineNormalizer<'_> {
        LineNormalizer::new(self)
    }
}

/// Normalizes `input` with the built-in physics table.
pub fn normalize(input: &str) -> String {
    ReplacementTable::physics().apply(input)
}
