use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// A literal `pattern -> replacement` pair. Patterns are never interpreted as
/// regular expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementRule {
    pattern: Cow<'static, str>,
    replacement: Cow<'static, str>,
}

impl ReplacementRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: Cow::Owned(pattern.into()),
            replacement: Cow::Owned(replacement.into()),
        }
    }

    const fn fixed(pattern: &'static str, replacement: &'static str) -> Self {
        Self {
            pattern: Cow::Borrowed(pattern),
            replacement: Cow::Borrowed(replacement),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

// Specific fractions stay ahead of anything more generic that may be added later.
static PHYSICS_RULES: [ReplacementRule; 36] = [
    ReplacementRule::fixed(r"\frac{dv}{dt}", "dv/dt"),
    ReplacementRule::fixed(r"\frac{d}{dt}", "d/dt"),
    ReplacementRule::fixed(r"\frac{1}{2}", "½"),
    ReplacementRule::fixed(r"\frac{1}{3}", "⅓"),
    ReplacementRule::fixed(r"\frac{1}{4}", "¼"),
    ReplacementRule::fixed(r"\frac{3}{4}", "¾"),
    ReplacementRule::fixed(r"\int", "∫"),
    ReplacementRule::fixed(r"\partial", "∂"),
    ReplacementRule::fixed(r"\approx", "≈"),
    ReplacementRule::fixed(r"\leq", "≤"),
    ReplacementRule::fixed(r"\geq", "≥"),
    ReplacementRule::fixed(r"\infty", "∞"),
    ReplacementRule::fixed(r"\pi", "π"),
    ReplacementRule::fixed(r"\theta", "θ"),
    ReplacementRule::fixed(r"\alpha", "α"),
    ReplacementRule::fixed(r"\beta", "β"),
    ReplacementRule::fixed(r"\gamma", "γ"),
    ReplacementRule::fixed(r"\delta", "δ"),
    ReplacementRule::fixed(r"\omega", "ω"),
    ReplacementRule::fixed(r"\ln", "ln"),
    ReplacementRule::fixed(r"\log", "log"),
    ReplacementRule::fixed(r"\sin", "sin"),
    ReplacementRule::fixed(r"\cos", "cos"),
    ReplacementRule::fixed(r"\tan", "tan"),
    ReplacementRule::fixed(r"\(", ""),
    ReplacementRule::fixed(r"\)", ""),
    ReplacementRule::fixed("$$", ""),
    ReplacementRule::fixed("_0", "₀"),
    ReplacementRule::fixed("_1", "₁"),
    ReplacementRule::fixed("_2", "₂"),
    ReplacementRule::fixed("_3", "₃"),
    ReplacementRule::fixed("_4", "₄"),
    ReplacementRule::fixed("_5", "₅"),
    ReplacementRule::fixed("^2", "²"),
    ReplacementRule::fixed("^3", "³"),
    ReplacementRule::fixed("^{-1}", "⁻¹"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    EmptyPattern {
        index: usize,
    },
    LineBreak {
        index: usize,
    },
    Shadowed {
        index: usize,
        pattern: String,
        earlier: String,
    },
}

impl TableError {
    /// Position of the offending rule within the rules being added.
    pub fn index(&self) -> usize {
        match self {
            Self::EmptyPattern { index }
            | Self::LineBreak { index }
            | Self::Shadowed { index, .. } => *index,
        }
    }
}

impl Display for TableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPattern { .. } => write!(f, "pattern must not be empty"),
            Self::LineBreak { .. } => {
                write!(f, "pattern and replacement must not contain line breaks")
            }
            Self::Shadowed {
                pattern, earlier, ..
            } => write!(
                f,
                "pattern '{pattern}' would be pre-empted by earlier pattern '{earlier}'"
            ),
        }
    }
}

impl Error for TableError {}

/// Ordered replacement rules. Each rule runs over the output of every rule
/// before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementTable {
    rules: Cow<'static, [ReplacementRule]>,
}

impl ReplacementTable {
    pub fn physics() -> Self {
        Self {
            rules: Cow::Borrowed(PHYSICS_RULES.as_slice()),
        }
    }

    pub fn new(rules: Vec<ReplacementRule>) -> Result<Self, TableError> {
        validate(&[], &rules)?;
        Ok(Self {
            rules: Cow::Owned(rules),
        })
    }

    /// Appends `extra` after the current rules. Fails without modifying the
    /// table if any added rule is invalid or would never fire because an
    /// earlier pattern is contained in it.
    pub fn extend(&mut self, extra: Vec<ReplacementRule>) -> Result<(), TableError> {
        if extra.is_empty() {
            return Ok(());
        }
        validate(&self.rules, &extra)?;
        self.rules.to_mut().extend(extra);
        Ok(())
    }

    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index pairs `(earlier, later)` where the earlier pattern occurs inside
    /// the later one.
    pub fn shadowed_rules(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (later, rule) in self.rules.iter().enumerate() {
            for (earlier, prior) in self.rules[..later].iter().enumerate() {
                if rule.pattern().contains(prior.pattern()) {
                    pairs.push((earlier, later));
                }
            }
        }
        pairs
    }

    pub(super) fn apply(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |text, rule| {
                if text.contains(rule.pattern()) {
                    text.replace(rule.pattern(), rule.replacement())
                } else {
                    text
                }
            })
    }
}

impl Default for ReplacementTable {
    fn default() -> Self {
        Self::physics()
    }
}

fn validate(existing: &[ReplacementRule], added: &[ReplacementRule]) -> Result<(), TableError> {
    for (index, rule) in added.iter().enumerate() {
        if rule.pattern().is_empty() {
            return Err(TableError::EmptyPattern { index });
        }
        if has_line_break(rule.pattern()) || has_line_break(rule.replacement()) {
            return Err(TableError::LineBreak { index });
        }

        if let Some(prior) = existing
            .iter()
            .chain(&added[..index])
            .find(|prior| rule.pattern().contains(prior.pattern()))
        {
            return Err(TableError::Shadowed {
                index,
                pattern: rule.pattern().to_string(),
                earlier: prior.pattern().to_string(),
            });
        }
    }

    Ok(())
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\n', '\r'])
}
