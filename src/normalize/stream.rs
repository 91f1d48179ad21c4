use super::TextNormalizer;

/// Normalizes streamed text one completed line at a time.
///
/// No rule may contain a line break, so rewriting each line on its own gives
/// the same result as rewriting the assembled message.
#[derive(Debug)]
pub struct LineNormalizer<'a> {
    normalizer: &'a TextNormalizer,
    pending: String,
}

impl<'a> LineNormalizer<'a> {
    pub(super) fn new(normalizer: &'a TextNormalizer) -> Self {
        Self {
            normalizer,
            pending: String::new(),
        }
    }

    pub fn push(&mut self, delta: &str) -> String {
        self.pending.push_str(delta);
        let Some(end) = self.pending.rfind('\n') else {
            return String::new();
        };

        let rest = self.pending.split_off(end + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        self.normalizer.normalize(&complete)
    }

    pub fn finish(self) -> String {
        self.normalizer.normalize(&self.pending)
    }
}
