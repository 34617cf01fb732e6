//! The externally supplied literal sampler map.

/// One sampler map line: the sampler value and the source text it came from.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SamplerMapEntry {
    pub value: u32,
    pub expression: String,
}

/// Ordered sampler map entries. Order and duplicates are significant.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SamplerMap {
    entries: Vec<SamplerMapEntry>,
}

impl SamplerMap {
    /// Creates an empty sampler map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from `(value, expression)` pairs.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (u32, S)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(value, expression)| SamplerMapEntry {
                    value,
                    expression: expression.into(),
                })
                .collect(),
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: SamplerMapEntry) {
        self.entries.push(entry);
    }

    /// All entries in supplied order.
    pub fn entries(&self) -> &[SamplerMapEntry] {
        &self.entries
    }

    /// Number of entries, repeats included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no sampler map was supplied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
