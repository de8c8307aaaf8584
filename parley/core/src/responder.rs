//! Fallback Responder
//!
//! Produces a reply when no command resolves. The default implementation is
//! a plain pattern table: the first pattern (in declaration order) found
//! inside the lowercased input selects a canned reply. Anything else gets a
//! reply echoing the first word of the input.
//!
//! Responders are stateless and never see the conversation ledger.

/// Produces a reply for input no command handled
pub trait Responder: Send + Sync {
    /// Reply to `input`
    fn respond(&self, input: &str) -> String;
}

/// Patterns shipped with the shell, checked in this order
pub const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("hello", "Hello! How can I assist you today?"),
    ("hi", "Hi there! What can I do for you?"),
    ("how are you", "I'm functioning perfectly, thank you for asking!"),
    ("what is your name", "I'm Parley, your command assistant."),
    ("who created you", "I was created by the Parley developers."),
    ("thank you", "You're welcome! Happy to help."),
    ("thanks", "Always happy to help!"),
];

/// Table-driven responder
#[derive(Clone, Debug)]
pub struct PatternResponder {
    patterns: Vec<(String, String)>,
}

impl Default for PatternResponder {
    fn default() -> Self {
        Self::new(
            DEFAULT_PATTERNS
                .iter()
                .map(|(p, r)| ((*p).to_string(), (*r).to_string())),
        )
    }
}

impl PatternResponder {
    /// Build a responder from `(pattern, reply)` pairs
    ///
    /// Patterns are lowercased so they compare against lowercased input.
    /// Empty patterns are dropped.
    pub fn new<I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let patterns = patterns
            .into_iter()
            .map(|(pattern, reply)| (pattern.trim().to_lowercase(), reply))
            .filter(|(pattern, _)| !pattern.is_empty())
            .collect();
        Self { patterns }
    }

    /// Append more patterns after the existing ones
    #[must_use]
    pub fn with_patterns<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.patterns.extend(Self::new(extra).patterns);
        self
    }

    /// Number of patterns in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Responder for PatternResponder {
    fn respond(&self, input: &str) -> String {
        let lowered = input.to_lowercase();

        if let Some((_, reply)) = self
            .patterns
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
        {
            return reply.clone();
        }

        default_reply(input)
    }
}

/// Reply used when no pattern matches
#[must_use]
pub fn default_reply(input: &str) -> String {
    let subject = input.split_whitespace().next().unwrap_or("that");
    format!("That's interesting. I'm still learning about {subject}.")
}
