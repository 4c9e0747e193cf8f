use std::fmt;

use serde::{Serialize, Serializer};

/// A set of scope tokens drawn from the fixed vocabulary, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scopes(u32);

impl Scopes {
    pub const ORG_READ: Scopes = Scopes(1 << 0);
    pub const ORG_WRITE: Scopes = Scopes(1 << 1);
    pub const ORG_ADMIN: Scopes = Scopes(1 << 2);
    pub const ORG_INTEGRATIONS: Scopes = Scopes(1 << 3);
    pub const MEMBER_READ: Scopes = Scopes(1 << 4);
    pub const MEMBER_WRITE: Scopes = Scopes(1 << 5);
    pub const MEMBER_ADMIN: Scopes = Scopes(1 << 6);
    pub const TEAM_READ: Scopes = Scopes(1 << 7);
    pub const TEAM_WRITE: Scopes = Scopes(1 << 8);
    pub const TEAM_ADMIN: Scopes = Scopes(1 << 9);
    pub const PROJECT_READ: Scopes = Scopes(1 << 10);
    pub const PROJECT_WRITE: Scopes = Scopes(1 << 11);
    pub const PROJECT_ADMIN: Scopes = Scopes(1 << 12);
    pub const PROJECT_RELEASES: Scopes = Scopes(1 << 13);
    pub const EVENT_READ: Scopes = Scopes(1 << 14);
    pub const EVENT_WRITE: Scopes = Scopes(1 << 15);
    pub const EVENT_ADMIN: Scopes = Scopes(1 << 16);

    /// Vocabulary in rendering order.
    const VOCABULARY: [(&'static str, Scopes); 17] = [
        ("org:read", Self::ORG_READ),
        ("org:write", Self::ORG_WRITE),
        ("org:admin", Self::ORG_ADMIN),
        ("org:integrations", Self::ORG_INTEGRATIONS),
        ("member:read", Self::MEMBER_READ),
        ("member:write", Self::MEMBER_WRITE),
        ("member:admin", Self::MEMBER_ADMIN),
        ("team:read", Self::TEAM_READ),
        ("team:write", Self::TEAM_WRITE),
        ("team:admin", Self::TEAM_ADMIN),
        ("project:read", Self::PROJECT_READ),
        ("project:write", Self::PROJECT_WRITE),
        ("project:admin", Self::PROJECT_ADMIN),
        ("project:releases", Self::PROJECT_RELEASES),
        ("event:read", Self::EVENT_READ),
        ("event:write", Self::EVENT_WRITE),
        ("event:admin", Self::EVENT_ADMIN),
    ];

    const ALL_BITS: u32 = (1 << 17) - 1;

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a set from stored bits, dropping bits outside the vocabulary.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn has(self, required: Scopes) -> bool {
        self.0 & required.0 == required.0
    }

    #[must_use]
    pub const fn union(self, other: Scopes) -> Scopes {
        Scopes(self.0 | other.0)
    }

    /// Converts a single scope token to its bit.
    pub fn parse(s: &str) -> Option<Scopes> {
        Self::VOCABULARY
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, scope)| *scope)
    }

    /// Combines scope tokens into one set. Returns the first unknown token on failure.
    pub fn parse_many<S: AsRef<str>>(tokens: &[S]) -> Result<Scopes, String> {
        tokens.iter().try_fold(Scopes::default(), |acc, token| {
            let token = token.as_ref();
            Self::parse(token)
                .map(|scope| acc.union(scope))
                .ok_or_else(|| token.to_string())
        })
    }

    /// Returns the scope tokens in this set, in vocabulary order.
    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        Self::VOCABULARY
            .iter()
            .filter(|(_, scope)| self.has(*scope))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl Serialize for Scopes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_strings())
    }
}

impl From<i64> for Scopes {
    fn from(bits: i64) -> Self {
        Self::from_bits_truncate(bits as u32)
    }
}

impl From<Scopes> for i64 {
    fn from(s: Scopes) -> Self {
        i64::from(s.0)
    }
}
