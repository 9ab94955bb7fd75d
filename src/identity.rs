//! Agent identities: validated display names, random generation, and the
//! pool that keeps concurrently connected names unique.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 16;
const MAX_GENERATION_ATTEMPTS: usize = 64;

const ADJECTIVES: &[&str] = &[
    "Swift", "Quiet", "Brave", "Lucky", "Rusty", "Mossy", "Amber", "Frosty", "Sly", "Stony",
    "Bold", "Dusky", "Iron", "Misty", "Sunny", "Wild",
];

const NOUNS: &[&str] = &[
    "Miner", "Fox", "Crafter", "Golem", "Otter", "Wolf", "Pick", "Ember", "Creek", "Badger",
    "Hawk", "Digger", "Lynx", "Raven", "Sprout", "Torch",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Agent name must be 3-16 characters: {0:?}")]
    InvalidLength(String),

    #[error("Agent name may only contain letters, digits and '_': {0:?}")]
    InvalidCharacters(String),

    #[error("Agent name already in use: {0}")]
    Duplicate(String),

    #[error("Could not generate a unique agent name")]
    Exhausted,
}

/// A validated in-game display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentIdentity(String);

impl AgentIdentity {
    /// Validates and wraps a name.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len()) {
            return Err(IdentityError::InvalidLength(name));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentityError::InvalidCharacters(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentIdentity> for String {
    fn from(value: AgentIdentity) -> Self {
        value.0
    }
}

/// Generates random names like `SwiftOtter42`.
pub struct NameGenerator;

impl NameGenerator {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> AgentIdentity {
        let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Swift");
        let noun = NOUNS.choose(rng).copied().unwrap_or("Miner");
        let mut name = format!("{adjective}{noun}{:02}", rng.gen_range(0..100));
        name.truncate(MAX_NAME_LEN);
        // Word lists are ASCII alphanumeric and at least MIN_NAME_LEN long.
        AgentIdentity(name)
    }
}

/// Names of currently connected agents.
#[derive(Debug, Default)]
pub struct IdentityPool {
    active: HashSet<AgentIdentity>,
}

impl IdentityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `identity` as connected. Fails if it already is.
    pub fn claim(&mut self, identity: &AgentIdentity) -> Result<(), IdentityError> {
        if !self.active.insert(identity.clone()) {
            return Err(IdentityError::Duplicate(identity.to_string()));
        }
        Ok(())
    }

    /// Generates and claims a name that no connected agent uses.
    pub fn claim_generated<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<AgentIdentity, IdentityError> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let candidate = NameGenerator::generate(rng);
            if self.claim(&candidate).is_ok() {
                return Ok(candidate);
            }
        }
        Err(IdentityError::Exhausted)
    }

    /// Releases a name once its agent disconnects.
    pub fn release(&mut self, identity: &AgentIdentity) -> bool {
        self.active.remove(identity)
    }

    pub fn is_active(&self, identity: &AgentIdentity) -> bool {
        self.active.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Extends `roster` with fresh unique names until it holds `count` entries.
///
/// Existing entries are kept in order; duplicates in the input are replaced.
pub fn complete_roster<R: Rng + ?Sized>(
    roster: Vec<AgentIdentity>,
    count: usize,
    rng: &mut R,
) -> Result<Vec<AgentIdentity>, IdentityError> {
    let mut seen = HashSet::new();
    let mut result: Vec<AgentIdentity> = roster
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .take(count)
        .collect();

    let mut attempts = 0;
    while result.len() < count {
        let candidate = NameGenerator::generate(rng);
        if seen.insert(candidate.clone()) {
            result.push(candidate);
        } else {
            attempts += 1;
            if attempts > MAX_GENERATION_ATTEMPTS * count.max(1) {
                return Err(IdentityError::Exhausted);
            }
        }
    }
    Ok(result)
}
