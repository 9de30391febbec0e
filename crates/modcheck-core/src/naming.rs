//! Collision-resistant resource names for test runs
//!
//! Every run provisions real infrastructure, so two runs (concurrent or
//! historical) must never share a resource name. Names are built as
//! `prefix + token + suffix` and lower-cased, because registry names are
//! lower-case only.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default token length (base-36 characters, about 41 bits)
pub const DEFAULT_TOKEN_LEN: usize = 8;

pub const DEFAULT_PREFIX: &str = "cs-pmod-";
pub const DEFAULT_SUFFIX: &str = "-testing";

// Lower-case only: the name is lower-cased, so upper-case letters would fold
const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 256;

/// Identity of a single run: the raw token and the derived resource name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIdentity {
    token: String,
    name: String,
}

impl RunIdentity {
    /// Build an identity from an explicit token (reproducible runs)
    pub fn new(prefix: &str, token: impl Into<String>, suffix: &str) -> Self {
        let token = token.into();
        let name = format!("{}{}{}", prefix, token, suffix).to_lowercase();
        Self { token, name }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Generates run identities from a fixed prefix and suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameGenerator {
    prefix: String,
    suffix: String,
    token_len: usize,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_SUFFIX)
    }
}

impl NameGenerator {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            token_len: DEFAULT_TOKEN_LEN,
        }
    }

    /// Override the token length. A zero length is bumped to one.
    pub fn with_token_len(mut self, token_len: usize) -> Self {
        self.token_len = token_len.max(1);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Generate a new identity from the thread-local RNG
    pub fn generate(&self) -> RunIdentity {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate a new identity from the supplied entropy source
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> RunIdentity {
        let token = unique_token(rng, self.token_len);
        RunIdentity::new(&self.prefix, token, &self.suffix)
    }
}

/// Random base-36 token of `len` characters
pub fn unique_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Check a name against the container-registry naming rule:
/// lower-case alphanumeric components separated by single `.`, `_`, `-`
/// or `/`, starting and ending alphanumeric, 2 to 256 characters.
pub fn is_provider_legal(name: &str) -> bool {
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return false;
    }

    name.split('/').all(|path_component| {
        !path_component.is_empty()
            && path_component
                .split(['.', '_', '-'])
                .all(|part| {
                    !part.is_empty()
                        && part
                            .chars()
                            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                })
    })
}
