//! Identity resolution and pseudonymization.
//!
//! People appear in independently generated reports under the same stable
//! key (typically an email address). The resolver maps each key to a display
//! name or to a deterministic pseudonym, identically across every source and
//! every run that shares the same salt — determinism is what lets reports
//! merge on person.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static RE_NUMERIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-\d+$").unwrap());

/// Minimum pseudonym length: short enough to scan, long enough that
/// collisions across a realistic team are rare (and handled when they do
/// happen).
const PSEUDONYM_MIN_LEN: usize = 4;

/// One resolved person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub stable_key: String,
    pub display_name: String,
    pub pseudonym: String,
}

/// Per-run pseudonym cache. Create one per report-generation run and pass it
/// wherever names are rendered; drop it when the run ends.
///
/// Not internally synchronized: build the mapping in a single-writer pass
/// before any parallel read of the resolved identities.
#[derive(Debug)]
pub struct IdentityResolver {
    salt: String,
    by_key: HashMap<String, Identity>,
    /// Reverse index used to detect truncation collisions.
    claimed: HashMap<String, String>,
}

impl IdentityResolver {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            by_key: HashMap::new(),
            claimed: HashMap::new(),
        }
    }

    /// Resolve a stable key, computing and caching the pseudonym on first
    /// reference.
    pub fn resolve(&mut self, stable_key: &str, display_name: Option<&str>) -> &Identity {
        if !self.by_key.contains_key(stable_key) {
            let pseudonym = self.claim_pseudonym(stable_key);
            self.by_key.insert(
                stable_key.to_string(),
                Identity {
                    stable_key: stable_key.to_string(),
                    display_name: display_name.unwrap_or(stable_key).to_string(),
                    pseudonym,
                },
            );
        }
        &self.by_key[stable_key]
    }

    /// The pseudonym for a key (resolving it if needed).
    pub fn pseudonym(&mut self, stable_key: &str) -> String {
        self.resolve(stable_key, None).pseudonym.clone()
    }

    /// Derive the shortest unclaimed pseudonym for a key. The digest is
    /// deterministic for a given key and salt; only the truncation length
    /// varies, and only when two keys' digests share a prefix.
    fn claim_pseudonym(&mut self, stable_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(stable_key.as_bytes());
        hasher.update(self.salt.as_bytes());
        let digest = format!("{:X}", hasher.finalize());

        let mut len = PSEUDONYM_MIN_LEN;
        loop {
            let candidate = format!("Developer-{}", &digest[..len.min(digest.len())]);
            match self.claimed.get(&candidate) {
                Some(owner) if owner != stable_key => {
                    if len >= digest.len() {
                        // Full-digest collision between distinct keys; not
                        // reachable in practice, but never merge two people.
                        let candidate = format!("Developer-{digest}-{}", self.claimed.len());
                        self.claimed.insert(candidate.clone(), stable_key.to_string());
                        return candidate;
                    }
                    len += 1;
                }
                _ => {
                    self.claimed.insert(candidate.clone(), stable_key.to_string());
                    return candidate;
                }
            }
        }
    }

    /// The mapping accumulated so far, for audit output.
    pub fn mapping(&self) -> Vec<&Identity> {
        let mut all: Vec<&Identity> = self.by_key.values().collect();
        all.sort_by(|a, b| a.stable_key.cmp(&b.stable_key));
        all
    }
}

/// Normalize a raw account identifier into a stable key: lowercase, mail
/// domain stripped, trailing `-1`/`-2` dedup suffixes removed. Jira and
/// review accounts for the same person then land on the same key.
pub fn normalize_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let local = lowered.split('@').next().unwrap_or(&lowered);
    RE_NUMERIC_SUFFIX.replace(local, "").into_owned()
}
