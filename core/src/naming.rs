//! Randomized resource names and fixed sample VM credentials.

use std::collections::HashSet;

use rand::Rng;

/// Exclusive upper bound of the numeric suffix appended to a prefix.
const SUFFIX_BOUND: u32 = 9999;

/// Issues `{prefix}{n}` names that never repeat within one generator.
///
/// One generator lives for one run, so every resource created during that
/// run gets a distinct name.
#[derive(Debug, Default)]
pub struct NameGenerator {
    issued: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a name with a random numeric suffix, re-rolling on collision.
    pub fn create(&mut self, prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let name = format!("{prefix}{}", rng.gen_range(0..SUFFIX_BOUND));
            if self.issued.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Number of names issued so far.
    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

/// Administrator user name for the Docker host VM.
pub fn create_username() -> String {
    "tirekicker".to_string()
}

/// Administrator password for the Docker host VM.
pub fn create_password() -> String {
    "azure12345QWE!".to_string()
}
