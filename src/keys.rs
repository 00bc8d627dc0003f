//! Upstream credential pool and per-request rotation.
//!
//! Credentials come from `API_KEY_<suffix>` environment variables and are
//! re-read on every request, so keys can be added or revoked without a
//! restart. The rotation cursor, by contrast, lives for the whole process and
//! decides which key each request tries first.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Environment variable prefix that marks an upstream credential.
pub const KEY_VAR_PREFIX: &str = "API_KEY_";

/// One upstream credential, remembered together with the variable it came
/// from and its position in the pool. Only the position is ever logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub index: usize,
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Deduplicated credentials, ordered by variable name.
#[derive(Debug, Clone, Default)]
pub struct KeyPool {
    keys: Vec<ApiKey>,
}

impl KeyPool {
    /// Build a pool from `(name, value)` pairs.
    ///
    /// Only `API_KEY_*` variables with a non-blank value are kept. Sorting by
    /// name makes the order stable across restarts; when two variables hold
    /// the same secret the one with the smaller name wins.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut candidates: Vec<ApiKey> = vars
            .into_iter()
            .filter(|(name, _)| name.starts_with(KEY_VAR_PREFIX))
            .filter_map(|(name, value)| {
                let secret = value.trim();
                (!secret.is_empty()).then(|| ApiKey { index: 0, name, secret: secret.to_owned() })
            })
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        let mut keys: Vec<ApiKey> = Vec::with_capacity(candidates.len());
        for key in candidates {
            if !keys.iter().any(|k| k.secret == key.secret) {
                keys.push(ApiKey { index: keys.len(), ..key });
            }
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[cfg(test)]
    pub fn keys(&self) -> &[ApiKey] {
        &self.keys
    }
}

/// Where the pool is read from on each request.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// The live process environment.
    Process,
    /// A fixed set of variables.
    #[cfg(test)]
    Fixed(Vec<(String, String)>),
}

impl KeySource {
    pub fn pool(&self) -> KeyPool {
        match self {
            // Variables that are not valid UTF-8 cannot be sent as a bearer
            // token anyway, so they are skipped rather than panicking.
            Self::Process => KeyPool::from_vars(std::env::vars_os().filter_map(|(name, value)| {
                Some((name.into_string().ok()?, value.into_string().ok()?))
            })),
            #[cfg(test)]
            Self::Fixed(vars) => KeyPool::from_vars(vars.iter().cloned()),
        }
    }
}

/// Process-wide rotation cursor shared by all requests.
#[derive(Debug, Default)]
pub struct KeyRotation {
    cursor: AtomicUsize,
}

impl KeyRotation {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(cursor: usize) -> Self {
        Self { cursor: AtomicUsize::new(cursor) }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Trial order for one request: the pool rotated left by `cursor % n`.
    ///
    /// Advances the cursor to `(cursor + 1) % n` in a single atomic step, so
    /// concurrent requests never share a starting key unless more requests
    /// than keys are in flight. An empty pool returns an empty order and
    /// leaves the cursor untouched.
    pub fn next_order<'a>(&self, pool: &'a KeyPool) -> Vec<&'a ApiKey> {
        let n = pool.len();
        if n == 0 {
            return Vec::new();
        }

        let previous = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c % n + 1) % n))
            .unwrap_or_else(|c| c);
        let start = previous % n;

        pool.keys[start..].iter().chain(&pool.keys[..start]).collect()
    }
}
