mod directory;
mod user;

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};
use thiserror::Error;

pub use self::{
    directory::{JsonUserDirectory, MemoryUserDirectory, UserDirectory},
    user::{Permissions, Roles, User},
};

/// How long the user cache is trusted before it is reloaded
pub const DEFAULT_CACHE_REFRESH: Duration = Duration::from_secs(300);

/// Why a request was refused. All variants are reported to the remote side
/// with the same text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("Permission denied")]
    UnknownKey,
    #[error("Permission denied")]
    MissingRole(Roles),
    #[error("Permission denied")]
    PathNotAllowed(String),
}

#[derive(Default)]
struct UserCache {
    users: HashMap<String, User>,
    loaded_at: Option<Instant>,
}

/// Decides whether a security key may perform an operation on a path.
/// Users are looked up through a cache keyed by security key which is
/// reloaded from the directory once it is older than the refresh interval.
pub struct AuthorizationGate {
    directory: Arc<dyn UserDirectory>,
    cache: RwLock<UserCache>,
    refresh: Duration,
}

impl AuthorizationGate {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self::with_refresh(directory, DEFAULT_CACHE_REFRESH)
    }

    pub fn with_refresh(directory: Arc<dyn UserDirectory>, refresh: Duration) -> Self {
        Self {
            directory,
            cache: RwLock::new(UserCache::default()),
            refresh,
        }
    }

    /// Drops the cached users; the next lookup reloads them
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.loaded_at = None;
        }
    }

    /// Resolves `security_key` to a user without role or path checks
    pub fn authenticate(&self, security_key: &str) -> Result<User, Denied> {
        self.lookup(security_key).ok_or(Denied::UnknownKey)
    }

    /// Like [`AuthorizationGate::authorize`] for operations without a target path
    pub fn authorize_role(&self, security_key: &str, role: Roles) -> Result<User, Denied> {
        let user = self.authenticate(security_key)?;

        if !user.has_role(role) {
            debug!("user {} lacks role {:?}", user.name, role);
            return Err(Denied::MissingRole(role));
        }

        Ok(user)
    }

    /// Checks run in order and stop at the first failure: the key must
    /// belong to a user, the user must hold `role` and `path` must fall under
    /// one of the user's allowed prefixes.
    pub fn authorize(&self, security_key: &str, role: Roles, path: &str) -> Result<User, Denied> {
        let user = self.authorize_role(security_key, role)?;

        if !user.can_access(path) {
            debug!("user {} may not access {}", user.name, path);
            return Err(Denied::PathNotAllowed(path.to_owned()));
        }

        Ok(user)
    }

    fn lookup(&self, security_key: &str) -> Option<User> {
        if let Ok(cache) = self.cache.read() {
            if cache.loaded_at.is_some_and(|at| at.elapsed() < self.refresh) {
                return cache.users.get(security_key).cloned();
            }
        }

        self.reload();

        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.users.get(security_key).cloned())
    }

    fn reload(&self) {
        let users = match self.directory.get_all() {
            Ok(users) => users,
            Err(err) => {
                error!("unable to load users: {}", err);
                return;
            }
        };

        debug!("loaded {} users", users.len());

        if let Ok(mut cache) = self.cache.write() {
            cache.users = users
                .into_iter()
                .map(|u| (u.security_key.clone(), u))
                .collect();
            cache.loaded_at = Some(Instant::now());
        }
    }
}
