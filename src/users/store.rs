//! User Storage
//!
//! [`UserStore`] is the data-access capability the user handlers depend on.
//! It is object safe, so the composition root can pick any implementation
//! (in-memory here, a row store or key-value store elsewhere) and hand it
//! over as `Arc<dyn UserStore>`.
//!
//! Identifiers are opaque string tokens. The in-memory store happens to
//! issue decimal numbers, but callers must not rely on that.

use futures::future::{self, BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Errors reported by a [`UserStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No user has this id
    #[error("user {0} not found")]
    NotFound(String),

    /// The backing store cannot serve requests
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result future returned by every store operation.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

/// Asynchronous access to user records.
pub trait UserStore: Send + Sync + 'static {
    /// All users, ordered by id.
    fn list(&self) -> StoreFuture<'_, Vec<User>>;

    /// The user with `id`.
    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, User>;

    /// Users whose name equals `name` exactly.
    fn find_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Vec<User>>;

    /// The user registered with `email`. With several matches the lowest id
    /// wins.
    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, User>;

    /// Stores a new user under a freshly issued id.
    fn create(&self, name: String, email: String) -> StoreFuture<'_, User>;

    /// Replaces the name and email of an existing user.
    fn update(&self, id: String, name: String, email: String) -> StoreFuture<'_, User>;

    /// Removes a user, returning the removed record.
    fn delete<'a>(&'a self, id: &'a str) -> StoreFuture<'a, User>;

    /// Number of stored users.
    fn count(&self) -> StoreFuture<'_, usize>;
}

/// A [`UserStore`] held entirely in memory.
///
/// # Example
///
/// ```
/// use lineroute::users::{InMemoryUserStore, UserStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryUserStore::new();
/// let user = store.create("ariz".into(), "ariz@example.com".into()).await.unwrap();
/// assert_eq!(store.get(&user.id).await.unwrap(), user);
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    next_id: AtomicU64,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserStore {
    /// Creates an empty store. The first issued id is `1`.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Inserts or replaces a user with a caller-chosen id.
    ///
    /// Numeric ids move the id counter past them.
    pub fn insert(&self, user: User) -> Result<(), StoreError> {
        if let Ok(n) = user.id.parse::<u64>() {
            self.next_id.fetch_max(n.saturating_add(1), Ordering::Relaxed);
        }
        self.users
            .write()
            .map_err(|_| poisoned())?
            .insert(user.id.clone(), user);
        Ok(())
    }

    /// Populates the store with a few demo users.
    pub fn seed_demo(&self) -> Result<(), StoreError> {
        for (name, email) in [
            ("ariz", "ariz@example.com"),
            ("grace", "grace@example.com"),
            ("linus", "linus@example.com"),
        ] {
            self.create_sync(name.to_string(), email.to_string())?;
        }
        Ok(())
    }

    /// Takes the next free id. Must be called with the write lock held so
    /// the id cannot be taken before it is used.
    fn issue_id(&self, users: &HashMap<String, User>) -> Result<String, StoreError> {
        loop {
            let n = self
                .next_id
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
                .map_err(|_| StoreError::Unavailable("user ids exhausted".to_string()))?;
            let id = n.to_string();
            if !users.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn list_sync(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| id_order(&a.id, &b.id));
        Ok(all)
    }

    fn get_sync(&self, id: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .map_err(|_| poisoned())?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn find_by_name_sync(&self, name: &str) -> Result<Vec<User>, StoreError> {
        Ok(self
            .list_sync()?
            .into_iter()
            .filter(|u| u.name == name)
            .collect())
    }

    fn find_by_email_sync(&self, email: &str) -> Result<User, StoreError> {
        self.list_sync()?
            .into_iter()
            .find(|u| u.email == email)
            .ok_or_else(|| StoreError::NotFound(email.to_string()))
    }

    fn create_sync(&self, name: String, email: String) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = User::new(self.issue_id(&users)?, name, email);
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn update_sync(&self, id: String, name: String, email: String) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        user.name = name;
        user.email = email;
        Ok(user.clone())
    }

    fn delete_sync(&self, id: &str) -> Result<User, StoreError> {
        self.users
            .write()
            .map_err(|_| poisoned())?
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn count_sync(&self) -> Result<usize, StoreError> {
        Ok(self.users.read().map_err(|_| poisoned())?.len())
    }
}

impl UserStore for InMemoryUserStore {
    fn list(&self) -> StoreFuture<'_, Vec<User>> {
        future::ready(self.list_sync()).boxed()
    }

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, User> {
        future::ready(self.get_sync(id)).boxed()
    }

    fn find_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Vec<User>> {
        future::ready(self.find_by_name_sync(name)).boxed()
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, User> {
        future::ready(self.find_by_email_sync(email)).boxed()
    }

    fn create(&self, name: String, email: String) -> StoreFuture<'_, User> {
        future::ready(self.create_sync(name, email)).boxed()
    }

    fn update(&self, id: String, name: String, email: String) -> StoreFuture<'_, User> {
        future::ready(self.update_sync(id, name, email)).boxed()
    }

    fn delete<'a>(&'a self, id: &'a str) -> StoreFuture<'a, User> {
        future::ready(self.delete_sync(id)).boxed()
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        future::ready(self.count_sync()).boxed()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// Shortlex order, so decimal ids sort numerically.
fn id_order(a: &str, b: &str) -> std::cmp::Ordering {
    (a.len(), a).cmp(&(b.len(), b))
}
