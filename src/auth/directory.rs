use std::{
    fs,
    path::PathBuf,
    sync::{Mutex, RwLock},
};

use super::User;
use crate::error::Error;

/// Keyed storage of users
pub trait UserDirectory: Send + Sync {
    fn get_all(&self) -> Result<Vec<User>, Error>;

    fn get_by_id(&self, id: &str) -> Result<Option<User>, Error> {
        Ok(self.get_all()?.into_iter().find(|u| u.id == id))
    }

    fn get_by_secret(&self, security_key: &str) -> Result<Option<User>, Error> {
        Ok(self
            .get_all()?
            .into_iter()
            .find(|u| u.security_key == security_key))
    }

    fn add(&self, user: User) -> Result<(), Error>;

    fn update(&self, user: User) -> Result<(), Error>;

    fn delete(&self, id: &str) -> Result<(), Error>;
}

fn insert(users: &mut Vec<User>, user: User) -> Result<(), Error> {
    if users.iter().any(|u| u.id == user.id) {
        return Err(Error::Config(format!("user {} already exists", user.id)));
    }
    if users.iter().any(|u| u.security_key == user.security_key) {
        return Err(Error::Config(format!(
            "security key of user {} is already in use",
            user.name
        )));
    }

    users.push(user);
    Ok(())
}

fn replace(users: &mut [User], user: User) -> Result<(), Error> {
    if users
        .iter()
        .any(|u| u.id != user.id && u.security_key == user.security_key)
    {
        return Err(Error::Config(format!(
            "security key of user {} is already in use",
            user.name
        )));
    }

    let slot = users
        .iter_mut()
        .find(|u| u.id == user.id)
        .ok_or_else(|| Error::Config(format!("user {} does not exist", user.id)))?;
    *slot = user;
    Ok(())
}

fn remove(users: &mut Vec<User>, id: &str) -> Result<(), Error> {
    let before = users.len();
    users.retain(|u| u.id != id);

    if users.len() == before {
        return Err(Error::Config(format!("user {id} does not exist")));
    }

    Ok(())
}

fn poisoned<T>(_: T) -> Error {
    Error::Config("user directory lock poisoned".to_owned())
}

/// Users held in process memory
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn get_all(&self) -> Result<Vec<User>, Error> {
        Ok(self.users.read().map_err(poisoned)?.clone())
    }

    fn add(&self, user: User) -> Result<(), Error> {
        insert(&mut *self.users.write().map_err(poisoned)?, user)
    }

    fn update(&self, user: User) -> Result<(), Error> {
        replace(&mut self.users.write().map_err(poisoned)?, user)
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        remove(&mut *self.users.write().map_err(poisoned)?, id)
    }
}

/// Users stored as a JSON array in one file. A missing file is an empty
/// directory.
#[derive(Debug)]
pub struct JsonUserDirectory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonUserDirectory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<User>, Error> {
        match fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| Error::Config(format!("read {}: {e}", self.path.display()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(Error::Config(format!(
                "read {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn store(&self, users: &[User]) -> Result<(), Error> {
        let raw = serde_json::to_vec_pretty(users)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Vec<User>) -> Result<(), Error>,
    {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut users = self.load()?;
        f(&mut users)?;
        self.store(&users)
    }
}

impl UserDirectory for JsonUserDirectory {
    fn get_all(&self) -> Result<Vec<User>, Error> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        self.load()
    }

    fn add(&self, user: User) -> Result<(), Error> {
        self.modify(|users| insert(users, user))
    }

    fn update(&self, user: User) -> Result<(), Error> {
        self.modify(|users| replace(users, user))
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        self.modify(|users| remove(users, id))
    }
}
