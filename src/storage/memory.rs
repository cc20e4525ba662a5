use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{App, AppStore, StorageError, StorageResult, User, UserStore, normalize_email};
use crate::crypto::{HashedPassword, generate_secret};

#[derive(Default)]
struct AppTable {
    by_id: HashMap<Uuid, App>,
    ids_by_name: HashMap<String, Uuid>,
}

/// Users and apps held in process memory.
///
/// Uniqueness is enforced under the write lock, so it gives the same
/// guarantees as the database constraints for a single process. Clones share
/// the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    apps: Arc<RwLock<AppTable>>,
}

impl MemoryStore {
    /// Creates empty stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered users.
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns the number of registered apps.
    pub async fn app_count(&self) -> usize {
        self.apps.read().await.by_id.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn save(&self, email: &str, password_hash: &HashedPassword) -> StorageResult<Uuid> {
        const OP: &str = "storage.user.save";

        let email = normalize_email(email);
        let mut users = self.users.write().await;

        match users.entry(email) {
            Entry::Occupied(_) => Err(StorageError::UserExists { op: OP }),
            Entry::Vacant(slot) => {
                let id = Uuid::new_v4();
                let user = User {
                    id,
                    email: slot.key().clone(),
                    password_hash: password_hash.clone(),
                    salt: generate_secret(),
                };
                slot.insert(user);
                Ok(id)
            }
        }
    }

    async fn get(&self, email: &str) -> StorageResult<User> {
        const OP: &str = "storage.user.get";

        self.users
            .read()
            .await
            .get(&normalize_email(email))
            .cloned()
            .ok_or(StorageError::UserNotFound { op: OP })
    }

    async fn delete(&self, email: &str) -> StorageResult<Uuid> {
        const OP: &str = "storage.user.delete";

        self.users
            .write()
            .await
            .remove(&normalize_email(email))
            .map(|user| user.id)
            .ok_or(StorageError::UserNotFound { op: OP })
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn save(&self, name: &str, secret: &str) -> StorageResult<Uuid> {
        const OP: &str = "storage.app.save";

        let mut apps = self.apps.write().await;
        if apps.ids_by_name.contains_key(name) {
            return Err(StorageError::AppExists { op: OP });
        }

        let id = Uuid::new_v4();
        apps.ids_by_name.insert(name.to_string(), id);
        apps.by_id.insert(
            id,
            App {
                id,
                name: name.to_string(),
                secret: secret.to_string(),
            },
        );

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> StorageResult<App> {
        const OP: &str = "storage.app.get";

        self.apps
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StorageError::AppNotFound { op: OP })
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        const OP: &str = "storage.app.delete";

        let mut apps = self.apps.write().await;
        let app = apps
            .by_id
            .remove(&id)
            .ok_or(StorageError::AppNotFound { op: OP })?;
        apps.ids_by_name.remove(&app.name);

        Ok(())
    }
}
