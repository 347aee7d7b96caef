//! In-process `UserStore` for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{NewUser, User};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    /// Makes `find_by_id` fail.
    pub fail_lookups: AtomicBool,
    /// Makes `create` and the media updates fail.
    pub fail_writes: AtomicBool,
}

impl InMemoryUserStore {
    fn check(flag: &AtomicBool, op: &str) -> anyhow::Result<()> {
        if flag.load(Ordering::SeqCst) {
            anyhow::bail!("{op} refused");
        }
        Ok(())
    }

    fn update<F>(&self, id: Uuid, f: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id)?;
        f(user);
        user.updated_at = OffsetDateTime::now_utc();
        Some(user.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Self::check(&self.fail_lookups, "lookup")?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| {
                username.is_some_and(|n| u.username == n) || email.is_some_and(|e| u.email == e)
            })
            .cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        Self::check(&self.fail_writes, "insert")?;
        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(StoreError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            password_hash: new.password_hash,
            avatar: new.avatar,
            cover_image: new.cover_image,
            refresh_token: None,
            watch_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        self.update(id, |u| u.refresh_token = token.map(str::to_string));
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&id) {
            Some(u) if u.refresh_token.as_deref() == Some(expected) => {
                u.refresh_token = Some(next.to_string());
                u.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> anyhow::Result<()> {
        self.update(id, |u| {
            u.password_hash = hash.to_string();
            u.refresh_token = None;
        });
        Ok(())
    }

    async fn update_details(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        {
            let users = self.users.lock().unwrap();
            if users.values().any(|u| u.id != id && u.email == email) {
                return Err(StoreError::Duplicate);
            }
        }
        Ok(self.update(id, |u| {
            u.full_name = full_name.to_string();
            u.email = email.to_string();
        }))
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> anyhow::Result<Option<User>> {
        Self::check(&self.fail_writes, "update")?;
        Ok(self.update(id, |u| u.avatar = url.to_string()))
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<User>> {
        Self::check(&self.fail_writes, "update")?;
        Ok(self.update(id, |u| u.cover_image = Some(url.to_string())))
    }
}
