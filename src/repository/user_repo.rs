//! Credential store (数据访问层)

use crate::{
    error::AppError,
    models::user::{Identity, Role},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Lookup of stored identities by username
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 根据用户名查找用户
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AppError>;

    /// 创建用户，用户名已存在时返回 Conflict
    async fn create(&self, identity: Identity) -> Result<Identity, AppError>;

    /// 列出所有用户（按用户名排序）
    async fn list(&self) -> Result<Vec<Identity>, AppError>;

    /// 替换密码哈希，返回 None 表示用户不存在
    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<Identity>, AppError>;

    /// 返回 false 表示用户不存在
    async fn delete(&self, username: &str) -> Result<bool, AppError>;

    /// 存储是否可用
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// In-process credential store
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<BTreeMap<String, Identity>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.username.clone(), u)).collect()),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AppError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, identity: Identity) -> Result<Identity, AppError> {
        let mut users = self.users.write().await;
        if users.contains_key(&identity.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                identity.username
            )));
        }
        users.insert(identity.username.clone(), identity.clone());
        Ok(identity)
    }

    async fn list(&self) -> Result<Vec<Identity>, AppError> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<Identity>, AppError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(username).map(|identity| {
            identity.password_hash = password_hash.to_string();
            identity.clone()
        }))
    }

    async fn delete(&self, username: &str) -> Result<bool, AppError> {
        Ok(self.users.write().await.remove(username).is_some())
    }
}

/// PostgreSQL-backed credential store
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AppError> {
        let user = sqlx::query_as::<_, Identity>(
            "SELECT username, password_hash, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn create(&self, identity: Identity) -> Result<Identity, AppError> {
        let user = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO users (username, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING username, password_hash, role, created_at
            "#,
        )
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .fetch_optional(&self.db)
        .await?;

        user.ok_or_else(|| {
            AppError::Conflict(format!("Username '{}' is already taken", identity.username))
        })
    }

    async fn list(&self) -> Result<Vec<Identity>, AppError> {
        let users = sqlx::query_as::<_, Identity>(
            "SELECT username, password_hash, role, created_at FROM users ORDER BY username",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<Identity>, AppError> {
        let user = sqlx::query_as::<_, Identity>(
            r#"
            UPDATE users SET password_hash = $2
            WHERE username = $1
            RETURNING username, password_hash, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn delete(&self, username: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Insert the configured administrator unless the username already exists
pub async fn ensure_admin(
    store: &dyn CredentialStore,
    username: &str,
    password_hash: String,
) -> Result<(), AppError> {
    if store.find_by_username(username).await?.is_some() {
        tracing::debug!(username = %username, "Bootstrap admin already present");
        return Ok(());
    }

    store
        .create(Identity::new(username, password_hash, Role::Admin))
        .await?;
    tracing::info!(username = %username, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_find_and_create() {
        let store = InMemoryCredentialStore::with_users([Identity::new("alice", "h1", Role::User)]);

        assert!(store.find_by_username("alice").await.unwrap().is_some());
        assert!(store.find_by_username("ghost").await.unwrap().is_none());

        store.create(Identity::new("bob", "h2", Role::Admin)).await.unwrap();
        let bob = store.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_in_memory_duplicate_username() {
        let store = InMemoryCredentialStore::new();
        store.create(Identity::new("alice", "h1", Role::User)).await.unwrap();

        let err = store.create(Identity::new("alice", "h2", Role::Admin)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // original record untouched
        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.password_hash, "h1");
    }

    #[tokio::test]
    async fn test_in_memory_update_password_and_delete() {
        let store = InMemoryCredentialStore::with_users([Identity::new("alice", "h1", Role::User)]);

        let updated = store.update_password("alice", "h2").await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "h2");
        assert_eq!(updated.role, Role::User);
        assert!(store.update_password("ghost", "h3").await.unwrap().is_none());

        assert!(store.delete("alice").await.unwrap());
        assert!(!store.delete("alice").await.unwrap());
        assert!(store.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_by_username() {
        let store = InMemoryCredentialStore::with_users([
            Identity::new("carol", "h", Role::User),
            Identity::new("alice", "h", Role::User),
        ]);

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = InMemoryCredentialStore::new();

        ensure_admin(&store, "root", "h1".to_string()).await.unwrap();
        ensure_admin(&store, "root", "h2".to_string()).await.unwrap();

        let root = store.find_by_username("root").await.unwrap().unwrap();
        assert_eq!(root.role, Role::Admin);
        assert_eq!(root.password_hash, "h1");
    }
}
