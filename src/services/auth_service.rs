//! 认证服务：登录、注册

use crate::{
    auth::{
        jwt::JwtService,
        password::{PasswordHasher, VerifyError},
    },
    config::AppConfig,
    error::AppError,
    models::user::{Identity, Role},
    repository::CredentialStore,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Why a login attempt did not produce a token
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("user not found")]
    NotFound,

    #[error("bad credentials")]
    BadCredentials,

    #[error("credential store failure: {0}")]
    Store(#[from] AppError),
}

impl LoginError {
    fn outcome(&self) -> &'static str {
        match self {
            LoginError::NotFound => "not_found",
            LoginError::BadCredentials => "bad_credentials",
            LoginError::Store(_) => "error",
        }
    }
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
    jwt_service: Arc<JwtService>,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<PasswordHasher>,
        jwt_service: Arc<JwtService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            hasher,
            jwt_service,
            config,
        }
    }

    /// 用户登录，成功时返回签名令牌
    pub async fn login(&self, username: &str, password: &str) -> Result<String, LoginError> {
        self.login_at(username, password, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<String, LoginError> {
        let result = self.authenticate(username, password, now).await;

        // 审计日志：只记录用户名与结果，绝不记录密码或令牌
        match &result {
            Ok(_) => {
                tracing::info!(target: "audit", username = %username, outcome = "success", "Login");
            }
            Err(LoginError::Store(e)) => {
                tracing::error!(target: "audit", username = %username, outcome = "error", error = %e, "Login");
            }
            Err(e) => {
                tracing::warn!(target: "audit", username = %username, outcome = e.outcome(), "Login");
            }
        }

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);

        result
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<String, LoginError> {
        let identity = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(LoginError::NotFound)?;

        match self.hasher.check(password, &identity.password_hash) {
            Ok(()) => {}
            Err(VerifyError::Mismatch) => return Err(LoginError::BadCredentials),
            Err(VerifyError::MalformedHash) => {
                tracing::warn!(
                    username = %identity.username,
                    "Stored password hash is malformed; treating as failed verification"
                );
                return Err(LoginError::BadCredentials);
            }
        }

        Ok(self.jwt_service.issue(&identity.username, identity.role, now)?)
    }

    /// 自助注册，总是创建 USER 角色
    pub async fn register(&self, username: &str, password: &str) -> Result<Identity, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest("Username must not be empty".to_string()));
        }

        PasswordHasher::validate_password_policy(password, &self.config)?;

        let password_hash = self.hasher.hash(password)?;
        let identity = self
            .store
            .create(Identity::new(username, password_hash, Role::User))
            .await?;

        tracing::info!(target: "audit", username = %identity.username, "User registered");
        Ok(identity)
    }

    /// 修改密码
    ///
    /// `current_password` 为 Some 时必须与现有密码一致（本人修改）；
    /// 管理员重置他人密码时传 None。
    pub async fn change_password(
        &self,
        username: &str,
        new_password: &str,
        current_password: Option<&str>,
    ) -> Result<Identity, AppError> {
        let identity = self
            .store
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if let Some(current) = current_password {
            if self.hasher.check(current, &identity.password_hash).is_err() {
                tracing::warn!(target: "audit", username = %username, outcome = "bad_credentials", "Password change");
                return Err(AppError::Unauthorized);
            }
        }

        PasswordHasher::validate_password_policy(new_password, &self.config)?;
        let password_hash = self.hasher.hash(new_password)?;

        let updated = self
            .store
            .update_password(username, &password_hash)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!(target: "audit", username = %username, outcome = "success", "Password change");
        Ok(updated)
    }

    /// 登录失败是否对客户端统一表现为 401
    pub fn uniform_login_failure(&self) -> bool {
        self.config.security.uniform_login_failure
    }
}

impl From<LoginError> for AppError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::NotFound => AppError::NotFound("User not found".to_string()),
            LoginError::BadCredentials => AppError::Unauthorized,
            LoginError::Store(e) => e,
        }
    }
}
