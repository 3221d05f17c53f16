//! Route-level authorization
//!
//! An ordered table of `(method, path pattern) -> access` rules. The first
//! rule matching the request decides; when none matches the request is denied.

use crate::{auth::middleware::AuthContext, error::AppError, models::user::Role};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Who may pass a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, authenticated or not
    Public,
    /// Any authenticated identity
    AuthenticatedAny,
    /// Authenticated identities holding one of these roles
    Roles(Vec<Role>),
}

/// Reason attached to a denial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => AppError::Unauthorized,
            DenyReason::Forbidden => AppError::Forbidden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{name}` or `*`: exactly one segment
    Single,
    /// `**`: any number of trailing segments, including none
    Rest,
}

/// Path pattern such as `/products/{id}` or `/products/**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, AppError> {
        let parts: Vec<&str> = split_path(pattern).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = if *part == "**" {
                if i + 1 != parts.len() {
                    return Err(AppError::Config(format!(
                        "'**' must be the last segment in pattern {}",
                        pattern
                    )));
                }
                Segment::Rest
            } else if *part == "*" || (part.starts_with('{') && part.ends_with('}') && part.len() > 2) {
                Segment::Single
            } else if part.contains(['{', '}', '*']) {
                return Err(AppError::Config(format!(
                    "Invalid segment '{}' in pattern {}",
                    part, pattern
                )));
            } else {
                Segment::Literal((*part).to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut path = split_path(path);

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if path.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => match path.next() {
                    Some(actual) if actual == expected => {}
                    _ => return false,
                },
            }
        }

        path.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// One row of the rule table; `method: None` matches every verb
#[derive(Debug, Clone)]
pub struct AuthorizationRule {
    pub method: Option<Method>,
    pub pattern: PathPattern,
    pub access: Access,
}

impl AuthorizationRule {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method
            .as_ref()
            .map_or(true, |m| method_matches(m, method))
            && self.pattern.matches(path)
    }
}

// HEAD is a GET without a body and is answered by the GET handler
fn method_matches(rule: &Method, request: &Method) -> bool {
    rule == request || (rule == Method::GET && request == Method::HEAD)
}

/// Ordered rule table, immutable once built
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    rules: Vec<AuthorizationRule>,
}

impl AuthorizationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; rules are evaluated in the order they are added
    pub fn rule(
        mut self,
        method: Option<Method>,
        pattern: &str,
        access: Access,
    ) -> Result<Self, AppError> {
        self.rules.push(AuthorizationRule {
            method,
            pattern: PathPattern::parse(pattern)?,
            access,
        });
        Ok(self)
    }

    pub fn rules(&self) -> &[AuthorizationRule] {
        &self.rules
    }

    /// Rule table for the catalog service
    pub fn catalog() -> Result<Self, AppError> {
        let any_role = || Access::Roles(vec![Role::User, Role::Admin]);
        let admin = || Access::Roles(vec![Role::Admin]);

        Self::new()
            .rule(Some(Method::POST), "/login", Access::Public)?
            .rule(Some(Method::POST), "/users/register", Access::Public)?
            .rule(Some(Method::GET), "/health", Access::Public)?
            .rule(Some(Method::GET), "/ready", Access::Public)?
            .rule(Some(Method::GET), "/users/me", Access::AuthenticatedAny)?
            .rule(Some(Method::GET), "/users/{username}", any_role())?
            .rule(Some(Method::PUT), "/users/{username}", any_role())?
            .rule(Some(Method::DELETE), "/users/{username}", any_role())?
            .rule(Some(Method::GET), "/users", admin())?
            .rule(Some(Method::GET), "/products/**", Access::Public)?
            .rule(Some(Method::POST), "/products", admin())?
            .rule(Some(Method::PUT), "/products/{id}", admin())?
            .rule(Some(Method::DELETE), "/products/{id}", admin())
    }

    /// Decide whether `identity` may call `method path`
    pub fn authorize(&self, method: &Method, path: &str, identity: Option<&AuthContext>) -> Decision {
        // CORS preflight never carries credentials
        if method == Method::OPTIONS {
            return Decision::Allow;
        }

        let Some(rule) = self.rules.iter().find(|r| r.matches(method, path)) else {
            return deny_default(identity);
        };

        match (&rule.access, identity) {
            (Access::Public, _) => Decision::Allow,
            (_, None) => Decision::Deny(DenyReason::Unauthenticated),
            (Access::AuthenticatedAny, Some(_)) => Decision::Allow,
            (Access::Roles(roles), Some(ctx)) if roles.contains(&ctx.role) => Decision::Allow,
            (Access::Roles(_), Some(_)) => Decision::Deny(DenyReason::Forbidden),
        }
    }
}

fn deny_default(identity: Option<&AuthContext>) -> Decision {
    match identity {
        Some(_) => Decision::Deny(DenyReason::Forbidden),
        None => Decision::Deny(DenyReason::Unauthenticated),
    }
}

/// 授权中间件：必须位于认证中间件之后
pub async fn authorization_middleware(
    State(policy): State<Arc<AuthorizationPolicy>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let decision = policy.authorize(
        req.method(),
        req.uri().path(),
        req.extensions().get::<AuthContext>(),
    );

    match decision {
        Decision::Allow => Ok(next.run(req).await),
        Decision::Deny(reason) => {
            tracing::info!(
                method = %req.method(),
                path = %req.uri().path(),
                username = req.extensions().get::<AuthContext>().map(|c| c.username.as_str()),
                reason = ?reason,
                "Request denied by authorization policy"
            );
            Err(reason.into())
        }
    }
}
