// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Account registration, credential checks and bearer tokens

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::db::{Database, PublicUser};
use crate::error::FieldError;
use crate::{MindflowError, Result};

const MIN_PASSWORD_LEN: usize = 6;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body returned by login and register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PublicUser,
}

/// Issues and checks credentials against the users table
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    encoding: EncodingKey,
    decoding: DecodingKey,
    bcrypt_cost: u32,
    token_ttl_secs: Option<u64>,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

impl RegisterRequest {
    /// Check fields and return (email, password, display name)
    fn validate(self) -> Result<(String, String, String)> {
        let mut errors = Vec::new();

        let email = normalize_email(self.email.as_deref().unwrap_or_default());
        if email.is_empty() {
            errors.push(FieldError::new("email", "email should not be empty"));
        } else if !looks_like_email(&email) {
            errors.push(FieldError::new("email", "email must be an email"));
        }

        let password = self.password.unwrap_or_default();
        if password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                format!("password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        if !errors.is_empty() {
            return Err(MindflowError::Validation(errors));
        }

        let name = match self.name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => email.split('@').next().unwrap_or_default().to_string(),
        };

        Ok((email, password, name))
    }
}

impl LoginRequest {
    fn validate(self) -> Result<(String, String)> {
        let mut errors = Vec::new();
        let email = normalize_email(self.email.as_deref().unwrap_or_default());
        if email.is_empty() {
            errors.push(FieldError::new("email", "email should not be empty"));
        }
        let password = self.password.unwrap_or_default();
        if password.is_empty() {
            errors.push(FieldError::new("password", "password should not be empty"));
        }
        if errors.is_empty() {
            Ok((email, password))
        } else {
            Err(MindflowError::Validation(errors))
        }
    }
}

impl AuthService {
    pub fn new(db: Database, config: &AuthConfig) -> Self {
        Self {
            db,
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            bcrypt_cost: config.bcrypt_cost,
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    /// Return the account without its hash when the password matches
    pub async fn validate_user(&self, email: &str, password: &str) -> Result<Option<PublicUser>> {
        let Some(user) = self.db.find_user_by_email(&normalize_email(email))? else {
            debug!("Login attempt for unknown email");
            return Ok(None);
        };

        let candidate = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash)).await??;

        Ok(matches.then(|| user.into()))
    }

    /// Sign a token for an already-authenticated user
    pub fn login(&self, user: PublicUser) -> Result<AuthResponse> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            iat: now,
            exp: self.token_ttl_secs.map(|ttl| now + ttl as i64),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(AuthResponse { access_token, user })
    }

    /// Check credentials and sign a token, or fail with 401
    pub async fn authenticate(&self, request: LoginRequest) -> Result<AuthResponse> {
        let (email, password) = request.validate()?;
        match self.validate_user(&email, &password).await? {
            Some(user) => {
                info!("User {} logged in", user.id);
                self.login(user)
            }
            None => Err(MindflowError::Unauthorized("Invalid credentials".to_string())),
        }
    }

    /// Hash the password with a fresh salt, store the account and log it in
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let (email, password, name) = request.validate()?;

        let cost = self.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let user = self.db.insert_user(&email, &hash, &name)?;
        info!("Registered user {}", user.id);
        self.login(user.into())
    }

    /// Decode a bearer token and check its signature
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        if self.token_ttl_secs.is_some() {
            validation.set_required_spec_claims(&["exp"]);
        } else {
            validation.set_required_spec_claims::<&str>(&[]);
            validation.validate_exp = false;
        }
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| MindflowError::Unauthorized(format!("Invalid token: {}", e)))?;
        Ok(data.claims)
    }

    /// Profile of the account a token was issued to
    pub fn current_user(&self, user_id: &str) -> Result<PublicUser> {
        self.db
            .find_user_by_id(user_id)?
            .map(PublicUser::from)
            .ok_or_else(|| MindflowError::Unauthorized("Account no longer exists".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let config = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            bcrypt_cost: 4,
            token_ttl_secs: None,
        };
        AuthService::new(Database::in_memory().unwrap(), &config)
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            name: Some("Robin".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_then_login_token_carries_user_id() {
        let auth = service();
        let registered = auth.register(register_request("robin@example.com", "hunter22")).await.unwrap();

        let logged_in = auth
            .authenticate(LoginRequest {
                email: Some("Robin@Example.com ".to_string()),
                password: Some("hunter22".to_string()),
            })
            .await
            .unwrap();

        let claims = auth.verify_token(&logged_in.access_token).unwrap();
        assert_eq!(claims.sub, registered.user.id);
        assert_eq!(claims.email, "robin@example.com");
        assert!(claims.exp.is_none());
        assert_eq!(logged_in.user.name, "Robin");
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let auth = service();
        auth.register(register_request("robin@example.com", "hunter22")).await.unwrap();

        let err = auth
            .authenticate(LoginRequest {
                email: Some("robin@example.com".to_string()),
                password: Some("hunter23".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MindflowError::Unauthorized(_)));
        assert!(auth.validate_user("nobody@example.com", "hunter22").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let auth = service();
        auth.register(register_request("robin@example.com", "hunter22")).await.unwrap();
        let stored = auth.db.find_user_by_email("robin@example.com").unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter22");
        assert!(stored.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let auth = service();
        auth.register(register_request("robin@example.com", "hunter22")).await.unwrap();
        let err = auth.register(register_request("ROBIN@example.com", "another1")).await.unwrap_err();
        assert!(matches!(err, MindflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_validation_lists_fields() {
        let auth = service();
        let err = auth.register(register_request("not-an-email", "123")).await.unwrap_err();
        match err {
            MindflowError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "password"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_name_defaults_to_email_local_part() {
        let auth = service();
        let mut request = register_request("sam@example.com", "hunter22");
        request.name = None;
        let response = auth.register(request).await.unwrap();
        assert_eq!(response.user.name, "sam");
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let auth = service();
        let other = AuthService::new(
            Database::in_memory().unwrap(),
            &AuthConfig {
                jwt_secret: "different".to_string(),
                bcrypt_cost: 4,
                token_ttl_secs: None,
            },
        );
        let user = PublicUser {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            name: "U".to_string(),
        };
        let token = other.login(user).unwrap().access_token;
        assert!(matches!(auth.verify_token(&token), Err(MindflowError::Unauthorized(_))));
        assert!(auth.verify_token("garbage").is_err());
    }

    #[test]
    fn test_ttl_adds_expiry() {
        let auth = AuthService::new(
            Database::in_memory().unwrap(),
            &AuthConfig {
                jwt_secret: "test-secret".to_string(),
                bcrypt_cost: 4,
                token_ttl_secs: Some(3600),
            },
        );
        let user = PublicUser {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            name: "U".to_string(),
        };
        let token = auth.login(user).unwrap().access_token;
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.exp, Some(claims.iat + 3600));
    }
}
