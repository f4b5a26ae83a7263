use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

pub use crate::entity::users::Role;
use crate::{
    config::{AppConfig, AuthMode},
    dto::auth::Claims,
    error::AppError,
    state::AppState,
};

/// The authenticated caller, resolved once per request and passed explicitly
/// into every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn seller(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Seller,
        }
    }

    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }
}

/// How requests are authenticated and authorized.
///
/// `PassThrough` is only built from development configuration: requests
/// without a token act as the configured development user and role checks
/// are skipped.
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    Enforce { secret: String },
    PassThrough { secret: String, dev_principal: Principal },
}

impl AuthPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let secret = config.jwt_secret.clone();
        match (config.auth_mode, &config.dev_user) {
            (AuthMode::Dev, Some(dev)) => {
                tracing::warn!(user_id = %dev.user_id, "authentication pass-through enabled");
                AuthPolicy::PassThrough {
                    secret,
                    dev_principal: Principal {
                        user_id: dev.user_id,
                        role: dev.role,
                    },
                }
            }
            _ => AuthPolicy::Enforce { secret },
        }
    }

    pub fn secret(&self) -> &str {
        match self {
            AuthPolicy::Enforce { secret } | AuthPolicy::PassThrough { secret, .. } => secret,
        }
    }

    /// Resolve the caller from an `Authorization` header value.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal, AppError> {
        let Some(auth_str) = authorization else {
            return match self {
                AuthPolicy::Enforce { .. } => Err(AppError::Unauthorized),
                AuthPolicy::PassThrough { dev_principal, .. } => Ok(dev_principal.clone()),
            };
        };

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AppError::Unauthorized)?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret().as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| {
            tracing::debug!(error = %err, "rejected bearer token");
            AppError::Unauthorized
        })?;

        let user_id =
            Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthorized)?;
        let role = decoded
            .claims
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized)?;

        Ok(Principal { user_id, role })
    }

    /// Returns the seller id the caller acts for, or `Forbidden`.
    pub fn require_seller(&self, principal: &Principal) -> Result<Uuid, AppError> {
        match self {
            AuthPolicy::Enforce { .. } if !principal.is_seller() => Err(AppError::Forbidden),
            _ => Ok(principal.user_id),
        }
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let authorization = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| AppError::Unauthorized)?),
            None => None,
        };
        state.auth.authenticate(authorization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, sub: Uuid, role: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            role: role.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn enforce() -> AuthPolicy {
        AuthPolicy::Enforce {
            secret: "test-secret".into(),
        }
    }

    #[test]
    fn missing_header_is_unauthorized_when_enforcing() {
        assert!(matches!(enforce().authenticate(None), Err(AppError::Unauthorized)));
    }

    #[test]
    fn valid_token_yields_principal() {
        let id = Uuid::new_v4();
        let header = format!("Bearer {}", token("test-secret", id, "SELLER"));
        let principal = enforce().authenticate(Some(&header)).unwrap();
        assert_eq!(principal, Principal::seller(id));
        assert!(principal.is_seller());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let header = format!("Bearer {}", token("other", Uuid::new_v4(), "CUSTOMER"));
        assert!(matches!(
            enforce().authenticate(Some(&header)),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn customers_cannot_act_as_sellers() {
        let customer = Principal::customer(Uuid::new_v4());
        assert!(matches!(
            enforce().require_seller(&customer),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn pass_through_uses_dev_principal_and_skips_role_checks() {
        let dev = Principal::customer(Uuid::new_v4());
        let policy = AuthPolicy::PassThrough {
            secret: "test-secret".into(),
            dev_principal: dev.clone(),
        };
        assert_eq!(policy.authenticate(None).unwrap(), dev);
        assert_eq!(policy.require_seller(&dev).unwrap(), dev.user_id);
    }
}
