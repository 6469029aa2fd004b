// src/middleware/auth.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{common::error::AppError, config::AppState, models::auth::Claims};

// Os tokens vêm do site (mesmo segredo HS256); aqui só validamos.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token rejeitado: {}", e);
            AppError::InvalidToken
        })
}

// Extrator para obter o usuário autenticado diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::InvalidToken)?;

        decode_claims(bearer.token(), &state.jwt_secret).map(AuthenticatedUser)
    }
}

// Mesmo token, mas exige role = admin
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(AppError::Forbidden("Apenas administradores".to_string()));
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn token_for(role: Role, exp: usize, secret: &str) -> (Uuid, String) {
        let sub = Uuid::new_v4();
        let claims = Claims {
            sub,
            email: "cliente@empresa.com".to_string(),
            role,
            tier: Some("subscriber".to_string()),
            exp,
            iat: 0,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
        (sub, token)
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3_600) as usize
    }

    #[test]
    fn valid_token_yields_claims() {
        let (sub, token) = token_for(Role::Customer, far_future(), "segredo");
        let claims = decode_claims(&token, "segredo").unwrap();
        assert_eq!(claims.sub, sub);
        assert!(claims.is_subscriber());
        assert!(!claims.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (_, token) = token_for(Role::Admin, far_future(), "segredo");
        assert!(matches!(decode_claims(&token, "outro"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let (_, token) = token_for(Role::Admin, 1_000, "segredo");
        assert!(matches!(decode_claims(&token, "segredo"), Err(AppError::InvalidToken)));
    }
}
