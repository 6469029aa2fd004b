// src/models/auth.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// O site emite os tokens; aqui só validamos e lemos os claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub email: String,
    pub role: Role,
    // Plano do cliente ("subscriber" libera reuniões recorrentes)
    #[serde(default)]
    pub tier: Option<String>,
    pub exp: usize, // Expiration time (quando o token expira)
    #[serde(default)]
    pub iat: usize, // Issued At (quando o token foi criado)
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_subscriber(&self) -> bool {
        self.is_admin() || self.tier.as_deref() == Some("subscriber")
    }
}
