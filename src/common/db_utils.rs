// src/common/db_utils.rs

use sqlx::{Executor, Postgres};

use crate::common::error::AppError;

// Namespaces dos advisory locks (primeiro argumento de pg_advisory_xact_lock(int, int))
pub(crate) const SLOT_DAY_LOCK: i32 = 7_101;
pub(crate) const RECURRING_MEETING_LOCK: i32 = 7_102;

// ---
// Helper de Lock: serializa escritores da mesma "chave" até o fim da transação
// ---
/// Adquire um advisory lock com escopo de transação.
/// Precisa rodar dentro de uma transação aberta; o Postgres libera no COMMIT/ROLLBACK.
pub(crate) async fn acquire_xact_lock<'e, E>(
    executor: E,
    namespace: i32,
    key: i32,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(namespace)
        .bind(key)
        .execute(executor)
        .await?;

    Ok(())
}

/// Chave de lock estável derivada de um UUID (os 4 primeiros bytes bastam para espalhar).
pub(crate) fn uuid_lock_key(id: uuid::Uuid) -> i32 {
    let bytes = id.as_bytes();
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
