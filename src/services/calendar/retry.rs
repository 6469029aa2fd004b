// src/services/calendar/retry.rs

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::CalendarError;

/// Política de backoff exponencial com jitter.
/// A matemática é pura (`decide`); quem dorme e sorteia é o executor do gateway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries além da primeira tentativa (3 = 4 tentativas no total)
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
    /// Fração máxima de jitter somada ao atraso base (0.3 = até +30%)
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2,
            max_backoff: Duration::from_secs(30),
            jitter_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    const STOP: RetryDecision = RetryDecision { retry: false, delay: Duration::ZERO };
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Atraso base antes do jitter: initial * multiplier^(attempt-1), limitado a max_backoff.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// `attempt` é o número da tentativa que acabou de falhar (1 = primeira chamada).
    /// `jitter` é uma amostra em [0, 1).
    pub fn decide(&self, attempt: u32, error: &CalendarError, jitter: f64) -> RetryDecision {
        if !error.kind.is_retryable() || attempt > self.max_retries {
            return RetryDecision::STOP;
        }

        // A dica do provedor manda, mas continua limitada ao teto
        let delay = match error.retry_after {
            Some(hint) => hint.min(self.max_backoff),
            None => {
                let base = self.base_delay(attempt);
                let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
                let extra = base.mul_f64(self.jitter_ratio.max(0.0) * jitter);
                (base + extra).min(self.max_backoff)
            }
        };

        RetryDecision { retry: true, delay }
    }
}

// --- Dependências de runtime (trocadas nos testes) ---

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub trait JitterSource: Send + Sync {
    /// Amostra em [0, 1)
    fn sample(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }
}
