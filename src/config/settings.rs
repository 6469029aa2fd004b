// src/config/settings.rs

use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::services::calendar::retry::RetryPolicy;

/// Regras de agenda que antes eram constantes soltas.
/// Cada serviço recebe uma cópia no construtor, então testes podem sobrescrever à vontade.
#[derive(Debug, Clone)]
pub struct SchedulingSettings {
    /// Quantos dias à frente o cliente pode reservar (padrão de negócio: 60)
    pub max_days_ahead: i64,
    pub min_slot_minutes: i64,
    /// Antecedência mínima para janelas do próprio dia
    pub min_notice_minutes: i64,
    /// Fuso único do negócio (ex: -03:00)
    pub business_offset: FixedOffset,
    /// Quantas ocorrências gerar por regra a cada rodada
    pub occurrence_batch: usize,
    pub occurrence_horizon_days: i64,
    pub reminder_lead_days: i64,
    /// Intervalo do job periódico. `None` desliga o job.
    pub job_interval: Option<Duration>,
    pub calendar: CalendarSettings,
}

#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub retry: RetryPolicy,
    /// Prazo total da chamada (incluindo todas as esperas de retry)
    pub operation_deadline: Duration,
    pub fallback: FallbackContact,
    /// `None` quando a integração não está configurada no ambiente
    pub google: Option<GoogleCalendarSettings>,
}

#[derive(Debug, Clone)]
pub struct FallbackContact {
    pub phone: String,
    pub video_instructions: String,
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarSettings {
    pub base_url: String,
    pub calendar_id: String,
    pub access_token: String,
    pub time_zone: String,
    pub request_timeout: Duration,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            max_days_ahead: 60,
            min_slot_minutes: 30,
            min_notice_minutes: 60,
            business_offset: FixedOffset::west_opt(3 * 3600).expect("offset fixo -03:00 é válido"),
            occurrence_batch: 12,
            occurrence_horizon_days: 90,
            reminder_lead_days: 1,
            job_interval: None,
            calendar: CalendarSettings::default(),
        }
    }
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            operation_deadline: Duration::from_secs(120),
            fallback: FallbackContact {
                phone: "+55 11 4000-0000".to_string(),
                video_instructions: "Enviaremos o link da videochamada por e-mail antes da reunião.".to_string(),
            },
            google: None,
        }
    }
}

impl SchedulingSettings {
    // Lê as variáveis de ambiente; tudo tem padrão, menos as credenciais do calendário.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let offset_minutes: i32 = env_or("BUSINESS_UTC_OFFSET_MINUTES", -180)?;
        let business_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("BUSINESS_UTC_OFFSET_MINUTES fora do intervalo: {offset_minutes}"))?;

        let job_interval_secs: u64 = env_or("SCHEDULER_JOB_INTERVAL_SECS", 0)?;

        let retry = RetryPolicy {
            max_retries: env_or("CALENDAR_MAX_RETRIES", defaults.calendar.retry.max_retries)?,
            initial_backoff: Duration::from_millis(env_or("CALENDAR_INITIAL_BACKOFF_MS", 1_000)?),
            max_backoff: Duration::from_millis(env_or("CALENDAR_MAX_BACKOFF_MS", 30_000)?),
            ..defaults.calendar.retry
        };

        let google = match (env::var("GOOGLE_CALENDAR_ID"), env::var("GOOGLE_CALENDAR_TOKEN")) {
            (Ok(calendar_id), Ok(access_token)) => Some(GoogleCalendarSettings {
                base_url: env::var("GOOGLE_CALENDAR_BASE_URL")
                    .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string()),
                calendar_id,
                access_token,
                time_zone: env::var("BUSINESS_TIME_ZONE").unwrap_or_else(|_| "America/Sao_Paulo".to_string()),
                request_timeout: Duration::from_secs(env_or("GOOGLE_CALENDAR_REQUEST_TIMEOUT_SECS", 20)?),
            }),
            _ => None,
        };

        Ok(Self {
            max_days_ahead: env_or("BOOKING_MAX_DAYS_AHEAD", defaults.max_days_ahead)?,
            min_slot_minutes: env_or("SLOT_MIN_MINUTES", defaults.min_slot_minutes)?,
            min_notice_minutes: env_or("BOOKING_MIN_NOTICE_MINUTES", defaults.min_notice_minutes)?,
            business_offset,
            occurrence_batch: env_or("OCCURRENCE_BATCH", defaults.occurrence_batch)?,
            occurrence_horizon_days: env_or("OCCURRENCE_HORIZON_DAYS", defaults.occurrence_horizon_days)?,
            reminder_lead_days: env_or("REMINDER_LEAD_DAYS", defaults.reminder_lead_days)?,
            job_interval: (job_interval_secs > 0).then(|| Duration::from_secs(job_interval_secs)),
            calendar: CalendarSettings {
                retry,
                operation_deadline: Duration::from_secs(env_or("CALENDAR_DEADLINE_SECS", 120)?),
                fallback: FallbackContact {
                    phone: env::var("FALLBACK_CONTACT_PHONE").unwrap_or(defaults.calendar.fallback.phone),
                    video_instructions: env::var("FALLBACK_VIDEO_INSTRUCTIONS")
                        .unwrap_or(defaults.calendar.fallback.video_instructions),
                },
                google,
            },
        })
    }

    /// "Hoje" no fuso do negócio.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.business_offset).date_naive()
    }

    pub fn local_now(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.business_offset)
    }

    pub fn at_business_time(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
        self.business_offset
            .from_local_datetime(&date.and_time(time))
            .single()
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Variável {key} inválida ({raw}): {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_uses_business_offset() {
        let settings = SchedulingSettings::default();
        // 01:30 UTC ainda é o dia anterior em -03:00
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 1, 30, 0).unwrap();
        assert_eq!(settings.today(now), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }

    #[test]
    fn defaults_match_business_rules() {
        let settings = SchedulingSettings::default();
        assert_eq!(settings.max_days_ahead, 60);
        assert_eq!(settings.min_slot_minutes, 30);
        assert_eq!(settings.calendar.retry.max_retries, 3);
        assert_eq!(settings.calendar.operation_deadline, Duration::from_secs(120));
    }
}
