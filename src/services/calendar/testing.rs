// src/services/calendar/testing.rs
//
// Fakes do provedor e do runtime de retry, compartilhados pelos testes do gateway e dos serviços.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use super::{
    retry::{JitterSource, Sleeper},
    CalendarProvider, ProviderFailure,
};
use crate::models::calendar::{CalendarEvent, CalendarEventRequest};

type Scripted<T> = Mutex<VecDeque<Result<T, ProviderFailure>>>;

/// Provedor roteirizado: devolve as respostas na ordem, conta as chamadas e guarda o que recebeu.
/// Fila de criação vazia: usa `fallback` se houver, senão responde 500.
#[derive(Default)]
pub struct ScriptedProvider {
    creates: Scripted<CalendarEvent>,
    deletes: Scripted<()>,
    fallback: Option<CalendarEvent>,
    calls: AtomicUsize,
    pub created: Mutex<Vec<CalendarEventRequest>>,
    pub updated: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn creating(responses: Vec<Result<CalendarEvent, ProviderFailure>>) -> Self {
        Self { creates: Mutex::new(responses.into()), ..Self::default() }
    }

    pub fn deleting(responses: Vec<Result<(), ProviderFailure>>) -> Self {
        Self { deletes: Mutex::new(responses.into()), ..Self::default() }
    }

    /// Toda criação/edição dá certo com o mesmo evento.
    pub fn always(event: CalendarEvent) -> Self {
        Self { fallback: Some(event), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_event(&self) -> Result<CalendarEvent, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.creates.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| match &self.fallback {
            Some(event) => Ok(event.clone()),
            None => Err(ProviderFailure::http(500, "")),
        })
    }
}

#[async_trait]
impl CalendarProvider for ScriptedProvider {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEvent, ProviderFailure> {
        self.created.lock().unwrap().push(request.clone());
        self.next_event()
    }

    async fn update_event(
        &self,
        event_id: &str,
        _request: &CalendarEventRequest,
    ) -> Result<CalendarEvent, ProviderFailure> {
        self.updated.lock().unwrap().push(event_id.to_string());
        self.next_event()
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deleted.lock().unwrap().push(event_id.to_string());
        self.deletes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Não dorme: só anota quanto teria esperado.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self) -> f64 {
        0.0
    }
}
