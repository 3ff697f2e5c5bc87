use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};

use crate::decoder::StreamDecoder;
use crate::render::{self, Presentation, Segment};
use crate::timer::{self, ExchangeTimer};
use crate::transport::{FragmentStream, QueryTransport};

macro_rules! debug_eprintln {
    ($($arg:tt)*) => {
        if std::env::var("RAGDESK_DEBUG").is_ok() {
            eprintln!($($arg)*);
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Idle,
    Submitting,
    Streaming,
    Finalizing,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Submit,
    Fragment,
    Terminal,
    Failure(String),
    Settled,
}

/// Side effect the caller performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LockInput,
    Render,
    AttachElapsed,
    ShowError(String),
    UnlockInput,
    Ignore,
}

/// Phase machine for one exchange. Every pair is accepted; events that make
/// no sense in a phase are ignored or end the exchange, never wedge it.
pub fn transition(phase: ExchangePhase, event: &Event) -> (ExchangePhase, Effect) {
    use ExchangePhase::*;

    match (phase, event) {
        (Idle, Event::Submit) => (Submitting, Effect::LockInput),
        (Idle, _) => (Idle, Effect::Ignore),

        (Submitting | Streaming, Event::Fragment) => (Streaming, Effect::Render),
        (Submitting | Streaming, Event::Terminal) => (Finalizing, Effect::AttachElapsed),
        (Submitting | Streaming, Event::Failure(detail)) => (Errored, Effect::ShowError(detail.clone())),
        (Submitting | Streaming, Event::Settled) => (
            Errored,
            Effect::ShowError("stream closed unexpectedly".to_string()),
        ),

        (Finalizing | Errored, Event::Settled) => (Idle, Effect::UnlockInput),
        (p, _) => (p, Effect::Ignore),
    }
}

/// What the transport reports for an in-flight query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Fragment(String),
    Done,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
    System,
}

/// One message in the chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRecord {
    pub role: Role,
    /// Formatted markup for the message body.
    pub content: String,
    pub presentation: Presentation,
    pub error: Option<String>,
    pub elapsed: Option<Duration>,
}

impl ExchangeRecord {
    fn from_presentation(role: Role, presentation: Presentation) -> Self {
        ExchangeRecord {
            role,
            content: presentation.markup(),
            presentation,
            error: None,
            elapsed: None,
        }
    }

    fn user(query: &str) -> Self {
        let presentation = Presentation {
            thinking: false,
            body: vec![Segment::Text(query.to_string())],
            badges: Vec::new(),
        };
        Self::from_presentation(Role::User, presentation)
    }

    fn system(text: &str) -> Self {
        let presentation = Presentation {
            thinking: false,
            body: render::format_text(text),
            badges: Vec::new(),
        };
        Self::from_presentation(Role::System, presentation)
    }

    pub fn elapsed_label(&self) -> Option<String> {
        self.elapsed.map(timer::format_elapsed)
    }
}

struct ActiveExchange {
    decoder: StreamDecoder,
    timer: ExchangeTimer,
    bot: usize,
}

/// Chat history plus the single in-flight exchange.
pub struct Conversation {
    records: Vec<ExchangeRecord>,
    phase: ExchangePhase,
    active: Option<ActiveExchange>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Conversation {
            records: Vec::new(),
            phase: ExchangePhase::Idle,
            active: None,
        }
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    pub fn records(&self) -> &[ExchangeRecord] {
        &self.records
    }

    pub fn is_busy(&self) -> bool {
        self.phase != ExchangePhase::Idle
    }

    pub fn can_submit(&self, input: &str) -> bool {
        !self.is_busy() && !input.trim().is_empty()
    }

    /// Adds an informational message; `**text**` is emphasised.
    pub fn add_system(&mut self, text: &str) {
        self.records.push(ExchangeRecord::system(text));
    }

    /// Starts an exchange. Returns the trimmed query, or `None` when the
    /// input is blank or another exchange is still in flight.
    pub fn submit(&mut self, input: &str) -> Option<String> {
        let query = input.trim();
        if query.is_empty() {
            return None;
        }

        let (next, effect) = transition(self.phase, &Event::Submit);
        if effect != Effect::LockInput {
            return None;
        }
        self.phase = next;

        self.records.push(ExchangeRecord::user(query));
        self.records
            .push(ExchangeRecord::from_presentation(Role::Bot, Presentation::thinking()));
        self.active = Some(ActiveExchange {
            decoder: StreamDecoder::new(),
            timer: ExchangeTimer::start(),
            bot: self.records.len() - 1,
        });

        debug_eprintln!("[exchange] submitted {:?}", query);
        Some(query.to_string())
    }

    /// Applies one transport event and returns the effect that was performed.
    pub fn apply(&mut self, event: TransportEvent) -> Effect {
        let machine_event = match &event {
            TransportEvent::Fragment(_) => Event::Fragment,
            TransportEvent::Done => Event::Terminal,
            TransportEvent::Failed(detail) => Event::Failure(detail.clone()),
        };
        let (next, effect) = transition(self.phase, &machine_event);
        debug_eprintln!("[exchange] {:?} -> {:?} ({:?})", self.phase, next, effect);
        self.phase = next;

        if effect == Effect::Ignore {
            return effect;
        }
        let Some(active) = self.active.as_mut() else {
            self.phase = ExchangePhase::Idle;
            return Effect::Ignore;
        };

        match (&effect, event) {
            (Effect::Render, TransportEvent::Fragment(text)) => {
                let frame = active.decoder.push(&text);
                show(&mut self.records[active.bot], render::project(&frame));
            }
            (Effect::AttachElapsed, _) => {
                let frame = active.decoder.finish();
                let record = &mut self.records[active.bot];
                show(record, render::project(&frame));
                record.elapsed = Some(active.timer.elapsed());
                self.settle();
            }
            (Effect::ShowError(detail), _) => {
                let record = &mut self.records[active.bot];
                record.content = format!("<p class=\"error\">Error: {}</p>", detail);
                record.presentation = Presentation {
                    thinking: false,
                    body: Vec::new(),
                    badges: Vec::new(),
                };
                record.error = Some(detail.clone());
                self.settle();
            }
            _ => {}
        }
        effect
    }

    fn settle(&mut self) {
        let (next, _) = transition(self.phase, &Event::Settled);
        self.phase = next;
        self.active = None;
    }
}

fn show(record: &mut ExchangeRecord, presentation: Presentation) {
    record.content = presentation.markup();
    record.presentation = presentation;
}

enum DriveState {
    Connect(Arc<dyn QueryTransport>, String),
    Read(FragmentStream),
    Closed,
}

async fn read_next(mut fragments: FragmentStream) -> Option<(TransportEvent, DriveState)> {
    match fragments.next().await {
        Some(Ok(text)) => Some((TransportEvent::Fragment(text), DriveState::Read(fragments))),
        Some(Err(e)) => Some((TransportEvent::Failed(e.to_string()), DriveState::Closed)),
        None => Some((TransportEvent::Done, DriveState::Closed)),
    }
}

/// Runs one query as a stream of transport events that always ends with
/// exactly one `Done` or `Failed`.
pub fn drive(transport: Arc<dyn QueryTransport>, query: String) -> BoxStream<'static, TransportEvent> {
    stream::unfold(DriveState::Connect(transport, query), |state| async move {
        match state {
            DriveState::Connect(transport, query) => match transport.ask(&query).await {
                Ok(fragments) => read_next(fragments).await,
                Err(e) => Some((TransportEvent::Failed(e.to_string()), DriveState::Closed)),
            },
            DriveState::Read(fragments) => read_next(fragments).await,
            DriveState::Closed => None,
        }
    })
    .boxed()
}
