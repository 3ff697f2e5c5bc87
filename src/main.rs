mod activity;
mod config;
mod decoder;
mod documents;
mod error;
mod exchange;
mod render;
mod session;
mod timer;
mod transport;

use iced::{
    widget::{
        button, container, pick_list, rich_text, scrollable, span, text, text_input,
        text_input::Id, Column, Row,
    },
    event::{self, Event as IcedEvent},
    font,
    keyboard::{self, Key},
    time, window, Element, Font, Length, Subscription, Task, Theme,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::documents::DocumentList;
use crate::error::TransportError;
use crate::exchange::{Conversation, ExchangeRecord, Role, TransportEvent};
use crate::render::Segment;
use crate::transport::{QueryTransport, RagClient};

const STATUS_HISTORY: usize = 4;
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const BOLD: Font = Font {
    weight: font::Weight::Bold,
    ..Font::MONOSPACE
};

fn main() -> iced::Result {
    let config = config::Config::load();

    iced::application("RAG Desk", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            min_size: Some(iced::Size::new(
                config.window.min_width as f32,
                config.window.min_height as f32,
            )),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(App::new)
}

#[derive(Debug, Clone)]
enum Message {
    InputChanged(String),
    Submit,
    Exchange(TransportEvent),
    UploadPathChanged(String),
    Upload,
    Uploaded(Result<String, String>),
    DeleteDocument(String),
    Deleted(String, Result<(), String>),
    ClearAll,
    ConfirmClear,
    CancelClear,
    Cleared(Result<(), String>),
    ModelSelected(String),
    ModelSet(String, Result<(), String>),
    Tick,
}

struct App {
    input_text: String,
    upload_path: String,
    conversation: Conversation,
    documents: DocumentList,
    models: Vec<String>,
    selected_model: Option<String>,
    confirming_clear: bool,
    uploading: bool,
    loading_frame: usize,
    client: Arc<RagClient>,
    input_id: Id,
    history_id: scrollable::Id,
}

fn upload_failure(err: &TransportError) -> String {
    match err {
        TransportError::Request(e) => format!("Network error: {}", e),
        other => format!("Error: {}", other.detail()),
    }
}

fn clear_failure(err: &TransportError) -> String {
    match err {
        TransportError::Request(_) => "Error clearing documents".to_string(),
        _ => "Failed to clear documents".to_string(),
    }
}

impl App {
    fn new() -> (Self, Task<Message>) {
        let config = config::Config::load();
        let session = session::init().clone();
        eprintln!("Session ID: {}", session);

        let client = RagClient::new(config.server.base_url.clone(), session);
        let models = config.model_choices();
        let input_id = Id::unique();

        let app = App {
            input_text: String::new(),
            upload_path: String::new(),
            conversation: Conversation::new(),
            documents: DocumentList::new(),
            models,
            selected_model: Some(config.server.default_model.clone()),
            confirming_clear: false,
            uploading: false,
            loading_frame: 0,
            client: Arc::new(client),
            input_id: input_id.clone(),
            history_id: scrollable::Id::unique(),
        };

        (app, text_input::focus(input_id))
    }

    fn scroll_to_bottom(&self) -> Task<Message> {
        scrollable::snap_to(self.history_id.clone(), scrollable::RelativeOffset::END)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.input_text = value;
                Task::none()
            }
            Message::Submit => {
                let Some(query) = self.conversation.submit(&self.input_text) else {
                    return Task::none();
                };
                self.input_text.clear();

                let transport: Arc<dyn QueryTransport> = self.client.clone();
                Task::batch([
                    Task::run(exchange::drive(transport, query), Message::Exchange),
                    self.scroll_to_bottom(),
                ])
            }
            Message::Exchange(event) => {
                self.conversation.apply(event);
                self.scroll_to_bottom()
            }
            Message::UploadPathChanged(value) => {
                self.upload_path = value;
                Task::none()
            }
            Message::Upload => {
                let path = self.upload_path.trim().to_string();
                if path.is_empty() || self.uploading {
                    return Task::none();
                }
                self.uploading = true;
                activity::log("Uploading...");

                let client = self.client.clone();
                Task::perform(
                    async move {
                        client
                            .upload(&PathBuf::from(path))
                            .await
                            .map_err(|e| upload_failure(&e))
                    },
                    Message::Uploaded,
                )
            }
            Message::Uploaded(result) => {
                self.uploading = false;
                match result {
                    Ok(filename) => {
                        activity::success(format!("Ingested: {}", filename));
                        self.conversation.add_system(&format!(
                            "Successfully indexed document: **{}**",
                            filename
                        ));
                        self.documents.add(filename);
                        self.upload_path.clear();
                        self.scroll_to_bottom()
                    }
                    Err(e) => {
                        activity::error(e);
                        Task::none()
                    }
                }
            }
            Message::DeleteDocument(filename) => {
                let client = self.client.clone();
                let name = filename.clone();
                Task::perform(
                    async move { client.delete_document(&name).await.map_err(|e| e.to_string()) },
                    move |result| Message::Deleted(filename.clone(), result),
                )
            }
            Message::Deleted(filename, result) => {
                match result {
                    Ok(()) => {
                        self.documents.remove(&filename);
                        if self.documents.is_empty() {
                            self.confirming_clear = false;
                        }
                        activity::log(format!("Deleted: {}", filename));
                    }
                    Err(e) => activity::error(format!("Could not delete {}: {}", filename, e)),
                }
                Task::none()
            }
            Message::ClearAll => {
                self.confirming_clear = true;
                Task::none()
            }
            Message::CancelClear => {
                self.confirming_clear = false;
                Task::none()
            }
            Message::ConfirmClear => {
                self.confirming_clear = false;
                let client = self.client.clone();
                Task::perform(
                    async move { client.clear_documents().await.map_err(|e| clear_failure(&e)) },
                    Message::Cleared,
                )
            }
            Message::Cleared(result) => match result {
                Ok(()) => {
                    self.documents.clear();
                    activity::success("All documents cleared");
                    self.conversation.add_system(
                        "Knowledge base has been **cleared**. Upload new documents to get started.",
                    );
                    self.scroll_to_bottom()
                }
                Err(e) => {
                    activity::error(e);
                    Task::none()
                }
            },
            Message::ModelSelected(model) => {
                self.selected_model = Some(model.clone());
                let client = self.client.clone();
                let name = model.clone();
                Task::perform(
                    async move { client.set_model(&name).await.map_err(|e| e.to_string()) },
                    move |result| Message::ModelSet(model.clone(), result),
                )
            }
            Message::ModelSet(model, result) => {
                match result {
                    Ok(()) => activity::success(format!("Model switched to {}", model)),
                    Err(e) => activity::error(format!("Could not switch model to {}: {}", model, e)),
                }
                Task::none()
            }
            Message::Tick => {
                self.loading_frame = (self.loading_frame + 1) % SPINNER_FRAMES.len();
                Task::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.conversation.is_busy() || self.uploading {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::CancelClear)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let sidebar = container(self.view_sidebar())
            .width(Length::Fixed(280.0))
            .height(Length::Fill)
            .padding(10)
            .style(container::rounded_box);

        let history = scrollable(
            Column::with_children(self.conversation.records().iter().map(|r| self.view_record(r)))
                .spacing(12)
                .padding(15)
                .width(Length::Fill),
        )
        .id(self.history_id.clone())
        .height(Length::Fill);

        let input = text_input("Ask a question about your documents...", &self.input_text)
            .on_input(Message::InputChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(16)
            .id(self.input_id.clone());

        let send = button(text("Send").size(15))
            .padding(12)
            .on_press_maybe(
                self.conversation
                    .can_submit(&self.input_text)
                    .then_some(Message::Submit),
            );

        let chat = Column::new()
            .push(history)
            .push(Row::new().push(input).push(send).spacing(8))
            .spacing(10)
            .width(Length::Fill);

        container(Row::new().push(sidebar).push(chat).spacing(10).padding(10))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_sidebar(&self) -> Element<Message> {
        let mut sidebar = Column::new().spacing(10);

        sidebar = sidebar.push(text("Model").size(14));
        sidebar = sidebar.push(
            pick_list(
                self.models.as_slice(),
                self.selected_model.as_ref(),
                Message::ModelSelected,
            )
            .width(Length::Fill),
        );

        sidebar = sidebar.push(text("Upload").size(14));
        sidebar = sidebar.push(
            text_input("Path to a .pdf or .txt file", &self.upload_path)
                .on_input(Message::UploadPathChanged)
                .on_submit(Message::Upload)
                .padding(8)
                .size(14),
        );
        let upload_label = if self.uploading {
            format!("{} Uploading...", SPINNER_FRAMES[self.loading_frame])
        } else {
            "Upload".to_string()
        };
        sidebar = sidebar.push(
            button(text(upload_label).size(14))
                .width(Length::Fill)
                .on_press_maybe(
                    (!self.uploading && !self.upload_path.trim().is_empty()).then_some(Message::Upload),
                ),
        );

        // Oldest first; the newest entry is drawn at full size.
        let history = activity::recent(STATUS_HISTORY);
        let newest = history.len().saturating_sub(1);
        for (i, entry) in history.into_iter().enumerate() {
            let status = text(entry.text).size(if i == newest { 13 } else { 11 });
            let status = match entry.kind {
                activity::Kind::Success => status.style(text::success),
                activity::Kind::Error => status.style(text::danger),
                activity::Kind::Info => status,
            };
            sidebar = sidebar.push(status);
        }

        sidebar = sidebar.push(text("Documents").size(14));
        for entry in self.documents.iter() {
            sidebar = sidebar.push(
                Row::new()
                    .push(text(entry.filename.as_str()).size(13).width(Length::Fill))
                    .push(
                        button(text("✕").size(12))
                            .style(button::danger)
                            .on_press(Message::DeleteDocument(entry.filename.clone())),
                    )
                    .spacing(6),
            );
        }

        if !self.documents.is_empty() {
            if self.confirming_clear {
                sidebar = sidebar.push(text("Clear all documents? This cannot be undone.").size(13));
                sidebar = sidebar.push(
                    Row::new()
                        .push(button(text("Clear").size(13)).style(button::danger).on_press(Message::ConfirmClear))
                        .push(button(text("Cancel").size(13)).on_press(Message::CancelClear))
                        .spacing(6),
                );
            } else {
                sidebar = sidebar.push(
                    button(text("Clear all").size(13))
                        .width(Length::Fill)
                        .on_press(Message::ClearAll),
                );
            }
        }

        sidebar.into()
    }

    fn view_record<'a>(&'a self, record: &'a ExchangeRecord) -> Element<'a, Message> {
        let label = match record.role {
            Role::User => "You",
            Role::Bot => "Assistant",
            Role::System => "System",
        };
        let mut body = Column::new().spacing(6).push(text(label).size(12).style(text::primary));

        if let Some(error) = &record.error {
            body = body.push(text(format!("Error: {}", error)).size(15).style(text::danger));
        } else if record.presentation.thinking {
            body = body.push(
                text(format!("{} Thinking...", SPINNER_FRAMES[self.loading_frame])).size(15),
            );
        } else {
            body = body.push(view_segments(&record.presentation.body));
        }

        if !record.presentation.badges.is_empty() {
            body = body.push(
                Row::with_children(record.presentation.badges.iter().map(|badge| {
                    container(text(badge.as_str()).size(12))
                        .padding([2, 8])
                        .style(container::bordered_box)
                        .into()
                }))
                .spacing(6),
            );
        }

        if let Some(elapsed) = record.elapsed_label() {
            body = body.push(text(elapsed).size(11).style(text::secondary));
        }

        container(body).padding(10).width(Length::Fill).into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

fn view_segments(segments: &[Segment]) -> Element<'_, Message> {
    let spans: Vec<text::Span<'_, Message, Font>> = segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(s) => span(s.as_str()),
            Segment::Emphasis(s) => span(s.as_str()).font(BOLD),
            Segment::LineBreak => span("\n"),
        })
        .collect();

    rich_text(spans).size(15).into()
}
