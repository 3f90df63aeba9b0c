mod attach;
mod config;
mod export;
mod ollama;
mod prompt;

use iced::{
    widget::{button, column, container, pick_list, row, scrollable, text, text_input, text_input::Id},
    Element, Length, Task, Theme, Font, Subscription,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment, Padding,
    window::{self, Level},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use export::ArtifactSink;
use prompt::PromptMode;

fn main() -> iced::Result {
    let config = config::Config::load();

    iced::application("AskBox", App::update, App::view)
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
    QuestionChanged(String),
    ModeSelected(PromptMode),
    CustomPromptChanged(String),
    ImageDropped(PathBuf),
    ClearImage,
    Submit,
    ImageEncoded(Result<String, String>),
    ResponseReceived(String),
    Tick,
    CopyOutput,
    Export,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    EncodingImage,
    AwaitingReply,
}

struct App {
    question: String,
    prompt_mode: PromptMode,
    custom_prompt: String,
    attached_image: Option<PathBuf>,
    response_text: String,
    phase: Phase,
    loading_frame: usize,
    client: Arc<ollama::OllamaClient>,
    sink: Box<dyn ArtifactSink>,
    input_id: Id,
}

impl App {
    fn new() -> (Self, Task<Message>) {
        let app = App::from_config(config::Config::load());

        let focus_task = text_input::focus(app.input_id.clone());
        let window_task = window::get_latest()
            .and_then(|id| window::change_level(id, Level::AlwaysOnTop));

        (app, Task::batch([focus_task, window_task]))
    }

    fn from_config(config: config::Config) -> Self {
        let client = ollama::OllamaClient::with_config(
            config.ollama.host.clone(),
            config.ollama.model.clone(),
        );

        App {
            question: String::new(),
            prompt_mode: PromptMode::Classic,
            custom_prompt: String::new(),
            attached_image: None,
            response_text: export::PLACEHOLDER.to_string(),
            phase: Phase::Idle,
            loading_frame: 0,
            client: Arc::new(client),
            sink: Box::new(export::DirSink::new(config.export_dir())),
            input_id: Id::unique(),
        }
    }

    fn in_flight(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::QuestionChanged(value) => {
                self.question = value;
                Task::none()
            }
            Message::ModeSelected(mode) => {
                self.prompt_mode = mode;
                Task::none()
            }
            Message::CustomPromptChanged(value) => {
                self.custom_prompt = value;
                Task::none()
            }
            Message::ImageDropped(path) => {
                self.attached_image = Some(path);
                Task::none()
            }
            Message::ClearImage => {
                self.attached_image = None;
                Task::none()
            }
            Message::Submit => self.submit(),
            Message::ImageEncoded(Ok(encoded)) => self.dispatch(Some(encoded)),
            Message::ImageEncoded(Err(error)) => {
                // The read failed, so nothing is sent for this submission.
                self.response_text = format!("Error reading image: {}", error);
                self.phase = Phase::Idle;
                Task::none()
            }
            Message::ResponseReceived(display) => {
                self.response_text = display;
                self.phase = Phase::Idle;
                Task::none()
            }
            Message::Tick => {
                if self.in_flight() {
                    self.loading_frame = (self.loading_frame + 1) % 40; // 10 frames * 4 messages
                }
                Task::none()
            }
            Message::CopyOutput => {
                if export::is_real_result(&self.response_text) {
                    clipboard::write(self.response_text.clone())
                } else {
                    Task::none()
                }
            }
            Message::Export => {
                self.export();
                Task::none()
            }
            Message::Exit => iced::exit(),
        }
    }

    fn submit(&mut self) -> Task<Message> {
        if self.in_flight() {
            return Task::none();
        }
        if self.question.trim().is_empty() {
            self.response_text = export::EMPTY_QUESTION.to_string();
            return Task::none();
        }

        if let Some(path) = self.attached_image.clone() {
            self.phase = Phase::EncodingImage;
            Task::future(async move {
                let result = attach::encode(&path).await.map_err(|e| e.to_string());
                Message::ImageEncoded(result)
            })
        } else {
            self.dispatch(None)
        }
    }

    fn dispatch(&mut self, image: Option<String>) -> Task<Message> {
        let effective_prompt =
            match prompt::resolve(&self.prompt_mode, &self.question, &self.custom_prompt) {
                Ok(effective_prompt) => effective_prompt,
                Err(e) => {
                    self.response_text = format!("Error: {}", e);
                    self.phase = Phase::Idle;
                    return Task::none();
                }
            };

        let request = ollama::build_request(
            &effective_prompt,
            &self.question,
            self.client.model(),
            image,
        );

        self.phase = Phase::AwaitingReply;
        self.loading_frame = 0;

        let client = self.client.clone();
        Task::future(async move {
            Message::ResponseReceived(client.send(&request).await.into_display())
        })
    }

    fn export(&mut self) {
        match export::format(&self.response_text, &self.prompt_mode, chrono::Utc::now()) {
            Ok(artifact) => {
                // Fire and forget: a failed save is logged, not displayed.
                if let Err(e) = self.sink.save(&artifact) {
                    eprintln!("[Export] save failed: {}", e);
                }
            }
            Err(export::ExportError::NothingToExport) => {}
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.in_flight() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| match event {
            IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) => Some(Message::Exit),
            IcedEvent::Window(window::Event::FileDropped(path)) => {
                Some(Message::ImageDropped(path))
            }
            _ => None,
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let mode_row = row![
            text("Prompt:").size(14),
            pick_list(
                PromptMode::choices(),
                Some(self.prompt_mode.clone()),
                Message::ModeSelected,
            )
            .text_size(14)
            .padding(8),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center);

        let question_input = text_input("Ask anything...", &self.question)
            .on_input(Message::QuestionChanged)
            .on_submit(Message::Submit)
            .padding(15)
            .size(18)
            .id(self.input_id.clone());

        let ask_button = button(text("[Ask]").size(14))
            .on_press_maybe((!self.in_flight()).then_some(Message::Submit))
            .padding(10);

        let question_row = row![question_input, ask_button]
            .spacing(10)
            .align_y(alignment::Vertical::Center);

        let attachment: Element<Message> = match &self.attached_image {
            Some(path) => row![
                text(format!("Image: {}", path.display())).size(13),
                button(text("[clear]").size(13))
                    .on_press(Message::ClearImage)
                    .padding(5),
            ]
            .spacing(10)
            .align_y(alignment::Vertical::Center)
            .into(),
            None => text("Drop an image onto the window to attach it").size(13).into(),
        };

        let output: Element<Message> = if self.in_flight() {
            let loading_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            let loading_messages = [
                "Waiting on the model...",
                "Composing an answer...",
                "Still thinking...",
                "Almost there...",
            ];

            let message_idx = (self.loading_frame / 10) % loading_messages.len();
            let spinner_idx = self.loading_frame % loading_frames.len();

            container(
                column![
                    text(loading_frames[spinner_idx]).size(32),
                    text(loading_messages[message_idx]).size(15)
                ]
                .spacing(10)
                .align_x(alignment::Horizontal::Center),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .align_y(alignment::Vertical::Center)
            .into()
        } else {
            scrollable(
                container(text(self.response_text.clone()).size(15))
                    .padding(15)
                    .width(Length::Fill),
            )
            .height(Length::Fill)
            .into()
        };

        let mut content_column = column![mode_row, question_row, attachment]
            .spacing(10)
            .padding(10);

        if self.prompt_mode.is_custom() {
            let custom_input = text_input("Custom prompt...", &self.custom_prompt)
                .on_input(Message::CustomPromptChanged)
                .padding(10)
                .size(15);
            content_column = content_column.push(custom_input);
        }

        content_column = content_column.push(output);

        if export::is_real_result(&self.response_text) && !self.in_flight() {
            let actions = container(
                row![
                    button(text("[Copy]").size(14))
                        .on_press(Message::CopyOutput)
                        .padding(10),
                    button(text("[Export]").size(14))
                        .on_press(Message::Export)
                        .padding(10),
                ]
                .spacing(10),
            )
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Right)
            .padding(Padding::from([10, 10]));

            content_column = content_column.push(actions);
        }

        container(content_column)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Nord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::CompletionOutcome;

    fn test_app() -> App {
        App::from_config(config::Config::default())
    }

    #[test]
    fn starts_idle_with_the_placeholder() {
        let app = test_app();
        assert_eq!(app.phase, Phase::Idle);
        assert_eq!(app.response_text, export::PLACEHOLDER);
        assert!(!app.in_flight());
    }

    #[test]
    fn blank_question_never_dispatches() {
        let mut app = test_app();
        let _ = app.update(Message::QuestionChanged("   ".to_string()));
        let _ = app.update(Message::Submit);

        assert_eq!(app.response_text, export::EMPTY_QUESTION);
        assert_eq!(app.phase, Phase::Idle);
    }

    #[test]
    fn transport_failure_is_displayed_and_flight_ends() {
        let mut app = test_app();
        let _ = app.update(Message::QuestionChanged("define osmosis".to_string()));
        let _ = app.update(Message::Submit);
        assert_eq!(app.phase, Phase::AwaitingReply);

        // a second submit while in flight is ignored
        let _ = app.update(Message::Submit);
        assert_eq!(app.phase, Phase::AwaitingReply);

        let display =
            CompletionOutcome::TransportFailure("connection refused".to_string()).into_display();
        let _ = app.update(Message::ResponseReceived(display));

        assert!(app.response_text.contains("connection refused"));
        assert_eq!(app.phase, Phase::Idle);
    }

    #[test]
    fn submitting_with_an_image_encodes_first() {
        let mut app = test_app();
        let _ = app.update(Message::QuestionChanged("what is in this picture".to_string()));
        let _ = app.update(Message::ImageDropped(PathBuf::from("/tmp/shot.png")));
        let _ = app.update(Message::Submit);
        assert_eq!(app.phase, Phase::EncodingImage);

        let _ = app.update(Message::ImageEncoded(Ok("aGVsbG8=".to_string())));
        assert_eq!(app.phase, Phase::AwaitingReply);
    }

    #[test]
    fn image_read_failure_aborts_the_submission() {
        let mut app = test_app();
        let _ = app.update(Message::QuestionChanged("what is in this picture".to_string()));
        let _ = app.update(Message::ImageDropped(PathBuf::from("/tmp/shot.png")));
        let _ = app.update(Message::Submit);

        let _ = app.update(Message::ImageEncoded(Err("no such file".to_string())));
        assert!(app.response_text.contains("no such file"));
        assert_eq!(app.phase, Phase::Idle);
    }

    #[test]
    fn clearing_the_attachment_dispatches_without_encoding() {
        let mut app = test_app();
        let _ = app.update(Message::QuestionChanged("define osmosis".to_string()));
        let _ = app.update(Message::ImageDropped(PathBuf::from("/tmp/shot.png")));
        let _ = app.update(Message::ClearImage);
        let _ = app.update(Message::Submit);

        assert_eq!(app.phase, Phase::AwaitingReply);
    }
}
