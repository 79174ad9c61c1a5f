mod activity;
mod api;
mod config;
mod controller;
mod gauge;
mod transcript;
mod voltages;

use iced::{
    widget::{
        button, center, column, container, horizontal_space, image, opaque, progress_bar, row,
        scrollable, stack, text, text_input, text_input::Id, Column, Row,
    },
    Background, Border, Color, Element, Length, Task, Theme, Font, Subscription,
    time,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment,
    window,
};
use std::time::Duration;

use api::{ChatError, PredictionError, PredictionResult, ServiceClient};
use controller::{AppController, Analysis, ChatTicket, PredictionTicket, RequestState};
use gauge::{GaugeReading, RING_LENGTH};
use transcript::{ChatRole, ChatTurn, PENDING_TEXT};
use voltages::{format_reading, VoltageArray, CELL_COUNT};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CELLS_PER_ROW: usize = 3;
const FOOTER_ACTIVITY_LINES: usize = 3;

fn main() -> iced::Result {
    env_logger::init();

    let config = config::Config::load();
    log::info!("Using prediction service at {}", config.service.api_base());

    iced::application("Battery SOH System", App::update, App::view)
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
        .default_font(Font::DEFAULT)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
enum Message {
    VoltageChanged(usize, String),
    Randomize,
    Analyze,
    PredictionSettled(u64, Result<PredictionResult, PredictionError>),
    DismissNotice,
    ChatInputChanged(String),
    ChatSubmit,
    ChatSettled(u64, Result<String, ChatError>),
    HealthChecked(bool),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Checking,
    Up,
    Unreachable,
}

struct App {
    controller: AppController,
    client: ServiceClient,
    /// Raw text of cells the user is editing, so partial input like "3." survives redraws.
    drafts: Vec<Option<String>>,
    chat_input: String,
    chat_input_id: Id,
    plot: Option<image::Handle>,
    backend: Backend,
    loading_frame: usize,
}

impl App {
    fn new(config: config::Config) -> (Self, Task<Message>) {
        let voltages = VoltageArray::initialize(&mut rand::rng());
        let client = ServiceClient::with_config(&config.service);
        let chat_input_id = Id::unique();

        let app = App {
            controller: AppController::new(voltages, config.prediction.clone()),
            client: client.clone(),
            drafts: vec![None; CELL_COUNT],
            chat_input: String::new(),
            chat_input_id: chat_input_id.clone(),
            plot: None,
            backend: Backend::Checking,
            loading_frame: 0,
        };

        let health_task = Task::perform(
            async move { client.health().await },
            Message::HealthChecked,
        );
        let focus_task = text_input::focus(chat_input_id);

        (app, Task::batch([health_task, focus_task]))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::VoltageChanged(index, raw) => {
                self.controller.set_voltage(index, &raw);
                self.drafts[index] = Some(raw);
                Task::none()
            }
            Message::Randomize => {
                self.controller.randomize_voltages(&mut rand::rng());
                self.drafts.iter_mut().for_each(|d| *d = None);
                Task::none()
            }
            Message::Analyze => {
                let Some(PredictionTicket { seq, request }) = self.controller.begin_prediction() else {
                    return Task::none();
                };

                let client = self.client.clone();
                Task::perform(
                    async move { client.predict(&request).await },
                    move |outcome| Message::PredictionSettled(seq, outcome),
                )
            }
            Message::PredictionSettled(seq, outcome) => {
                let succeeded = outcome.is_ok();
                let plot = outcome
                    .as_ref()
                    .ok()
                    .and_then(|r| r.performance_plot())
                    .map(|p| image::Handle::from_bytes(p.png.clone()));

                if self.controller.finish_prediction(seq, outcome) == controller::Outcome::Applied {
                    if succeeded {
                        self.plot = plot;
                    } else if self.controller.result().is_none() {
                        self.plot = None;
                    }
                }
                Task::none()
            }
            Message::DismissNotice => {
                self.controller.dismiss_notice();
                Task::none()
            }
            Message::ChatInputChanged(value) => {
                self.chat_input = value;
                Task::none()
            }
            Message::ChatSubmit => {
                let Some(ChatTicket { seq, message }) = self.controller.begin_chat(&self.chat_input) else {
                    return Task::none();
                };
                self.chat_input.clear();

                let client = self.client.clone();
                Task::perform(
                    async move { client.chat(&message).await },
                    move |outcome| Message::ChatSettled(seq, outcome),
                )
            }
            Message::ChatSettled(seq, outcome) => {
                self.controller.finish_chat(seq, outcome);
                Task::none()
            }
            Message::HealthChecked(up) => {
                self.backend = if up { Backend::Up } else { Backend::Unreachable };
                if !up {
                    activity::record(activity::Kind::Error, "Backend health check failed");
                }
                Task::none()
            }
            Message::Tick => {
                if self.is_busy() {
                    self.loading_frame = (self.loading_frame + 1) % SPINNER_FRAMES.len();
                }
                Task::none()
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.controller.is_predicting() || self.controller.chat_state().is_loading()
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.is_busy() {
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
                Some(Message::DismissNotice)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let header = column![
            text("Battery SOH System").size(26),
            text("AI-Powered Health Monitoring").size(14),
        ]
        .spacing(4);

        let panels = row![
            container(self.view_inputs()).width(Length::FillPortion(1)),
            container(self.view_results()).width(Length::FillPortion(1)),
            container(self.view_chat()).width(Length::FillPortion(1)),
        ]
        .spacing(20)
        .height(Length::Fill);

        let content = container(
            column![header, panels, self.view_footer()]
                .spacing(20)
                .padding(20),
        )
        .width(Length::Fill)
        .height(Length::Fill);

        match self.controller.notice() {
            Some(notice) => {
                let dialog = container(
                    column![
                        text(notice.to_string()).size(16),
                        button(text("OK")).on_press(Message::DismissNotice),
                    ]
                    .spacing(15)
                    .align_x(alignment::Horizontal::Center),
                )
                .padding(20)
                .style(container::rounded_box);

                stack![
                    content,
                    opaque(center(dialog).style(|_theme| container::Style {
                        background: Some(Background::Color(Color { a: 0.6, ..Color::BLACK })),
                        ..Default::default()
                    })),
                ]
                .into()
            }
            None => content.into(),
        }
    }

    fn view_inputs(&self) -> Element<Message> {
        let cells: Vec<Element<Message>> = self
            .controller
            .voltages()
            .cells()
            .enumerate()
            .map(|(index, (label, value))| {
                let shown = self.drafts[index]
                    .clone()
                    .unwrap_or_else(|| format_reading(value));

                column![
                    text(label).size(11),
                    text_input("0.000", &shown)
                        .on_input(move |raw| Message::VoltageChanged(index, raw))
                        .padding(6)
                        .size(14),
                ]
                .spacing(2)
                .width(Length::Fill)
                .into()
            })
            .collect();

        let mut grid = Column::new().spacing(8);
        let mut cells = cells.into_iter().peekable();
        while cells.peek().is_some() {
            let line: Vec<Element<Message>> = cells.by_ref().take(CELLS_PER_ROW).collect();
            grid = grid.push(Row::with_children(line).spacing(8));
        }

        let analyze_label = if self.controller.is_predicting() {
            format!("{} Calculating...", SPINNER_FRAMES[self.loading_frame])
        } else {
            "Analyze Health".to_string()
        };
        let analyze = button(
            container(text(analyze_label)).width(Length::Fill).align_x(alignment::Horizontal::Center),
        )
        .width(Length::Fill)
        .padding(12)
        .on_press_maybe((!self.controller.is_predicting()).then_some(Message::Analyze));

        column![
            row![
                text("Cell Voltages (V)").size(16),
                horizontal_space(),
                button(text("Randomize").size(12)).on_press(Message::Randomize).style(button::text),
            ]
            .align_y(alignment::Vertical::Center),
            scrollable(grid).height(Length::Fill),
            analyze,
        ]
        .spacing(12)
        .into()
    }

    fn view_results(&self) -> Element<Message> {
        let failure = match self.controller.prediction_state() {
            RequestState::Failed(reason) => Some(text(format!("Last analysis failed: {}", reason))
                .size(12)
                .color(gauge::Band::Critical.color())),
            _ => None,
        };

        let Some(analysis) = self.controller.analysis() else {
            let placeholder = column![text("Run analysis to see results").size(15)]
                .push_maybe(failure)
                .spacing(8)
                .align_x(alignment::Horizontal::Center);
            return center(placeholder).into();
        };

        let mut body = column![view_gauge(analysis.gauge, analysis.classification)]
            .spacing(16)
            .align_x(alignment::Horizontal::Center);

        body = body.push(text("MODEL ANALYSIS").size(12));
        let plot = self.controller.result().and_then(|r| r.performance_plot());
        if let (Some(handle), Some(plot)) = (&self.plot, plot) {
            body = body
                .push(image(handle.clone()).width(Length::Fill))
                .push(text(format!("SOH chart, {}x{} px", plot.width, plot.height)).size(11));
        }
        body = body.push(view_equation(&analysis)).push_maybe(failure);

        scrollable(body).height(Length::Fill).into()
    }

    fn view_chat(&self) -> Element<Message> {
        let transcript = self.controller.transcript();

        let mut turns = Column::with_children(transcript.turns().iter().map(view_turn)).spacing(10);
        if transcript.is_pending() {
            turns = turns.push(
                text(format!("{} {}", SPINNER_FRAMES[self.loading_frame], PENDING_TEXT)).size(12),
            );
        }

        let input = text_input("Ask a question...", &self.chat_input)
            .on_input(Message::ChatInputChanged)
            .on_submit(Message::ChatSubmit)
            .padding(10)
            .id(self.chat_input_id.clone());

        column![
            text("AI Assistant").size(16),
            scrollable(turns).height(Length::Fill),
            row![input, button(text("Send")).on_press(Message::ChatSubmit).padding(10)].spacing(8),
        ]
        .spacing(12)
        .into()
    }

    fn view_footer(&self) -> Element<Message> {
        let status = match self.backend {
            Backend::Checking => "Backend: checking...",
            Backend::Up => "Backend: running",
            Backend::Unreachable => "Backend: unreachable",
        };

        let mut footer = Column::new().spacing(2).push(text(status).size(12));
        for entry in activity::recent(FOOTER_ACTIVITY_LINES) {
            let line = text(entry.text).size(11);
            footer = footer.push(match entry.kind {
                activity::Kind::Error => line.color(gauge::Band::Critical.color()),
                _ => line,
            });
        }

        footer.into()
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }
}

fn view_gauge<'a>(reading: GaugeReading, classification: &str) -> Element<'a, Message> {
    let color = reading.band.color();

    column![
        text(format!("{}%", reading.percentage)).size(40).color(color),
        text("SOH").size(12),
        progress_bar(0.0..=RING_LENGTH, reading.arc_length())
            .height(10)
            .style(move |_theme| progress_bar::Style {
                background: Background::Color(Color::from_rgb8(0xe5, 0xe7, 0xeb)),
                bar: Background::Color(color),
                border: Border {
                    radius: 5.0.into(),
                    ..Default::default()
                },
            }),
        text(classification.to_string()).size(20),
    ]
    .spacing(8)
    .align_x(alignment::Horizontal::Center)
    .into()
}

fn view_equation<'a>(analysis: &Analysis<'_>) -> Element<'a, Message> {
    column![
        text(format!("Raw SOH: {:.4}", analysis.soh_raw)).size(12),
        container(text(analysis.equation_preview.clone()).font(Font::MONOSPACE).size(12))
            .padding(10)
            .width(Length::Fill)
            .style(container::rounded_box),
    ]
    .spacing(8)
    .into()
}

fn view_turn(turn: &ChatTurn) -> Element<'_, Message> {
    let (prefix, style): (&str, fn(&Theme) -> container::Style) = match turn.role {
        ChatRole::Ai => ("AI", container::rounded_box),
        ChatRole::User => ("You", user_bubble),
    };

    let bubble = container(text(format!("{}: {}", prefix, turn.text)).size(14))
        .padding(10)
        .max_width(320)
        .style(style);

    match turn.role {
        ChatRole::Ai => row![bubble, horizontal_space()].into(),
        ChatRole::User => row![horizontal_space(), bubble].into(),
    }
}

fn user_bubble(_theme: &Theme) -> container::Style {
    container::Style {
        background: Some(Background::Color(Color::from_rgb8(0x25, 0x63, 0xeb))),
        text_color: Some(Color::WHITE),
        border: Border {
            radius: 8.0.into(),
            ..Default::default()
        },
        ..Default::default()
    }
}
