use rand::Rng;

use crate::activity::{self, Kind};
use crate::api::{ChatError, PredictionError, PredictionRequest, PredictionResult};
use crate::config::{FailurePolicy, PredictionConfig};
use crate::gauge::{self, GaugeReading};
use crate::transcript::{ChatTranscript, ChatTurn, CHAT_ERROR_TEXT};
use crate::voltages::VoltageArray;

pub const PREDICTION_FAILED_NOTICE: &str = "Failed to get prediction from backend";

/// Characters of the regression equation shown in the analysis panel.
const EQUATION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Loading,
    Settled,
    Failed(String),
}

impl RequestState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }
}

/// Hands out increasing sequence numbers; only the newest one is current.
#[derive(Debug, Default)]
struct Sequencer {
    latest: u64,
}

impl Sequencer {
    fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    fn is_current(&self, seq: u64) -> bool {
        seq == self.latest
    }
}

/// Whether a settled response was applied or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTicket {
    pub seq: u64,
    pub request: PredictionRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTicket {
    pub seq: u64,
    pub message: String,
}

/// Everything the analysis panel renders for the current result.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis<'a> {
    pub gauge: GaugeReading,
    pub classification: &'a str,
    pub soh_raw: f64,
    pub equation_preview: String,
}

pub fn equation_preview(equation: &str) -> String {
    let head: String = equation.chars().take(EQUATION_PREVIEW_CHARS).collect();
    format!("{}...", head)
}

/// Owns the dashboard state and the request lifecycle for both flows.
pub struct AppController {
    voltages: VoltageArray,
    settings: PredictionConfig,

    prediction_state: RequestState,
    prediction_seq: Sequencer,
    result: Option<PredictionResult>,
    notice: Option<String>,

    chat_state: RequestState,
    chat_seq: Sequencer,
    transcript: ChatTranscript,
}

impl AppController {
    pub fn new(voltages: VoltageArray, settings: PredictionConfig) -> Self {
        AppController {
            voltages,
            settings,
            prediction_state: RequestState::Idle,
            prediction_seq: Sequencer::default(),
            result: None,
            notice: None,
            chat_state: RequestState::Idle,
            chat_seq: Sequencer::default(),
            transcript: ChatTranscript::new(),
        }
    }

    // Voltages

    pub fn voltages(&self) -> &VoltageArray {
        &self.voltages
    }

    pub fn set_voltage(&mut self, index: usize, raw_text: &str) {
        self.voltages.set_at(index, raw_text);
    }

    pub fn randomize_voltages<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.voltages.randomize(rng);
        activity::record(Kind::Info, "Voltages randomized");
    }

    // Prediction flow

    /// Start a prediction. Returns `None` while one is already loading.
    pub fn begin_prediction(&mut self) -> Option<PredictionTicket> {
        if self.prediction_state.is_loading() {
            log::debug!("prediction submit ignored: request already in flight");
            return None;
        }

        let seq = self.prediction_seq.issue();
        self.prediction_state = RequestState::Loading;
        activity::record(Kind::Prediction, format!("Prediction #{} submitted", seq));

        Some(PredictionTicket {
            seq,
            request: PredictionRequest {
                voltages: self.voltages.snapshot(),
                threshold: self.settings.threshold,
                include_plots: self.settings.include_plots,
            },
        })
    }

    pub fn finish_prediction(
        &mut self,
        seq: u64,
        outcome: Result<PredictionResult, PredictionError>,
    ) -> Outcome {
        if !self.prediction_seq.is_current(seq) {
            log::debug!("dropping stale prediction #{}", seq);
            return Outcome::Stale;
        }

        match outcome {
            Ok(result) => {
                let reading = gauge::render(result.soh);
                activity::record(
                    Kind::Prediction,
                    format!("Prediction #{} settled: {}% {}", seq, reading.percentage, result.classification),
                );
                self.result = Some(result);
                self.prediction_state = RequestState::Settled;
            }
            Err(e) => {
                activity::record(Kind::Error, format!("Prediction #{} failed: {}", seq, e));
                if self.settings.on_failure == FailurePolicy::Clear {
                    self.result = None;
                }
                self.notice = Some(PREDICTION_FAILED_NOTICE.to_string());
                self.prediction_state = RequestState::Failed(e.to_string());
            }
        }

        Outcome::Applied
    }

    pub fn prediction_state(&self) -> &RequestState {
        &self.prediction_state
    }

    pub fn is_predicting(&self) -> bool {
        self.prediction_state.is_loading()
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref()
    }

    #[allow(dead_code)]
    pub fn gauge(&self) -> Option<GaugeReading> {
        self.result.as_ref().map(|r| gauge::render(r.soh))
    }

    pub fn analysis(&self) -> Option<Analysis<'_>> {
        self.result.as_ref().map(|result| Analysis {
            gauge: gauge::render(result.soh),
            classification: &result.classification,
            soh_raw: result.soh_raw,
            equation_preview: equation_preview(&result.equation),
        })
    }

    /// Blocking notice raised by a failed prediction.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // Chat flow

    /// Append the user's turn and start a chat call. Blank input is ignored.
    pub fn begin_chat(&mut self, input: &str) -> Option<ChatTicket> {
        if input.trim().is_empty() {
            return None;
        }

        let seq = self.chat_seq.issue();
        self.transcript.append(ChatTurn::user(input));
        self.transcript.set_pending(true);
        self.chat_state = RequestState::Loading;
        activity::record(Kind::Chat, format!("Chat #{} sent", seq));

        Some(ChatTicket {
            seq,
            message: input.to_string(),
        })
    }

    pub fn finish_chat(&mut self, seq: u64, outcome: Result<String, ChatError>) -> Outcome {
        if !self.chat_seq.is_current(seq) {
            log::debug!("dropping stale chat reply #{}", seq);
            return Outcome::Stale;
        }

        match outcome {
            Ok(reply) => {
                activity::record(Kind::Chat, format!("Chat #{} answered", seq));
                self.transcript.append(ChatTurn::ai(reply));
                self.chat_state = RequestState::Settled;
            }
            Err(e) => {
                activity::record(Kind::Error, format!("Chat #{} failed: {}", seq, e));
                self.transcript.append(ChatTurn::ai(CHAT_ERROR_TEXT));
                self.chat_state = RequestState::Failed(e.to_string());
            }
        }
        self.transcript.set_pending(false);

        Outcome::Applied
    }

    pub fn chat_state(&self) -> &RequestState {
        &self.chat_state
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }
}
