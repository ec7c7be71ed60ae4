//! UI state and the generation state machine.
//!
//! [`step`] is pure: it takes the current [`UiState`] and one [`Event`], and
//! returns the next state along with the [`Effect`]s the caller has to carry
//! out. Outcomes of those effects come back in as events.

/// Where the generation sequence currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing in flight
    #[default]
    Idle,
    /// Waiting on the chat-completion service
    Enhancing,
    /// Waiting on the image-generation service
    Generating,
}

impl Phase {
    /// Returns the phase as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Enhancing => "enhancing",
            Phase::Generating => "generating",
        }
    }
}

/// Which external call a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// The chat-completion call
    Enhancement,
    /// The image-generation call
    ImageGeneration,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Enhancement => write!(f, "prompt enhancement"),
            Stage::ImageGeneration => write!(f, "image generation"),
        }
    }
}

/// Everything the page shows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiState {
    /// Working prompt
    pub prompt: String,
    /// Base64 payloads from the last successful generation, in service order
    pub images: Vec<String>,
    /// Whether the prompt goes through the enhancer first
    pub enhancement_enabled: bool,
    /// Current phase of the sequence
    pub phase: Phase,
}

impl UiState {
    /// Fresh state with the enhancement toggle preset.
    pub fn new(enhancement_enabled: bool) -> Self {
        Self {
            enhancement_enabled,
            ..Default::default()
        }
    }

    /// The loading flag.
    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Images to render. Empty while loading; the stored set is kept so a
    /// failed request leaves the previous results in place.
    pub fn visible_images(&self) -> &[String] {
        if self.is_loading() { &[] } else { &self.images }
    }
}

/// Inputs to the machine: user actions and call outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The user typed into the prompt field
    PromptEdited(String),
    /// The user flipped the enhancement toggle
    EnhancementToggled(bool),
    /// The user pressed Generate
    GenerateRequested,
    /// A Generate submission carrying the field contents at click time
    GenerateSubmitted {
        /// Prompt text as submitted
        prompt: String,
        /// Enhancement toggle as submitted
        enhance: bool,
    },
    /// The enhancer returned a rewritten prompt
    EnhancementSucceeded(String),
    /// The enhancer call failed
    EnhancementFailed(String),
    /// The image service returned a result set
    ImagesReceived(Vec<String>),
    /// The image service call failed
    ImagesFailed(String),
    /// The image service answered with an unexpected shape
    ImagesMalformed(String),
    /// The user pressed Reset
    Reset,
    /// The sequence task went away before its call answered
    SequenceAborted,
}

/// Work the caller has to do after a step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Call the chat-completion service with this text
    Enhance {
        /// Raw user text
        text: String,
    },
    /// Call the image-generation service with this prompt
    RequestImages {
        /// Working prompt
        prompt: String,
    },
    /// Log a failed external call
    ReportFailure {
        /// Which call failed
        stage: Stage,
        /// Error description
        message: String,
    },
    /// Log a response that was ignored because of its shape
    ReportIgnored {
        /// What was wrong with it
        message: String,
    },
}

/// Advances the machine by one event.
pub fn step(mut state: UiState, event: Event) -> (UiState, Vec<Effect>) {
    let effects = match event {
        Event::PromptEdited(prompt) => {
            state.prompt = prompt;
            Vec::new()
        }
        Event::EnhancementToggled(enabled) => {
            state.enhancement_enabled = enabled;
            Vec::new()
        }
        Event::GenerateRequested => begin(&mut state),
        Event::GenerateSubmitted { prompt, enhance } => {
            state.prompt = prompt;
            state.enhancement_enabled = enhance;
            begin(&mut state)
        }
        Event::EnhancementSucceeded(prompt) => {
            state.prompt = prompt.clone();
            state.phase = Phase::Generating;
            vec![Effect::RequestImages { prompt }]
        }
        Event::EnhancementFailed(message) => {
            state.phase = Phase::Idle;
            vec![Effect::ReportFailure {
                stage: Stage::Enhancement,
                message,
            }]
        }
        Event::ImagesReceived(images) => {
            state.images = images;
            state.phase = Phase::Idle;
            Vec::new()
        }
        Event::ImagesFailed(message) => {
            state.phase = Phase::Idle;
            vec![Effect::ReportFailure {
                stage: Stage::ImageGeneration,
                message,
            }]
        }
        Event::ImagesMalformed(message) => {
            state.phase = Phase::Idle;
            vec![Effect::ReportIgnored { message }]
        }
        Event::Reset => {
            state.prompt.clear();
            state.images.clear();
            Vec::new()
        }
        Event::SequenceAborted => {
            let stage = match state.phase {
                Phase::Idle => None,
                Phase::Enhancing => Some(Stage::Enhancement),
                Phase::Generating => Some(Stage::ImageGeneration),
            };
            state.phase = Phase::Idle;
            stage
                .map(|stage| Effect::ReportFailure {
                    stage,
                    message: "sequence aborted".to_string(),
                })
                .into_iter()
                .collect()
        }
    };
    (state, effects)
}

fn begin(state: &mut UiState) -> Vec<Effect> {
    let text = state.prompt.clone();
    if state.enhancement_enabled {
        state.phase = Phase::Enhancing;
        vec![Effect::Enhance { text }]
    } else {
        state.phase = Phase::Generating;
        vec![Effect::RequestImages { prompt: text }]
    }
}
