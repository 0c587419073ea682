pub mod announcer;
pub mod engine;
pub mod words;

pub use announcer::SpeechAnnouncer;
pub use engine::{ProcessSpeechEngine, SpeechEngine, UtteranceObserver};
pub use words::spoken_duration;
