pub mod codec;
pub mod prompt;
pub mod realtime;
pub mod session;
pub mod telephony;
pub mod transcript;

pub use codec::{AudioCodec, AudioFormat, CodecError};
pub use prompt::{PersonaPromptBuilder, PromptBuilder};
pub use realtime::{
    OpenAIRealtimeConnector, RealtimeError, RealtimeResult, RealtimeSettings, UpstreamConnector,
    UpstreamLink, UpstreamSignal,
};
pub use session::{CallMetadata, CallSnapshot, CallStatus, Session, SessionRegistry};
pub use telephony::{OutgoingFrame, TelephonyEvent};
pub use transcript::{
    CallSummary, FanoutTranscriptSink, LogTranscriptSink, TranscriptSink, WebhookTranscriptSink,
};
