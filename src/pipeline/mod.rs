mod backend;
mod cancel;
mod translator;

pub use backend::TranslationBackend;
pub use cancel::CancelSignal;
pub use translator::{TranslationJob, TranslationOutcome};
