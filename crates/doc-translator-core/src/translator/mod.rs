mod traits;
mod openai;

pub use traits::{Translator, TranslatorInfo};
pub use openai::OpenAiTranslator;

use crate::config::TranslatorConfig;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Create a translator from configuration.
///
/// Fails with [`Error::TranslationMissingApiKey`](crate::Error::TranslationMissingApiKey)
/// before any request is made if no key is configured.
pub fn create_translator(config: &TranslatorConfig, timeout: Duration) -> Result<Arc<dyn Translator>> {
    let translator = OpenAiTranslator::new(config, timeout)?;
    Ok(Arc::new(translator))
}
