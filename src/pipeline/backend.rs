use async_trait::async_trait;

/// Opaque translation service invoked once per batch.
///
/// Implementations return one string per input, in input order.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> anyhow::Result<Vec<String>>;
}
