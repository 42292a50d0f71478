use std::collections::HashMap;
use std::pin::pin;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::batch::{plan_batches, Batch};
use crate::config::TranslationConfig;
use crate::dataurl::{decode_data_url, encode_data_url};
use crate::docx::{parse_docx, ParsedDocx};
use crate::error::{Error, Result};
use crate::ir::TextSegment;
use crate::ooxml::document::RebuiltDocument;
use crate::progress::{NoProgress, Phase, ProgressEvent, ProgressSink};
use crate::summary::DiagnosticSummary;
use crate::xlsx::{parse_xlsx, ParsedXlsx};
use crate::DocumentKind;

use super::backend::TranslationBackend;
use super::cancel::CancelSignal;

static NO_PROGRESS: NoProgress = NoProgress;

pub struct TranslationOutcome {
    pub document: RebuiltDocument,
    pub summary: DiagnosticSummary,
}

enum Parsed {
    Docx(ParsedDocx),
    Xlsx(ParsedXlsx),
}

impl Parsed {
    fn segments(&self) -> &[TextSegment] {
        match self {
            Parsed::Docx(d) => d.segments(),
            Parsed::Xlsx(x) => x.segments(),
        }
    }

    fn summary(&self) -> DiagnosticSummary {
        match self {
            Parsed::Docx(d) => DiagnosticSummary::from_docx(d),
            Parsed::Xlsx(x) => DiagnosticSummary::from_xlsx(x),
        }
    }

    fn rebuild(&mut self, translations: &HashMap<String, String>) -> Result<RebuiltDocument> {
        match self {
            Parsed::Docx(d) => d.rebuild(translations),
            Parsed::Xlsx(x) => x.rebuild(translations),
        }
    }
}

#[derive(Debug, Default)]
struct Merged {
    translations: HashMap<String, String>,
    batches_done: usize,
    failed_batches: usize,
}

/// One document translation: parse, batch through the backend, rebuild.
///
/// Every job owns its parsed package; the input bytes are never modified.
pub struct TranslationJob<'a> {
    config: TranslationConfig,
    backend: &'a dyn TranslationBackend,
    progress: &'a dyn ProgressSink,
    cancel: CancelSignal,
}

impl<'a> TranslationJob<'a> {
    pub fn new(config: TranslationConfig, backend: &'a dyn TranslationBackend) -> Self {
        Self {
            config,
            backend,
            progress: &NO_PROGRESS,
            cancel: CancelSignal::new(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub async fn run(&self, input: &[u8], source_lang: &str, target_lang: &str) -> Result<TranslationOutcome> {
        let kind = match DocumentKind::detect(input) {
            Ok(kind) => kind,
            Err(err) => return Err(self.fail(err)),
        };
        self.run_as(kind, input, source_lang, target_lang).await
    }

    pub async fn run_as(
        &self,
        kind: DocumentKind,
        input: &[u8],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslationOutcome> {
        self.emit(ProgressEvent::new(Phase::Parsing).message(format!("reading {}", kind.as_str())));
        match self.execute(kind, input, source_lang, target_lang).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Data-URL in, data-URL out; the MIME type picks the format when it names one.
    pub async fn run_data_url(
        &self,
        data_url: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<(String, DiagnosticSummary)> {
        let (mime, bytes) = decode_data_url(data_url).map_err(|e| self.fail(e))?;
        let outcome = match DocumentKind::from_mime(&mime) {
            Some(kind) => self.run_as(kind, &bytes, source_lang, target_lang).await?,
            None => self.run(&bytes, source_lang, target_lang).await?,
        };
        let url = encode_data_url(outcome.document.mime, &outcome.document.bytes);
        Ok((url, outcome.summary))
    }

    async fn execute(
        &self,
        kind: DocumentKind,
        input: &[u8],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslationOutcome> {
        self.cancel.check()?;
        let mut parsed = match kind {
            DocumentKind::Docx => Parsed::Docx(parse_docx(input, &self.config)?),
            DocumentKind::Xlsx => Parsed::Xlsx(parse_xlsx(input, &self.config)?),
        };
        let mut summary = parsed.summary();
        if let Some(skips) = summary.describe_skips() {
            info!("{skips}");
        }
        let segments = parsed.segments();
        if segments.is_empty() {
            return Err(Error::NoTranslatableText);
        }

        let batches = plan_batches(segments, self.config.batch_limits());
        let total_segments = segments.len();
        let total_batches = batches.len();
        info!(
            segments = total_segments,
            batches = total_batches,
            concurrency = self.config.concurrency(),
            "translating {source_lang} -> {target_lang}"
        );
        let merged = self.translate_batches(&batches, total_segments, source_lang, target_lang).await?;
        summary.record_translation(total_batches, merged.failed_batches);

        self.cancel.check()?;
        self.emit(
            ProgressEvent::new(Phase::Rebuilding)
                .segments(total_segments, total_segments)
                .batches(total_batches, total_batches),
        );
        let document = parsed.rebuild(&merged.translations)?;
        summary.record_rebuild(&document.report);
        if document.report.missing_targets > 0 {
            warn!(missing = document.report.missing_targets, "some translations had no target node");
        }

        self.emit(
            ProgressEvent::new(Phase::Complete)
                .segments(total_segments, total_segments)
                .batches(total_batches, total_batches),
        );
        Ok(TranslationOutcome { document, summary })
    }

    async fn translate_batches(
        &self,
        batches: &[Batch<'_>],
        total_segments: usize,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Merged> {
        let total_batches = batches.len();
        self.emit(ProgressEvent::new(Phase::Translating).segments(0, total_segments).batches(0, total_batches));

        let calls = stream::iter(batches.iter().enumerate().map(|(index, batch)| async move {
            self.cancel.check()?;
            let texts = batch.texts();
            debug!(batch = index, start = batch.start_index, items = texts.len(), "dispatching batch");
            let result = self.backend.translate_batch(&texts, source_lang, target_lang).await;
            Ok::<_, Error>((index, batch, result))
        }))
        .buffer_unordered(self.config.concurrency());
        let mut calls = pin!(calls);

        let mut merged = Merged::default();
        let mut segments_done = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                next = calls.next() => next,
            };
            let Some(item) = next else {
                break;
            };
            let (index, batch, result) = item?;
            match result {
                Ok(out) => merge_batch(index, batch, out, &mut merged.translations),
                Err(err) => {
                    warn!(batch = index, error = %format!("{err:#}"), "batch failed; keeping source text");
                    merged.failed_batches += 1;
                }
            }
            merged.batches_done += 1;
            segments_done += batch.segments.len();
            self.emit(
                ProgressEvent::new(Phase::Translating)
                    .segments(segments_done, total_segments)
                    .batches(merged.batches_done, total_batches),
            );
        }
        Ok(merged)
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.emit(&event);
    }

    fn fail(&self, err: Error) -> Error {
        if !err.is_cancelled() {
            warn!(error = %err, "translation job failed");
        }
        self.emit(ProgressEvent::new(Phase::Error).message(err.to_string()));
        err
    }
}

/// Missing items keep their source text; extra items are dropped.
fn merge_batch(index: usize, batch: &Batch<'_>, out: Vec<String>, translations: &mut HashMap<String, String>) {
    if out.len() != batch.segments.len() {
        warn!(
            batch = index,
            expected = batch.segments.len(),
            got = out.len(),
            "backend returned a different item count"
        );
    }
    for (seg, text) in batch.segments.iter().zip(out) {
        translations.insert(seg.id.clone(), text);
    }
}
