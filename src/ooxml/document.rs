use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::package::Package;
use super::xml::{XmlEvent, XmlPart};
use crate::error::{Error, Result};
use crate::ir::{DocumentMetadata, TargetKey, TargetKind, TextNodeRef, TextSegment, TextTarget};
use crate::DocumentKind;

static NEEDS_PRESERVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s|\s$| {2}|[\r\n\t]").expect("preserve"));

/// Readers collapse whitespace in text nodes unless told otherwise.
pub fn needs_space_preserve(text: &str) -> bool {
    NEEDS_PRESERVE_RE.is_match(text)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpacePolicy {
    /// Set `xml:space="preserve"` when needed, never remove it.
    AddOnly,
    /// Set when needed, drop it otherwise.
    Sync,
    /// Element does not take the attribute.
    Leave,
}

impl TargetKind {
    fn space_policy(self) -> SpacePolicy {
        match self {
            TargetKind::Run => SpacePolicy::AddOnly,
            TargetKind::SharedString | TargetKind::InlineString => SpacePolicy::Sync,
            TargetKind::FormulaString => SpacePolicy::Leave,
        }
    }
}

pub(crate) type Locator = fn(&XmlPart, &TargetKey) -> Option<TextNodeRef>;

#[derive(Clone, Debug)]
pub struct ParsedDocument {
    pub kind: DocumentKind,
    pub package: Package,
    pub parts: HashMap<String, XmlPart>,
    pub segments: Vec<TextSegment>,
    pub targets: HashMap<String, TextTarget>,
    pub metadata: DocumentMetadata,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub applied: usize,
    pub missing_targets: usize,
    pub touched_parts: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RebuiltDocument {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub report: RebuildReport,
}

impl ParsedDocument {
    pub(crate) fn rebuild_with(
        &mut self,
        translations: &HashMap<String, String>,
        locate: Locator,
    ) -> Result<RebuiltDocument> {
        let mut report = RebuildReport::default();
        let mut touched: BTreeSet<String> = BTreeSet::new();

        for seg in &self.segments {
            let Some(value) = translations.get(&seg.id) else {
                continue;
            };
            let Some(target) = self.targets.get(&seg.id) else {
                report.missing_targets += 1;
                continue;
            };
            let Some(part) = self.parts.get_mut(&target.part_path) else {
                warn!(segment = %seg.id, part = %target.part_path, "target part not loaded");
                report.missing_targets += 1;
                continue;
            };
            let Some(node) = resolve(part, target, locate) else {
                warn!(segment = %seg.id, part = %target.part_path, "target node not found");
                report.missing_targets += 1;
                continue;
            };
            apply_node_text(part, node, value, target.kind.space_policy())
                .map_err(|e| Error::malformed(&target.part_path, &e))?;
            touched.insert(target.part_path.clone());
            report.applied += 1;
        }
        report.missing_targets += translations
            .keys()
            .filter(|id| !self.targets.contains_key(id.as_str()))
            .count();

        let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
        for path in &touched {
            let part = &self.parts[path];
            if !part.structure_unchanged() {
                return Err(Error::StructureChanged(path.clone()));
            }
            let bytes = part.to_bytes();
            replacements.insert(path.clone(), bytes);
        }
        debug!(
            applied = report.applied,
            missing = report.missing_targets,
            parts = touched.len(),
            "rebuilding package"
        );
        let bytes = self.package.write_with_replacements(&replacements)?;
        report.touched_parts = touched.into_iter().collect();
        Ok(RebuiltDocument {
            bytes,
            mime: self.kind.mime(),
            report,
        })
    }
}

/// Direct handle when it still belongs to this part, structural key otherwise.
fn resolve(part: &XmlPart, target: &TextTarget, locate: Locator) -> Option<TextNodeRef> {
    let node = target.node;
    let direct_ok = target.fingerprint == part.baseline_hash
        && part.text_at(node.text_event_index).is_some()
        && matches!(part.events.get(node.elem_event_index), Some(XmlEvent::Start { .. }));
    if direct_ok {
        return Some(node);
    }
    debug!(segment = %target.segment_id, "re-locating target by key");
    locate(part, &target.key)
}

fn apply_node_text(
    part: &mut XmlPart,
    node: TextNodeRef,
    value: &str,
    policy: SpacePolicy,
) -> anyhow::Result<()> {
    part.set_text(node.text_event_index, value)?;
    match policy {
        SpacePolicy::Leave => {}
        SpacePolicy::AddOnly => {
            if needs_space_preserve(value) {
                part.set_attr(node.elem_event_index, "xml:space", "preserve");
            }
        }
        SpacePolicy::Sync => {
            if needs_space_preserve(value) {
                part.set_attr(node.elem_event_index, "xml:space", "preserve");
            } else {
                part.remove_attr(node.elem_event_index, "xml:space");
            }
        }
    }
    Ok(())
}
