use crate::ir::TextNodeRef;
use crate::ooxml::tree::{ElementTree, Namespace};
use crate::ooxml::xml::XmlPart;

use super::workbook::S_NS;

/// What a string item (`si` or inline `is`) offers for translation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StringItem {
    Plain { text: String, node: TextNodeRef },
    /// Several formatted runs; text is their concatenation.
    Rich { text: String },
    Missing,
}

impl StringItem {
    pub fn text(&self) -> Option<&str> {
        match self {
            StringItem::Plain { text, .. } | StringItem::Rich { text } => Some(text),
            StringItem::Missing => None,
        }
    }
}

/// Classifies the string item rooted at element `id`.
///
/// A single run binds to that run's `t`; without runs the direct `t` is used.
pub(crate) fn classify_item(tree: &ElementTree, part: &XmlPart, ns: &Namespace, id: usize) -> StringItem {
    let r = ns.name("r");
    let t = ns.name("t");
    let runs: Vec<usize> = tree.children_named(id, &r).collect();
    if runs.len() > 1 {
        let text = runs
            .iter()
            .filter_map(|&run| tree.first_child(run, &t))
            .map(|tid| tree.text(part, tid))
            .collect();
        return StringItem::Rich { text };
    }
    let text_elem = match runs.first() {
        Some(&run) => tree.first_child(run, &t),
        None => tree.first_child(id, &t),
    };
    let Some(tid) = text_elem else {
        return StringItem::Missing;
    };
    let node = tree.node(tid);
    match node.texts.as_slice() {
        &[text_event_index] => StringItem::Plain {
            text: tree.text(part, tid),
            node: TextNodeRef {
                elem_event_index: node.start,
                text_event_index,
            },
        },
        // `<t/>` or split content: nothing a single write could replace
        _ => StringItem::Missing,
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SharedStrings {
    pub path: String,
    pub items: Vec<StringItem>,
}

impl SharedStrings {
    pub fn parse(part: &XmlPart) -> Self {
        let tree = ElementTree::build(part);
        let ns = Namespace::resolve(&tree, part, S_NS, "");
        let si = ns.name("si");
        let items = tree
            .all_named(&si)
            .map(|id| classify_item(&tree, part, &ns, id))
            .collect();
        Self {
            path: part.path.clone(),
            items,
        }
    }

    pub fn get(&self, index: usize) -> Option<&StringItem> {
        self.items.get(index)
    }
}

/// Finds the text node of shared-string entry `index` in a live table part.
pub(crate) fn locate_shared(part: &XmlPart, index: usize) -> Option<TextNodeRef> {
    let tree = ElementTree::build(part);
    let ns = Namespace::resolve(&tree, part, S_NS, "");
    let si = ns.name("si");
    let id = tree.all_named(&si).nth(index)?;
    match classify_item(&tree, part, &ns, id) {
        StringItem::Plain { node, .. } => Some(node),
        _ => None,
    }
}
