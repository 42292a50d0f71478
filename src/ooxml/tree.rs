use quick_xml::escape::unescape;

use super::xml::{local_name, XmlEvent, XmlPart};

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Text events that are direct children of this element.
    pub texts: Vec<usize>,
}

/// Element hierarchy over an event-list part; node ids are in document order.
#[derive(Clone, Debug, Default)]
pub struct ElementTree {
    nodes: Vec<Node>,
}

impl ElementTree {
    pub fn build(part: &XmlPart) -> Self {
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        for (idx, ev) in part.events.iter().enumerate() {
            match ev {
                XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } => {
                    let id = nodes.len();
                    let parent = stack.last().copied();
                    nodes.push(Node {
                        name: name.clone(),
                        start: idx,
                        end: idx,
                        parent,
                        children: Vec::new(),
                        texts: Vec::new(),
                    });
                    if let Some(p) = parent {
                        nodes[p].children.push(id);
                    }
                    if matches!(ev, XmlEvent::Start { .. }) {
                        stack.push(id);
                    }
                }
                XmlEvent::End { .. } => {
                    if let Some(id) = stack.pop() {
                        nodes[id].end = idx;
                    }
                }
                XmlEvent::Text { .. } => {
                    if let Some(&id) = stack.last() {
                        nodes[id].texts.push(idx);
                    }
                }
                _ => {}
            }
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn root(&self) -> Option<usize> {
        (!self.nodes.is_empty()).then_some(0)
    }

    pub fn local(&self, id: usize) -> &str {
        local_name(&self.nodes[id].name)
    }

    pub fn ancestors(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&p| self.nodes[p].parent)
    }

    pub fn nearest_ancestor(&self, id: usize, qname: &QName) -> Option<usize> {
        self.ancestors(id).find(|&a| qname.matches(&self.nodes[a].name))
    }

    pub fn has_ancestor(&self, id: usize, qname: &QName) -> bool {
        self.nearest_ancestor(id, qname).is_some()
    }

    pub fn children_named<'a>(
        &'a self,
        id: usize,
        qname: &'a QName,
    ) -> impl Iterator<Item = usize> + 'a {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(move |&c| qname.matches(&self.nodes[c].name))
    }

    pub fn first_child(&self, id: usize, qname: &QName) -> Option<usize> {
        self.children_named(id, qname).next()
    }

    pub fn all_named<'a>(&'a self, qname: &'a QName) -> impl Iterator<Item = usize> + 'a {
        (0..self.nodes.len()).filter(move |&i| qname.matches(&self.nodes[i].name))
    }

    pub fn descendants_named<'a>(
        &'a self,
        id: usize,
        qname: &'a QName,
    ) -> impl Iterator<Item = usize> + 'a {
        let end = self.nodes[id].end;
        (id + 1..self.nodes.len())
            .take_while(move |&i| self.nodes[i].start < end)
            .filter(move |&i| qname.matches(&self.nodes[i].name))
    }

    pub fn attr(&self, part: &XmlPart, id: usize, key: &str) -> Option<String> {
        let attrs = part.events.get(self.nodes[id].start)?.attrs()?;
        attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| unescape(v).map(|c| c.into_owned()).unwrap_or_else(|_| v.clone()))
    }

    /// Attribute value matched by local name, whatever prefix it carries.
    pub fn attr_local(&self, part: &XmlPart, id: usize, local: &str) -> Option<String> {
        let attrs = part.events.get(self.nodes[id].start)?.attrs()?;
        attrs
            .iter()
            .find(|(k, _)| k.contains(':') && local_name(k) == local)
            .map(|(_, v)| unescape(v).map(|c| c.into_owned()).unwrap_or_else(|_| v.clone()))
    }

    pub fn text(&self, part: &XmlPart, id: usize) -> String {
        self.nodes[id]
            .texts
            .iter()
            .filter_map(|&t| part.text_at(t))
            .collect()
    }

    /// Prefix bound to `uri` on the root element; `Some("")` for a default namespace.
    pub fn prefix_for(&self, part: &XmlPart, uri: &str) -> Option<String> {
        let root = self.root()?;
        let attrs = part.events.get(self.nodes[root].start)?.attrs()?;
        attrs.iter().find(|(_, v)| v == uri).and_then(|(k, _)| {
            if k == "xmlns" {
                Some(String::new())
            } else {
                k.strip_prefix("xmlns:").map(str::to_string)
            }
        })
    }
}

/// Element name resolved against the prefix a part actually uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QName {
    qualified: String,
}

impl QName {
    pub fn new(prefix: &str, local: &str) -> Self {
        let qualified = if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{prefix}:{local}")
        };
        Self { qualified }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.qualified == name
    }

    pub fn as_str(&self) -> &str {
        &self.qualified
    }
}

#[derive(Clone, Debug)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn resolve(tree: &ElementTree, part: &XmlPart, uri: &str, fallback_prefix: &str) -> Self {
        let prefix = tree
            .prefix_for(part, uri)
            .unwrap_or_else(|| fallback_prefix.to_string());
        Self { prefix }
    }

    pub fn name(&self, local: &str) -> QName {
        QName::new(&self.prefix, local)
    }
}
