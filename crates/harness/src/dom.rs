//! Document model
//!
//! An arena-backed element tree. Nodes are never removed from the arena,
//! only detached from their parent, so a [`NodeId`] stays meaningful for
//! the lifetime of a page load and a detached node can be reported as such.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of an element inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Axis-aligned layout box in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Box used for elements without explicit layout anywhere up the tree
    pub const DEFAULT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 20.0,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when the two boxes share a region of positive area
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Rendering surface size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1000, height: 660 }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    /// Own text, excluding children
    pub text: String,
    pub rect: Option<Rect>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            rect: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document holding only an empty `body`
    pub fn new() -> Self {
        Self {
            nodes: vec![Element::new("body")],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.0)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(id.0)
    }

    pub fn tag(&self, id: NodeId) -> &str {
        self.element(id).map(|e| e.tag.as_str()).unwrap_or("")
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Create a detached element
    pub fn create(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    /// Create an element as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create(tag);
        self.attach(parent, id);
        id
    }

    /// Move `child` under `parent`, detaching it from any previous parent
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.is_ancestor(child, parent) {
            return;
        }
        self.detach(child);
        if let Some(el) = self.nodes.get_mut(child.0) {
            el.parent = Some(parent);
        }
        if let Some(el) = self.nodes.get_mut(parent.0) {
            el.children.push(child);
        }
    }

    /// Remove `id` (and its subtree) from the tree. The root cannot be detached.
    pub fn detach(&mut self, id: NodeId) {
        if id == self.root() {
            return;
        }
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(el) = self.nodes.get_mut(parent.0) {
            el.children.retain(|c| *c != id);
        }
        if let Some(el) = self.nodes.get_mut(id.0) {
            el.parent = None;
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// An element is attached when its parent chain reaches the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.is_ancestor(self.root(), id)
    }

    /// Attached elements in document (pre-)order, root first
    pub fn elements(&self) -> Vec<NodeId> {
        self.subtree(self.root())
    }

    /// `id` followed by its descendants in document order
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.remove(name);
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(el) = self.element_mut(id) {
            el.text = text.to_string();
        }
    }

    /// Whitespace-normalised text of the element and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut words = Vec::new();
        for node in self.subtree(id) {
            if let Some(el) = self.element(node) {
                words.extend(el.text.split_whitespace());
            }
        }
        words.join(" ")
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    /// Explicit box of the element, else the nearest ancestor's, else [`Rect::DEFAULT`]
    pub fn layout_rect(&self, id: NodeId) -> Rect {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|node| self.element(node).and_then(|e| e.rect))
            .unwrap_or(Rect::DEFAULT)
    }

    fn hidden_by_style(&self, id: NodeId) -> bool {
        if self.has_attr(id, "hidden") {
            return true;
        }
        let Some(style) = self.attr(id, "style") else {
            return false;
        };
        let style: String = style
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        style.contains("display:none") || style.contains("visibility:hidden")
    }

    /// Attached, not hidden by itself or an ancestor, non-empty box intersecting the viewport
    pub fn is_visible(&self, id: NodeId, viewport: &Viewport) -> bool {
        if !self.is_attached(id) {
            return false;
        }
        if std::iter::once(id)
            .chain(self.ancestors(id))
            .any(|node| self.hidden_by_style(node))
        {
            return false;
        }
        let rect = self.layout_rect(id);
        !rect.is_empty() && rect.intersects(&viewport.rect())
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.has_attr(id, "disabled") || self.attr(id, "aria-disabled") == Some("true")
    }

    /// Elements that accept focus: native controls, links with href, anything with tabindex
    pub fn is_focusable(&self, id: NodeId) -> bool {
        if self.has_attr(id, "tabindex") {
            return true;
        }
        match self.tag(id) {
            "button" | "input" | "select" | "textarea" => !self.is_disabled(id),
            "a" => self.has_attr(id, "href"),
            _ => false,
        }
    }

    /// Part of sequential (Tab key) focus navigation
    pub fn is_tabbable(&self, id: NodeId, viewport: &Viewport) -> bool {
        self.is_focusable(id)
            && self.attr(id, "tabindex").map(|t| t.trim() != "-1").unwrap_or(true)
            && self.is_visible(id, viewport)
    }

    /// Explicit `role` attribute, else the implicit ARIA role of the tag
    pub fn role(&self, id: NodeId) -> Option<String> {
        if let Some(role) = self.attr(id, "role") {
            return role.split_whitespace().next().map(str::to_string);
        }
        let implicit = match self.tag(id) {
            "button" => "button",
            "a" if self.has_attr(id, "href") => "link",
            "select" => "combobox",
            "textarea" => "textbox",
            "input" => match self.attr(id, "type").unwrap_or("text") {
                "checkbox" => "checkbox",
                "radio" => "radio",
                "button" | "submit" | "reset" => "button",
                _ => "textbox",
            },
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            "ul" | "ol" => "list",
            "li" => "listitem",
            "nav" => "navigation",
            "main" => "main",
            "option" => "option",
            "dialog" => "dialog",
            _ => return None,
        };
        Some(implicit.to_string())
    }

    /// `aria-label`, else the element's text
    pub fn accessible_name(&self, id: NodeId) -> String {
        match self.attr(id, "aria-label") {
            Some(label) => label.trim().to_string(),
            None => self.text_content(id),
        }
    }

    /// Current form value (`value` attribute)
    pub fn value(&self, id: NodeId) -> String {
        self.attr(id, "value").unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let panel = doc.append(root, "section");
        doc.set_attr(panel, "data-cy", "dtse-stage-panel-1");
        let button = doc.append(panel, "button");
        doc.set_text(button, "Next");
        (doc, panel, button)
    }

    #[test]
    fn test_detached_nodes_are_not_visible() {
        let (mut doc, panel, button) = sample();
        let viewport = Viewport::new(1600, 900);
        assert!(doc.is_visible(button, &viewport));

        doc.detach(panel);
        assert!(!doc.is_attached(button));
        assert!(!doc.is_visible(button, &viewport));
        assert_eq!(doc.elements(), vec![doc.root()]);
    }

    #[test]
    fn test_hidden_ancestor_hides_descendants() {
        let (mut doc, panel, button) = sample();
        let viewport = Viewport::default();
        doc.set_attr(panel, "hidden", "");
        assert!(!doc.is_visible(button, &viewport));

        doc.remove_attr(panel, "hidden");
        doc.set_attr(panel, "style", "display: none");
        assert!(!doc.is_visible(button, &viewport));
    }

    #[test]
    fn test_visibility_depends_on_viewport() {
        let (mut doc, panel, button) = sample();
        if let Some(el) = doc.element_mut(panel) {
            el.rect = Some(Rect::new(1700.0, 10.0, 200.0, 50.0));
        }
        assert!(!doc.is_visible(button, &Viewport::new(1600, 900)));
        assert!(doc.is_visible(button, &Viewport::new(1920, 1080)));
    }

    #[test]
    fn test_text_content_is_normalised() {
        let (mut doc, panel, _) = sample();
        let hint = doc.append(panel, "span");
        doc.set_text(hint, "  Next step:\n review ");
        assert_eq!(doc.text_content(panel), "Next Next step: review");
    }

    #[test]
    fn test_implicit_roles_and_focusability() {
        let (mut doc, panel, button) = sample();
        assert_eq!(doc.role(button).as_deref(), Some("button"));
        assert!(doc.is_focusable(button));
        assert!(!doc.is_focusable(panel));

        doc.set_attr(panel, "role", "tabpanel");
        doc.set_attr(panel, "tabindex", "-1");
        assert_eq!(doc.role(panel).as_deref(), Some("tabpanel"));
        assert!(doc.is_focusable(panel));
        assert!(!doc.is_tabbable(panel, &Viewport::default()));
    }
}
