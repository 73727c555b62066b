//! Selector resolution
//!
//! Supported locators:
//! - CSS-like selectors: `tag`, `#id`, `.class`, `[attr]`, `[attr="v"]`,
//!   `[attr^="v"]`, `[attr$="v"]`, `[attr*="v"]`, `[attr~="v"]`, `:visible`,
//!   `:focus`, descendant and `>` combinators, comma-separated lists
//! - test-id attribute equality (`data-cy` by default)
//! - ARIA role with optional accessible name
//! - text content (deepest elements containing the text)
//! - the currently focused element
//!
//! Resolution never fails: an empty result is just an empty `Vec`.

use crate::dom::NodeId;
use crate::driver::{PageSnapshot, ReadyState};
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
}

impl AttrMatch {
    fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == v,
            AttrOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
            AttrOp::Contains(v) => !v.is_empty() && value.contains(v.as_str()),
            AttrOp::Word(v) => value.split_whitespace().any(|w| w == v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    visible: bool,
    focus: bool,
}

impl Compound {
    fn matches(&self, page: &PageSnapshot, node: NodeId) -> bool {
        let doc = &page.document;
        if let Some(tag) = &self.tag {
            if doc.tag(node) != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self
            .classes
            .iter()
            .all(|class| doc.classes(node).any(|c| c == class))
        {
            return false;
        }
        if !self.attrs.iter().all(|a| a.matches(doc.attr(node, &a.name))) {
            return false;
        }
        if self.visible && !page.is_visible(node) {
            return false;
        }
        if self.focus && !page.has_focus(node) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    parts: Vec<Compound>,
    /// `combinators[i]` joins `parts[i]` and `parts[i + 1]`
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches(&self, page: &PageSnapshot, node: NodeId) -> bool {
        self.match_from(page, self.parts.len() - 1, node)
    }

    fn match_from(&self, page: &PageSnapshot, index: usize, node: NodeId) -> bool {
        if !self.parts[index].matches(page, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => page
                .document
                .parent(node)
                .map(|p| self.match_from(page, index - 1, p))
                .unwrap_or(false),
            Combinator::Descendant => page
                .document
                .ancestors(node)
                .into_iter()
                .any(|a| self.match_from(page, index - 1, a)),
        }
    }
}

struct CssParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> CssParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> HarnessError {
        HarnessError::config(format!(
            "invalid selector {:?} at offset {}: {}",
            self.source, self.pos, message
        ))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn is_ident_char(c: char) -> bool {
        c.is_alphanumeric() || c == '-' || c == '_'
    }

    fn ident(&mut self) -> HarnessResult<String> {
        let start = self.pos;
        while self.peek().map(Self::is_ident_char).unwrap_or(false) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_list(&mut self) -> HarnessResult<Vec<Complex>> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                }
                Some(_) => return Err(self.error("unexpected character")),
            }
        }
        Ok(list)
    }

    fn parse_complex(&mut self) -> HarnessResult<Complex> {
        let mut parts = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(_) => return Err(self.error("unexpected character")),
            }
            parts.push(self.parse_compound()?);
        }
        Ok(Complex { parts, combinators })
    }

    fn parse_compound(&mut self) -> HarnessResult<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();
        if !self.eat('*') && self.peek().map(Self::is_ident_char).unwrap_or(false) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    match self.ident()?.as_str() {
                        "visible" => compound.visible = true,
                        "focus" => compound.focus = true,
                        other => {
                            return Err(self.error(&format!("unsupported pseudo-class :{}", other)))
                        }
                    }
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse_attr(&mut self) -> HarnessResult<AttrMatch> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        if self.eat(']') {
            return Ok(AttrMatch {
                name,
                op: AttrOp::Exists,
            });
        }
        let op: fn(String) -> AttrOp = match self.bump() {
            Some('=') => AttrOp::Equals,
            Some(c @ ('^' | '$' | '*' | '~')) => {
                if !self.eat('=') {
                    return Err(self.error("expected '='"));
                }
                match c {
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Contains,
                    _ => AttrOp::Word,
                }
            }
            _ => return Err(self.error("expected attribute operator")),
        };
        self.skip_ws();
        let value = self.attr_value()?;
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(AttrMatch {
            name,
            op: op(value),
        })
    }

    fn attr_value(&mut self) -> HarnessResult<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some('\\') => match self.bump() {
                            Some(c) => value.push(c),
                            None => return Err(self.error("unterminated string")),
                        },
                        Some(c) if c == quote => return Ok(value),
                        Some(c) => value.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            _ => self.ident(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Strategy {
    Css(Vec<Complex>),
    Attribute { name: String, value: String },
    Role { role: String, name: Option<String> },
    Text(String),
    Focused,
}

/// Positional filter applied after resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    Nth(usize),
}

/// A locator plus its resolution strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    raw: String,
    strategy: Strategy,
    position: Option<Position>,
}

impl Selector {
    /// Parse a CSS-like selector
    pub fn parse(css: &str) -> HarnessResult<Self> {
        let css = css.trim();
        if css.is_empty() {
            return Err(HarnessError::config("empty selector"));
        }
        let list = CssParser::new(css).parse_list()?;
        Ok(Self {
            raw: css.to_string(),
            strategy: Strategy::Css(list),
            position: None,
        })
    }

    /// Exact match on a test-hook attribute such as `data-cy`
    pub fn attribute(name: &str, value: &str) -> Self {
        Self {
            raw: format!("[{}=\"{}\"]", name, value),
            strategy: Strategy::Attribute {
                name: name.to_string(),
                value: value.to_string(),
            },
            position: None,
        }
    }

    pub fn role(role: &str, name: Option<&str>) -> Self {
        let raw = match name {
            Some(n) => format!("role={}[name=\"{}\"]", role, n),
            None => format!("role={}", role),
        };
        Self {
            raw,
            strategy: Strategy::Role {
                role: role.to_string(),
                name: name.map(str::to_string),
            },
            position: None,
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            raw: format!("contains({:?})", text),
            strategy: Strategy::Text(text.to_string()),
            position: None,
        }
    }

    pub fn focused() -> Self {
        Self {
            raw: "focused()".to_string(),
            strategy: Strategy::Focused,
            position: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn first(self) -> Self {
        self.at(Position::First)
    }

    /// Matching elements in document order. A page still loading matches nothing.
    pub fn resolve(&self, page: &PageSnapshot) -> Vec<NodeId> {
        if page.ready != ReadyState::Complete {
            return Vec::new();
        }
        let doc = &page.document;
        let mut matches: Vec<NodeId> = match &self.strategy {
            Strategy::Css(list) => doc
                .elements()
                .into_iter()
                .filter(|node| list.iter().any(|c| c.matches(page, *node)))
                .collect(),
            Strategy::Attribute { name, value } => doc
                .elements()
                .into_iter()
                .filter(|node| doc.attr(*node, name) == Some(value.as_str()))
                .collect(),
            Strategy::Role { role, name } => doc
                .elements()
                .into_iter()
                .filter(|node| doc.role(*node).as_deref() == Some(role.as_str()))
                .filter(|node| {
                    name.as_ref()
                        .map(|n| doc.accessible_name(*node) == *n)
                        .unwrap_or(true)
                })
                .collect(),
            Strategy::Text(text) => doc
                .elements()
                .into_iter()
                .filter(|node| doc.text_content(*node).contains(text.as_str()))
                .filter(|node| {
                    !doc
                        .children(*node)
                        .iter()
                        .any(|child| doc.text_content(*child).contains(text.as_str()))
                })
                .collect(),
            Strategy::Focused => page
                .focused
                .filter(|node| doc.is_attached(*node))
                .into_iter()
                .collect(),
        };

        match self.position {
            None => {}
            Some(Position::First) => matches.truncate(1),
            Some(Position::Last) => {
                let last = matches.pop();
                matches = last.into_iter().collect();
            }
            Some(Position::Nth(n)) => {
                matches = matches.get(n).copied().into_iter().collect();
            }
        }
        matches
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)?;
        match self.position {
            None => Ok(()),
            Some(Position::First) => f.write_str(" (first)"),
            Some(Position::Last) => f.write_str(" (last)"),
            Some(Position::Nth(n)) => write!(f, " (eq {})", n),
        }
    }
}
