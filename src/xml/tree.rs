//! Minimal element tree built from one XML document.
//!
//! Only what the field extractor needs is kept: the local tag name, the
//! element's own text and its children in document order. Attributes and
//! namespaces are dropped.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Why a document could not be turned into a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("closing tag without matching open tag")]
    UnmatchedClose,

    #[error("unexpected end of document inside <{0}>")]
    Unclosed(String),

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("document has no root element")]
    NoRoot,
}

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, TreeError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    stack.push(Element::new(name));
                }
                Ok(Event::Empty(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    attach(&mut stack, &mut root, Element::new(name))?;
                }
                Ok(Event::End(_)) => {
                    let mut element = stack.pop().ok_or(TreeError::UnmatchedClose)?;
                    element.text = element.text.trim().to_string();
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::GeneralRef(ref e)) => {
                    if let Some(top) = stack.last_mut() {
                        let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                        match resolve_entity(&name) {
                            Some(c) => top.text.push(c),
                            None => {
                                top.text.push('&');
                                top.text.push_str(&name);
                                top.text.push(';');
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(TreeError::Syntax {
                        position: reader.error_position(),
                        message: e.to_string(),
                    })
                }
            }
        }

        if let Some(open) = stack.pop() {
            return Err(TreeError::Unclosed(open.name));
        }
        root.ok_or(TreeError::NoRoot)
    }

    /// Local tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trimmed text directly inside this element
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Direct children with the given tag
    pub fn children_named<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Element> + 'a {
        let tag = tag.to_owned();
        self.children.iter().filter(move |c| c.name == tag)
    }

    /// All descendants (not self), depth-first pre-order
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Descendants with the given tag, in document order
    pub fn descendants_named<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Element> + 'a {
        let tag = tag.to_owned();
        self.descendants().filter(move |e| e.name == tag)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }
}

/// Pre-order iterator over an element's descendants.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), TreeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(TreeError::MultipleRoots),
    }
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_namespace_prefixes() {
        let root = Element::parse(
            r#"<sl:bagStand xmlns:sl="x"><Objecten:Pand><Objecten:identificatie domein="NL">P1</Objecten:identificatie></Objecten:Pand></sl:bagStand>"#,
        )
        .unwrap();
        assert_eq!(root.name(), "bagStand");
        let pand = root.children_named("Pand").next().unwrap();
        assert_eq!(pand.children()[0].name(), "identificatie");
        assert_eq!(pand.children()[0].text(), "P1");
    }

    #[test]
    fn test_entities_keep_surrounding_spaces() {
        let root = Element::parse("<a><naam>Ruys &amp; Co &#39;t Hof</naam></a>").unwrap();
        assert_eq!(root.children()[0].text(), "Ruys & Co 't Hof");
    }

    #[test]
    fn test_descendants_are_pre_order() {
        let root = Element::parse("<r><a><b/><c/></a><d/></r>").unwrap();
        let names: Vec<&str> = root.descendants().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unbalanced_document_is_error() {
        assert!(Element::parse("<r><a></r>").is_err());
        assert_eq!(Element::parse(""), Err(TreeError::NoRoot));
        assert_eq!(
            Element::parse("<r><a>"),
            Err(TreeError::Unclosed("a".to_string()))
        );
        assert_eq!(Element::parse("<a/><b/>"), Err(TreeError::MultipleRoots));
    }

    #[test]
    fn test_lookup_tag_may_outlive_call() {
        let root = Element::parse("<r><a><b>1</b></a><b>2</b></r>").unwrap();
        let found: Vec<&Element> = {
            let tag = String::from("b");
            root.descendants_named(&tag).collect()
        };
        assert_eq!(found.iter().map(|e| e.text()).collect::<Vec<_>>(), vec!["1", "2"]);
        let direct = {
            let tag = String::from("a");
            root.children_named(&tag).count()
        };
        assert_eq!(direct, 1);
    }
}
