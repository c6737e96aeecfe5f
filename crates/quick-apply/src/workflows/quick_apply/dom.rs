//! Serializable snapshot of a rendered UI subtree.
//!
//! Drivers hand the engine one `DomNode` per form section. Besides markup attributes the node
//! carries the live `value`/`checked`/`selected` properties, which is what the classifier
//! reads to learn the field's current answer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Text owned directly by this element (child element text excluded).
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        let merged = match self.attrs.get("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.attrs.insert("class".to_string(), merged);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Attribute compared case-insensitively, the way HTML boolean-ish attributes are written.
    pub fn attr_is(&self, name: &str, expected: &str) -> bool {
        self.get_attr(name)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|item| item == class))
    }

    pub fn id(&self) -> Option<&str> {
        self.get_attr("id").filter(|id| !id.is_empty())
    }

    /// Depth-first, pre-order walk over every descendant (the node itself excluded).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    pub fn find<P>(&self, mut predicate: P) -> Option<&DomNode>
    where
        P: FnMut(&DomNode) -> bool,
    {
        self.descendants().find(|node| predicate(*node))
    }

    pub fn find_all<P>(&self, mut predicate: P) -> Vec<&DomNode>
    where
        P: FnMut(&DomNode) -> bool,
    {
        self.descendants().filter(|node| predicate(*node)).collect()
    }

    pub fn find_tag(&self, tag: &str) -> Option<&DomNode> {
        self.find(|node| node.is(tag))
    }

    pub fn find_class(&self, class: &str) -> Option<&DomNode> {
        self.find(|node| node.has_class(class))
    }

    /// Text of the node and all descendants, with whitespace runs collapsed to one space.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        collect_text(self, &mut parts);
        parts
            .iter()
            .flat_map(|part| part.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Visible lines of text; keeps line structure that `text_content` flattens.
    pub fn text_lines(&self) -> Vec<String> {
        let mut parts = Vec::new();
        collect_text(self, &mut parts);
        parts
            .iter()
            .flat_map(|part| part.lines())
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect()
    }
}

fn collect_text<'a>(node: &'a DomNode, parts: &mut Vec<&'a str>) {
    if !node.text.is_empty() {
        parts.push(&node.text);
    }
    for child in &node.children {
        collect_text(child, parts);
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a DomNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a DomNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DomNode {
        DomNode::element("div")
            .class("grouping")
            .child(
                DomNode::element("label")
                    .attr("for", "email")
                    .child(DomNode::element("span").text("  Email\n   address ")),
            )
            .child(DomNode::element("input").attr("id", "email").value("a@b.c"))
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let node = sample();
        let tags: Vec<&str> = node.descendants().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, ["label", "span", "input"]);
    }

    #[test]
    fn text_content_collapses_whitespace() {
        assert_eq!(sample().text_content(), "Email address");
        assert_eq!(sample().text_lines(), ["Email", "address"]);
    }

    #[test]
    fn class_builder_appends_classes() {
        let node = DomNode::element("DIV").class("a").class("b");
        assert!(node.is("div"));
        assert!(node.has_class("a") && node.has_class("b"));
        assert!(!node.has_class("ab"));
    }
}
