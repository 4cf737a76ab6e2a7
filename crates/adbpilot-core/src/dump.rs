//! Parser for `uiautomator` hierarchy dumps.
//!
//! A hierarchy dump is a serialized tree snapshot of the currently rendered
//! UI, one element per visible widget, each carrying attributes (`text`,
//! `bounds`, `class`, etc.). This module turns the raw XML into a [`UiNode`]
//! tree and a flattened node list used for linear text search.
//!
//! Parsing is pure and deterministic: no I/O, identical input yields
//! identical output.
//!
//! # Bounds policy
//!
//! A node with a missing or malformed `bounds` attribute is retained with
//! [`Bounds::ZERO`] rather than dropped; only structural markup errors
//! (unbalanced tags, missing root, empty input) fail the whole document.
//!
//! # Example
//!
//! ```
//! use adbpilot_core::dump::parse_document;
//!
//! let xml = r#"<hierarchy rotation="0">
//!   <node class="android.widget.TextView" text="Settings" bounds="[0,0][200,64]"/>
//! </hierarchy>"#;
//!
//! let root = parse_document(xml).unwrap();
//! let nodes = root.flatten();
//! assert!(nodes.iter().any(|n| n.text() == "Settings"));
//! ```

use std::collections::HashMap;

use thiserror::Error;

/// Errors raised while parsing a hierarchy dump.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The dump text is not well-formed markup (unbalanced tags, missing
    /// root, empty input).
    #[error("Malformed hierarchy dump: {0}")]
    Malformed(#[from] roxmltree::Error),
}

/// A bounding rectangle in device pixel space.
///
/// Decoded from the `bounds` attribute encoding `"[x1,y1][x2,y2]"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// The empty rectangle assigned to nodes without parsable bounds.
    pub const ZERO: Bounds = Bounds {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Decodes the `"[x1,y1][x2,y2]"` encoding. Returns `None` for any
    /// deviation from that shape.
    pub fn parse(raw: &str) -> Option<Bounds> {
        let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
        let (first, second) = inner.split_once("][")?;
        let (left, top) = first.split_once(',')?;
        let (right, bottom) = second.split_once(',')?;

        Some(Bounds {
            left: left.trim().parse().ok()?,
            top: top.trim().parse().ok()?,
            right: right.trim().parse().ok()?,
            bottom: bottom.trim().parse().ok()?,
        })
    }

    /// The midpoint of the rectangle, useful as a tap target.
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    /// Whether `other` lies entirely within this rectangle.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }
}

/// A parsed element from a hierarchy dump.
///
/// Nodes form a tree via `children`; each child is owned exclusively by its
/// parent and there are no back-edges. Every node's bounds lie within its
/// parent's (the root lies within the device screen), except nodes that fell
/// back to [`Bounds::ZERO`].
#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    /// The element tag or widget class name.
    pub tag: String,

    /// Attribute name to string value. Absent attributes are simply not
    /// present; use [`UiNode::attr`] for empty-string defaulting.
    pub attributes: HashMap<String, String>,

    /// The decoded bounding rectangle.
    pub bounds: Bounds,

    /// Child nodes in document order.
    pub children: Vec<UiNode>,
}

impl UiNode {
    /// Returns the value of `name`, or `""` if the attribute is absent.
    pub fn attr(&self, name: &str) -> &str {
        self.attributes.get(name).map(String::as_str).unwrap_or("")
    }

    /// The human-visible `text` attribute.
    pub fn text(&self) -> &str {
        self.attr("text")
    }

    /// Flattens the tree into a node list in depth-first preorder: a node
    /// always precedes its children, children appear in document order.
    ///
    /// The list always includes the root, so a well-formed document yields a
    /// list of length at least 1.
    pub fn flatten(&self) -> Vec<UiNode> {
        let mut result = Vec::new();
        self.collect(&mut result);
        result
    }

    fn collect(&self, result: &mut Vec<UiNode>) {
        result.push(self.clone());
        for child in &self.children {
            child.collect(result);
        }
    }
}

/// Parses raw hierarchy-dump XML into a [`UiNode`] tree.
///
/// Tolerant of attribute ordering and optional attributes; strict about
/// markup structure.
///
/// # Errors
///
/// - [`ParseError::Malformed`] if the text is not well-formed XML
pub fn parse_document(xml: &str) -> Result<UiNode, ParseError> {
    let doc = roxmltree::Document::parse(xml)?;
    Ok(convert(doc.root_element()))
}

fn convert(node: roxmltree::Node) -> UiNode {
    let attributes: HashMap<String, String> = node
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();

    let bounds = attributes
        .get("bounds")
        .and_then(|raw| Bounds::parse(raw))
        .unwrap_or(Bounds::ZERO);

    let children = node
        .children()
        .filter(|c| c.is_element())
        .map(convert)
        .collect();

    UiNode {
        tag: node.tag_name().name().to_string(),
        attributes,
        bounds,
        children,
    }
}
