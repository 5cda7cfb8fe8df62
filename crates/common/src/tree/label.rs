use crate::collection::{Node, NodeId};

/// Spaces (or `&nbsp;`s) per indent level
pub const INDENT_WIDTH: usize = 4;

/// Depth that renders unindented: the children of the reserved Root.
pub const DEFAULT_LABEL_BASE_DEPTH: u32 = 2;

/// How [`indented_label`] renders its indent and branch marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelStyle {
    #[default]
    Plain,
    /// Non-breaking spaces, an entity for the branch glyph, and an
    ///  escaped name
    Html,
}

impl LabelStyle {
    fn indent_unit(self) -> &'static str {
        match self {
            LabelStyle::Plain => " ",
            LabelStyle::Html => "&nbsp;",
        }
    }

    fn branch(self) -> &'static str {
        match self {
            LabelStyle::Plain => "↳",
            LabelStyle::Html => "&#x21b3",
        }
    }
}

/// `node`'s name indented by how far it sits below `base_depth`.
pub fn indented_label(node: &Node, base_depth: u32, style: LabelStyle) -> String {
    let name = match style {
        LabelStyle::Plain => node.name().to_string(),
        LabelStyle::Html => escape_html(node.name()),
    };
    let display_depth = node.depth().saturating_sub(base_depth);
    if display_depth == 0 {
        return name;
    }
    format!(
        "{}{} {}",
        style.indent_unit().repeat(INDENT_WIDTH * display_depth as usize),
        style.branch(),
        name
    )
}

/// `(id, label)` pairs for a collection chooser, indented relative to the
///  shallowest node in `nodes`.
pub fn indented_choices(nodes: &[Node]) -> Vec<(NodeId, String)> {
    let base_depth = nodes
        .iter()
        .map(Node::depth)
        .min()
        .unwrap_or(DEFAULT_LABEL_BASE_DEPTH);
    nodes
        .iter()
        .map(|node| (node.id(), indented_label(node, base_depth, LabelStyle::Html)))
        .collect()
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
