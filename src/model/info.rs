//! Indented text rendering used by `model.info`.

#[derive(Debug, Default)]
pub(crate) struct InfoNode {
    items: Vec<(String, InfoItem)>,
}

#[derive(Debug)]
enum InfoItem {
    Leaf(String),
    Node(InfoNode),
}

impl InfoNode {
    pub(crate) fn node(&mut self, name: &str, node: InfoNode) {
        self.items.push((name.to_string(), InfoItem::Node(node)));
    }

    pub(crate) fn leaf(&mut self, key: &str, value: String) {
        self.items.push((key.to_string(), InfoItem::Leaf(value)));
    }
}

/// One line per node and leaf. Leaf values are right-aligned to
/// `line_length`, with at least one space after the key.
pub(crate) fn info_lines(root: &InfoNode, line_length: usize, indent: usize) -> Vec<String> {
    let mut lines = Vec::new();
    render(root, 0, line_length, indent, &mut lines);
    lines
}

fn render(node: &InfoNode, depth: usize, line_length: usize, indent: usize, lines: &mut Vec<String>) {
    let prefix = " ".repeat(depth * indent);
    for (key, item) in &node.items {
        match item {
            InfoItem::Node(child) => {
                lines.push(format!("{prefix}{key}"));
                render(child, depth + 1, line_length, indent, lines);
            }
            InfoItem::Leaf(value) => {
                let used = prefix.len() + key.len() + value.len();
                let padding = line_length.saturating_sub(used).max(1);
                lines.push(format!("{prefix}{key}{}{value}", " ".repeat(padding)));
            }
        }
    }
}
