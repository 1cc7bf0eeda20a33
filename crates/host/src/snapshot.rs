use crate::{HostId, MemoryHost};
use std::fmt;

/// Deterministic indented dump of a [`MemoryHost`] subtree.
///
/// Not a stable format; intended for test comparisons and demo output.
/// Attributes print in creation order, listeners as `@name`, text nodes
/// quoted.
#[derive(Debug)]
pub struct HostSnapshot {
    lines: Vec<String>,
}

impl HostSnapshot {
    pub fn new(host: &MemoryHost, root: HostId) -> Self {
        let mut lines = Vec::new();
        walk(host, root, 0, &mut lines);
        Self { lines }
    }

    /// Snapshot of each child of `root`, skipping the container itself.
    pub fn children_of(host: &MemoryHost, root: HostId) -> Self {
        let mut lines = Vec::new();
        for child in host.children(root) {
            walk(host, *child, 0, &mut lines);
        }
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for HostSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn walk(host: &MemoryHost, id: HostId, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    if let Some(text) = host.text(id) {
        lines.push(format!("{indent}\"{text}\""));
        return;
    }
    let Some(tag) = host.tag(id) else {
        lines.push(format!("{indent}<?{}>", id.0));
        return;
    };
    let mut line = format!("{indent}<{tag}");
    for (name, value) in host.attributes(id) {
        if value.is_empty() {
            line.push_str(&format!(" {name}"));
        } else {
            line.push_str(&format!(" {name}=\"{value}\""));
        }
    }
    for name in host.listener_names(id) {
        line.push_str(&format!(" @{name}"));
    }
    line.push('>');
    lines.push(line);
    for child in host.children(id) {
        walk(host, *child, depth + 1, lines);
    }
}
