//! Text rendering of projected trees for logs and tests.

use vitrine_core::TreeStyle;

use super::error::TreeResult;
use super::projector::{NodeId, TreeProjector};

/// Options for [`TreeDebug`].
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The visual style.
    pub style: TreeStyle,
    /// Whether to append each node's handle.
    pub show_ids: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
    /// Fetch unrealized children instead of marking them as collapsed.
    pub realize: bool,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: false,
            max_depth: None,
            indent_size: 3,
            realize: false,
        }
    }
}

impl TreeFormatOptions {
    /// Options that expand the whole tree.
    pub fn expanded() -> Self {
        Self {
            realize: true,
            ..Default::default()
        }
    }
}

/// Renders a [`TreeProjector`] as an indented outline.
///
/// Unrealized nodes that could have children are suffixed with `...` unless
/// [`TreeFormatOptions::realize`] is set.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    /// Create a formatter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a formatter with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the whole tree, labelling each node with `label`.
    pub fn format<T, F>(&self, projector: &TreeProjector<T>, label: F) -> TreeResult<String>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T) -> String,
    {
        let mut output = String::new();
        match projector.root() {
            Some(root) => self.format_into(projector, &label, root, 0, true, &mut output)?,
            None => output.push_str("(empty)\n"),
        }
        Ok(output)
    }

    fn format_into<T, F>(
        &self,
        projector: &TreeProjector<T>,
        label: &F,
        node: NodeId,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) -> TreeResult<()>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T) -> String,
    {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        output.push_str(&self.options.style.prefix(depth, is_last, self.options.indent_size));
        output.push_str(&label(&projector.wrapped_object(node)?));
        if self.options.show_ids {
            output.push_str(&format!(" [{node:?}]"));
        }

        let expand = projector.allows_children(node)? && (self.options.realize || projector.is_realized(node));
        if projector.allows_children(node)? && !expand {
            output.push_str(" ...");
        }
        output.push('\n');

        if expand {
            let children = projector.children(node)?;
            let last = children.len().saturating_sub(1);
            for (index, child) in children.into_iter().enumerate() {
                self.format_into(projector, label, child, depth + 1, index == last, output)?;
            }
        }
        Ok(())
    }
}
