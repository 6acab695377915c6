use std::path::Path;
use tree_sitter::Node as TSNode;

use super::common::{extract_text, find_child_by_kind, TreeSitterParser};
use super::{ImportDescriptor, ImportExtractor};
use crate::error::ExtractionError;

/// Import extractor for Python sources backed by tree-sitter.
///
/// Every import statement in the file is reported, including the ones nested
/// in functions, classes, `try` blocks and conditionals, in source order.
pub struct PythonImportExtractor;

impl PythonImportExtractor {
    pub fn new() -> Self {
        Self
    }

    fn collect_imports(&self, root: &TSNode, source: &[u8]) -> Vec<ImportDescriptor> {
        let mut imports = Vec::new();
        let mut cursor = root.walk();

        loop {
            let node = cursor.node();
            let descend = match node.kind() {
                "import_statement" => {
                    self.process_import(&node, source, &mut imports);
                    false
                }
                "import_from_statement" => {
                    self.process_import_from(&node, source, &mut imports);
                    false
                }
                "future_import_statement" => {
                    let names = self.imported_names(&node, source);
                    imports.push(
                        ImportDescriptor::absolute("__future__", line_of(&node)).with_names(names),
                    );
                    false
                }
                _ => true,
            };

            if descend && cursor.goto_first_child() {
                continue;
            }

            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return imports;
                }
            }
        }
    }

    /// `import a.b, c as d` yields one absolute descriptor per module.
    fn process_import(&self, import_node: &TSNode, source: &[u8], imports: &mut Vec<ImportDescriptor>) {
        let line = line_of(import_node);
        let mut cursor = import_node.walk();

        for name in import_node.children_by_field_name("name", &mut cursor) {
            if let Some(module) = dotted_name_of(&name, source) {
                imports.push(ImportDescriptor::absolute(module, line));
            }
        }
    }

    fn process_import_from(
        &self,
        import_node: &TSNode,
        source: &[u8],
        imports: &mut Vec<ImportDescriptor>,
    ) {
        let Some(module_node) = import_node.child_by_field_name("module_name") else {
            return;
        };
        let line = line_of(import_node);
        let names = self.imported_names(import_node, source);

        let descriptor = if module_node.kind() == "relative_import" {
            let level = find_child_by_kind(&module_node, "import_prefix")
                .map(|prefix| extract_text(&prefix, source).matches('.').count())
                .unwrap_or(1);
            let module = find_child_by_kind(&module_node, "dotted_name")
                .map(|dotted| normalize_dotted(extract_text(&dotted, source)))
                .unwrap_or_default();
            ImportDescriptor::relative(module, level, line)
        } else {
            ImportDescriptor::absolute(normalize_dotted(extract_text(&module_node, source)), line)
        };

        imports.push(descriptor.with_names(names));
    }

    fn imported_names(&self, import_node: &TSNode, source: &[u8]) -> Vec<String> {
        let mut cursor = import_node.walk();
        let names = import_node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|name| dotted_name_of(&name, source))
            .collect();
        names
    }
}

impl Default for PythonImportExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportExtractor for PythonImportExtractor {
    fn extract_imports(&self, file_path: &Path) -> Result<Vec<ImportDescriptor>, ExtractionError> {
        let mut parser = TreeSitterParser::new(tree_sitter_python::language())?;
        let (tree, source) = parser.parse_file(file_path)?;
        Ok(self.collect_imports(&tree.root_node(), source.as_bytes()))
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

fn line_of(node: &TSNode) -> usize {
    node.start_position().row + 1
}

/// Module path of a `dotted_name` or of the `name` of an `aliased_import`.
fn dotted_name_of(node: &TSNode, source: &[u8]) -> Option<String> {
    let target = match node.kind() {
        "aliased_import" => node.child_by_field_name("name")?,
        "dotted_name" | "identifier" => *node,
        _ => return None,
    };
    let text = normalize_dotted(extract_text(&target, source));
    (!text.is_empty()).then_some(text)
}

/// Drop whitespace and line continuations tree-sitter keeps inside dotted names.
fn normalize_dotted(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '\\')
        .collect()
}
