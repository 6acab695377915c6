use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tree_sitter::{Language, Node as TSNode, Parser, Tree};

use crate::error::ExtractionError;

pub struct TreeSitterParser {
    parser: Parser,
}

impl TreeSitterParser {
    pub fn new(language: Language) -> Result<Self, ExtractionError> {
        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|err| ExtractionError::Language(err.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse a file and hand back the tree together with its source text.
    pub fn parse_file(&mut self, file_path: &Path) -> Result<(Tree, String), ExtractionError> {
        let source = read_source(file_path).map_err(|source| ExtractionError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| ExtractionError::Parse(file_path.to_path_buf()))?;
        Ok((tree, source))
    }
}

/// Buffered read sized to the file.
pub fn read_source(file_path: &Path) -> std::io::Result<String> {
    let file = File::open(file_path)?;
    let file_size = file.metadata()?.len() as usize;

    let mut reader =
        BufReader::with_capacity(if file_size < 8192 { file_size.max(1) } else { 8192 }, file);

    let mut content = String::with_capacity(file_size);
    reader.read_to_string(&mut content)?;
    Ok(content)
}

pub fn extract_text<'a>(node: &TSNode, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.byte_range()]).unwrap_or("")
}

pub fn find_child_by_kind<'a>(node: &TSNode<'a>, kind: &str) -> Option<TSNode<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}
