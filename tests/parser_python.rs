use depwatch::error::ExtractionError;
use depwatch::parsers::python::PythonImportExtractor;
use depwatch::parsers::{ImportDescriptor, ImportExtractor, ImportKind};
use std::fs;

fn extract(code: &str) -> Vec<ImportDescriptor> {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("sample.py");
    fs::write(&file, code).unwrap();
    PythonImportExtractor::new().extract_imports(&file).unwrap()
}

#[test]
fn python_extractor_reports_plain_and_from_imports_in_order() {
    let imports = extract(
        r#"import os
import app.models as models, json
from app.views import render, Page as P
"#,
    );

    assert_eq!(
        imports,
        vec![
            ImportDescriptor::absolute("os", 1),
            ImportDescriptor::absolute("app.models", 2),
            ImportDescriptor::absolute("json", 2),
            ImportDescriptor::absolute("app.views", 3).with_names(["render", "Page"]),
        ]
    );
}

#[test]
fn python_extractor_counts_relative_levels() {
    let imports = extract(
        r#"from . import c
from .sibling import thing
from ..parent.mod import other
"#,
    );

    assert_eq!(
        imports,
        vec![
            ImportDescriptor::relative("", 1, 1).with_names(["c"]),
            ImportDescriptor::relative("sibling", 1, 2).with_names(["thing"]),
            ImportDescriptor::relative("parent.mod", 2, 3).with_names(["other"]),
        ]
    );
    assert!(imports.iter().all(|import| import.kind == ImportKind::Relative));
}

#[test]
fn python_extractor_finds_nested_imports() {
    let imports = extract(
        r#"
def lazy():
    import heavy

class Plugin:
    try:
        from fast import speedups
    except ImportError:
        speedups = None

if TYPE_CHECKING:
    from app import typing_only
"#,
    );

    let modules: Vec<&str> = imports.iter().map(|i| i.module_path.as_str()).collect();
    assert_eq!(modules, vec!["heavy", "fast", "app"]);
    assert_eq!(imports[0].line, 3);
}

#[test]
fn python_extractor_reports_future_imports_as_absolute() {
    let imports = extract("from __future__ import annotations\n");

    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].module_path, "__future__");
    assert_eq!(imports[0].kind, ImportKind::Absolute);
    assert_eq!(imports[0].names, vec!["annotations"]);
}

#[test]
fn python_extractor_wildcard_import_has_no_names() {
    let imports = extract("from app.constants import *\n");
    assert_eq!(imports, vec![ImportDescriptor::absolute("app.constants", 1)]);
}

#[test]
fn python_extractor_rejects_unreadable_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("binary.py");
    fs::write(&file, [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let err = PythonImportExtractor::new().extract_imports(&file).unwrap_err();
    assert!(matches!(err, ExtractionError::Io { .. }));
}
