use depwatch::core::graph::{DependencyGraph, EdgeMetadata, NodeMetadata, PYTHON_MODULE};
use depwatch::error::Error;
use depwatch::parsers::{ImportDescriptor, ImportKind};

fn sample_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_node(
        "app/main.py",
        NodeMetadata::scanned(
            PYTHON_MODULE,
            vec![
                ImportDescriptor::absolute("app.models", 1),
                ImportDescriptor::relative("", 1, 2).with_names(["views"]),
                ImportDescriptor::absolute("requests", 3),
            ],
        ),
    );
    graph.add_edge(
        "app/main.py",
        "app/models.py",
        EdgeMetadata::new("app.models", ImportKind::Absolute, 1),
    );
    graph.add_edge(
        "app/main.py",
        "app/views.py",
        EdgeMetadata::new(".views", ImportKind::Relative, 2),
    );
    graph.add_edge("app/views.py", "app/models.py", EdgeMetadata::default());
    graph.add_external_dependency("app/main.py", "requests");
    graph.add_external_dependency("app/main.py", "requests");
    graph.add_unresolved_import("app/views.py", "app.helpers.missing");
    graph
}

#[test]
fn graph_json_round_trip_is_byte_identical() {
    let graph = sample_graph();
    let json = graph.to_json().unwrap();

    let restored = DependencyGraph::from_json(&json).unwrap();
    assert_eq!(restored.to_json().unwrap(), json);
    assert_eq!(restored.to_document(), graph.to_document());
}

#[test]
fn graph_document_has_the_four_top_level_maps() {
    let json = sample_graph().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let object = value.as_object().unwrap();
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["edges", "external_dependencies", "nodes", "unresolved_imports"]);
    assert_eq!(value["edges"]["app/main.py"], serde_json::json!(["app/models.py", "app/views.py"]));
    assert_eq!(value["external_dependencies"]["app/main.py"], serde_json::json!(["requests"]));
    assert_eq!(
        value["unresolved_imports"]["app/views.py"],
        serde_json::json!(["app.helpers.missing"])
    );
    assert_eq!(value["nodes"]["app/models.py"], serde_json::json!({}));
}

#[test]
fn graph_round_trip_restores_indexes() {
    let restored = DependencyGraph::from_json(&sample_graph().to_json().unwrap()).unwrap();

    assert_eq!(restored.node_count(), 3);
    assert_eq!(restored.edge_count(), 3);
    assert_eq!(restored.dependents("app/models.py"), ["app/main.py", "app/views.py"]);
    assert_eq!(restored.unresolved_imports("app/views.py"), ["app.helpers.missing"]);
    assert!(restored.node("app/main.py").unwrap().is_scanned());
    assert!(!restored.node("app/models.py").unwrap().is_scanned());
}

#[test]
fn add_edge_twice_keeps_one_edge_with_first_metadata() {
    let mut graph = DependencyGraph::new();
    assert!(graph.add_edge("a.py", "b.py", EdgeMetadata::new("b", ImportKind::Absolute, 1)));
    assert!(!graph.add_edge("a.py", "b.py", EdgeMetadata::new(".b", ImportKind::Relative, 9)));

    assert_eq!(graph.edges("a.py").len(), 1);
    assert_eq!(graph.edges("a.py")[0].metadata.line, 1);
    assert_eq!(graph.dependents("b.py").len(), 1);
}

#[test]
fn three_node_cycle_is_reported() {
    let mut graph = DependencyGraph::new();
    graph.add_edge("A", "B", EdgeMetadata::default());
    graph.add_edge("B", "C", EdgeMetadata::default());
    graph.add_edge("C", "A", EdgeMetadata::default());

    let cycles = graph.find_cycles();
    assert_eq!(cycles.len(), 1);
    for module in ["A", "B", "C"] {
        assert!(cycles[0].iter().any(|id| id == module));
    }
}

#[test]
fn malformed_document_is_a_json_error() {
    let err = DependencyGraph::from_json("{\"nodes\": []}").unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}
