use serde_json::json;
use workflow_engine::{
    validate, HistoryManager, NodePatch, NodeTemplate, NodeType, Position, ValidationCode,
    Workflow, WorkflowEditor, HANDLE_FALSE, HANDLE_TRUE,
};

fn assert_consistent(workflow: &Workflow) {
    let mut ids: Vec<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), workflow.nodes.len(), "node ids are unique");

    for edge in &workflow.edges {
        assert!(workflow.contains_node(&edge.source), "edge {} has a live source", edge.id);
        assert!(workflow.contains_node(&edge.target), "edge {} has a live target", edge.id);
        assert_ne!(edge.source, edge.target, "edge {} is not a self-loop", edge.id);
    }
    for (i, edge) in workflow.edges.iter().enumerate() {
        assert!(
            !workflow.edges[..i]
                .iter()
                .any(|e| e.source == edge.source && e.target == edge.target),
            "edge {} is not a duplicate",
            edge.id
        );
    }
}

fn add(editor: &mut WorkflowEditor, node_type: NodeType) -> String {
    editor.add_node(&NodeTemplate::for_type(node_type), Position::default())
}

#[test]
fn edits_keep_the_graph_consistent() {
    let mut editor = WorkflowEditor::new(Workflow::new("Consistency"));
    let trigger = add(&mut editor, NodeType::Trigger);
    let action = add(&mut editor, NodeType::Action);
    let agent = add(&mut editor, NodeType::Agent);
    let end = add(&mut editor, NodeType::End);

    assert!(editor.add_edge(&trigger, &action, None).is_some());
    assert!(editor.add_edge(&action, &agent, None).is_some());
    assert!(editor.add_edge(&agent, &end, None).is_some());

    // Rejected edits leave the graph as it was
    assert!(editor.add_edge(&action, &action, None).is_none());
    assert!(editor.add_edge(&trigger, &action, None).is_none());
    assert!(editor.add_edge(&trigger, "node-missing", None).is_none());
    assert_eq!(editor.workflow().edges.len(), 3);
    assert_consistent(editor.workflow());

    assert!(editor.delete_node(&action));
    assert_consistent(editor.workflow());
    assert_eq!(editor.workflow().edges.len(), 1);
    assert!(editor
        .workflow()
        .edges
        .iter()
        .all(|e| e.source != action && e.target != action));

    assert!(!editor.delete_node(&action));
    assert!(!editor.update_node(&action, NodePatch::label("gone")));
}

#[test]
fn deleting_a_hub_node_removes_all_its_edges() {
    let mut editor = WorkflowEditor::new(Workflow::new("Cascade"));
    let hub = add(&mut editor, NodeType::Transform);
    let others: Vec<String> = (0..4).map(|_| add(&mut editor, NodeType::Action)).collect();
    for (i, other) in others.iter().enumerate() {
        if i % 2 == 0 {
            editor.add_edge(&hub, other, None);
        } else {
            editor.add_edge(other, &hub, None);
        }
    }
    editor.add_edge(&others[0], &others[1], None);
    assert_eq!(editor.workflow().edges.len(), 5);

    editor.delete_node(&hub);
    assert_eq!(editor.workflow().nodes.len(), 4);
    assert_eq!(editor.workflow().edges.len(), 1);
    assert_consistent(editor.workflow());
}

#[test]
fn validation_is_deterministic() {
    let mut editor = WorkflowEditor::new(Workflow::new("Determinism"));
    let condition = add(&mut editor, NodeType::Condition);
    let action = add(&mut editor, NodeType::Action);
    add(&mut editor, NodeType::Delay);
    editor.add_edge(&condition, &action, Some(HANDLE_TRUE));

    let first = validate(editor.workflow());
    for _ in 0..5 {
        assert_eq!(validate(editor.workflow()), first);
    }

    let codes: Vec<ValidationCode> = first.errors.iter().map(|i| i.code).collect();
    assert_eq!(
        codes,
        vec![ValidationCode::MissingTrigger, ValidationCode::MissingBranch]
    );
}

#[test]
fn condition_branch_completeness_round_trip() {
    let mut editor = WorkflowEditor::new(Workflow::new("Branches"));
    let trigger = add(&mut editor, NodeType::Trigger);
    let condition = add(&mut editor, NodeType::Condition);
    let yes = add(&mut editor, NodeType::End);
    let no = add(&mut editor, NodeType::End);
    editor.add_edge(&trigger, &condition, None);
    editor.add_edge(&condition, &yes, Some(HANDLE_TRUE));

    let missing = validate(editor.workflow());
    assert!(!missing.is_valid());
    assert!(missing.errors.iter().any(|i| {
        i.code == ValidationCode::MissingBranch && i.node_id.as_deref() == Some(condition.as_str())
    }));

    let edge = editor.add_edge(&condition, &no, Some(HANDLE_FALSE)).unwrap();
    assert!(validate(editor.workflow()).is_valid());

    editor.delete_edge(&edge);
    assert_eq!(validate(editor.workflow()), missing);
}

#[test]
fn revalidate_marks_nodes() {
    let mut editor = WorkflowEditor::new(Workflow::new("Marks"));
    let trigger = add(&mut editor, NodeType::Trigger);
    let condition = add(&mut editor, NodeType::Condition);
    editor.add_edge(&trigger, &condition, None);

    let report = editor.revalidate();
    assert!(!report.is_valid());
    let node = editor.node(&condition).unwrap();
    assert!(!node.is_valid);
    assert!(node.errors.as_ref().is_some_and(|e| !e.is_empty()));
    assert!(editor.node(&trigger).unwrap().is_valid);
}

#[test]
fn undo_redo_is_symmetric() {
    let mut editor = WorkflowEditor::with_history(Workflow::new("History"), HistoryManager::default());
    let original = editor.workflow().clone();

    let trigger = add(&mut editor, NodeType::Trigger);
    let delay = add(&mut editor, NodeType::Delay);
    editor.add_edge(&trigger, &delay, None);
    editor.update_node(&delay, NodePatch::config(json!({"duration": 30})));
    editor.move_node(&delay, Position::new(300.0, 40.0));
    let edited = editor.workflow().clone();

    let mut undone = 0;
    while editor.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 5);
    assert_eq!(editor.workflow(), &original);
    assert!(!editor.can_undo());

    while editor.redo().unwrap() {}
    assert_eq!(editor.workflow(), &edited);

    // A new edit after undo drops the redo branch
    editor.undo().unwrap();
    editor.rename("Renamed", "");
    assert!(!editor.can_redo());
}

#[test]
fn rejected_edits_do_not_record_history() {
    let mut editor = WorkflowEditor::with_history(Workflow::new("History"), HistoryManager::new(5));
    let trigger = add(&mut editor, NodeType::Trigger);
    assert_eq!(editor.history().unwrap().undo_len(), 1);

    editor.add_edge(&trigger, &trigger, None);
    editor.delete_node("node-missing");
    assert_eq!(editor.history().unwrap().undo_len(), 1);
}
