//! End-to-end editing and persistence flows through the public API.

use thulium::domains::uml::uml_commands::{CommandGroup, EditCommand};
use thulium::domains::uml::uml_controllers::{DiagramController, ToolKind};
use thulium::domains::uml::uml_models::{DiagramKind, LinkModel, LinkType, NodeModel};
use thulium::domains::uml::uml_project::Project;
use thulium::pos2;

#[test]
fn create_link_undo_redo_scenario() {
    let mut c = DiagramController::new("scenario", DiagramKind::ClassDiagram);
    assert_eq!(c.diagram.shape_count(), 0);

    c.select_tool(ToolKind::Class);
    c.click(pos2(10.0, 10.0)).unwrap();
    assert_eq!(c.diagram.shape_count(), 1);

    c.select_tool(ToolKind::Class);
    c.click(pos2(100.0, 10.0)).unwrap();
    assert_eq!(c.diagram.shape_count(), 2);

    c.select_tool(ToolKind::Link(LinkType::Inheritance));
    c.click(pos2(15.0, 15.0)).unwrap();
    c.click(pos2(105.0, 15.0)).unwrap();
    assert_eq!(c.diagram.shape_count(), 3);

    let parent_of_first = |c: &DiagramController| {
        let edge = c.diagram.shapes().find_map(|s| s.as_edge()).unwrap();
        let e = edge.read();
        assert_eq!(e.link.link_type, LinkType::Inheritance);
        assert_eq!(e.source.read().bounds.min, pos2(10.0, 10.0));
        e.dest.read().bounds.min
    };
    assert_eq!(parent_of_first(&c), pos2(100.0, 10.0));

    assert!(c.undo().unwrap());
    assert_eq!(c.diagram.shape_count(), 2);
    assert!(c.undo().unwrap());
    assert_eq!(c.diagram.shape_count(), 1);
    assert!(c.undo().unwrap());
    assert_eq!(c.diagram.shape_count(), 0);
    assert!(!c.can_undo());

    assert!(c.redo().unwrap());
    assert!(c.redo().unwrap());
    assert!(c.redo().unwrap());
    assert_eq!(c.diagram.shape_count(), 3);
    assert!(!c.can_redo());
    // the redone link connects the same child to the same parent
    assert_eq!(parent_of_first(&c), pos2(100.0, 10.0));
}

#[test]
fn edited_diagram_survives_a_project_save_and_open() {
    let mut c = DiagramController::new("persisted", DiagramKind::ClassDiagram);
    c.select_tool(ToolKind::Class);
    c.click(pos2(0.0, 0.0)).unwrap();
    c.select_tool(ToolKind::UseCase);
    c.click(pos2(250.0, 0.0)).unwrap();
    let ids: Vec<_> = c.diagram.shapes().map(|s| s.uuid()).collect();
    c.submit(CommandGroup::single(
        "Create link",
        EditCommand::create_edge(LinkModel::of_type(LinkType::Association), ids[0], ids[1]),
    ))
    .unwrap();

    let mut project = Project::new("roundtrip");
    project.documents.push(c.export().unwrap());
    let bytes = project.to_zip_bytes().unwrap();

    let reloaded = Project::from_zip_bytes(bytes).unwrap();
    assert_eq!(reloaded.name, "roundtrip");
    let mut fresh = DiagramController::new("persisted", DiagramKind::ClassDiagram);
    fresh.import(&reloaded.documents[0]).unwrap();

    assert_eq!(fresh.diagram.shape_count(), 3);
    let edge = fresh.diagram.shapes().find_map(|s| s.as_edge()).unwrap();
    let e = edge.read();
    assert!(matches!(e.source.read().model, NodeModel::Class(..)));
    assert!(matches!(e.dest.read().model, NodeModel::UseCase(..)));

    // imported shapes are editable like any others
    let target = e.source.read().uuid;
    drop(e);
    let group =
        thulium::domains::uml::uml_commands::delete_shape_group(&fresh.diagram, &target).unwrap();
    fresh.submit(group).unwrap();
    assert_eq!(fresh.diagram.shape_count(), 1);
    fresh.undo().unwrap();
    assert_eq!(fresh.diagram.shape_count(), 3);
}
