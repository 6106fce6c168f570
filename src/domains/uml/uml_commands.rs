//! Reversible structural edits, their atomic grouping, and the per-diagram
//! undo/redo history.
//!
//! Every command retains what it needs to reverse itself exactly: create
//! commands keep their constructor arguments (plus the uuids minted on
//! first apply, so redo rebuilds the same objects), delete commands take a
//! full snapshot of the doomed shape before removal.

use log::{debug, warn};

use crate::common::entity::{ModelUuid, ViewUuid};
use crate::common::eref::ERef;
use crate::common::geometry::{Pos2, Rect, Vec2};

use super::uml_models::{
    Diagram, DiagramError, EdgeShape, LinkModel, NodeModel, NodeShape, Shape,
};

#[derive(Debug)]
pub enum CommandError {
    ShapeMissing(ViewUuid),
    DuplicateShape(ViewUuid),
    /// An edge endpoint is not (or no longer) a node of this diagram.
    EndpointMissing(ViewUuid),
    /// Deleting a node with live edges would orphan them; delete the
    /// edges first (see [`delete_shape_group`]).
    NodeHasEdges(ViewUuid, usize),
    /// Undo was asked to reverse a command that never applied.
    NotApplied,
}

impl From<DiagramError> for CommandError {
    fn from(value: DiagramError) -> Self {
        match value {
            DiagramError::DuplicateShape(uuid) => CommandError::DuplicateShape(uuid),
            DiagramError::ShapeMissing(uuid) => CommandError::ShapeMissing(uuid),
        }
    }
}

/// Everything needed to rebuild a deleted node with identical attributes
/// at the same geometry. Mirrors a serializer node record, with the uuids
/// kept so adjacent snapshots can re-find their endpoints.
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    pub uuid: ViewUuid,
    pub model_uuid: ModelUuid,
    pub model: NodeModel,
    pub bounds: Rect,
}

impl NodeSnapshot {
    fn capture(node: &NodeShape) -> Self {
        Self {
            uuid: node.uuid,
            model_uuid: node.model_uuid,
            model: node.model.clone(),
            bounds: node.bounds,
        }
    }

    fn restore(&self) -> NodeShape {
        NodeShape {
            uuid: self.uuid,
            model_uuid: self.model_uuid,
            model: self.model.clone(),
            bounds: self.bounds,
            edges: Vec::new(),
        }
    }
}

/// Edge counterpart of [`NodeSnapshot`]; endpoints are recorded by view
/// uuid and resolved against the diagram at restore time.
#[derive(Clone, Debug)]
pub struct EdgeSnapshot {
    pub uuid: ViewUuid,
    pub model_uuid: ModelUuid,
    pub link: LinkModel,
    pub source: ViewUuid,
    pub dest: ViewUuid,
    pub source_anchor: Pos2,
    pub dest_anchor: Pos2,
    pub bend_points: Vec<Pos2>,
}

impl EdgeSnapshot {
    fn capture(edge: &EdgeShape) -> Self {
        Self {
            uuid: edge.uuid,
            model_uuid: edge.model_uuid,
            link: edge.link.clone(),
            source: edge.source.read().uuid,
            dest: edge.dest.read().uuid,
            source_anchor: edge.source_anchor,
            dest_anchor: edge.dest_anchor,
            bend_points: edge.bend_points.clone(),
        }
    }

    fn restore(&self, diagram: &Diagram) -> Result<EdgeShape, CommandError> {
        let source = resolve_node(diagram, &self.source)?;
        let dest = resolve_node(diagram, &self.dest)?;
        Ok(EdgeShape {
            uuid: self.uuid,
            model_uuid: self.model_uuid,
            link: self.link.clone(),
            source,
            dest,
            source_anchor: self.source_anchor,
            dest_anchor: self.dest_anchor,
            bend_points: self.bend_points.clone(),
        })
    }
}

fn resolve_node(diagram: &Diagram, uuid: &ViewUuid) -> Result<ERef<NodeShape>, CommandError> {
    match diagram.get_shape_by_id(uuid) {
        Some(Shape::Node(n)) => Ok(n),
        _ => Err(CommandError::EndpointMissing(*uuid)),
    }
}

/// One reversible structural edit. `apply` returns whether anything
/// changed; `unapply` reverses the edit exactly.
#[derive(Clone, Debug)]
pub enum EditCommand {
    CreateNode {
        model: NodeModel,
        position: Pos2,
        size: Vec2,
        /// Uuids minted on first apply, reused on redo.
        minted: Option<(ViewUuid, ModelUuid)>,
    },
    DeleteNode {
        target: ViewUuid,
        snapshot: Option<NodeSnapshot>,
    },
    CreateEdge {
        link: LinkModel,
        source: ViewUuid,
        dest: ViewUuid,
        source_anchor: Option<Pos2>,
        dest_anchor: Option<Pos2>,
        minted: Option<(ViewUuid, ModelUuid)>,
    },
    DeleteEdge {
        target: ViewUuid,
        snapshot: Option<EdgeSnapshot>,
    },
}

impl EditCommand {
    pub fn create_node(model: NodeModel, position: Pos2, size: Vec2) -> Self {
        EditCommand::CreateNode {
            model,
            position,
            size,
            minted: None,
        }
    }

    pub fn delete_node(target: ViewUuid) -> Self {
        EditCommand::DeleteNode {
            target,
            snapshot: None,
        }
    }

    pub fn create_edge(link: LinkModel, source: ViewUuid, dest: ViewUuid) -> Self {
        EditCommand::CreateEdge {
            link,
            source,
            dest,
            source_anchor: None,
            dest_anchor: None,
            minted: None,
        }
    }

    pub fn delete_edge(target: ViewUuid) -> Self {
        EditCommand::DeleteEdge {
            target,
            snapshot: None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            EditCommand::CreateNode { model, .. } => {
                format!("Create {} '{}'", model.kind_name(), model.display_name())
            }
            EditCommand::DeleteNode { target, .. } => format!("Delete node {target}"),
            EditCommand::CreateEdge { link, .. } => format!("Create {:?} link", link.link_type),
            EditCommand::DeleteEdge { target, .. } => format!("Delete link {target}"),
        }
    }

    pub fn apply(&mut self, diagram: &mut Diagram) -> Result<bool, CommandError> {
        match self {
            EditCommand::CreateNode {
                model,
                position,
                size,
                minted,
            } => {
                let mut node = NodeShape::new(model.clone(), Rect::from_min_size(*position, *size));
                if let Some((view, model_uuid)) = minted {
                    node.uuid = *view;
                    node.model_uuid = *model_uuid;
                } else {
                    *minted = Some((node.uuid, node.model_uuid));
                }
                diagram.add_node(ERef::new(node))?;
                Ok(true)
            }
            EditCommand::DeleteNode { target, snapshot } => {
                let node = match diagram.get_shape_by_id(target) {
                    Some(Shape::Node(n)) => n,
                    _ => return Err(CommandError::ShapeMissing(*target)),
                };
                let edge_count = node.read().edges.len();
                if edge_count > 0 {
                    return Err(CommandError::NodeHasEdges(*target, edge_count));
                }
                // snapshot before removal, undo rebuilds from it
                *snapshot = Some(NodeSnapshot::capture(&node.read()));
                diagram.remove_node(target)?;
                Ok(true)
            }
            EditCommand::CreateEdge {
                link,
                source,
                dest,
                source_anchor,
                dest_anchor,
                minted,
            } => {
                let source_node = resolve_node(diagram, source)?;
                let dest_node = resolve_node(diagram, dest)?;
                let sa = *source_anchor.get_or_insert_with(|| source_node.read().bounds.center());
                let da = *dest_anchor.get_or_insert_with(|| dest_node.read().bounds.center());
                let mut edge =
                    EdgeShape::new(link.clone(), source_node, dest_node, sa, da, Vec::new());
                if let Some((view, model_uuid)) = minted {
                    edge.uuid = *view;
                    edge.model_uuid = *model_uuid;
                } else {
                    *minted = Some((edge.uuid, edge.model_uuid));
                }
                diagram.add_edge(ERef::new(edge))?;
                Ok(true)
            }
            EditCommand::DeleteEdge { target, snapshot } => {
                let edge = match diagram.get_shape_by_id(target) {
                    Some(Shape::Edge(e)) => e,
                    _ => return Err(CommandError::ShapeMissing(*target)),
                };
                *snapshot = Some(EdgeSnapshot::capture(&edge.read()));
                diagram.remove_edge(target)?;
                Ok(true)
            }
        }
    }

    pub fn unapply(&mut self, diagram: &mut Diagram) -> Result<bool, CommandError> {
        match self {
            EditCommand::CreateNode { minted, .. } => {
                let (view, _) = minted.ok_or(CommandError::NotApplied)?;
                let node = match diagram.get_shape_by_id(&view) {
                    Some(Shape::Node(n)) => n,
                    _ => return Err(CommandError::ShapeMissing(view)),
                };
                let edge_count = node.read().edges.len();
                if edge_count > 0 {
                    return Err(CommandError::NodeHasEdges(view, edge_count));
                }
                diagram.remove_node(&view)?;
                Ok(true)
            }
            EditCommand::DeleteNode { snapshot, .. } => {
                let snap = snapshot.as_ref().ok_or(CommandError::NotApplied)?;
                diagram.add_node(ERef::new(snap.restore()))?;
                Ok(true)
            }
            EditCommand::CreateEdge { minted, .. } => {
                let (view, _) = minted.ok_or(CommandError::NotApplied)?;
                if diagram.get_shape_by_id(&view).is_none() {
                    return Err(CommandError::ShapeMissing(view));
                }
                diagram.remove_edge(&view)?;
                Ok(true)
            }
            EditCommand::DeleteEdge { snapshot, .. } => {
                let snap = snapshot.as_ref().ok_or(CommandError::NotApplied)?;
                diagram.add_edge(ERef::new(snap.restore(diagram)?))?;
                Ok(true)
            }
        }
    }
}

/// A group member failed; earlier successful members stay applied.
/// Inherited behavior, kept deliberately: there is no automatic rollback
/// of a partially-applied group.
#[derive(Debug)]
pub struct PartialFailure {
    pub applied: usize,
    pub label: String,
    pub reason: CommandError,
}

/// Ordered, atomically-undoable batch of commands with a human-readable
/// label. The group, not the member, is the unit history works with.
#[derive(Clone, Debug)]
pub struct CommandGroup {
    pub label: String,
    commands: Vec<EditCommand>,
}

impl CommandGroup {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            commands: Vec::new(),
        }
    }

    pub fn single(label: &str, command: EditCommand) -> Self {
        let mut group = Self::new(label);
        group.push(command);
        group
    }

    pub fn push(&mut self, command: EditCommand) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[EditCommand] {
        &self.commands
    }

    /// Runs members in insertion order. Returns whether anything changed.
    pub fn execute(&mut self, diagram: &mut Diagram) -> Result<bool, PartialFailure> {
        let mut changed = false;
        for (i, command) in self.commands.iter_mut().enumerate() {
            match command.apply(diagram) {
                Ok(c) => changed |= c,
                Err(reason) => {
                    warn!(
                        "command group '{}' failed at member {}: {:?}",
                        self.label, i, reason
                    );
                    return Err(PartialFailure {
                        applied: i,
                        label: self.label.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(changed)
    }

    /// Runs members' undo in reverse insertion order.
    pub fn undo(&mut self, diagram: &mut Diagram) -> Result<bool, PartialFailure> {
        let mut changed = false;
        let total = self.commands.len();
        for (i, command) in self.commands.iter_mut().rev().enumerate() {
            match command.unapply(diagram) {
                Ok(c) => changed |= c,
                Err(reason) => {
                    warn!(
                        "undo of group '{}' failed at member {}: {:?}",
                        self.label,
                        total - 1 - i,
                        reason
                    );
                    return Err(PartialFailure {
                        applied: i,
                        label: self.label.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(changed)
    }
}

/// Builds the group that deletes a shape cleanly: for a node, its
/// incident edges go first (in z-order), then the node itself.
pub fn delete_shape_group(diagram: &Diagram, target: &ViewUuid) -> Option<CommandGroup> {
    match diagram.get_shape_by_id(target)? {
        Shape::Edge(..) => Some(CommandGroup::single(
            "Delete link",
            EditCommand::delete_edge(*target),
        )),
        Shape::Node(node) => {
            let mut group = CommandGroup::new("Delete element");
            let incident: Vec<ViewUuid> = node.read().edges.clone();
            for edge_uuid in diagram
                .shapes()
                .filter_map(|s| s.as_edge())
                .map(|e| e.read().uuid)
                .filter(|u| incident.contains(u))
            {
                group.push(EditCommand::delete_edge(edge_uuid));
            }
            group.push(EditCommand::delete_node(*target));
            Some(group)
        }
    }
}

#[derive(Debug, derive_more::From)]
pub enum HistoryError {
    NothingStaged,
    Partial(PartialFailure),
}

/// Per-diagram undo/redo stacks. Created with the diagram, destroyed with
/// it; assumes single-threaded exclusive access.
pub struct HistoryManager {
    staged: Option<CommandGroup>,
    undo_stack: Vec<CommandGroup>,
    redo_stack: Vec<CommandGroup>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self {
            staged: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// Stages a constructed group for the next [`execute`](Self::execute).
    /// A previously staged, never-executed group is discarded.
    pub fn add_command_group(&mut self, group: CommandGroup) {
        if let Some(old) = self.staged.replace(group) {
            warn!("discarding staged but never executed group '{}'", old.label);
        }
    }

    /// Applies the staged group. Success pushes it onto the undo stack and
    /// clears the redo stack; failure discards it, stacks unchanged. A
    /// group that changed nothing is discarded too, never pushed.
    pub fn execute(&mut self, diagram: &mut Diagram) -> Result<bool, HistoryError> {
        let mut group = self.staged.take().ok_or(HistoryError::NothingStaged)?;
        if group.is_empty() {
            return Ok(false);
        }
        let changed = group.execute(diagram)?;
        if changed {
            debug!("executed group '{}'", group.label);
            self.undo_stack.push(group);
            self.redo_stack.clear();
        }
        Ok(changed)
    }

    /// No-op on an empty undo stack. A failing group undo leaves both
    /// stacks unchanged.
    pub fn undo(&mut self, diagram: &mut Diagram) -> Result<bool, HistoryError> {
        let Some(mut group) = self.undo_stack.pop() else {
            return Ok(false);
        };
        match group.undo(diagram) {
            Ok(_) => {
                debug!("undid group '{}'", group.label);
                self.redo_stack.push(group);
                Ok(true)
            }
            Err(failure) => {
                self.undo_stack.push(group);
                Err(failure.into())
            }
        }
    }

    /// No-op on an empty redo stack. A failing re-execution leaves both
    /// stacks unchanged.
    pub fn redo(&mut self, diagram: &mut Diagram) -> Result<bool, HistoryError> {
        let Some(mut group) = self.redo_stack.pop() else {
            return Ok(false);
        };
        match group.execute(diagram) {
            Ok(_) => {
                debug!("redid group '{}'", group.label);
                self.undo_stack.push(group);
                Ok(true)
            }
            Err(failure) => {
                self.redo_stack.push(group);
                Err(failure.into())
            }
        }
    }

    pub fn is_undo_possible(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn is_redo_possible(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_stack(&self) -> &[CommandGroup] {
        &self.undo_stack
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::geometry::{pos2, vec2};
    use crate::domains::uml::uml_models::{ClassField, ClassModel, DiagramKind, LinkType, Visibility};

    fn diagram() -> Diagram {
        Diagram::new("test", DiagramKind::ClassDiagram)
    }

    fn create_class(name: &str, x: f32, y: f32) -> EditCommand {
        EditCommand::create_node(
            ClassModel::named(name).into(),
            pos2(x, y),
            vec2(100.0, 60.0),
        )
    }

    fn executed(history: &mut HistoryManager, diagram: &mut Diagram, group: CommandGroup) {
        history.add_command_group(group);
        history.execute(diagram).unwrap();
    }

    #[test]
    fn undo_redo_inverse_law() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        executed(&mut h, &mut d, CommandGroup::single("Create class", create_class("A", 10.0, 10.0)));
        assert_eq!(d.shape_count(), 1);

        assert!(h.undo(&mut d).unwrap());
        assert_eq!(d.shape_count(), 0);

        assert!(h.redo(&mut d).unwrap());
        assert_eq!(d.shape_count(), 1);
        let node = d.shapes().find_map(|s| s.as_node()).unwrap();
        assert_eq!(node.read().model.display_name(), "A");
        assert_eq!(node.read().bounds.min, pos2(10.0, 10.0));
    }

    #[test]
    fn new_edit_clears_redo_stack() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        executed(&mut h, &mut d, CommandGroup::single("Create class", create_class("A", 0.0, 0.0)));
        h.undo(&mut d).unwrap();
        assert!(h.is_redo_possible());

        executed(&mut h, &mut d, CommandGroup::single("Create class", create_class("B", 50.0, 0.0)));
        assert!(!h.is_redo_possible());
        assert!(!h.redo(&mut d).unwrap());
        assert_eq!(d.shape_count(), 1);
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        assert!(!h.undo(&mut d).unwrap());
        assert!(!h.redo(&mut d).unwrap());
        assert!(!h.is_undo_possible());
        assert!(!h.is_redo_possible());
    }

    #[test]
    fn empty_group_is_never_pushed() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        h.add_command_group(CommandGroup::new("nothing"));
        assert!(!h.execute(&mut d).unwrap());
        assert!(!h.is_undo_possible());
    }

    #[test]
    fn delete_undo_restores_full_payload() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        let mut class = ClassModel::named("Customer");
        class.stereotype = Some("entity".to_owned());
        class.fields.push(ClassField {
            name: "id".to_owned(),
            field_type: "int".to_owned(),
            default_value: None,
            visibility: Visibility::Private,
        });
        executed(
            &mut h,
            &mut d,
            CommandGroup::single(
                "Create class",
                EditCommand::create_node(class.clone().into(), pos2(5.0, 5.0), vec2(120.0, 80.0)),
            ),
        );
        let uuid = d.shapes().next().unwrap().uuid();

        let group = delete_shape_group(&d, &uuid).unwrap();
        executed(&mut h, &mut d, group);
        assert_eq!(d.shape_count(), 0);

        h.undo(&mut d).unwrap();
        let node = d.shapes().find_map(|s| s.as_node()).unwrap();
        let restored = node.read();
        assert_eq!(restored.uuid, uuid);
        assert_eq!(restored.bounds.min, pos2(5.0, 5.0));
        match &restored.model {
            NodeModel::Class(c) => assert_eq!(c, &class),
            other => panic!("expected class payload, got {other:?}"),
        }
    }

    #[test]
    fn delete_node_with_edges_is_refused() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        let mut group = CommandGroup::new("Create pair");
        group.push(create_class("A", 0.0, 0.0));
        group.push(create_class("B", 200.0, 0.0));
        executed(&mut h, &mut d, group);
        let ids: Vec<ViewUuid> = d.shapes().map(|s| s.uuid()).collect();
        executed(
            &mut h,
            &mut d,
            CommandGroup::single(
                "Create link",
                EditCommand::create_edge(
                    LinkModel::of_type(LinkType::Association),
                    ids[0],
                    ids[1],
                ),
            ),
        );

        h.add_command_group(CommandGroup::single(
            "Delete element",
            EditCommand::delete_node(ids[0]),
        ));
        let err = h.execute(&mut d).unwrap_err();
        assert!(matches!(
            err,
            HistoryError::Partial(PartialFailure {
                reason: CommandError::NodeHasEdges(..),
                ..
            })
        ));
        // failed staged group leaves stacks unchanged
        assert_eq!(d.shape_count(), 3);
    }

    #[test]
    fn delete_shape_group_removes_edges_first_and_undo_restores_roles() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        let mut group = CommandGroup::new("Create pair");
        group.push(create_class("Child", 0.0, 0.0));
        group.push(create_class("Parent", 200.0, 0.0));
        executed(&mut h, &mut d, group);
        let ids: Vec<ViewUuid> = d.shapes().map(|s| s.uuid()).collect();
        executed(
            &mut h,
            &mut d,
            CommandGroup::single(
                "Create link",
                EditCommand::create_edge(
                    LinkModel::of_type(LinkType::Inheritance),
                    ids[0],
                    ids[1],
                ),
            ),
        );

        let group = delete_shape_group(&d, &ids[0]).unwrap();
        executed(&mut h, &mut d, group);
        assert_eq!(d.shape_count(), 1);

        h.undo(&mut d).unwrap();
        assert_eq!(d.shape_count(), 3);
        let edge = d.shapes().find_map(|s| s.as_edge()).unwrap();
        let e = edge.read();
        assert_eq!(e.link.link_type, LinkType::Inheritance);
        assert_eq!(e.source.read().model.display_name(), "Child");
        assert_eq!(e.dest.read().model.display_name(), "Parent");
    }

    #[test]
    fn partial_failure_keeps_earlier_members_applied() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        let mut group = CommandGroup::new("mixed");
        group.push(create_class("Ok", 0.0, 0.0));
        // refers to a shape that does not exist, so member 1 fails
        group.push(EditCommand::delete_node(ViewUuid::now()));
        h.add_command_group(group);

        let err = h.execute(&mut d).unwrap_err();
        match err {
            HistoryError::Partial(pf) => {
                assert_eq!(pf.applied, 1);
                assert!(matches!(pf.reason, CommandError::ShapeMissing(..)));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        // no rollback of the successful first member
        assert_eq!(d.shape_count(), 1);
        assert!(!h.is_undo_possible());
    }

    #[test]
    fn redo_recreates_with_same_identity() {
        let mut d = diagram();
        let mut h = HistoryManager::new();
        executed(&mut h, &mut d, CommandGroup::single("Create class", create_class("A", 1.0, 2.0)));
        let uuid = d.shapes().next().unwrap().uuid();
        h.undo(&mut d).unwrap();
        h.redo(&mut d).unwrap();
        assert_eq!(d.shapes().next().unwrap().uuid(), uuid);
    }
}
