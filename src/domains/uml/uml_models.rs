use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::entity::{Entity, EntityUuid, ModelUuid, ViewUuid};
use crate::common::eref::ERef;
use crate::common::geometry::{Pos2, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodParam {
    pub name: String,
    pub param_type: String,
    pub default_value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassField {
    pub name: String,
    pub field_type: String,
    pub default_value: Option<String>,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassMethod {
    pub name: String,
    pub visibility: Visibility,
    pub return_type: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub params: Vec<MethodParam>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    pub name: String,
    pub stereotype: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub show_fields: bool,
    #[serde(default)]
    pub show_methods: bool,
    #[serde(default)]
    pub fields: Vec<ClassField>,
    #[serde(default)]
    pub methods: Vec<ClassMethod>,
}

impl ClassModel {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            stereotype: None,
            description: String::new(),
            show_fields: true,
            show_methods: true,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteModel {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorModel {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UseCaseModel {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextModel {
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SdInstanceModel {
    pub name: String,
    pub life_line_length: u32,
}

/// Non-visual payload carried 1:1 by a node shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "kind")]
pub enum NodeModel {
    Class(ClassModel),
    Note(NoteModel),
    Actor(ActorModel),
    UseCase(UseCaseModel),
    Text(TextModel),
    SdInstance(SdInstanceModel),
}

impl NodeModel {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeModel::Class(..) => "Class",
            NodeModel::Note(..) => "Note",
            NodeModel::Actor(..) => "Actor",
            NodeModel::UseCase(..) => "UseCase",
            NodeModel::Text(..) => "Text",
            NodeModel::SdInstance(..) => "SdInstance",
        }
    }

    /// The user-facing label, whatever the payload calls it.
    pub fn display_name(&self) -> &str {
        match self {
            NodeModel::Class(c) => &c.name,
            NodeModel::Note(n) => &n.text,
            NodeModel::Actor(a) => &a.name,
            NodeModel::UseCase(u) => &u.name,
            NodeModel::Text(t) => &t.content,
            NodeModel::SdInstance(s) => &s.name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    Association,
    Inheritance,
    Aggregation,
    Composition,
    InterfaceRealization,
    NoteLink,
    SdMessage,
}

/// Non-visual payload of an edge. Source and destination do not live here;
/// they are shape-level references so the payload stays a plain value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkModel {
    pub link_type: LinkType,
    #[serde(default)]
    pub name: String,
    pub source_cardinality: Option<String>,
    pub dest_cardinality: Option<String>,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub spline: bool,
    /// Occurrence times on the two life-lines, only meaningful for
    /// `LinkType::SdMessage`.
    #[serde(default)]
    pub source_time: u32,
    #[serde(default)]
    pub dest_time: u32,
}

impl LinkModel {
    pub fn of_type(link_type: LinkType) -> Self {
        Self {
            link_type,
            name: String::new(),
            source_cardinality: None,
            dest_cardinality: None,
            bidirectional: false,
            spline: false,
            source_time: 0,
            dest_time: 0,
        }
    }
}

/// Visual element with no endpoints.
#[derive(Clone, Debug)]
pub struct NodeShape {
    pub uuid: ViewUuid,
    pub model_uuid: ModelUuid,
    pub model: NodeModel,
    pub bounds: Rect,
    /// View uuids of incident edges, maintained by [`Diagram`].
    pub edges: Vec<ViewUuid>,
}

impl NodeShape {
    pub fn new(model: NodeModel, bounds: Rect) -> Self {
        Self {
            uuid: ViewUuid::now(),
            model_uuid: ModelUuid::now(),
            model,
            bounds,
            edges: Vec::new(),
        }
    }
}

impl Entity for NodeShape {
    fn tagged_uuid(&self) -> EntityUuid {
        self.uuid.into()
    }
}

/// Visual element connecting exactly two node shapes.
#[derive(Clone, Debug)]
pub struct EdgeShape {
    pub uuid: ViewUuid,
    pub model_uuid: ModelUuid,
    pub link: LinkModel,
    pub source: ERef<NodeShape>,
    pub dest: ERef<NodeShape>,
    pub source_anchor: Pos2,
    pub dest_anchor: Pos2,
    pub bend_points: Vec<Pos2>,
}

impl EdgeShape {
    pub fn new(
        link: LinkModel,
        source: ERef<NodeShape>,
        dest: ERef<NodeShape>,
        source_anchor: Pos2,
        dest_anchor: Pos2,
        bend_points: Vec<Pos2>,
    ) -> Self {
        Self {
            uuid: ViewUuid::now(),
            model_uuid: ModelUuid::now(),
            link,
            source,
            dest,
            source_anchor,
            dest_anchor,
            bend_points,
        }
    }
}

impl Entity for EdgeShape {
    fn tagged_uuid(&self) -> EntityUuid {
        self.uuid.into()
    }
}

#[derive(Clone, Debug, derive_more::From)]
pub enum Shape {
    Node(ERef<NodeShape>),
    Edge(ERef<EdgeShape>),
}

impl Shape {
    pub fn uuid(&self) -> ViewUuid {
        match self {
            Shape::Node(n) => n.read().uuid,
            Shape::Edge(e) => e.read().uuid,
        }
    }

    pub fn as_node(&self) -> Option<ERef<NodeShape>> {
        match self {
            Shape::Node(n) => Some(n.clone()),
            Shape::Edge(..) => None,
        }
    }

    pub fn as_edge(&self) -> Option<ERef<EdgeShape>> {
        match self {
            Shape::Edge(e) => Some(e.clone()),
            Shape::Node(..) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagramKind {
    ClassDiagram,
    UseCaseDiagram,
    SequenceDiagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramError {
    DuplicateShape(ViewUuid),
    ShapeMissing(ViewUuid),
}

/// One drawing surface worth of shapes, z-ordered back to front.
#[derive(Debug)]
pub struct Diagram {
    uuid: ViewUuid,
    pub name: String,
    pub kind: DiagramKind,
    shapes: Vec<Shape>,
    by_uuid: HashMap<ViewUuid, usize>,
}

impl Diagram {
    pub fn new(name: &str, kind: DiagramKind) -> Self {
        Self {
            uuid: ViewUuid::now(),
            name: name.to_owned(),
            kind,
            shapes: Vec::new(),
            by_uuid: HashMap::new(),
        }
    }

    pub fn uuid(&self) -> ViewUuid {
        self.uuid
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    pub fn get_shape_by_id(&self, uuid: &ViewUuid) -> Option<Shape> {
        self.by_uuid.get(uuid).map(|i| self.shapes[*i].clone())
    }

    pub fn find_node_by_model(&self, model_uuid: &ModelUuid) -> Option<ERef<NodeShape>> {
        self.shapes.iter().find_map(|s| {
            s.as_node()
                .filter(|n| n.read().model_uuid == *model_uuid)
        })
    }

    /// Topmost node whose bounds contain `pos`.
    pub fn node_at(&self, pos: Pos2) -> Option<ERef<NodeShape>> {
        self.shapes
            .iter()
            .rev()
            .filter_map(|s| s.as_node())
            .find(|n| n.read().bounds.contains(pos))
    }

    pub fn add_node(&mut self, node: ERef<NodeShape>) -> Result<(), DiagramError> {
        let uuid = node.read().uuid;
        if self.by_uuid.contains_key(&uuid) {
            return Err(DiagramError::DuplicateShape(uuid));
        }
        self.by_uuid.insert(uuid, self.shapes.len());
        self.shapes.push(node.into());
        Ok(())
    }

    /// Inserts the edge and registers it on both endpoints' adjacency.
    pub fn add_edge(&mut self, edge: ERef<EdgeShape>) -> Result<(), DiagramError> {
        let uuid = edge.read().uuid;
        if self.by_uuid.contains_key(&uuid) {
            return Err(DiagramError::DuplicateShape(uuid));
        }
        {
            let e = edge.read();
            e.source.write().edges.push(uuid);
            if !e.source.ptr_eq(&e.dest) {
                e.dest.write().edges.push(uuid);
            }
        }
        self.by_uuid.insert(uuid, self.shapes.len());
        self.shapes.push(edge.into());
        Ok(())
    }

    pub fn remove_node(&mut self, uuid: &ViewUuid) -> Result<ERef<NodeShape>, DiagramError> {
        match self.get_shape_by_id(uuid) {
            Some(Shape::Node(n)) => {
                self.remove_at(uuid);
                Ok(n)
            }
            _ => Err(DiagramError::ShapeMissing(*uuid)),
        }
    }

    /// Removes the edge and unregisters it from both endpoints' adjacency.
    pub fn remove_edge(&mut self, uuid: &ViewUuid) -> Result<ERef<EdgeShape>, DiagramError> {
        match self.get_shape_by_id(uuid) {
            Some(Shape::Edge(e)) => {
                {
                    let edge = e.read();
                    edge.source.write().edges.retain(|u| u != uuid);
                    edge.dest.write().edges.retain(|u| u != uuid);
                }
                self.remove_at(uuid);
                Ok(e)
            }
            _ => Err(DiagramError::ShapeMissing(*uuid)),
        }
    }

    /// Moves every shape of `other` into `self`, preserving z-order.
    /// Used to commit a fully-built scratch diagram after import.
    pub fn absorb(&mut self, other: Diagram) {
        for shape in other.shapes {
            let uuid = shape.uuid();
            self.by_uuid.insert(uuid, self.shapes.len());
            self.shapes.push(shape);
        }
    }

    fn remove_at(&mut self, uuid: &ViewUuid) {
        let Some(index) = self.by_uuid.remove(uuid) else {
            return;
        };
        self.shapes.remove(index);
        for slot in self.by_uuid.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
    }
}

impl Entity for Diagram {
    fn tagged_uuid(&self) -> EntityUuid {
        self.uuid.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::geometry::{pos2, vec2};

    fn class_node(name: &str, x: f32, y: f32) -> ERef<NodeShape> {
        ERef::new(NodeShape::new(
            ClassModel::named(name).into(),
            Rect::from_min_size(pos2(x, y), vec2(100.0, 60.0)),
        ))
    }

    #[test]
    fn adjacency_tracks_edge_lifecycle() {
        let mut d = Diagram::new("t", DiagramKind::ClassDiagram);
        let a = class_node("A", 0.0, 0.0);
        let b = class_node("B", 200.0, 0.0);
        d.add_node(a.clone()).unwrap();
        d.add_node(b.clone()).unwrap();

        let edge = ERef::new(EdgeShape::new(
            LinkModel::of_type(LinkType::Association),
            a.clone(),
            b.clone(),
            a.read().bounds.center(),
            b.read().bounds.center(),
            vec![],
        ));
        let edge_uuid = edge.read().uuid;
        d.add_edge(edge).unwrap();

        assert_eq!(a.read().edges, vec![edge_uuid]);
        assert_eq!(b.read().edges, vec![edge_uuid]);

        d.remove_edge(&edge_uuid).unwrap();
        assert!(a.read().edges.is_empty());
        assert!(b.read().edges.is_empty());
    }

    #[test]
    fn duplicate_shape_rejected() {
        let mut d = Diagram::new("t", DiagramKind::ClassDiagram);
        let a = class_node("A", 0.0, 0.0);
        d.add_node(a.clone()).unwrap();
        assert_eq!(
            d.add_node(a.clone()),
            Err(DiagramError::DuplicateShape(a.read().uuid))
        );
    }

    #[test]
    fn node_at_respects_z_order() {
        let mut d = Diagram::new("t", DiagramKind::ClassDiagram);
        let below = class_node("Below", 0.0, 0.0);
        let above = class_node("Above", 50.0, 30.0);
        d.add_node(below.clone()).unwrap();
        d.add_node(above.clone()).unwrap();

        // overlap region belongs to the shape added later
        let hit = d.node_at(pos2(60.0, 40.0)).unwrap();
        assert!(hit.ptr_eq(&above));
        let hit = d.node_at(pos2(10.0, 10.0)).unwrap();
        assert!(hit.ptr_eq(&below));
        assert!(d.node_at(pos2(500.0, 500.0)).is_none());
    }
}
