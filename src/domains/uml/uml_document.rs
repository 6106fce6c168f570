//! The versioned, record-based document the serializer emits and the
//! deserializer consumes. Records reference each other through small
//! integer ids that are meaningful only inside one document.

use serde::{Deserialize, Serialize};

use crate::common::geometry::Pos2;

use super::uml_models::{DiagramKind, LinkModel, NodeModel};

/// Bumped whenever the record layout changes. There is no migration
/// logic: a reader seeing any other number must refuse the document.
pub const DOCUMENT_VERSION: u32 = 11;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub model: NodeModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source_id: u32,
    pub dest_id: u32,
    pub link: LinkModel,
    pub source_anchor: Pos2,
    pub dest_anchor: Pos2,
    #[serde(default)]
    pub bend_points: Vec<Pos2>,
}

/// Multi-parent inheritance declaration: one inheritance edge per listed
/// parent gets materialized in the import's hierarchy pass. The exporter
/// never emits these (it writes one binary [`EdgeRecord`] per parent);
/// they exist for producers that batch a child's parents into one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRecord {
    pub child_id: u32,
    pub parent_ids: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    pub kind: DiagramKind,
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    #[serde(default)]
    pub hierarchy: Vec<HierarchyRecord>,
}

impl Document {
    pub fn new(kind: DiagramKind, title: &str) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            kind,
            title: title.to_owned(),
            nodes: Vec::new(),
            edges: Vec::new(),
            hierarchy: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::geometry::pos2;
    use crate::domains::uml::uml_models::{ClassModel, LinkType};

    #[test]
    fn document_toml_round_trip() {
        let mut doc = Document::new(DiagramKind::ClassDiagram, "demo");
        doc.nodes.push(NodeRecord {
            id: 1,
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 60.0,
            model: ClassModel::named("Customer").into(),
        });
        doc.nodes.push(NodeRecord {
            id: 2,
            x: 300.0,
            y: 20.0,
            width: 100.0,
            height: 60.0,
            model: ClassModel::named("Order").into(),
        });
        doc.edges.push(EdgeRecord {
            source_id: 1,
            dest_id: 2,
            link: LinkModel::of_type(LinkType::Association),
            source_anchor: pos2(110.0, 50.0),
            dest_anchor: pos2(300.0, 50.0),
            bend_points: vec![pos2(200.0, 50.0)],
        });
        doc.hierarchy.push(HierarchyRecord {
            child_id: 2,
            parent_ids: vec![1],
        });

        let text = toml::to_string(&doc).unwrap();
        let back: Document = toml::from_str(&text).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn missing_record_arrays_default_to_empty() {
        let text = "version = 11\nkind = \"ClassDiagram\"\ntitle = \"empty\"\n";
        let doc: Document = toml::from_str(text).unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());
        assert!(doc.hierarchy.is_empty());
    }
}
