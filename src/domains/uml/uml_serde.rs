//! Conversion between a live [`Diagram`] and the record [`Document`].
//!
//! Export walks shapes in z-order and resolves every model object to a
//! small integer id through a registry that lives for exactly one call.
//! Import rebuilds the graph in three passes: nodes first, then edges
//! against the node index, then hierarchy fix-ups for multi-parent
//! inheritance records. Either operation aborts whole; a target diagram
//! is never left partially populated.

use std::collections::HashMap;

use log::debug;

use crate::common::entity::ModelUuid;
use crate::common::eref::ERef;
use crate::common::geometry::{Rect, pos2, vec2};

use super::uml_document::{DOCUMENT_VERSION, Document, EdgeRecord, NodeRecord};
use super::uml_models::{Diagram, EdgeShape, LinkModel, LinkType, NodeShape, Shape};

/// Per-operation bijection between model objects and small integer ids.
///
/// One instance per export call, never shared across calls; the first id
/// handed out is 1. Asking for the same object twice yields the same id.
pub struct IdentityRegistry {
    next_id: u32,
    assigned: HashMap<ModelUuid, u32>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            assigned: HashMap::new(),
        }
    }

    pub fn id_of(&mut self, model_uuid: ModelUuid) -> u32 {
        *self.assigned.entry(model_uuid).or_insert_with(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        })
    }

    /// Previously assigned id, without assigning a new one.
    pub fn lookup(&self, model_uuid: &ModelUuid) -> Option<u32> {
        self.assigned.get(model_uuid).copied()
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, derive_more::From)]
pub enum ExportError {
    /// An edge endpoint's model object was never seen as a node of this
    /// diagram, so no id can be assigned to it.
    UnresolvedEndpoint(ModelUuid),
    TomlSer(toml::ser::Error),
    IoError(std::io::Error),
}

#[derive(Debug, derive_more::From)]
pub enum ImportError {
    VersionMismatch { found: u32, supported: u32 },
    /// An edge or hierarchy record names an id absent from the node index.
    DanglingReference { id: u32, context: &'static str },
    Validation(String),
    TomlDe(toml::de::Error),
    IoError(std::io::Error),
    Utf8Error(std::str::Utf8Error),
}

/// Emits one record per shape, nodes before edges, each group in z-order.
/// The diagram is not mutated; the id registry lives only for this call.
pub fn export_diagram(diagram: &Diagram) -> Result<Document, ExportError> {
    let mut registry = IdentityRegistry::new();
    let mut doc = Document::new(diagram.kind, &diagram.name);

    for shape in diagram.shapes() {
        if let Shape::Node(node) = shape {
            let n = node.read();
            doc.nodes.push(NodeRecord {
                id: registry.id_of(n.model_uuid),
                x: n.bounds.min.x,
                y: n.bounds.min.y,
                width: n.bounds.width(),
                height: n.bounds.height(),
                model: n.model.clone(),
            });
        }
    }

    for shape in diagram.shapes() {
        if let Shape::Edge(edge) = shape {
            let e = edge.read();
            let source_id = registry
                .lookup(&e.source.read().model_uuid)
                .ok_or(ExportError::UnresolvedEndpoint(e.source.read().model_uuid))?;
            let dest_id = registry
                .lookup(&e.dest.read().model_uuid)
                .ok_or(ExportError::UnresolvedEndpoint(e.dest.read().model_uuid))?;
            doc.edges.push(EdgeRecord {
                source_id,
                dest_id,
                link: e.link.clone(),
                source_anchor: e.source_anchor,
                dest_anchor: e.dest_anchor,
                bend_points: e.bend_points.clone(),
            });
        }
    }

    debug!(
        "exported '{}': {} node records, {} edge records",
        diagram.name,
        doc.nodes.len(),
        doc.edges.len()
    );
    Ok(doc)
}

/// Rebuilds `doc` into `target` in three passes. On any failure the
/// target diagram is untouched: everything is staged in a scratch diagram
/// and only absorbed once the whole document resolved.
pub fn import_document(doc: &Document, target: &mut Diagram) -> Result<(), ImportError> {
    if doc.version != DOCUMENT_VERSION {
        return Err(ImportError::VersionMismatch {
            found: doc.version,
            supported: DOCUMENT_VERSION,
        });
    }

    let mut scratch = Diagram::new(&doc.title, doc.kind);

    // Pass 1: nodes, indexed by their declared id. Fresh uuids: record
    // ids carry no meaning outside this document.
    let mut index: HashMap<u32, ERef<NodeShape>> = HashMap::new();
    for record in &doc.nodes {
        let bounds = Rect::from_min_size(
            pos2(record.x, record.y),
            vec2(record.width, record.height),
        );
        let node = ERef::new(NodeShape::new(record.model.clone(), bounds));
        if index.insert(record.id, node.clone()).is_some() {
            return Err(ImportError::Validation(format!(
                "duplicate node record id {}",
                record.id
            )));
        }
        scratch
            .add_node(node)
            .map_err(|e| ImportError::Validation(format!("{e:?}")))?;
    }

    // Pass 2: edges against the pass-1 index. Endpoints must exist by now.
    for record in &doc.edges {
        let source = index
            .get(&record.source_id)
            .ok_or(ImportError::DanglingReference {
                id: record.source_id,
                context: "edge source",
            })?
            .clone();
        let dest = index
            .get(&record.dest_id)
            .ok_or(ImportError::DanglingReference {
                id: record.dest_id,
                context: "edge destination",
            })?
            .clone();
        let edge = ERef::new(EdgeShape::new(
            record.link.clone(),
            source,
            dest,
            record.source_anchor,
            record.dest_anchor,
            record.bend_points.clone(),
        ));
        scratch
            .add_edge(edge)
            .map_err(|e| ImportError::Validation(format!("{e:?}")))?;
    }

    // Pass 3: one inheritance edge per (child, parent) pair, child points
    // at parent, anchored at the node centers.
    for record in &doc.hierarchy {
        let child = index
            .get(&record.child_id)
            .ok_or(ImportError::DanglingReference {
                id: record.child_id,
                context: "hierarchy child",
            })?
            .clone();
        for parent_id in &record.parent_ids {
            let parent = index
                .get(parent_id)
                .ok_or(ImportError::DanglingReference {
                    id: *parent_id,
                    context: "hierarchy parent",
                })?
                .clone();
            let source_anchor = child.read().bounds.center();
            let dest_anchor = parent.read().bounds.center();
            let edge = ERef::new(EdgeShape::new(
                LinkModel::of_type(LinkType::Inheritance),
                child.clone(),
                parent,
                source_anchor,
                dest_anchor,
                Vec::new(),
            ));
            scratch
                .add_edge(edge)
                .map_err(|e| ImportError::Validation(format!("{e:?}")))?;
        }
    }

    debug!(
        "imported '{}': {} shapes staged",
        doc.title,
        scratch.shape_count()
    );
    target.absorb(scratch);
    Ok(())
}
