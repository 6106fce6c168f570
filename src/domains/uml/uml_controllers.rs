//! Tool selection and click handling, plus the per-diagram facade tying
//! the state machine, the history and redraw notification together.
//!
//! The state machine owns nothing but the armed tool and the pending
//! link source. Clicks come in with already-resolved payloads; any user
//! prompting happened before, in the shell.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::common::entity::ViewUuid;
use crate::common::geometry::{Pos2, Vec2, vec2};
use crate::common::observer::{RedrawObservable, RedrawObserver, impl_redraw_observable};

use super::uml_commands::{CommandGroup, EditCommand, HistoryError, HistoryManager, delete_shape_group};
use super::uml_document::Document;
use super::uml_models::{
    ActorModel, ClassModel, Diagram, DiagramKind, LinkModel, LinkType, NodeModel, NoteModel,
    SdInstanceModel, TextModel, UseCaseModel,
};
use super::uml_serde::{ExportError, ImportError, export_diagram, import_document};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    Selector,
    Class,
    Note,
    Actor,
    UseCase,
    Text,
    SdInstance,
    Link(LinkType),
}

impl ToolKind {
    /// Payload and default footprint for the node kinds. `None` for the
    /// selector and the link tools.
    fn node_payload(&self) -> Option<(NodeModel, Vec2)> {
        match self {
            ToolKind::Class => Some((
                ClassModel::named("Class").into(),
                vec2(100.0, 60.0),
            )),
            ToolKind::Note => Some((
                NoteModel { text: "Note".to_owned() }.into(),
                vec2(120.0, 60.0),
            )),
            ToolKind::Actor => Some((
                ActorModel { name: "Actor".to_owned() }.into(),
                vec2(60.0, 100.0),
            )),
            ToolKind::UseCase => Some((
                UseCaseModel { name: "UseCase".to_owned() }.into(),
                vec2(120.0, 60.0),
            )),
            ToolKind::Text => Some((
                TextModel { content: "Text".to_owned() }.into(),
                vec2(100.0, 20.0),
            )),
            ToolKind::SdInstance => Some((
                SdInstanceModel { name: "Instance".to_owned(), life_line_length: 200 }.into(),
                vec2(100.0, 40.0),
            )),
            ToolKind::Selector | ToolKind::Link(..) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToolStage {
    Idle,
    NodeArmed,
    LinkStart { link_type: LinkType },
    LinkEnd { link_type: LinkType, source: ViewUuid },
}

/// Finite-state controller turning tool selection plus clicks into
/// command groups. Holds no diagram state beyond the pending source.
pub struct NaiveUmlTool {
    selected: ToolKind,
    pinned: bool,
    current_stage: ToolStage,
}

impl NaiveUmlTool {
    pub fn new() -> Self {
        Self {
            selected: ToolKind::Selector,
            pinned: false,
            current_stage: ToolStage::Idle,
        }
    }

    pub fn selected_tool(&self) -> ToolKind {
        self.selected
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Re-selecting the already active tool toggles pinning instead of
    /// re-arming, so repeated creations can skip the toolbar round trip.
    pub fn select_tool(&mut self, kind: ToolKind) {
        if kind == self.selected && kind != ToolKind::Selector {
            self.pinned = !self.pinned;
            debug!("tool {:?} pinned: {}", kind, self.pinned);
            return;
        }
        self.selected = kind;
        self.pinned = false;
        self.current_stage = Self::initial_stage(kind);
    }

    fn initial_stage(kind: ToolKind) -> ToolStage {
        match kind {
            ToolKind::Selector => ToolStage::Idle,
            ToolKind::Link(link_type) => ToolStage::LinkStart { link_type },
            _ => ToolStage::NodeArmed,
        }
    }

    fn disarm(&mut self) {
        self.selected = ToolKind::Selector;
        self.pinned = false;
        self.current_stage = ToolStage::Idle;
    }

    /// Advances the machine for one click. Returns a finished group when
    /// the click completes a creation; the caller stages and executes it.
    pub fn handle_click(&mut self, diagram: &Diagram, pos: Pos2) -> Option<CommandGroup> {
        match self.current_stage {
            ToolStage::Idle => None,
            ToolStage::NodeArmed => {
                let (model, size) = self.selected.node_payload()?;
                if !self.pinned {
                    self.disarm();
                }
                let label = format!("Create {}", model.kind_name());
                Some(CommandGroup::single(
                    &label,
                    EditCommand::create_node(model, pos, size),
                ))
            }
            ToolStage::LinkStart { link_type } => {
                match diagram.node_at(pos) {
                    Some(node) => {
                        self.current_stage = ToolStage::LinkEnd {
                            link_type,
                            source: node.read().uuid,
                        };
                        None
                    }
                    // empty click cancels, no command is ever created
                    None => {
                        self.disarm();
                        None
                    }
                }
            }
            ToolStage::LinkEnd { link_type, source } => {
                match diagram.node_at(pos) {
                    Some(node) => {
                        let dest = node.read().uuid;
                        if self.pinned {
                            self.current_stage = ToolStage::LinkStart { link_type };
                        } else {
                            self.disarm();
                        }
                        Some(CommandGroup::single(
                            "Create link",
                            EditCommand::create_edge(LinkModel::of_type(link_type), source, dest),
                        ))
                    }
                    None => {
                        self.disarm();
                        None
                    }
                }
            }
        }
    }
}

impl Default for NaiveUmlTool {
    fn default() -> Self {
        Self::new()
    }
}

/// One diagram, its history and its interaction state, as the shell
/// sees them. All mutation funnels through here so every structural
/// change ends with a redraw notification.
pub struct DiagramController {
    pub diagram: Diagram,
    history: HistoryManager,
    tool: NaiveUmlTool,
    observers: VecDeque<Arc<RwLock<dyn RedrawObserver>>>,
}

impl DiagramController {
    pub fn new(name: &str, kind: DiagramKind) -> Self {
        Self {
            diagram: Diagram::new(name, kind),
            history: HistoryManager::new(),
            tool: NaiveUmlTool::new(),
            observers: VecDeque::new(),
        }
    }

    pub fn select_tool(&mut self, kind: ToolKind) {
        self.tool.select_tool(kind);
    }

    pub fn selected_tool(&self) -> ToolKind {
        self.tool.selected_tool()
    }

    pub fn is_tool_pinned(&self) -> bool {
        self.tool.is_pinned()
    }

    /// Routes a click through the state machine and executes whatever
    /// group it produced.
    pub fn click(&mut self, pos: Pos2) -> Result<bool, HistoryError> {
        let Some(group) = self.tool.handle_click(&self.diagram, pos) else {
            return Ok(false);
        };
        self.submit(group)
    }

    /// Stages and executes an externally built group, e.g. a deletion.
    pub fn submit(&mut self, group: CommandGroup) -> Result<bool, HistoryError> {
        self.history.add_command_group(group);
        let changed = self.history.execute(&mut self.diagram)?;
        if changed {
            self.notify_redraw();
        }
        Ok(changed)
    }

    /// Deletes the shape under `pos` (edges of a node included), if any.
    pub fn delete_at(&mut self, pos: Pos2) -> Result<bool, HistoryError> {
        let Some(target) = self.diagram.node_at(pos).map(|n| n.read().uuid) else {
            return Ok(false);
        };
        match delete_shape_group(&self.diagram, &target) {
            Some(group) => self.submit(group),
            None => Ok(false),
        }
    }

    pub fn undo(&mut self) -> Result<bool, HistoryError> {
        let changed = self.history.undo(&mut self.diagram)?;
        if changed {
            self.notify_redraw();
        }
        Ok(changed)
    }

    pub fn redo(&mut self) -> Result<bool, HistoryError> {
        let changed = self.history.redo(&mut self.diagram)?;
        if changed {
            self.notify_redraw();
        }
        Ok(changed)
    }

    pub fn can_undo(&self) -> bool {
        self.history.is_undo_possible()
    }

    pub fn can_redo(&self) -> bool {
        self.history.is_redo_possible()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn export(&self) -> Result<Document, ExportError> {
        export_diagram(&self.diagram)
    }

    /// Imports a document into this controller's diagram. The current
    /// shapes stay untouched when the import fails.
    pub fn import(&mut self, document: &Document) -> Result<(), ImportError> {
        import_document(document, &mut self.diagram)?;
        self.notify_redraw();
        Ok(())
    }
}

impl_redraw_observable!(DiagramController);
