//! History log for edit commands: symmetric encode/decode between
//! [`CommandGroup`]s and the angle-bracket token stream of
//! [`crate::common::command_log`].
//!
//! Shapes are referenced by small integer ids assigned by a
//! [`DiagramIndex`] built from the live diagram, so a log is only
//! meaningful against the diagram it was written for. Node payloads are
//! logged by kind and display name; a decoded create-node carries a
//! default payload of that kind.

use std::collections::HashMap;

use crate::common::command_log::{ScanError, Token, emit, scan};
use crate::common::entity::ViewUuid;
use crate::common::geometry::{Pos2, pos2, vec2};

use super::uml_commands::{CommandGroup, EditCommand};
use super::uml_models::{
    ActorModel, ClassModel, Diagram, LinkModel, LinkType, NodeModel, NoteModel, SdInstanceModel,
    TextModel, UseCaseModel,
};

#[derive(Debug, derive_more::From)]
pub enum CommandLogError {
    #[from]
    Scan(ScanError),
    UnexpectedToken(String),
    UnexpectedEnd,
    MissingField(&'static str),
    BadValue { key: &'static str, value: String },
    UnknownCommandClass(String),
    UnknownNodeKind(String),
    UnknownLinkType(String),
    /// A log id with no shape behind it in the index.
    UnknownShapeId(u32),
    /// A command references a shape the index has never seen.
    UnindexedShape(ViewUuid),
}

/// Bijection between the diagram's shapes and log-local ids, assigned
/// from 1 in z-order. Valid only as long as the diagram is unchanged.
pub struct DiagramIndex {
    by_id: HashMap<u32, ViewUuid>,
    by_uuid: HashMap<ViewUuid, u32>,
}

impl DiagramIndex {
    pub fn of(diagram: &Diagram) -> Self {
        let mut by_id = HashMap::new();
        let mut by_uuid = HashMap::new();
        for (i, shape) in diagram.shapes().enumerate() {
            let id = (i + 1) as u32;
            let uuid = shape.uuid();
            by_id.insert(id, uuid);
            by_uuid.insert(uuid, id);
        }
        Self { by_id, by_uuid }
    }

    pub fn uuid_of(&self, id: u32) -> Result<ViewUuid, CommandLogError> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or(CommandLogError::UnknownShapeId(id))
    }

    pub fn id_of(&self, uuid: &ViewUuid) -> Result<u32, CommandLogError> {
        self.by_uuid
            .get(uuid)
            .copied()
            .ok_or(CommandLogError::UnindexedShape(*uuid))
    }
}

fn link_type_name(link_type: LinkType) -> &'static str {
    match link_type {
        LinkType::Association => "ASSOCIATION",
        LinkType::Inheritance => "INHERITANCE",
        LinkType::Aggregation => "AGGREGATION",
        LinkType::Composition => "COMPOSITION",
        LinkType::InterfaceRealization => "INTERFACE_REALIZATION",
        LinkType::NoteLink => "NOTE_LINK",
        LinkType::SdMessage => "SD_MESSAGE",
    }
}

fn link_type_from(value: &str) -> Result<LinkType, CommandLogError> {
    Ok(match value {
        "ASSOCIATION" => LinkType::Association,
        "INHERITANCE" => LinkType::Inheritance,
        "AGGREGATION" => LinkType::Aggregation,
        "COMPOSITION" => LinkType::Composition,
        "INTERFACE_REALIZATION" => LinkType::InterfaceRealization,
        "NOTE_LINK" => LinkType::NoteLink,
        "SD_MESSAGE" => LinkType::SdMessage,
        _ => return Err(CommandLogError::UnknownLinkType(value.to_owned())),
    })
}

fn format_pos(pos: Pos2) -> String {
    format!("({}, {})", pos.x, pos.y)
}

fn parse_pos(key: &'static str, value: &str) -> Result<Pos2, CommandLogError> {
    let bad = || CommandLogError::BadValue {
        key,
        value: value.to_owned(),
    };
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(bad)?;
    let (x, y) = inner.split_once(',').ok_or_else(bad)?;
    Ok(pos2(
        x.trim().parse().map_err(|_| bad())?,
        y.trim().parse().map_err(|_| bad())?,
    ))
}

fn parse_num<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, CommandLogError> {
    value.parse().map_err(|_| CommandLogError::BadValue {
        key,
        value: value.to_owned(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, CommandLogError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(CommandLogError::BadValue {
            key,
            value: value.to_owned(),
        }),
    }
}

fn encode_command(
    command: &EditCommand,
    index: &DiagramIndex,
    out: &mut Vec<Token>,
) -> Result<(), CommandLogError> {
    out.push(Token::BeginCommand);
    match command {
        EditCommand::CreateNode {
            model,
            position,
            size,
            ..
        } => {
            out.push(Token::field("COMMAND_CLASS", "CreateNode"));
            out.push(Token::field("kind", model.kind_name()));
            out.push(Token::field("name", model.display_name()));
            if let NodeModel::SdInstance(sd) = model {
                out.push(Token::field("lifeLineLength", sd.life_line_length));
            }
            out.push(Token::field("pos", format_pos(*position)));
            out.push(Token::field("size", format!("({}, {})", size.x, size.y)));
        }
        EditCommand::DeleteNode { target, .. } => {
            out.push(Token::field("COMMAND_CLASS", "DeleteNode"));
            out.push(Token::field("shapeId", index.id_of(target)?));
        }
        EditCommand::CreateEdge {
            link,
            source,
            dest,
            source_anchor,
            dest_anchor,
            ..
        } => {
            out.push(Token::field("COMMAND_CLASS", "CreateEdge"));
            out.push(Token::field("srcId", index.id_of(source)?));
            out.push(Token::field("dstId", index.id_of(dest)?));
            if let Some(anchor) = source_anchor {
                out.push(Token::field("srcPos", format_pos(*anchor)));
            }
            if let Some(anchor) = dest_anchor {
                out.push(Token::field("dstPos", format_pos(*anchor)));
            }
            out.push(Token::field("linkType", link_type_name(link.link_type)));
            out.push(Token::field("name", &link.name));
            if let Some(card) = &link.source_cardinality {
                out.push(Token::field("cardSrc", card));
            }
            if let Some(card) = &link.dest_cardinality {
                out.push(Token::field("cardDst", card));
            }
            out.push(Token::field("bidir", link.bidirectional));
            out.push(Token::field("spline", link.spline));
            if link.link_type == LinkType::SdMessage {
                out.push(Token::field("srcTime", link.source_time));
                out.push(Token::field("dstTime", link.dest_time));
            }
        }
        EditCommand::DeleteEdge { target, .. } => {
            out.push(Token::field("COMMAND_CLASS", "DeleteEdge"));
            out.push(Token::field("shapeId", index.id_of(target)?));
        }
    }
    out.push(Token::EndCommand);
    Ok(())
}

pub fn encode_group(
    group: &CommandGroup,
    index: &DiagramIndex,
) -> Result<String, CommandLogError> {
    let mut tokens = vec![
        Token::BeginGroup,
        Token::field("GROUP_COMMENT", &group.label),
    ];
    for command in group.commands() {
        encode_command(command, index, &mut tokens)?;
    }
    tokens.push(Token::EndGroup);
    Ok(emit(&tokens))
}

struct Fields(Vec<(String, String)>);

impl Fields {
    fn take(&mut self, key: &'static str) -> Option<String> {
        let i = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(i).1)
    }

    fn require(&mut self, key: &'static str) -> Result<String, CommandLogError> {
        self.take(key).ok_or(CommandLogError::MissingField(key))
    }
}

fn default_node_model(kind: &str, name: String, fields: &mut Fields) -> Result<NodeModel, CommandLogError> {
    Ok(match kind {
        "Class" => ClassModel::named(&name).into(),
        "Note" => NoteModel { text: name }.into(),
        "Actor" => ActorModel { name }.into(),
        "UseCase" => UseCaseModel { name }.into(),
        "Text" => TextModel { content: name }.into(),
        "SdInstance" => {
            let life_line_length = match fields.take("lifeLineLength") {
                Some(v) => parse_num("lifeLineLength", &v)?,
                None => 200,
            };
            SdInstanceModel {
                name,
                life_line_length,
            }
            .into()
        }
        _ => return Err(CommandLogError::UnknownNodeKind(kind.to_owned())),
    })
}

fn decode_command(
    mut fields: Fields,
    index: &DiagramIndex,
) -> Result<EditCommand, CommandLogError> {
    let class = fields.require("COMMAND_CLASS")?;
    match class.as_str() {
        "CreateNode" => {
            let kind = fields.require("kind")?;
            let name = fields.require("name")?;
            let model = default_node_model(&kind, name, &mut fields)?;
            let pos = parse_pos("pos", &fields.require("pos")?)?;
            let size = parse_pos("size", &fields.require("size")?)?;
            Ok(EditCommand::create_node(model, pos, vec2(size.x, size.y)))
        }
        "DeleteNode" => {
            let id = parse_num("shapeId", &fields.require("shapeId")?)?;
            Ok(EditCommand::delete_node(index.uuid_of(id)?))
        }
        "CreateEdge" => {
            let src: u32 = parse_num("srcId", &fields.require("srcId")?)?;
            let dst: u32 = parse_num("dstId", &fields.require("dstId")?)?;
            let mut link = LinkModel::of_type(link_type_from(&fields.require("linkType")?)?);
            if let Some(name) = fields.take("name") {
                link.name = name;
            }
            link.source_cardinality = fields.take("cardSrc");
            link.dest_cardinality = fields.take("cardDst");
            if let Some(v) = fields.take("bidir") {
                link.bidirectional = parse_bool("bidir", &v)?;
            }
            if let Some(v) = fields.take("spline") {
                link.spline = parse_bool("spline", &v)?;
            }
            if let Some(v) = fields.take("srcTime") {
                link.source_time = parse_num("srcTime", &v)?;
            }
            if let Some(v) = fields.take("dstTime") {
                link.dest_time = parse_num("dstTime", &v)?;
            }
            let mut command =
                EditCommand::create_edge(link, index.uuid_of(src)?, index.uuid_of(dst)?);
            if let EditCommand::CreateEdge {
                source_anchor,
                dest_anchor,
                ..
            } = &mut command
            {
                if let Some(v) = fields.take("srcPos") {
                    *source_anchor = Some(parse_pos("srcPos", &v)?);
                }
                if let Some(v) = fields.take("dstPos") {
                    *dest_anchor = Some(parse_pos("dstPos", &v)?);
                }
            }
            Ok(command)
        }
        "DeleteEdge" => {
            let id = parse_num("shapeId", &fields.require("shapeId")?)?;
            Ok(EditCommand::delete_edge(index.uuid_of(id)?))
        }
        _ => Err(CommandLogError::UnknownCommandClass(class)),
    }
}

/// Decodes a whole log back into command groups, resolving shape ids
/// through `index`.
pub fn decode_groups(
    input: &str,
    index: &DiagramIndex,
) -> Result<Vec<CommandGroup>, CommandLogError> {
    let tokens = scan(input)?;
    let mut groups = Vec::new();
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token != Token::BeginGroup {
            return Err(CommandLogError::UnexpectedToken(format!("{token:?}")));
        }
        let label = match iter.peek() {
            Some(Token::Field { key, .. }) if key == "GROUP_COMMENT" => {
                let Some(Token::Field { value, .. }) = iter.next() else {
                    unreachable!()
                };
                value
            }
            _ => String::new(),
        };
        let mut group = CommandGroup::new(&label);
        loop {
            match iter.next() {
                Some(Token::EndGroup) => break,
                Some(Token::BeginCommand) => {
                    let mut fields = Vec::new();
                    loop {
                        match iter.next() {
                            Some(Token::EndCommand) => break,
                            Some(Token::Field { key, value }) => fields.push((key, value)),
                            Some(other) => {
                                return Err(CommandLogError::UnexpectedToken(format!("{other:?}")));
                            }
                            None => return Err(CommandLogError::UnexpectedEnd),
                        }
                    }
                    group.push(decode_command(Fields(fields), index)?);
                }
                Some(other) => {
                    return Err(CommandLogError::UnexpectedToken(format!("{other:?}")));
                }
                None => return Err(CommandLogError::UnexpectedEnd),
            }
        }
        groups.push(group);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::eref::ERef;
    use crate::common::geometry::Rect;
    use crate::domains::uml::uml_models::{DiagramKind, NodeShape};

    fn two_node_diagram() -> Diagram {
        let mut d = Diagram::new("log", DiagramKind::ClassDiagram);
        d.add_node(ERef::new(NodeShape::new(
            ClassModel::named("A").into(),
            Rect::from_min_size(pos2(0.0, 0.0), vec2(100.0, 60.0)),
        )))
        .unwrap();
        d.add_node(ERef::new(NodeShape::new(
            ClassModel::named("B").into(),
            Rect::from_min_size(pos2(300.0, 0.0), vec2(100.0, 60.0)),
        )))
        .unwrap();
        d
    }

    #[test]
    fn edge_creation_round_trips_exactly() {
        let d = two_node_diagram();
        let index = DiagramIndex::of(&d);
        let ids: Vec<ViewUuid> = d.shapes().map(|s| s.uuid()).collect();

        let mut link = LinkModel::of_type(LinkType::Aggregation);
        link.name = "holds".to_owned();
        link.source_cardinality = Some("1".to_owned());
        link.dest_cardinality = Some("0..*".to_owned());
        link.bidirectional = true;
        let mut group = CommandGroup::new("Create link");
        let mut command = EditCommand::create_edge(link.clone(), ids[0], ids[1]);
        if let EditCommand::CreateEdge {
            source_anchor,
            dest_anchor,
            ..
        } = &mut command
        {
            *source_anchor = Some(pos2(50.0, 30.0));
            *dest_anchor = Some(pos2(350.0, 30.0));
        }
        group.push(command);

        let text = encode_group(&group, &index).unwrap();
        let decoded = decode_groups(&text, &index).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].label, "Create link");
        match &decoded[0].commands()[0] {
            EditCommand::CreateEdge {
                link: got,
                source,
                dest,
                source_anchor,
                dest_anchor,
                ..
            } => {
                assert_eq!(got, &link);
                assert_eq!(*source, ids[0]);
                assert_eq!(*dest, ids[1]);
                assert_eq!(*source_anchor, Some(pos2(50.0, 30.0)));
                assert_eq!(*dest_anchor, Some(pos2(350.0, 30.0)));
            }
            other => panic!("expected edge creation, got {other:?}"),
        }
    }

    #[test]
    fn decodes_legacy_flavored_sample() {
        let d = two_node_diagram();
        let index = DiagramIndex::of(&d);
        let sample = "<BEGIN_COMMAND_GROUP><GROUP_COMMENT=Create inheritance>\
            <BEGIN_COMMAND><COMMAND_CLASS=CreateEdge><srcId=1><dstId=2>\
            <srcPos=(264.0, 195.0)><dstPos=(414.0, 450.0)><linkType=INHERITANCE>\
            <END_COMMAND><END_COMMAND_GROUP>";

        let groups = decode_groups(sample, &index).unwrap();
        assert_eq!(groups.len(), 1);
        match &groups[0].commands()[0] {
            EditCommand::CreateEdge {
                link,
                source_anchor,
                ..
            } => {
                assert_eq!(link.link_type, LinkType::Inheritance);
                assert_eq!(*source_anchor, Some(pos2(264.0, 195.0)));
            }
            other => panic!("expected edge creation, got {other:?}"),
        }
    }

    #[test]
    fn node_creation_keeps_kind_name_and_geometry() {
        let d = Diagram::new("log", DiagramKind::ClassDiagram);
        let index = DiagramIndex::of(&d);
        let group = CommandGroup::single(
            "Create Class",
            EditCommand::create_node(
                ClassModel::named("Customer").into(),
                pos2(10.0, 20.0),
                vec2(100.0, 60.0),
            ),
        );

        let decoded = decode_groups(&encode_group(&group, &index).unwrap(), &index).unwrap();
        match &decoded[0].commands()[0] {
            EditCommand::CreateNode {
                model,
                position,
                size,
                ..
            } => {
                assert_eq!(model.kind_name(), "Class");
                assert_eq!(model.display_name(), "Customer");
                assert_eq!(*position, pos2(10.0, 20.0));
                assert_eq!(*size, vec2(100.0, 60.0));
            }
            other => panic!("expected node creation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_shape_id_is_rejected() {
        let d = two_node_diagram();
        let index = DiagramIndex::of(&d);
        let sample = "<BEGIN_COMMAND_GROUP><BEGIN_COMMAND><COMMAND_CLASS=DeleteNode>\
            <shapeId=99><END_COMMAND><END_COMMAND_GROUP>";
        assert!(matches!(
            decode_groups(sample, &index),
            Err(CommandLogError::UnknownShapeId(99))
        ));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let d = two_node_diagram();
        let index = DiagramIndex::of(&d);
        let sample = "<BEGIN_COMMAND_GROUP><BEGIN_COMMAND><COMMAND_CLASS=CreateEdge>\
            <srcId=1><END_COMMAND><END_COMMAND_GROUP>";
        assert!(matches!(
            decode_groups(sample, &index),
            Err(CommandLogError::MissingField("dstId"))
        ));
    }
}
