//! Root and auxiliary schema documents in JSON or XML.
//!
//! A document is detected as JSON when its first non-whitespace byte is `{` or `[`, and XML
//! otherwise. Both forms decode into the same [`Document`], which is merged through
//! [`ModelBuilder`] with the same conflict rules as clauses. Document values are plain text,
//! they are not C string literals.

use std::collections::BTreeMap;

use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;

use crate::builder::{EventDecl, ModelBuilder, ProviderScalars, parse_provider_id};
use crate::err::{EvtcError, Result};
use crate::invalid_content;
use crate::model::InType;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderDoc {
    pub id: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub resource_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDoc {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    #[serde(default)]
    pub value: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpCodeDoc {
    pub name: String,
    #[serde(default)]
    pub value: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskDoc {
    pub name: String,
    #[serde(default)]
    pub value: Option<u32>,
    #[serde(default)]
    pub opcodes: Vec<OpCodeDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParamDoc {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventDoc {
    pub subsystem: String,
    pub severity: String,
    pub level: String,
    pub channel: String,
    pub task: String,
    pub opcode: String,
    #[serde(default)]
    pub value: Option<u32>,
    #[serde(default)]
    pub params: Vec<ParamDoc>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub provider: Option<ProviderDoc>,
    pub includes: Vec<String>,
    pub sources: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub typedefs: BTreeMap<String, String>,
    pub channels: Vec<ChannelDoc>,
    pub tasks: Vec<TaskDoc>,
    pub opcodes: Vec<OpCodeDoc>,
    pub events: Vec<EventDoc>,
}

/// Whether a buffer holds a JSON document rather than XML.
pub fn is_json(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

/// Whether a file should be read as a document instead of scanned for clauses.
///
/// Only JSON is auto-detected for referenced files; XML is only accepted as the root.
pub(crate) fn is_document_path(path: &str, text: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".json") || is_json(text)
}

/// Parse a JSON or XML document, `path` is only used for error messages.
pub fn parse_documents(path: &str, text: &str) -> Result<Vec<Document>> {
    if is_json(text) {
        parse_json(path, text)
    } else {
        parse_xml(path, text).map(|doc| vec![doc])
    }
}

fn parse_json(path: &str, text: &str) -> Result<Vec<Document>> {
    let trimmed = text.trim_start();
    let result = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Document>>(trimmed)
    } else {
        serde_json::from_str::<Document>(trimmed).map(|doc| vec![doc])
    };
    result.map_err(|source| EvtcError::Json {
        path: path.to_owned(),
        source,
    })
}

fn attributes(path: &str, e: &BytesStart) -> Result<BTreeMap<String, String>> {
    let mut attrs = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| EvtcError::xml(path, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| EvtcError::xml(path, err))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn required(attrs: &mut BTreeMap<String, String>, element: &str, key: &str) -> Result<String> {
    attrs
        .remove(key)
        .ok_or_else(|| invalid_content!("<{}> is missing the `{}` attribute", element, key))
}

fn numeric(attrs: &mut BTreeMap<String, String>, element: &str) -> Result<Option<u32>> {
    attrs
        .remove("value")
        .map(|v| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| invalid_content!("<{}> has a non numeric value `{}`", element, v))
        })
        .transpose()
}

/// Which list the current text content belongs to.
enum TextTarget {
    Include,
    Source,
}

fn parse_xml(path: &str, text: &str) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut doc = Document::default();
    let mut task: Option<TaskDoc> = None;
    let mut event: Option<EventDoc> = None;
    let mut text_target: Option<TextTarget> = None;
    let mut saw_provider = false;

    loop {
        let (e, is_empty) = match reader.read_event().map_err(|err| EvtcError::xml(path, err))? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::Text(t) => {
                let value = t.unescape().map_err(|err| EvtcError::xml(path, err))?;
                match text_target {
                    Some(TextTarget::Include) => doc.includes.push(value.trim().to_owned()),
                    Some(TextTarget::Source) => doc.sources.push(value.trim().to_owned()),
                    None => {}
                }
                continue;
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"task" => doc.tasks.extend(task.take()),
                    b"event" => doc.events.extend(event.take()),
                    b"include" | b"source" => text_target = None,
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = attributes(path, &e)?;

        match element.as_str() {
            "provider" => {
                saw_provider = true;
                doc.provider = Some(ProviderDoc {
                    id: attrs.remove("id"),
                    name: attrs.remove("name"),
                    symbol: attrs.remove("symbol"),
                    description: attrs.remove("description"),
                    resource_name: attrs.remove("resourceName"),
                });
            }
            "include" | "source" => {
                let list = if element == "include" {
                    &mut doc.includes
                } else {
                    &mut doc.sources
                };
                if let Some(p) = attrs.remove("path") {
                    list.push(p);
                } else if !is_empty {
                    text_target = Some(if element == "include" {
                        TextTarget::Include
                    } else {
                        TextTarget::Source
                    });
                }
            }
            "alias" => {
                let name = required(&mut attrs, &element, "name")?;
                let value = required(&mut attrs, &element, "value")?;
                doc.aliases.insert(name, value);
            }
            "typedef" => {
                let name = required(&mut attrs, &element, "name")?;
                let type_name = required(&mut attrs, &element, "type")?;
                doc.typedefs.insert(name, type_name);
            }
            "channel" => doc.channels.push(ChannelDoc {
                id: required(&mut attrs, &element, "id")?,
                name: required(&mut attrs, &element, "name")?,
                channel_type: required(&mut attrs, &element, "type")?,
                value: numeric(&mut attrs, &element)?,
            }),
            "task" => {
                let t = TaskDoc {
                    name: required(&mut attrs, &element, "name")?,
                    value: numeric(&mut attrs, &element)?,
                    opcodes: Vec::new(),
                };
                if is_empty {
                    doc.tasks.push(t);
                } else {
                    task = Some(t);
                }
            }
            "opcode" => {
                let opcode = OpCodeDoc {
                    name: required(&mut attrs, &element, "name")?,
                    value: numeric(&mut attrs, &element)?,
                };
                match task.as_mut() {
                    Some(t) => t.opcodes.push(opcode),
                    None => doc.opcodes.push(opcode),
                }
            }
            "event" => {
                let ev = EventDoc {
                    subsystem: required(&mut attrs, &element, "subsystem")?,
                    severity: required(&mut attrs, &element, "severity")?,
                    level: required(&mut attrs, &element, "level")?,
                    channel: required(&mut attrs, &element, "channel")?,
                    task: required(&mut attrs, &element, "task")?,
                    opcode: required(&mut attrs, &element, "opcode")?,
                    value: numeric(&mut attrs, &element)?,
                    params: Vec::new(),
                };
                if is_empty {
                    doc.events.push(ev);
                } else {
                    event = Some(ev);
                }
            }
            "param" => {
                let param = ParamDoc {
                    type_name: required(&mut attrs, &element, "type")?,
                    name: required(&mut attrs, &element, "name")?,
                };
                match event.as_mut() {
                    Some(ev) => ev.params.push(param),
                    None => return Err(invalid_content!("<param> outside of an <event>")),
                }
            }
            // Container and wrapper elements.
            _ => {}
        }
    }

    if !saw_provider {
        debug!("XML document `{}` has no <provider> element", path);
    }
    Ok(doc)
}

impl Document {
    /// Merge this document into the model and queue the files it references.
    pub fn apply(&self, builder: &mut ModelBuilder) -> Result<()> {
        if let Some(p) = &self.provider {
            let id = p
                .id
                .as_deref()
                .map(|id| parse_provider_id(&builder.alias_lookup(id)))
                .transpose()?;
            builder.define_provider(ProviderScalars {
                id,
                name: p.name.clone(),
                symbol: p.symbol.clone(),
                description: p.description.clone(),
                resource_name: p.resource_name.clone(),
            })?;
        }

        for (name, value) in &self.aliases {
            builder.define_alias(name, value)?;
        }

        for (name, type_name) in &self.typedefs {
            let in_type = InType::parse(&builder.alias_lookup(type_name))?;
            builder.define_typedef(name, in_type)?;
        }

        for c in &self.channels {
            let id = builder.alias_lookup(&c.id);
            let channel_type =
                crate::model::ChannelType::parse(&builder.alias_lookup(&c.channel_type))?;
            let name = builder.alias_lookup(&c.name);
            builder.define_channel(&id, &name, channel_type)?;
            if let Some(value) = c.value {
                builder.pin_channel(&id, value)?;
            }
        }

        for t in &self.tasks {
            let task = builder.alias_lookup(&t.name);
            builder.define_task(&task);
            if let Some(value) = t.value {
                builder.pin_task(&task, value)?;
            }
            for o in &t.opcodes {
                let opcode = builder.alias_lookup(&o.name);
                builder.define_task_local_opcode(&task, &opcode)?;
                if let Some(value) = o.value {
                    builder.pin_task_opcode(&task, &opcode, value)?;
                }
            }
        }

        for o in &self.opcodes {
            let opcode = builder.alias_lookup(&o.name);
            builder.define_opcode(&opcode);
            if let Some(value) = o.value {
                builder.pin_opcode(&opcode, value)?;
            }
        }

        for e in &self.events {
            let decl = EventDecl {
                subsystem: builder.alias_lookup(&e.subsystem),
                severity: builder.alias_lookup(&e.severity),
                level: builder.alias_lookup(&e.level),
                channel: builder.alias_lookup(&e.channel),
                task: builder.alias_lookup(&e.task),
                opcode: builder.alias_lookup(&e.opcode),
                params: e
                    .params
                    .iter()
                    .map(|p| (builder.alias_lookup(&p.type_name), builder.alias_lookup(&p.name)))
                    .collect(),
                value: e.value,
            };
            builder.define_event(decl)?;
        }

        let includes: Vec<String> = self.includes.iter().map(|p| builder.alias_lookup(p)).collect();
        let sources: Vec<String> = self.sources.iter().map(|p| builder.alias_lookup(p)).collect();
        builder.queue().push_front_all(includes);
        for source in sources {
            builder.queue().push_back(source);
        }
        Ok(())
    }
}
