//! The resolved semantic model of an event provider.
//!
//! Entities are created while sources are read, then the [`crate::index`] pass assigns their
//! numeric values. Events refer to channels, tasks and opcodes by key.

mod template;
mod types;

use std::rc::Rc;

use num_bigint::BigUint;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

pub use template::{DataTemplate, TemplateField, TemplateKey};
pub use types::{ChannelType, InType, Level, PREDEFINED_OPCODES, Severity, predefined_opcode};

pub type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

pub(crate) fn fast_map<K, V>() -> FastMap<K, V> {
    FastMap::with_hasher(ahash::RandomState::new())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Pinned value, or `None` when unpinned. Unpinned channels stay unpinned after indexing.
    pub value: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpCode {
    pub name: String,
    pub value: Option<u32>,
}

impl OpCode {
    pub fn new(name: impl Into<String>) -> Self {
        OpCode {
            name: name.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub value: Option<u32>,
    /// Opcodes scoped to this task.
    pub opcodes: FastMap<String, OpCode>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            value: None,
            opcodes: fast_map(),
        }
    }
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Task", 3)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("value", &self.value)?;
        s.serialize_field("opcodes", &sorted_values(&self.opcodes))?;
        s.end()
    }
}

/// Where an event's opcode lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "name", rename_all = "lowercase")]
pub enum OpCodeRef {
    /// An opcode in the task's own map.
    Task(String),
    /// An opcode in the provider's global map.
    Global(String),
}

impl OpCodeRef {
    pub fn name(&self) -> &str {
        match self {
            OpCodeRef::Task(name) | OpCodeRef::Global(name) => name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub name: String,
    pub subsystem: String,
    pub severity: Severity,
    pub level: Level,
    /// Key into [`Provider::channels`].
    pub channel: String,
    /// Key into [`Provider::tasks`].
    pub task: String,
    pub opcode: OpCodeRef,
    pub value: Option<u32>,
    #[serde(serialize_with = "serialize_template_ref")]
    pub template: Option<Rc<DataTemplate>>,
}

fn serialize_template_ref<S: Serializer>(
    template: &Option<Rc<DataTemplate>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match template {
        Some(t) => serializer.serialize_some(t.id()),
        None => serializer.serialize_none(),
    }
}

/// The top level owner of every schema entity.
#[derive(Debug, Clone)]
pub struct Provider {
    /// GUID-like identifier, kept as a plain unsigned integer.
    pub id: Option<BigUint>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub resource_name: Option<String>,

    /// Channel id -> channel.
    pub channels: FastMap<String, Channel>,
    pub tasks: FastMap<String, Task>,
    /// Provider wide opcodes.
    pub opcodes: FastMap<String, OpCode>,
    pub events: FastMap<String, Event>,
    pub templates: FastMap<TemplateKey, Rc<DataTemplate>>,
    pub aliases: FastMap<String, String>,
    pub typedefs: FastMap<String, InType>,
}

impl Default for Provider {
    fn default() -> Self {
        Provider {
            id: None,
            name: None,
            symbol: None,
            description: None,
            resource_name: None,
            channels: fast_map(),
            tasks: fast_map(),
            opcodes: fast_map(),
            events: fast_map(),
            templates: fast_map(),
            aliases: fast_map(),
            typedefs: fast_map(),
        }
    }
}

impl Provider {
    pub fn new() -> Self {
        Provider::default()
    }

    /// Intern a template: structurally equal field lists share one instance.
    pub fn intern_template(&mut self, fields: Vec<TemplateField>) -> Rc<DataTemplate> {
        let key = TemplateKey::new(fields);
        self.templates
            .entry(key)
            .or_insert_with_key(|key| Rc::new(DataTemplate::new(key.fields().to_vec())))
            .clone()
    }

    /// Resolve an event's opcode reference.
    pub fn opcode(&self, event: &Event) -> Option<&OpCode> {
        match &event.opcode {
            OpCodeRef::Task(name) => self.tasks.get(&event.task)?.opcodes.get(name),
            OpCodeRef::Global(name) => self.opcodes.get(name),
        }
    }

    pub fn sorted_channels(&self) -> Vec<&Channel> {
        sorted_values(&self.channels)
    }

    pub fn sorted_tasks(&self) -> Vec<&Task> {
        sorted_values(&self.tasks)
    }

    pub fn sorted_opcodes(&self) -> Vec<&OpCode> {
        sorted_values(&self.opcodes)
    }

    pub fn sorted_events(&self) -> Vec<&Event> {
        sorted_values(&self.events)
    }

    pub fn sorted_templates(&self) -> Vec<&DataTemplate> {
        let mut templates: Vec<&DataTemplate> = self.templates.values().map(|t| &**t).collect();
        templates.sort_by(|a, b| a.id().cmp(b.id()));
        templates
    }
}

fn sorted_values<V>(map: &FastMap<String, V>) -> Vec<&V> {
    let mut entries: Vec<(&String, &V)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, v)| v).collect()
}

impl Serialize for Provider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut aliases: Vec<(&String, &String)> = self.aliases.iter().collect();
        aliases.sort();
        let mut typedefs: Vec<(&String, &InType)> = self.typedefs.iter().collect();
        typedefs.sort();

        let mut s = serializer.serialize_struct("Provider", 12)?;
        s.serialize_field("id", &self.id.as_ref().map(|id| id.to_str_radix(16)))?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("symbol", &self.symbol)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("resourceName", &self.resource_name)?;
        s.serialize_field("channels", &self.sorted_channels())?;
        s.serialize_field("tasks", &self.sorted_tasks())?;
        s.serialize_field("opcodes", &self.sorted_opcodes())?;
        s.serialize_field("events", &self.sorted_events())?;
        s.serialize_field("templates", &self.sorted_templates())?;
        s.serialize_field("aliases", &aliases)?;
        s.serialize_field("typedefs", &typedefs)?;
        s.end()
    }
}
