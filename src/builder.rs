//! Interpretation of clauses into the [`Provider`] model.
//!
//! Every clause argument, `ALIAS` arguments included, goes through one level of alias
//! substitution before it is interpreted. Provider scalars, `SOURCE` paths and channel
//! names and types must be string literals. Everywhere else a bare identifier is taken as
//! written and a literal is decoded, so `TASK(Socket)` and `TASK("Socket")` are the same task.
//! Recognised forms:
//!
//! | form | args | effect |
//! |------|------|--------|
//! | `PROVIDER(id, name, symbol, description, resource)` | 5 | provider scalars |
//! | `ALIAS(name, value)` | 2 | textual substitution |
//! | `SOURCE(path)` / `INCLUDE(path)` | 1 | queue another file (back / front) |
//! | `CHANNEL(id, name, type)` | 3 | channel |
//! | `TASK(name)` / `OPCODE(name)` | 1 | task / global opcode, first definition wins |
//! | `TASK_OPCODE(task, opcode)` | 2 | see [`ModelBuilder::define_task_opcode`] |
//! | `INIT()` / `DEINIT()` | 0 | guard only |
//! | `<N>(subsystem, severity, level, channel, task, opcode, [type, name, expr]*N)` | 6+3N | event |

use log::{debug, warn};
use num_bigint::BigUint;

use crate::clause::Clause;
use crate::err::{EvtcError, Result};
use crate::invalid_content;
use crate::literal::{decode, decode_or_bare};
use crate::model::{
    Channel, ChannelType, Event, InType, Level, OpCode, OpCodeRef, Provider, Severity, Task,
    TemplateField, predefined_opcode,
};
use crate::queue::WorkQueue;

/// Provider scalar fields, `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderScalars {
    pub id: Option<BigUint>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub resource_name: Option<String>,
}

/// An event declaration, shared by the clause form and documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecl {
    pub subsystem: String,
    pub severity: String,
    pub level: String,
    pub channel: String,
    pub task: String,
    pub opcode: String,
    /// `(type name, parameter name)` pairs in order.
    pub params: Vec<(String, String)>,
    pub value: Option<u32>,
}

/// Mutable handle on the model under construction.
///
/// The provider is created on first use.
pub struct ModelBuilder<'a> {
    provider: &'a mut Option<Provider>,
    queue: &'a mut WorkQueue,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(provider: &'a mut Option<Provider>, queue: &'a mut WorkQueue) -> Self {
        ModelBuilder { provider, queue }
    }

    pub fn provider(&mut self) -> &mut Provider {
        self.provider.get_or_insert_with(Provider::new)
    }

    pub fn queue(&mut self) -> &mut WorkQueue {
        self.queue
    }

    /// Exact-match, single level alias replacement.
    pub fn alias_lookup(&self, arg: &str) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.aliases.get(arg))
            .cloned()
            .unwrap_or_else(|| arg.to_owned())
    }

    /// Interpret one parsed clause.
    pub fn apply(&mut self, clause: &Clause) -> Result<()> {
        let method = clause.method.as_str();
        debug!("interpreting `{}` with {} argument(s)", method, clause.args.len());

        let args: Vec<String> = clause.args.iter().map(|a| self.alias_lookup(a)).collect();

        match method {
            "PROVIDER" => {
                expect_args(method, &args, 5)?;
                self.define_provider(ProviderScalars {
                    id: Some(parse_provider_id(&args[0])?),
                    name: Some(decode(&args[1])?),
                    symbol: Some(decode(&args[2])?),
                    description: Some(decode(&args[3])?),
                    resource_name: Some(decode(&args[4])?),
                })
            }
            "ALIAS" => {
                expect_args(method, &args, 2)?;
                self.define_alias(&args[0], &args[1])
            }
            "SOURCE" => {
                expect_args(method, &args, 1)?;
                let path = decode(&args[0])?;
                self.queue.push_back(path);
                Ok(())
            }
            "INCLUDE" => {
                expect_args(method, &args, 1)?;
                let path = decode_or_bare(&args[0])?;
                self.queue.push_front(path);
                Ok(())
            }
            "CHANNEL" => {
                expect_args(method, &args, 3)?;
                let channel_type = ChannelType::parse(&decode(&args[2])?)?;
                self.define_channel(&decode_or_bare(&args[0])?, &decode(&args[1])?, channel_type)
                    .map(|_| ())
            }
            "TASK" => {
                expect_args(method, &args, 1)?;
                self.define_task(&decode_or_bare(&args[0])?);
                Ok(())
            }
            "OPCODE" => {
                expect_args(method, &args, 1)?;
                self.define_opcode(&decode_or_bare(&args[0])?);
                Ok(())
            }
            "TASK_OPCODE" => {
                expect_args(method, &args, 2)?;
                self.define_task_opcode(&decode_or_bare(&args[0])?, &decode_or_bare(&args[1])?)
            }
            "INIT" | "DEINIT" => {
                expect_args(method, &args, 0)?;
                // TODO: confirm whether this guard is inverted against existing annotated sources.
                if let Some(name) = self.provider().name.as_ref() {
                    return Err(invalid_content!(
                        "`{}` is not allowed after provider `{}` was defined",
                        method,
                        name
                    ));
                }
                Ok(())
            }
            m if !m.is_empty() && m.bytes().all(|b| b.is_ascii_digit()) => {
                let decl = parse_event_clause(m, &args)?;
                self.define_event(decl)
            }
            _ => Err(EvtcError::MethodNotUnderstood {
                method: method.to_owned(),
            }),
        }
    }

    /// Sets the given provider scalars. Redefining one with another value is an error.
    pub fn define_provider(&mut self, scalars: ProviderScalars) -> Result<()> {
        let provider = self.provider();
        set_opt_scalar(&mut provider.id, scalars.id, "provider id")?;
        set_opt_scalar(&mut provider.name, scalars.name, "provider name")?;
        set_opt_scalar(&mut provider.symbol, scalars.symbol, "provider symbol")?;
        set_opt_scalar(&mut provider.description, scalars.description, "provider description")?;
        set_opt_scalar(
            &mut provider.resource_name,
            scalars.resource_name,
            "provider resource name",
        )?;
        Ok(())
    }

    pub fn define_alias(&mut self, name: &str, value: &str) -> Result<()> {
        let aliases = &mut self.provider().aliases;
        match aliases.get(name) {
            Some(existing) if existing == value => Ok(()),
            Some(existing) => Err(invalid_content!(
                "alias `{}` redefined from `{}` to `{}`",
                name,
                existing,
                value
            )),
            None => {
                aliases.insert(name.to_owned(), value.to_owned());
                Ok(())
            }
        }
    }

    pub fn define_typedef(&mut self, name: &str, in_type: InType) -> Result<()> {
        let typedefs = &mut self.provider().typedefs;
        match typedefs.get(name) {
            Some(existing) if *existing == in_type => Ok(()),
            Some(existing) => Err(invalid_content!(
                "typedef `{}` redefined from {} to {}",
                name,
                existing,
                in_type
            )),
            None => {
                typedefs.insert(name.to_owned(), in_type);
                Ok(())
            }
        }
    }

    /// Defines a channel, or returns the existing one if it is identical.
    pub fn define_channel(
        &mut self,
        id: &str,
        name: &str,
        channel_type: ChannelType,
    ) -> Result<&Channel> {
        let channels = &mut self.provider().channels;
        if let Some(existing) = channels.get(id) {
            if existing.name != name || existing.channel_type != channel_type {
                return Err(invalid_content!(
                    "channel `{}` redefined as (`{}`, {}), previously (`{}`, {})",
                    id,
                    name,
                    channel_type,
                    existing.name,
                    existing.channel_type
                ));
            }
        }

        Ok(channels
            .entry(id.to_owned())
            .or_insert_with(|| Channel {
                id: id.to_owned(),
                name: name.to_owned(),
                channel_type,
                value: None,
            }))
    }

    /// First definition wins.
    pub fn define_task(&mut self, name: &str) {
        self.provider()
            .tasks
            .entry(name.to_owned())
            .or_insert_with(|| Task::new(name));
    }

    /// First definition wins.
    pub fn define_opcode(&mut self, name: &str) {
        self.provider()
            .opcodes
            .entry(name.to_owned())
            .or_insert_with(|| OpCode::new(name));
    }

    /// Registers an opcode for a task.
    ///
    /// The task must exist. An opcode missing from the task's own map is added to the
    /// provider's *global* map, not the task's.
    pub fn define_task_opcode(&mut self, task: &str, opcode: &str) -> Result<()> {
        let provider = self.provider();
        let Some(t) = provider.tasks.get(task) else {
            return Err(invalid_content!(
                "TASK_OPCODE references undefined task `{}`",
                task
            ));
        };

        if !t.opcodes.contains_key(opcode) {
            warn!(
                "opcode `{}` of task `{}` is registered in the provider wide opcode map",
                opcode, task
            );
            provider
                .opcodes
                .entry(opcode.to_owned())
                .or_insert_with(|| OpCode::new(opcode));
        }
        Ok(())
    }

    /// Adds an opcode to a task's own map. Used by documents.
    pub fn define_task_local_opcode(&mut self, task: &str, opcode: &str) -> Result<()> {
        let t = self
            .provider()
            .tasks
            .get_mut(task)
            .ok_or_else(|| invalid_content!("opcode `{}` declared on undefined task `{}`", opcode, task))?;
        t.opcodes
            .entry(opcode.to_owned())
            .or_insert_with(|| OpCode::new(opcode));
        Ok(())
    }

    pub fn pin_channel(&mut self, id: &str, value: u32) -> Result<()> {
        let channel = self
            .provider()
            .channels
            .get_mut(id)
            .ok_or_else(|| invalid_content!("cannot pin undefined channel `{}`", id))?;
        set_scalar(&mut channel.value, value, "channel value")
    }

    pub fn pin_task(&mut self, name: &str, value: u32) -> Result<()> {
        let task = self
            .provider()
            .tasks
            .get_mut(name)
            .ok_or_else(|| invalid_content!("cannot pin undefined task `{}`", name))?;
        set_scalar(&mut task.value, value, "task value")
    }

    pub fn pin_opcode(&mut self, name: &str, value: u32) -> Result<()> {
        let opcode = self
            .provider()
            .opcodes
            .get_mut(name)
            .ok_or_else(|| invalid_content!("cannot pin undefined opcode `{}`", name))?;
        set_scalar(&mut opcode.value, value, "opcode value")
    }

    pub fn pin_task_opcode(&mut self, task: &str, name: &str, value: u32) -> Result<()> {
        let opcode = self
            .provider()
            .tasks
            .get_mut(task)
            .and_then(|t| t.opcodes.get_mut(name))
            .ok_or_else(|| {
                invalid_content!("cannot pin undefined opcode `{}` of task `{}`", name, task)
            })?;
        set_scalar(&mut opcode.value, value, "task opcode value")
    }

    /// Resolves an event declaration against the model and records it.
    pub fn define_event(&mut self, decl: EventDecl) -> Result<()> {
        let severity = Severity::parse(&decl.severity)?;
        let level = Level::parse(&decl.level)?;
        let provider = self.provider();

        if !provider.channels.contains_key(&decl.channel) {
            return Err(invalid_content!("event references undefined channel `{}`", decl.channel));
        }
        let Some(task) = provider.tasks.get(&decl.task) else {
            return Err(invalid_content!("event references undefined task `{}`", decl.task));
        };

        let opcode = if task.opcodes.contains_key(&decl.opcode) {
            OpCodeRef::Task(decl.opcode.clone())
        } else if provider.opcodes.contains_key(&decl.opcode) {
            OpCodeRef::Global(decl.opcode.clone())
        } else if predefined_opcode(&decl.opcode).is_some() {
            // Predefined names are materialised in the global map on first reference.
            provider
                .opcodes
                .insert(decl.opcode.clone(), OpCode::new(decl.opcode.as_str()));
            OpCodeRef::Global(decl.opcode.clone())
        } else {
            return Err(invalid_content!("event references undefined opcode `{}`", decl.opcode));
        };

        let mut fields = Vec::with_capacity(decl.params.len());
        for (type_name, name) in &decl.params {
            let in_type = match provider.typedefs.get(type_name) {
                Some(t) => *t,
                None => InType::parse(type_name)?,
            };
            fields.push(TemplateField {
                in_type,
                name: name.clone(),
            });
        }

        let name = event_symbol(&decl.subsystem, &decl.task, &decl.opcode);
        if provider.events.contains_key(&name) {
            return Err(invalid_content!("duplicate event `{}`", name));
        }

        let template = if fields.is_empty() {
            None
        } else {
            Some(provider.intern_template(fields))
        };

        debug!("defined event `{}`", name);
        provider.events.insert(
            name.clone(),
            Event {
                name,
                subsystem: decl.subsystem,
                severity,
                level,
                channel: decl.channel,
                task: decl.task,
                opcode,
                value: decl.value,
                template,
            },
        );
        Ok(())
    }
}

/// The symbol an event is known by.
pub fn event_symbol(subsystem: &str, task: &str, opcode: &str) -> String {
    [subsystem, task, opcode]
        .iter()
        .map(|part| {
            part.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn expect_args(method: &str, args: &[String], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(invalid_content!(
            "`{}` expects {} argument(s), got {}",
            method,
            count,
            args.len()
        ));
    }
    Ok(())
}

fn set_scalar<T: PartialEq + std::fmt::Debug>(
    slot: &mut Option<T>,
    value: T,
    what: &str,
) -> Result<()> {
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(existing) => Err(invalid_content!(
            "{} redefined from {:?} to {:?}",
            what,
            existing,
            value
        )),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn set_opt_scalar<T: PartialEq + std::fmt::Debug>(
    slot: &mut Option<T>,
    value: Option<T>,
    what: &str,
) -> Result<()> {
    match value {
        Some(value) => set_scalar(slot, value, what),
        None => Ok(()),
    }
}

fn parse_event_clause(method: &str, args: &[String]) -> Result<EventDecl> {
    let arity: usize = method
        .parse()
        .map_err(|_| EvtcError::internal(format!("event arity `{}` is too large", method)))?;
    let expected = arity
        .checked_mul(3)
        .and_then(|n| n.checked_add(6))
        .ok_or_else(|| EvtcError::internal(format!("event arity `{}` is too large", method)))?;
    expect_args(method, args, expected)?;

    let params = args[6..]
        .chunks_exact(3)
        .map(|group| Ok((decode_or_bare(&group[0])?, decode_or_bare(&group[1])?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(EventDecl {
        subsystem: decode_or_bare(&args[0])?,
        severity: decode_or_bare(&args[1])?,
        level: decode_or_bare(&args[2])?,
        channel: decode_or_bare(&args[3])?,
        task: decode_or_bare(&args[4])?,
        opcode: decode_or_bare(&args[5])?,
        params,
        value: None,
    })
}

/// Parses a provider id as an unsigned integer of any width.
///
/// Accepts an optionally quoted value, surrounding braces, `0x` hex, GUID-style dashed hex
/// and plain decimal.
pub fn parse_provider_id(raw: &str) -> Result<BigUint> {
    let trimmed = raw.trim();
    let unquoted = if trimmed.starts_with('"') || trimmed.starts_with("L\"") {
        decode(trimmed)?
    } else {
        trimmed.to_owned()
    };
    let s = unquoted
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}');

    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        BigUint::parse_bytes(hex.as_bytes(), 16)
    } else if s.contains('-') {
        BigUint::parse_bytes(s.replace('-', "").as_bytes(), 16)
    } else if s.bytes().all(|b| b.is_ascii_digit()) {
        BigUint::parse_bytes(s.as_bytes(), 10)
    } else {
        BigUint::parse_bytes(s.as_bytes(), 16)
    };

    parsed.ok_or_else(|| invalid_content!("invalid provider id `{}`", raw))
}
