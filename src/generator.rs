//! Consumers of the resolved model.
//!
//! Generators only read the [`Provider`]; the compiler knows nothing about their formats.

use std::fmt::Write;

use crate::err::{EvtcError, Result};
use crate::model::Provider;

pub trait Generator {
    fn name(&self) -> &str;
    fn generate(&self, provider: &Provider) -> Result<String>;
}

/// Pretty printed JSON of the whole model.
#[derive(Debug, Default, Copy, Clone)]
pub struct ModelJsonGenerator {
    pub indent: bool,
}

impl Generator for ModelJsonGenerator {
    fn name(&self) -> &str {
        "json"
    }

    fn generate(&self, provider: &Provider) -> Result<String> {
        let out = if self.indent {
            serde_json::to_string_pretty(provider)
        } else {
            serde_json::to_string(provider)
        };
        out.map_err(|e| EvtcError::internal(format!("failed to serialize model: {}", e)))
    }
}

/// A short human readable listing of the assigned values.
#[derive(Debug, Default, Copy, Clone)]
pub struct SummaryGenerator;

fn value(v: Option<u32>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_owned())
}

impl Generator for SummaryGenerator {
    fn name(&self) -> &str {
        "summary"
    }

    fn generate(&self, provider: &Provider) -> Result<String> {
        let mut s = String::new();
        write_summary(&mut s, provider)
            .map_err(|e| EvtcError::internal(format!("failed to format summary: {}", e)))?;
        Ok(s)
    }
}

fn write_summary(s: &mut String, p: &Provider) -> std::fmt::Result {
    writeln!(
        s,
        "Provider {} ({})",
        p.name.as_deref().unwrap_or("<unnamed>"),
        p.id
            .as_ref()
            .map(|id| format!("0x{}", id.to_str_radix(16)))
            .unwrap_or_else(|| "-".to_owned())
    )?;

    writeln!(s, "Channels: {}", p.channels.len())?;
    for c in p.sorted_channels() {
        writeln!(s, "  {} {} [{}] = {}", c.id, c.name, c.channel_type, value(c.value))?;
    }

    writeln!(s, "Tasks: {}", p.tasks.len())?;
    for t in p.sorted_tasks() {
        writeln!(s, "  {} = {}", t.name, value(t.value))?;
        let mut opcodes: Vec<_> = t.opcodes.values().collect();
        opcodes.sort_by(|a, b| a.name.cmp(&b.name));
        for o in opcodes {
            writeln!(s, "    opcode {} = {}", o.name, value(o.value))?;
        }
    }

    writeln!(s, "Opcodes: {}", p.opcodes.len())?;
    for o in p.sorted_opcodes() {
        writeln!(s, "  {} = {}", o.name, value(o.value))?;
    }

    writeln!(s, "Events: {}", p.events.len())?;
    for e in p.sorted_events() {
        writeln!(
            s,
            "  {} = {} ({}, {}, opcode {} = {}, template {})",
            e.name,
            value(e.value),
            e.severity,
            e.level,
            e.opcode.name(),
            value(p.opcode(e).and_then(|o| o.value)),
            e.template.as_ref().map(|t| t.id()).unwrap_or("-")
        )?;
    }

    writeln!(s, "Templates: {}", p.templates.len())?;
    for t in p.sorted_templates() {
        let fields: Vec<String> = t
            .fields()
            .iter()
            .map(|f| format!("{} {}", f.in_type, f.name))
            .collect();
        writeln!(s, "  {}({})", t.id(), fields.join(", "))?;
    }
    Ok(())
}
