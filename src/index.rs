//! Assignment and validation of numeric values once every source has been read.
//!
//! | namespace | pinned range | auto-assigned from | cap |
//! |-----------|--------------|--------------------|-----|
//! | channels | 1..=255 | (never) | |
//! | tasks | 1..=239 | 1 | 239 |
//! | global opcodes | 10..=239, or a predefined value | 10 | 239 |
//! | task opcodes | 10..=239 | 10 | 239 |
//! | events | any | 1000 | none |
//!
//! Entities are visited in name order so results do not depend on map iteration order.

use std::collections::BTreeSet;

use log::debug;

use crate::err::Result;
use crate::invalid_content;
use crate::model::{FastMap, OpCode, Provider, predefined_opcode};

const CHANNEL_RANGE: (u32, u32) = (1, 255);
const TASK_RANGE: (u32, u32) = (1, 239);
const OPCODE_RANGE: (u32, u32) = (10, 239);
const EVENT_FIRST: u32 = 1000;

/// Set of values already taken within one namespace.
#[derive(Debug, Clone)]
struct IndexSpace {
    what: String,
    used: BTreeSet<u32>,
    first: u32,
    last: Option<u32>,
}

impl IndexSpace {
    fn new(what: impl Into<String>, first: u32, last: Option<u32>) -> Self {
        IndexSpace {
            what: what.into(),
            used: BTreeSet::new(),
            first,
            last,
        }
    }

    fn with_used(mut self, used: BTreeSet<u32>) -> Self {
        self.used = used;
        self
    }

    /// Claims a pinned value, failing if it was already taken.
    fn claim(&mut self, owner: &str, value: u32) -> Result<()> {
        if !self.used.insert(value) {
            return Err(invalid_content!(
                "{} `{}` reuses value {}",
                self.what,
                owner,
                value
            ));
        }
        Ok(())
    }

    /// Claims the smallest free value.
    fn next_free(&mut self, owner: &str) -> Result<u32> {
        let mut candidate = self.first;
        loop {
            if let Some(last) = self.last {
                if candidate > last {
                    return Err(invalid_content!(
                        "no free {} value left for `{}` (limit {})",
                        self.what,
                        owner,
                        last
                    ));
                }
            }
            if self.used.insert(candidate) {
                return Ok(candidate);
            }
            candidate = candidate.checked_add(1).ok_or_else(|| {
                invalid_content!("{} values exhausted while assigning `{}`", self.what, owner)
            })?;
        }
    }
}

fn check_range(what: &str, owner: &str, value: u32, (lo, hi): (u32, u32)) -> Result<()> {
    if value < lo || value > hi {
        return Err(invalid_content!(
            "{} `{}` has value {} outside of {}..={}",
            what,
            owner,
            value,
            lo,
            hi
        ));
    }
    Ok(())
}

fn sorted_mut<V>(map: &mut FastMap<String, V>) -> Vec<(&String, &mut V)> {
    let mut entries: Vec<(&String, &mut V)> = map.iter_mut().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Runs every pass over the model. The model must not change afterwards.
pub fn assign_indices(provider: &mut Provider) -> Result<()> {
    index_channels(provider)?;
    index_tasks(provider)?;
    let consumed = index_global_opcodes(provider)?;
    index_task_opcodes(provider, &consumed)?;
    index_events(provider)?;
    Ok(())
}

fn index_channels(provider: &mut Provider) -> Result<()> {
    let mut space = IndexSpace::new("channel", CHANNEL_RANGE.0, Some(CHANNEL_RANGE.1));
    for (id, channel) in sorted_mut(&mut provider.channels) {
        if let Some(value) = channel.value {
            check_range("channel", id, value, CHANNEL_RANGE)?;
            space.claim(id, value)?;
        }
    }
    Ok(())
}

fn index_tasks(provider: &mut Provider) -> Result<()> {
    let mut space = IndexSpace::new("task", TASK_RANGE.0, Some(TASK_RANGE.1));
    let mut tasks = sorted_mut(&mut provider.tasks);

    for (name, task) in tasks.iter() {
        if let Some(value) = task.value {
            check_range("task", name, value, TASK_RANGE)?;
            space.claim(name, value)?;
        }
    }

    for (name, task) in tasks.iter_mut() {
        if task.value.is_none() {
            let value = space.next_free(name)?;
            debug!("task `{}` assigned {}", name, value);
            task.value = Some(value);
        }
    }
    Ok(())
}

/// Returns the set of opcode values no task may reuse.
fn index_global_opcodes(provider: &mut Provider) -> Result<BTreeSet<u32>> {
    // Values pinned on any task are taken provider wide.
    let seeded: BTreeSet<u32> = provider
        .tasks
        .values()
        .flat_map(|t| t.opcodes.values().filter_map(|o| o.value))
        .collect();

    let mut space =
        IndexSpace::new("opcode", OPCODE_RANGE.0, Some(OPCODE_RANGE.1)).with_used(seeded);
    let mut opcodes = sorted_mut(&mut provider.opcodes);

    for (name, opcode) in opcodes.iter() {
        if let Some(value) = opcode.value {
            if predefined_opcode(name) != Some(value) {
                check_range("opcode", name, value, OPCODE_RANGE)?;
            }
            space.claim(name, value)?;
        }
    }

    assign_unpinned(&mut opcodes, &mut space, "opcode")?;
    Ok(space.used)
}

fn index_task_opcodes(provider: &mut Provider, consumed: &BTreeSet<u32>) -> Result<()> {
    for (task_name, task) in sorted_mut(&mut provider.tasks) {
        let what = format!("opcode of task `{}`", task_name);
        let mut space = IndexSpace::new(what.clone(), OPCODE_RANGE.0, Some(OPCODE_RANGE.1))
            .with_used(consumed.clone());
        let mut pinned = IndexSpace::new(what.clone(), OPCODE_RANGE.0, Some(OPCODE_RANGE.1));
        let mut opcodes = sorted_mut(&mut task.opcodes);

        for (name, opcode) in opcodes.iter() {
            if let Some(value) = opcode.value {
                check_range(&what, name, value, OPCODE_RANGE)?;
                pinned.claim(name, value)?;
                space.used.insert(value);
            }
        }

        assign_unpinned(&mut opcodes, &mut space, &what)?;
    }
    Ok(())
}

fn assign_unpinned(
    opcodes: &mut [(&String, &mut OpCode)],
    space: &mut IndexSpace,
    what: &str,
) -> Result<()> {
    for (name, opcode) in opcodes.iter_mut() {
        if opcode.value.is_none() {
            let value = space.next_free(name)?;
            debug!("{} `{}` assigned {}", what, name, value);
            opcode.value = Some(value);
        }
    }
    Ok(())
}

fn index_events(provider: &mut Provider) -> Result<()> {
    let mut space = IndexSpace::new("event", EVENT_FIRST, None);
    let mut events = sorted_mut(&mut provider.events);

    for (name, event) in events.iter() {
        if let Some(value) = event.value {
            space.claim(name, value)?;
        }
    }

    for (name, event) in events.iter_mut() {
        if event.value.is_none() {
            let value = space.next_free(name)?;
            debug!("event `{}` assigned {}", name, value);
            event.value = Some(value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::ErrorKind;
    use crate::model::{Channel, ChannelType, Event, Level, OpCodeRef, Severity, Task};
    use pretty_assertions::assert_eq;

    fn channel(provider: &mut Provider, id: &str, value: Option<u32>) {
        provider.channels.insert(
            id.to_owned(),
            Channel {
                id: id.to_owned(),
                name: id.to_owned(),
                channel_type: ChannelType::Operational,
                value,
            },
        );
    }

    fn task(provider: &mut Provider, name: &str, value: Option<u32>) {
        let mut t = Task::new(name);
        t.value = value;
        provider.tasks.insert(name.to_owned(), t);
    }

    fn opcode(name: &str, value: Option<u32>) -> (String, OpCode) {
        (
            name.to_owned(),
            OpCode {
                name: name.to_owned(),
                value,
            },
        )
    }

    fn event(provider: &mut Provider, name: &str, value: Option<u32>) {
        provider.events.insert(
            name.to_owned(),
            Event {
                name: name.to_owned(),
                subsystem: "S".to_owned(),
                severity: Severity::Error,
                level: Level::Error,
                channel: "c".to_owned(),
                task: "t".to_owned(),
                opcode: OpCodeRef::Global("o".to_owned()),
                value,
                template: None,
            },
        );
    }

    fn fails(provider: &mut Provider) -> String {
        let err = assign_indices(provider).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidContent);
        err.to_string()
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut p = Provider::new();
        channel(&mut p, "c1", Some(300));
        assert!(fails(&mut p).contains("300"));

        let mut p = Provider::new();
        channel(&mut p, "c1", Some(0));
        fails(&mut p);
    }

    #[test]
    fn test_channels_are_not_auto_assigned() {
        let mut p = Provider::new();
        channel(&mut p, "c1", None);
        channel(&mut p, "c2", Some(16));
        assign_indices(&mut p).unwrap();
        assert_eq!(p.channels["c1"].value, None);
        assert_eq!(p.channels["c2"].value, Some(16));
    }

    #[test]
    fn test_duplicate_pinned_channel() {
        let mut p = Provider::new();
        channel(&mut p, "c1", Some(16));
        channel(&mut p, "c2", Some(16));
        assert!(fails(&mut p).contains("16"));
    }

    #[test]
    fn test_tasks_fill_smallest_free() {
        let mut p = Provider::new();
        task(&mut p, "a", None);
        task(&mut p, "b", Some(1));
        task(&mut p, "c", None);
        task(&mut p, "d", Some(3));
        assign_indices(&mut p).unwrap();
        assert_eq!(p.tasks["a"].value, Some(2));
        assert_eq!(p.tasks["c"].value, Some(4));
    }

    #[test]
    fn test_task_limits() {
        let mut p = Provider::new();
        task(&mut p, "a", Some(240));
        fails(&mut p);

        let mut p = Provider::new();
        for i in 0..240 {
            task(&mut p, &format!("t{:03}", i), None);
        }
        assert!(fails(&mut p).contains("239"));
    }

    #[test]
    fn test_global_opcodes() {
        let mut p = Provider::new();
        p.opcodes.extend([opcode("a", None), opcode("b", Some(10)), opcode("Start", Some(1))]);
        assign_indices(&mut p).unwrap();
        assert_eq!(p.opcodes["a"].value, Some(11));
        assert_eq!(p.opcodes["Start"].value, Some(1));
    }

    #[test]
    fn test_global_opcode_range() {
        let mut p = Provider::new();
        p.opcodes.extend([opcode("a", Some(5))]);
        fails(&mut p);

        // The predefined value only belongs to its own name.
        let mut p = Provider::new();
        p.opcodes.extend([opcode("Stop", Some(1))]);
        fails(&mut p);
    }

    #[test]
    fn test_task_pinned_opcodes_are_reserved_globally() {
        let mut p = Provider::new();
        task(&mut p, "t", None);
        p.tasks
            .get_mut("t")
            .unwrap()
            .opcodes
            .extend([opcode("local", Some(10))]);
        p.opcodes.extend([opcode("global", None)]);
        assign_indices(&mut p).unwrap();
        assert_eq!(p.opcodes["global"].value, Some(11));

        // A global pin colliding with a task pin is fatal.
        let mut p = Provider::new();
        task(&mut p, "t", None);
        p.tasks
            .get_mut("t")
            .unwrap()
            .opcodes
            .extend([opcode("local", Some(12))]);
        p.opcodes.extend([opcode("global", Some(12))]);
        fails(&mut p);
    }

    #[test]
    fn test_task_opcodes_avoid_global_values() {
        let mut p = Provider::new();
        task(&mut p, "t1", None);
        task(&mut p, "t2", None);
        p.opcodes.extend([opcode("g1", Some(10)), opcode("g2", None)]);
        p.tasks
            .get_mut("t1")
            .unwrap()
            .opcodes
            .extend([opcode("x", None), opcode("y", None)]);
        p.tasks
            .get_mut("t2")
            .unwrap()
            .opcodes
            .extend([opcode("x", None)]);
        assign_indices(&mut p).unwrap();

        assert_eq!(p.opcodes["g2"].value, Some(11));
        assert_eq!(p.tasks["t1"].opcodes["x"].value, Some(12));
        assert_eq!(p.tasks["t1"].opcodes["y"].value, Some(13));
        // Task namespaces are independent of each other.
        assert_eq!(p.tasks["t2"].opcodes["x"].value, Some(12));
    }

    #[test]
    fn test_duplicate_task_local_pins() {
        let mut p = Provider::new();
        task(&mut p, "t", None);
        p.tasks
            .get_mut("t")
            .unwrap()
            .opcodes
            .extend([opcode("a", Some(20)), opcode("b", Some(20))]);
        assert!(fails(&mut p).contains("20"));
    }

    #[test]
    fn test_events() {
        let mut p = Provider::new();
        event(&mut p, "a", None);
        event(&mut p, "b", Some(1000));
        event(&mut p, "c", Some(5));
        event(&mut p, "d", None);
        assign_indices(&mut p).unwrap();
        assert_eq!(p.events["a"].value, Some(1001));
        assert_eq!(p.events["c"].value, Some(5));
        assert_eq!(p.events["d"].value, Some(1002));

        let mut p = Provider::new();
        event(&mut p, "a", Some(1000));
        event(&mut p, "b", Some(1000));
        fails(&mut p);
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let build = || {
            let mut p = Provider::new();
            for name in ["zeta", "alpha", "mid", "beta"] {
                task(&mut p, name, None);
                event(&mut p, name, None);
            }
            assign_indices(&mut p).unwrap();
            p
        };
        let (a, b) = (build(), build());
        for name in ["zeta", "alpha", "mid", "beta"] {
            assert_eq!(a.tasks[name].value, b.tasks[name].value);
            assert_eq!(a.events[name].value, b.events[name].value);
        }
        assert_eq!(a.tasks["alpha"].value, Some(1));
        assert_eq!(a.tasks["zeta"].value, Some(4));
    }
}
