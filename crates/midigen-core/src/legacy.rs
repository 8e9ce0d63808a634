//! Adapter for loosely-typed JSON event lists
//!
//! Accepts tagged arrays (`["note_on", tick, note, velocity, channel?]`,
//! `["note_off", ...]`, `["pitch_bend", tick, value, channel?]`,
//! `["control_change", tick, controller, value, channel?]`) and untagged drone
//! tuples (`[note, start_tick, duration_ticks, velocity, channel?]`).
//! Entries that cannot be read are skipped with a warning.

use serde_json::Value;
use tracing::warn;

use crate::instruction::{note_pair, MidiInstruction, PITCH_BEND_MAX, PITCH_BEND_MIN};
use crate::Result;

/// Parse a JSON array of legacy events
pub fn parse_legacy_events(json: &str, default_channel: u8) -> Result<Vec<MidiInstruction>> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    Ok(convert_legacy_events(&entries, default_channel))
}

/// Convert already-parsed entries, dropping the malformed ones
pub fn convert_legacy_events(entries: &[Value], default_channel: u8) -> Vec<MidiInstruction> {
    let mut out = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match convert_entry(entry, default_channel) {
            Ok(events) => out.extend(events),
            Err(reason) => warn!(index, %entry, reason, "Skipping malformed event"),
        }
    }
    out
}

type EntryResult = std::result::Result<Vec<MidiInstruction>, &'static str>;

fn convert_entry(entry: &Value, default_channel: u8) -> EntryResult {
    let fields = entry.as_array().ok_or("not an array")?;
    match fields.first() {
        Some(Value::String(tag)) => convert_tagged(tag, &fields[1..], default_channel),
        Some(Value::Number(_)) => convert_tuple(fields, default_channel),
        Some(_) => Err("unrecognised first field"),
        None => Err("empty entry"),
    }
}

fn int_field(fields: &[Value], index: usize, min: i64, max: i64) -> std::result::Result<i64, &'static str> {
    let value = fields.get(index).ok_or("too few fields")?;
    let n = value.as_i64().ok_or("field is not an integer")?;
    if (min..=max).contains(&n) { Ok(n) } else { Err("field out of range") }
}

fn tick_field(fields: &[Value], index: usize) -> std::result::Result<u32, &'static str> {
    int_field(fields, index, 0, u32::MAX as i64).map(|t| t as u32)
}

fn u7_field(fields: &[Value], index: usize) -> std::result::Result<u8, &'static str> {
    int_field(fields, index, 0, 127).map(|v| v as u8)
}

fn channel_field(fields: &[Value], index: usize, default_channel: u8) -> std::result::Result<u8, &'static str> {
    if fields.len() <= index {
        return Ok(default_channel);
    }
    int_field(fields, index, 0, 15).map(|c| c as u8)
}

/// `fields` excludes the tag
fn convert_tagged(tag: &str, fields: &[Value], default_channel: u8) -> EntryResult {
    let event = match tag {
        "note_on" | "note_off" => {
            let tick = tick_field(fields, 0)?;
            let note = u7_field(fields, 1)?;
            let velocity = u7_field(fields, 2)?;
            let channel = channel_field(fields, 3, default_channel)?;
            if tag == "note_on" {
                MidiInstruction::NoteOn { tick, note, velocity, channel }
            } else {
                MidiInstruction::NoteOff { tick, note, velocity, channel }
            }
        }
        "pitch_bend" => MidiInstruction::PitchBend {
            tick: tick_field(fields, 0)?,
            value: int_field(fields, 1, PITCH_BEND_MIN.into(), PITCH_BEND_MAX.into())? as i16,
            channel: channel_field(fields, 2, default_channel)?,
        },
        "control_change" => MidiInstruction::ControlChange {
            tick: tick_field(fields, 0)?,
            controller: u7_field(fields, 1)?,
            value: u7_field(fields, 2)?,
            channel: channel_field(fields, 3, default_channel)?,
        },
        _ => return Err("unknown event tag"),
    };
    Ok(vec![event])
}

fn convert_tuple(fields: &[Value], default_channel: u8) -> EntryResult {
    let note = u7_field(fields, 0)?;
    let start = tick_field(fields, 1)?;
    let duration = tick_field(fields, 2)?;
    let velocity = int_field(fields, 3, 1, 127)? as u8;
    let channel = channel_field(fields, 4, default_channel)?;
    if duration == 0 {
        return Ok(Vec::new());
    }
    start.checked_add(duration).ok_or("note ends past the last tick")?;
    Ok(note_pair(note, velocity, channel, start, duration).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_events() {
        let json = r#"[
            ["control_change", 0, 101, 0],
            ["pitch_bend", 0, -8192, 3],
            ["note_on", 0, 60, 90],
            ["note_off", 480, 60, 0, 1]
        ]"#;
        let events = parse_legacy_events(json, 2).unwrap();
        assert_eq!(
            events,
            vec![
                MidiInstruction::ControlChange { tick: 0, controller: 101, value: 0, channel: 2 },
                MidiInstruction::PitchBend { tick: 0, value: -8192, channel: 3 },
                MidiInstruction::NoteOn { tick: 0, note: 60, velocity: 90, channel: 2 },
                MidiInstruction::NoteOff { tick: 480, note: 60, velocity: 0, channel: 1 },
            ]
        );
    }

    #[test]
    fn test_drone_tuples() {
        let events = parse_legacy_events("[[48, 0, 1920, 70], [52, 100, 0, 70]]", 0).unwrap();
        assert_eq!(events, note_pair(48, 70, 0, 0, 1920).to_vec());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let json = r#"[
            ["note_on", 0, 60],
            ["note_on", 0, 128, 90],
            ["pitch_bend", 0, 9000],
            ["sysex", 0, 1, 2],
            [60, -5, 100, 80],
            [60, 0, 100, 0],
            ["note_on", 0, 60, 90, 16],
            "note_on",
            [],
            [true, 1, 2, 3],
            ["note_on", 10, 62, 100]
        ]"#;
        let events = parse_legacy_events(json, 0).unwrap();
        assert_eq!(events, vec![MidiInstruction::NoteOn { tick: 10, note: 62, velocity: 100, channel: 0 }]);
    }

    #[test]
    fn test_not_an_array_is_an_error() {
        assert!(parse_legacy_events("{\"events\": []}", 0).is_err());
        assert!(parse_legacy_events("not json", 0).is_err());
    }
}
