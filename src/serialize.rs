//! Term-graph serialization.
//!
//! A closed term without opaque nodes serializes to a textual DAG: one line
//! per node in bottom-up order, the root last. Nodes are deduplicated by
//! reference identity, so shared subterms serialize once.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::escape::{escape, unescape};
use crate::machine::Machine;
use crate::term::{self, Slot, Term, TermRef};

pub fn serialize(machine: &Machine, root: &TermRef) -> Result<String, String> {
    let mut ids: HashMap<*const Term, u32> = HashMap::new();
    let mut out = String::from("[\n");
    serialize_node(machine, root, &mut ids, &mut out)?;
    out.push_str("]\n");
    Ok(out)
}

fn serialize_node(
    machine: &Machine,
    t: &TermRef,
    ids: &mut HashMap<*const Term, u32>,
    out: &mut String,
) -> Result<u32, String> {
    let key = Arc::as_ptr(t);
    if let Some(id) = ids.get(&key) {
        return Ok(*id);
    }
    let line = match &**t {
        Term::Integer(n) => format!("i {}", n),
        Term::Float(f) => format!("f {:?}", f),
        Term::Char(c) => format!("c '{}'", escape(&c.to_string())),
        Term::Text(s) => format!("t \"{}\"", escape(s)),
        Term::Combinator(c) => format!("o {}", machine.symbol_text(c.symbol())),
        Term::Opaque(_) => return Err("cannot serialize opaque".to_string()),
        Term::Array(a) => {
            let mut ss = String::from("a [");
            for slot in a.to_vec() {
                match slot {
                    Some(x) => {
                        let id = serialize_node(machine, &x, ids, out)?;
                        let _ = write!(ss, " {}", id);
                    }
                    None => return Err("cannot serialize incomplete term".to_string()),
                }
            }
            ss.push_str(" ]");
            ss
        }
    };
    let id = ids.len() as u32;
    ids.insert(key, id);
    let _ = writeln!(out, "{}: {}", id, line);
    Ok(id)
}

pub fn deserialize(machine: &Machine, s: &str) -> Result<TermRef, String> {
    let mut map: HashMap<u32, TermRef> = HashMap::new();
    let mut last: Option<u32> = None;
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line == "[" || line == "]" {
            continue;
        }
        let (id_part, rest) = line
            .split_once(':')
            .ok_or_else(|| "deserialization error: missing id".to_string())?;
        let id: u32 = id_part
            .trim()
            .parse()
            .map_err(|_| "deserialization error: malformed id".to_string())?;
        let rest = rest.trim();
        let (tag, payload) = match rest.split_once(' ') {
            Some((t, p)) => (t, p.trim()),
            None => (rest, ""),
        };
        let t = match tag {
            "i" => machine.create_integer(
                payload
                    .parse::<i64>()
                    .map_err(|_| "deserialization error: malformed integer".to_string())?,
            ),
            "f" => machine.create_float(
                payload
                    .parse::<f64>()
                    .map_err(|_| "deserialization error: malformed float".to_string())?,
            ),
            "c" => {
                let inner = payload
                    .strip_prefix('\'')
                    .and_then(|p| p.strip_suffix('\''))
                    .ok_or_else(|| "deserialization error: malformed character".to_string())?;
                let s = unescape(inner)
                    .ok_or_else(|| "deserialization error: malformed escape".to_string())?;
                machine.create_char(s.chars().next().unwrap_or('?'))
            }
            "t" => {
                let inner = payload
                    .strip_prefix('"')
                    .and_then(|p| p.strip_suffix('"'))
                    .ok_or_else(|| "deserialization error: malformed text".to_string())?;
                let s = unescape(inner)
                    .ok_or_else(|| "deserialization error: malformed escape".to_string())?;
                machine.create_text(s)
            }
            "o" => machine.get_combinator(payload),
            "a" => {
                let inner = payload
                    .strip_prefix('[')
                    .and_then(|p| p.strip_suffix(']'))
                    .ok_or_else(|| "deserialization error: malformed array".to_string())?;
                let mut slots: Vec<Slot> = Vec::new();
                for w in inner.split_whitespace() {
                    let n: u32 = w
                        .parse()
                        .map_err(|_| "deserialization error: malformed reference".to_string())?;
                    let x = map
                        .get(&n)
                        .cloned()
                        .ok_or_else(|| "deserialization error: forward reference".to_string())?;
                    slots.push(Some(x));
                }
                term::array(slots)
            }
            _ => return Err("deserialization error: unknown tag".to_string()),
        };
        map.insert(id, t);
        last = Some(id);
    }
    let root = last.ok_or_else(|| "deserialization error: empty input".to_string())?;
    map.get(&root)
        .cloned()
        .ok_or_else(|| "deserialization error: no root".to_string())
}
