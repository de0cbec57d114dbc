//! invalidate/emit — XML-список блоков:
//!
//! ```text
//! <blocks>
//!   <block block="7"/>
//!   <range begin="10" end="20"/>
//! </blocks>
//! ```
//!
//! Отрезок длины 1 → `<block>`, длиннее → `<range>` (end не включается).

use anyhow::Result;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

use super::runs::BlockRun;
use crate::error::EraError;
use crate::xml::{element_name, required_u32};

pub fn emit_blocks<W: Write>(out: W, runs: &[BlockRun]) -> Result<W> {
    let mut w = Writer::new_with_indent(out, b' ', 2);
    w.write_event(Event::Start(BytesStart::new("blocks")))?;
    for r in runs {
        if r.len() == 1 {
            let mut e = BytesStart::new("block");
            e.push_attribute(("block", r.begin.to_string().as_str()));
            w.write_event(Event::Empty(e))?;
        } else {
            let mut e = BytesStart::new("range");
            e.push_attribute(("begin", r.begin.to_string().as_str()));
            e.push_attribute(("end", r.end.to_string().as_str()));
            w.write_event(Event::Empty(e))?;
        }
    }
    w.write_event(Event::End(BytesEnd::new("blocks")))?;
    let mut out = w.into_inner();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(out)
}

/// Прочитать список блоков обратно (по порядку документа).
pub fn parse_blocks_xml(doc: &str) -> Result<Vec<BlockRun>> {
    let mut reader = Reader::from_str(doc);
    reader.trim_text(true);
    let mut runs = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"blocks" => {}
                b"block" => {
                    let b = required_u32(&e, "block")?;
                    runs.push(BlockRun {
                        begin: b,
                        end: b.saturating_add(1),
                    });
                }
                b"range" => {
                    let begin = required_u32(&e, "begin")?;
                    let end = required_u32(&e, "end")?;
                    if end <= begin {
                        return Err(EraError::MalformedDescription(format!(
                            "empty range [{}, {})",
                            begin, end
                        ))
                        .into());
                    }
                    runs.push(BlockRun { begin, end });
                }
                _ => {
                    return Err(EraError::MalformedDescription(format!(
                        "unknown element <{}>",
                        element_name(&e)
                    ))
                    .into())
                }
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(EraError::MalformedDescription(e.to_string()).into()),
        }
    }
    Ok(runs)
}
