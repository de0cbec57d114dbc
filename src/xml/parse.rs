//! xml/parse — потоковый разбор описания.
//!
//! Парсер только переводит элементы в вызовы визитора; структурные правила
//! (вложенность, диапазоны, повторы) проверяет сам визитор.

use anyhow::{Context, Result};
use log::info;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{
    element_name, malformed, required_bool, required_u32, MetadataVisitor, SuperblockInfo,
};

/// Разобрать файл описания. Прогресс (`info!`) каждые `progress_every` элементов,
/// если не `quiet` и `progress_every > 0`.
pub fn parse_xml<V: MetadataVisitor + ?Sized>(
    path: &Path,
    visitor: &mut V,
    quiet: bool,
    progress_every: u64,
) -> Result<()> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let every = if quiet { 0 } else { progress_every };
    parse_reader(BufReader::new(f), visitor, every)
        .with_context(|| format!("parse {}", path.display()))
}

/// Разобрать описание из любого BufRead.
pub fn parse_reader<R: BufRead, V: MetadataVisitor + ?Sized>(
    input: R,
    visitor: &mut V,
    progress_every: u64,
) -> Result<()> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut events = 0u64;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => start(&e, visitor, false)?,
            Ok(Event::Empty(e)) => start(&e, visitor, true)?,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"superblock" => visitor.superblock_end()?,
                b"writeset" => visitor.writeset_end()?,
                b"era_array" => visitor.era_array_end()?,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| {
                    malformed(format!(
                        "bad text at byte {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                })?;
                if !text.trim().is_empty() {
                    return Err(malformed(format!(
                        "unexpected text at byte {}: '{}'",
                        reader.buffer_position(),
                        text.trim()
                    )));
                }
            }
            Ok(Event::Eof) => break,
            // декларация, комментарии, PI, DOCTYPE
            Ok(_) => {}
            Err(e) => {
                return Err(malformed(format!(
                    "xml error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
        buf.clear();

        events += 1;
        if progress_every > 0 && events % progress_every == 0 {
            info!("restore: {} elements parsed", events);
        }
    }
    visitor.eof()
}

fn start<V: MetadataVisitor + ?Sized>(e: &BytesStart, visitor: &mut V, empty: bool) -> Result<()> {
    match e.name().as_ref() {
        b"superblock" => {
            let sb = SuperblockInfo {
                block_size: required_u32(e, "block_size")?,
                nr_blocks: required_u32(e, "nr_blocks")?,
                current_era: required_u32(e, "current_era")?,
            };
            visitor.superblock_begin(&sb)?;
            if empty {
                visitor.superblock_end()?;
            }
        }
        b"writeset" => {
            visitor.writeset_begin(required_u32(e, "era")?, required_u32(e, "nr_bits")?)?;
            if empty {
                visitor.writeset_end()?;
            }
        }
        b"bit" => visitor.writeset_bit(required_u32(e, "block")?, required_bool(e, "value")?)?,
        b"era_array" => {
            visitor.era_array_begin()?;
            if empty {
                visitor.era_array_end()?;
            }
        }
        b"era" => visitor.era(required_u32(e, "block")?, required_u32(e, "era")?)?,
        _ => {
            return Err(malformed(format!(
                "unknown element <{}>",
                element_name(e)
            )))
        }
    }
    Ok(())
}
