//! xml — текстовое описание метаданных era (формат restore/dump).
//!
//! ```text
//! <superblock block_size="128" nr_blocks="N" current_era="E">
//!   <writeset era="1" nr_bits="N">
//!     <bit block="3" value="true"/>
//!   </writeset>
//!   <era_array>
//!     <era block="3" era="5"/>
//!   </era_array>
//! </superblock>
//! ```
//!
//! - parse.rs  — потоковый разбор (quick-xml) в вызовы MetadataVisitor;
//! - writer.rs — XmlWriter: MetadataVisitor, который пишет этот формат.

use anyhow::Result;
use quick_xml::events::BytesStart;

use crate::error::EraError;

pub mod parse;
pub mod writer;

pub use parse::parse_xml;
pub use writer::XmlWriter;

/// Атрибуты `<superblock>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperblockInfo {
    /// Размер блока данных в секторах.
    pub block_size: u32,
    pub nr_blocks: u32,
    pub current_era: u32,
}

/// Получатель событий описания (в порядке документа).
pub trait MetadataVisitor {
    fn superblock_begin(&mut self, sb: &SuperblockInfo) -> Result<()>;
    fn superblock_end(&mut self) -> Result<()>;

    fn writeset_begin(&mut self, era: u32, nr_bits: u32) -> Result<()>;
    fn writeset_bit(&mut self, block: u32, value: bool) -> Result<()>;
    fn writeset_end(&mut self) -> Result<()>;

    fn era_array_begin(&mut self) -> Result<()>;
    fn era(&mut self, block: u32, era: u32) -> Result<()>;
    fn era_array_end(&mut self) -> Result<()>;

    /// Документ закончился.
    fn eof(&mut self) -> Result<()> {
        Ok(())
    }
}

fn malformed(msg: String) -> anyhow::Error {
    EraError::MalformedDescription(msg).into()
}

pub(crate) fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Значение атрибута (None — атрибута нет).
pub(crate) fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| malformed(format!("<{}>: {}", element_name(e), err)))?;
        if a.key.as_ref() == name.as_bytes() {
            let v = a
                .unescape_value()
                .map_err(|err| malformed(format!("<{}>: {}", element_name(e), err)))?;
            return Ok(Some(v.into_owned()));
        }
    }
    Ok(None)
}

pub(crate) fn required_attr(e: &BytesStart, name: &str) -> Result<String> {
    attr(e, name)?.ok_or_else(|| {
        malformed(format!(
            "<{}> is missing attribute '{}'",
            element_name(e),
            name
        ))
    })
}

pub(crate) fn required_u32(e: &BytesStart, name: &str) -> Result<u32> {
    let v = required_attr(e, name)?;
    v.trim().parse::<u32>().map_err(|_| {
        malformed(format!(
            "<{}>: attribute '{}' is not a u32: '{}'",
            element_name(e),
            name,
            v
        ))
    })
}

pub(crate) fn required_bool(e: &BytesStart, name: &str) -> Result<bool> {
    let v = required_attr(e, name)?;
    match v.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(malformed(format!(
            "<{}>: attribute '{}' is not a bool: '{}'",
            element_name(e),
            name,
            other
        ))),
    }
}
