//! restore/emitter — RestoreEmitter: визитор описания, который строит
//! Metadata (Create) по ходу чтения.
//!
//! Память ограничена тем, что реально есть в описании, а не nr_blocks/nr_bits:
//! - битмапа writeset'а копится как ненулевые слова и пишется на `</writeset>`;
//!   дальше держим только (era, nr_bits, root);
//! - era array копится разреженно и строится на `</superblock>`.
//!
//! Любое нарушение структуры → EraError::MalformedDescription.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::consts::NEVER_WRITTEN;
use crate::error::EraError;
use crate::metadata::Metadata;
use crate::writeset::WritesetValue;
use crate::xml::{MetadataVisitor, SuperblockInfo};

fn malformed(msg: impl Into<String>) -> anyhow::Error {
    EraError::MalformedDescription(msg.into()).into()
}

/// Открытый `<writeset>`: ненулевые слова битмапы.
struct PendingWriteset {
    era: u32,
    nr_bits: u32,
    words: BTreeMap<u64, u64>,
}

pub struct RestoreEmitter<'a> {
    md: &'a mut Metadata,
    sb: Option<SuperblockInfo>,
    sb_done: bool,
    writeset: Option<PendingWriteset>,
    in_era_array: bool,
    writesets: BTreeMap<u32, WritesetValue>,
    eras: BTreeMap<u32, u32>,
}

impl<'a> RestoreEmitter<'a> {
    pub fn new(md: &'a mut Metadata) -> Self {
        Self {
            md,
            sb: None,
            sb_done: false,
            writeset: None,
            in_era_array: false,
            writesets: BTreeMap::new(),
            eras: BTreeMap::new(),
        }
    }

    fn open_superblock(&self, what: &str) -> Result<SuperblockInfo> {
        match self.sb {
            Some(sb) if !self.sb_done => Ok(sb),
            _ => Err(malformed(format!("<{}> outside <superblock>", what))),
        }
    }

    fn at_top_level(&self, what: &str) -> Result<SuperblockInfo> {
        let sb = self.open_superblock(what)?;
        if self.writeset.is_some() {
            return Err(malformed(format!("<{}> inside <writeset>", what)));
        }
        if self.in_era_array {
            return Err(malformed(format!("<{}> inside <era_array>", what)));
        }
        Ok(sb)
    }
}

impl<'a> MetadataVisitor for RestoreEmitter<'a> {
    fn superblock_begin(&mut self, sb: &SuperblockInfo) -> Result<()> {
        if self.sb.is_some() {
            return Err(malformed("more than one <superblock>"));
        }
        self.md
            .begin_superblock(sb.nr_blocks, sb.current_era, sb.block_size)?;
        self.sb = Some(*sb);
        Ok(())
    }

    fn superblock_end(&mut self) -> Result<()> {
        self.at_top_level("/superblock")?;
        let writesets: Vec<(u32, WritesetValue)> =
            self.writesets.iter().map(|(e, v)| (*e, *v)).collect();
        self.md.set_writeset_values(&writesets)?;
        let eras = std::mem::take(&mut self.eras);
        let nr_eras = eras.len();
        self.md.set_era_entries(eras)?;
        self.sb_done = true;
        log::debug!(
            "restore: {} writesets, {} era entries",
            writesets.len(),
            nr_eras
        );
        Ok(())
    }

    fn writeset_begin(&mut self, era: u32, nr_bits: u32) -> Result<()> {
        self.at_top_level("writeset")?;
        if self.writesets.contains_key(&era) {
            return Err(malformed(format!("duplicate writeset for era {}", era)));
        }
        self.writeset = Some(PendingWriteset {
            era,
            nr_bits,
            words: BTreeMap::new(),
        });
        Ok(())
    }

    fn writeset_bit(&mut self, block: u32, value: bool) -> Result<()> {
        let ws = self
            .writeset
            .as_mut()
            .ok_or_else(|| malformed("<bit> outside <writeset>"))?;
        if block >= ws.nr_bits {
            return Err(malformed(format!(
                "bit {} out of range for writeset era {} (nr_bits {})",
                block, ws.era, ws.nr_bits
            )));
        }
        let mask = 1u64 << (block % 64);
        let key = (block / 64) as u64;
        if value {
            *ws.words.entry(key).or_insert(0) |= mask;
        } else if let Some(word) = ws.words.get_mut(&key) {
            *word &= !mask;
        }
        Ok(())
    }

    fn writeset_end(&mut self) -> Result<()> {
        let ws = self
            .writeset
            .take()
            .ok_or_else(|| malformed("</writeset> without <writeset>"))?;
        let bitset_root = self.md.write_bitset(ws.nr_bits, ws.words)?;
        self.writesets.insert(
            ws.era,
            WritesetValue {
                nr_bits: ws.nr_bits,
                bitset_root,
            },
        );
        Ok(())
    }

    fn era_array_begin(&mut self) -> Result<()> {
        self.at_top_level("era_array")?;
        self.in_era_array = true;
        Ok(())
    }

    fn era(&mut self, block: u32, era: u32) -> Result<()> {
        if !self.in_era_array {
            return Err(malformed("<era> outside <era_array>"));
        }
        let sb = self.open_superblock("era")?;
        if block >= sb.nr_blocks {
            return Err(malformed(format!(
                "era entry for block {} (nr_blocks {})",
                block, sb.nr_blocks
            )));
        }
        if era == NEVER_WRITTEN {
            return Err(malformed(format!(
                "era {} for block {} is reserved",
                era, block
            )));
        }
        self.eras.insert(block, era);
        Ok(())
    }

    fn era_array_end(&mut self) -> Result<()> {
        if !self.in_era_array {
            return Err(malformed("</era_array> without <era_array>"));
        }
        self.in_era_array = false;
        Ok(())
    }

    fn eof(&mut self) -> Result<()> {
        match (self.sb.is_some(), self.sb_done) {
            (false, _) => Err(malformed("no <superblock> in description")),
            (true, false) => Err(malformed("description ends before </superblock>")),
            _ => Ok(()),
        }
    }
}
