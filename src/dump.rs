//! dump — обратная к restore операция: метаданные → описание.
//!
//! Порядок событий: superblock → writeset'ы (по возрастанию эр, только
//! установленные биты) → era array (только писавшиеся блоки).
//! Dump обязан быть точным, поэтому любое повреждение — ошибка (fatal-политика).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::consts::STDOUT_PATH;
use crate::metadata::{Metadata, MetadataMode};
use crate::store::{BlockStore, OpenMode};
use crate::writeset::{FatalDamage, WritesetVisitor};
use crate::xml::{MetadataVisitor, SuperblockInfo, XmlWriter};

/// Переходник: события обхода writeset'ов → MetadataVisitor.
struct Writesets<'a, V: MetadataVisitor + ?Sized>(&'a mut V);

impl<'a, V: MetadataVisitor + ?Sized> WritesetVisitor for Writesets<'a, V> {
    fn writeset_begin(&mut self, era: u32, nr_bits: u32) -> Result<()> {
        self.0.writeset_begin(era, nr_bits)
    }

    fn bit(&mut self, index: u32, value: bool) -> Result<()> {
        self.0.writeset_bit(index, value)
    }

    fn writeset_end(&mut self) -> Result<()> {
        self.0.writeset_end()
    }
}

pub fn dump<V: MetadataVisitor + ?Sized>(md: &Metadata, visitor: &mut V) -> Result<()> {
    visitor.superblock_begin(&SuperblockInfo {
        block_size: md.data_block_size(),
        nr_blocks: md.nr_blocks(),
        current_era: md.current_era(),
    })?;

    md.walk_writesets(&mut Writesets(&mut *visitor), &mut FatalDamage)?;

    let ea = md.era_array()?;
    visitor.era_array_begin()?;
    ea.for_each(md.tm(), |block, era| match era {
        Some(e) => visitor.era(block as u32, e),
        None => Ok(()),
    })?;
    visitor.era_array_end()?;

    visitor.superblock_end()?;
    visitor.eof()
}

#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub input: PathBuf,
    pub output: String,
    pub metadata_snapshot: bool,
}

/// Открыть store, снять dump в XML и записать его в файл или stdout.
pub fn dump_to(opts: &DumpOptions) -> Result<()> {
    let mode = if opts.metadata_snapshot {
        OpenMode::ReadOnlyShared
    } else {
        OpenMode::ReadOnlyExclusive
    };
    let store = BlockStore::open(&opts.input, mode)?;
    let md = if opts.metadata_snapshot {
        Metadata::open_snapshot(store)?
    } else {
        Metadata::open(store, MetadataMode::Open)?
    };

    if opts.output == STDOUT_PATH {
        let stdout = std::io::stdout();
        let mut w = XmlWriter::new(BufWriter::new(stdout.lock()));
        dump(&md, &mut w)?;
        w.into_inner().flush()?;
    } else {
        // документ собирается в памяти; при ошибке файл не создаётся
        let mut w = XmlWriter::new(Vec::new());
        dump(&md, &mut w)?;
        let mut f = File::create(&opts.output)
            .with_context(|| format!("create output {}", opts.output))?;
        f.write_all(&w.into_inner())?;
        f.sync_all()?;
    }
    Ok(())
}
