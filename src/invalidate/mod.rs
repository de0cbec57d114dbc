//! invalidate — какие блоки писались, начиная с эры T.
//!
//! Результат = объединение:
//! - блоков, чья эра в era array >= T (NEVER_WRITTEN не считается);
//! - установленных битов writeset'ов с эрой >= T.
//!
//! Era array держит только последнюю запись блока, а writeset'ы ещё не
//! свёрнутых эр — записи, которые в era array пока не попали; поэтому нужны оба.
//!
//! Подмодули:
//! - runs.rs — сжатие в отрезки;
//! - emit.rs — XML-список блоков.

use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::consts::STDOUT_PATH;
use crate::metadata::{Metadata, MetadataMode};
use crate::report::{NestedOutput, Severity};
use crate::store::{BlockStore, OpenMode};
use crate::writeset::{DamageHandler, FatalDamage, ReportingDamage, WritesetVisitor};

pub mod emit;
pub mod runs;

pub use emit::{emit_blocks, parse_blocks_xml};
pub use runs::{decode_runs, encode_runs, runs, BlockRun};

/// Визитор writeset'ов: собирает биты эр >= threshold.
struct MarkedSince<'a> {
    threshold: u32,
    current: u32,
    blocks: &'a mut BTreeSet<u32>,
}

impl<'a> WritesetVisitor for MarkedSince<'a> {
    fn writeset_begin(&mut self, era: u32, _nr_bits: u32) -> Result<()> {
        self.current = era;
        Ok(())
    }

    fn bit(&mut self, index: u32, value: bool) -> Result<()> {
        if value && self.current >= self.threshold {
            self.blocks.insert(index);
        }
        Ok(())
    }

    fn writeset_end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Блоки, записанные в эрах >= `threshold`. Повреждения дерева writeset'ов уходят в `handler`.
pub fn blocks_written_since<H>(
    md: &Metadata,
    threshold: u32,
    handler: &mut H,
) -> Result<BTreeSet<u32>>
where
    H: DamageHandler + ?Sized,
{
    let mut blocks = BTreeSet::new();

    let ea = md.era_array().context("open era array")?;
    ea.for_each(md.tm(), |block, era| {
        if let Some(e) = era {
            if e >= threshold {
                blocks.insert(block as u32);
            }
        }
        Ok(())
    })
    .context("walk era array")?;

    let mut v = MarkedSince {
        threshold,
        current: 0,
        blocks: &mut blocks,
    };
    md.walk_writesets(&mut v, handler)?;
    Ok(blocks)
}

/// То же с reporting-политикой: отчёт о повреждениях в `out`, результат best-effort.
pub fn blocks_written_since_reporting<W: Write>(
    md: &Metadata,
    threshold: u32,
    out: &mut NestedOutput<W>,
) -> Result<(BTreeSet<u32>, Severity)> {
    let mut severity = Severity::NoError;
    let blocks = {
        let mut h = ReportingDamage::new(out, &mut severity);
        blocks_written_since(md, threshold, &mut h)?
    };
    Ok((blocks, severity))
}

#[derive(Debug, Clone)]
pub struct InvalidateOptions {
    pub input: PathBuf,
    /// Путь вывода; "-" — stdout.
    pub output: String,
    pub written_since: u32,
    pub metadata_snapshot: bool,
    /// Fatal-политика: при повреждении ничего не выводить и вернуть ошибку.
    /// По умолчанию выключена; CLI берёт её из EraConfig::strict_invalidate.
    pub strict: bool,
}

impl InvalidateOptions {
    pub fn new(input: impl Into<PathBuf>, written_since: u32) -> Self {
        Self {
            input: input.into(),
            output: STDOUT_PATH.to_string(),
            written_since,
            metadata_snapshot: false,
            strict: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvalidateOutcome {
    pub blocks: usize,
    pub runs: usize,
    pub severity: Severity,
}

/// Полный проход команды invalidate: открыть, посчитать, выписать список.
pub fn invalidate<W: Write>(
    opts: &InvalidateOptions,
    diag: &mut NestedOutput<W>,
) -> Result<InvalidateOutcome> {
    // снапшот заморожен — живой писатель не мешает, блокировка разделяемая
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

    let (blocks, severity) = if opts.strict {
        let blocks = blocks_written_since(&md, opts.written_since, &mut FatalDamage)?;
        (blocks, Severity::NoError)
    } else {
        blocks_written_since_reporting(&md, opts.written_since, diag)?
    };
    if severity != Severity::NoError {
        warn!(
            "metadata is damaged ({}); block list may be incomplete",
            severity
        );
    }

    let runs = encode_runs(&blocks);
    if opts.output == STDOUT_PATH {
        let stdout = std::io::stdout();
        let mut out = emit_blocks(stdout.lock(), &runs)?;
        out.flush()?;
    } else {
        let f = File::create(&opts.output)
            .with_context(|| format!("create output {}", opts.output))?;
        let mut w = emit_blocks(BufWriter::new(f), &runs)?;
        w.flush()?;
    }
    info!(
        "invalidate: {} blocks in {} runs written since era {}",
        blocks.len(),
        runs.len(),
        opts.written_since
    );

    Ok(InvalidateOutcome {
        blocks: blocks.len(),
        runs: runs.len(),
        severity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_reporting_policy() {
        let opts = InvalidateOptions::new("/dev/null", 3);
        assert!(!opts.strict);
        assert!(!opts.metadata_snapshot);
        assert_eq!(opts.output, STDOUT_PATH);
        assert_eq!(opts.written_since, 3);
    }
}
