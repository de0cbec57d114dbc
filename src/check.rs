//! check — диагностический проход по метаданным (read-only).
//!
//! Семантика:
//! - суперблок: magic/CRC/версия/размер блока; нулевой суперблок — отдельный диагноз;
//! - era array: damage-tolerant обход, нечитаемые диапазоны блоков; эры
//!   "из будущего" (> current_era) — non-fatal;
//! - дерево writeset'ов: damage-tolerant обход с reporting-политикой.
//!
//! Вывод:
//! - текстовый отчёт — в NestedOutput (stderr у CLI);
//! - CheckReport сериализуется в JSON для `--json`.
//!
//! Итог: severity; CLI завершается с кодом 1, если она не NoError.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::metadata::{Metadata, MetadataMode};
use crate::report::{NestedOutput, Severity};
use crate::store::{BlockStore, OpenMode};
use crate::writeset::{Damage, DamageHandler, ReportingDamage, WritesetVisitor};

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub input: PathBuf,
    pub super_block_only: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub path: String,
    pub superblock_ok: bool,
    pub nr_blocks: u32,
    pub current_era: u32,
    pub metadata_snap: Option<u64>,
    pub written_blocks: u64,
    pub writesets: u64,
    pub writeset_bits: u64,
    pub damage: Vec<String>,
    pub severity: Severity,
}

#[derive(Default)]
struct WritesetStats {
    writesets: u64,
    bits: u64,
}

impl WritesetVisitor for WritesetStats {
    fn writeset_begin(&mut self, _era: u32, _nr_bits: u32) -> Result<()> {
        self.writesets += 1;
        Ok(())
    }

    fn bit(&mut self, _index: u32, _value: bool) -> Result<()> {
        self.bits += 1;
        Ok(())
    }

    fn writeset_end(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn check<W: Write>(opts: &CheckOptions, out: &mut NestedOutput<W>) -> Result<CheckReport> {
    let mut report = CheckReport {
        path: opts.input.display().to_string(),
        ..CheckReport::default()
    };

    let store = BlockStore::open(&opts.input, OpenMode::ReadOnlyExclusive)?;

    out.line("examining superblock")?;
    let sb = match store.read_superblock() {
        Ok(sb) => sb,
        Err(e) => {
            out.with_nest(|o| o.line(format!("superblock is corrupt: {:#}", e)))?;
            report.damage.push(format!("superblock: {:#}", e));
            report.severity = Severity::Fatal;
            return Ok(report);
        }
    };
    report.superblock_ok = true;
    report.nr_blocks = sb.nr_blocks;
    report.current_era = sb.current_era;
    report.metadata_snap = sb.metadata_snap();
    if opts.super_block_only {
        return Ok(report);
    }

    let md = Metadata::open(store, MetadataMode::Open)?;
    let mut severity = Severity::NoError;

    out.line("examining era array")?;
    let mut ahead = Vec::new();
    let mut written = 0u64;
    out.with_nest(|o| {
        let mut damage = Vec::new();
        let result = {
            let mut rep = ReportingDamage::new(o, &mut severity);
            match md.era_array() {
                Ok(ea) => ea.walk(
                    md.tm(),
                    |block, era| {
                        if let Some(e) = era {
                            written += 1;
                            if e > md.current_era() {
                                ahead.push((block, e));
                            }
                        }
                        Ok(())
                    },
                    |r, why| {
                        let d = Damage::MissingEraArrayEntries {
                            begin: r.start,
                            end: r.end,
                            desc: why.to_string(),
                        };
                        damage.push(d.to_string());
                        rep.damage(&d)
                    },
                ),
                Err(e) => {
                    let d = Damage::MissingEraArrayEntries {
                        begin: 0,
                        end: md.nr_blocks() as u64,
                        desc: format!("{:#}", e),
                    };
                    damage.push(d.to_string());
                    rep.damage(&d)
                }
            }
        };
        report.damage.extend(damage);
        result?;
        for (block, era) in &ahead {
            o.line(format!(
                "block {} has era {} ahead of current era {}",
                block,
                era,
                md.current_era()
            ))?;
        }
        Ok(())
    })?;
    if !ahead.is_empty() {
        severity.raise(Severity::NonFatal);
        report
            .damage
            .extend(ahead.iter().map(|(b, e)| format!("block {}: era {} ahead of current era", b, e)));
    }
    report.written_blocks = written;

    out.line("examining writeset tree")?;
    let mut stats = WritesetStats::default();
    out.with_nest(|o| {
        let mut damage = Vec::new();
        let result = {
            let mut rep = ReportingDamage::new(o, &mut severity);
            let mut h = |d: &Damage| -> Result<()> {
                damage.push(d.to_string());
                rep.damage(d)
            };
            md.walk_writesets(&mut stats, &mut h)
        };
        report.damage.extend(damage);
        result
    })?;
    report.writesets = stats.writesets;
    report.writeset_bits = stats.bits;

    report.severity = severity;
    log::debug!(
        "check {}: severity={} damage={}",
        report.path,
        report.severity,
        report.damage.len()
    );
    Ok(report)
}
