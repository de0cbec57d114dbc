//! writeset/damage — описание повреждений и политики их обработки.
//!
//! Политика — это значение, реализующее DamageHandler:
//! - ReportingDamage пишет отчёт в NestedOutput и поднимает Severity, обход продолжается;
//! - FatalDamage прерывает обход ошибкой EraError::MetadataDamaged;
//! - любое замыкание FnMut(&Damage) -> Result<()> тоже годится.

use anyhow::Result;
use std::fmt;
use std::io::Write;

use crate::error::EraError;
use crate::report::{NestedOutput, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Damage {
    /// Узлы дерева writeset'ов, покрывающие эры [begin, end), не читаются.
    MissingEras { begin: u32, end: u32, desc: String },
    /// Биты [begin, end) writeset'а эры `era` не читаются.
    DamagedWriteset {
        era: u32,
        begin: u32,
        end: u32,
        desc: String,
    },
    /// Записи era array для блоков [begin, end) не читаются.
    MissingEraArrayEntries { begin: u64, end: u64, desc: String },
}

impl Damage {
    pub fn desc(&self) -> &str {
        match self {
            Damage::MissingEras { desc, .. }
            | Damage::DamagedWriteset { desc, .. }
            | Damage::MissingEraArrayEntries { desc, .. } => desc,
        }
    }

    /// Любое структурное повреждение фатально для результата.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for Damage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Damage::MissingEras { begin, end, .. } => {
                write!(f, "missing eras [{}, {}) from writeset tree", begin, end)
            }
            Damage::DamagedWriteset {
                era, begin, end, ..
            } => write!(f, "damaged writeset for era {}: bits [{}, {})", era, begin, end),
            Damage::MissingEraArrayEntries { begin, end, .. } => {
                write!(f, "missing era array entries [{}, {})", begin, end)
            }
        }
    }
}

pub trait DamageHandler {
    fn damage(&mut self, d: &Damage) -> Result<()>;
}

impl<F> DamageHandler for F
where
    F: FnMut(&Damage) -> Result<()>,
{
    fn damage(&mut self, d: &Damage) -> Result<()> {
        self(d)
    }
}

/// Репортит повреждения и копит Severity; обход не прерывает.
pub struct ReportingDamage<'a, W: Write> {
    out: &'a mut NestedOutput<W>,
    severity: &'a mut Severity,
}

impl<'a, W: Write> ReportingDamage<'a, W> {
    pub fn new(out: &'a mut NestedOutput<W>, severity: &'a mut Severity) -> Self {
        Self { out, severity }
    }
}

impl<'a, W: Write> DamageHandler for ReportingDamage<'a, W> {
    fn damage(&mut self, d: &Damage) -> Result<()> {
        match d {
            Damage::MissingEras { begin, end, desc } => {
                self.out.line("missing eras from writeset tree")?;
                self.out.with_nest(|o| {
                    o.line(desc)?;
                    o.line(format!("Effected eras: [{}, {})", begin, end))
                })?;
            }
            Damage::DamagedWriteset {
                era,
                begin,
                end,
                desc,
            } => {
                self.out.line("damaged writeset")?;
                self.out.with_nest(|o| {
                    o.line(desc)?;
                    o.line(format!("Era: {}", era))?;
                    o.line(format!("Missing bits: [{}, {})", begin, end))
                })?;
            }
            Damage::MissingEraArrayEntries { begin, end, desc } => {
                self.out.line("missing era array entries")?;
                self.out.with_nest(|o| {
                    o.line(desc)?;
                    o.line(format!("Effected blocks: [{}, {})", begin, end))
                })?;
            }
        }
        self.severity.raise(d.severity());
        Ok(())
    }
}

/// Первое же повреждение прерывает обход.
#[derive(Debug, Default, Clone, Copy)]
pub struct FatalDamage;

impl DamageHandler for FatalDamage {
    fn damage(&mut self, d: &Damage) -> Result<()> {
        log::debug!("fatal damage: {}", d);
        Err(EraError::MetadataDamaged.into())
    }
}
