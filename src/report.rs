//! report — диагностический вывод проверок.
//!
//! - NestedOutput<W>: построчный вывод с отступами (вложенность секций отчёта).
//! - Severity: NoError < NonFatal < Fatal, комбинируется максимумом.
//!
//! Вывод идёт в явно переданный sink (stderr у CLI), а не в логгер.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    NoError,
    NonFatal,
    Fatal,
}

impl Severity {
    #[inline]
    pub fn combine(self, other: Severity) -> Severity {
        self.max(other)
    }

    #[inline]
    pub fn raise(&mut self, other: Severity) {
        *self = self.combine(other);
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::NoError => "no error",
            Severity::NonFatal => "non-fatal",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

pub struct NestedOutput<W: Write> {
    out: W,
    indent: usize,
    quiet: bool,
}

impl<W: Write> NestedOutput<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indent: 0,
            quiet: false,
        }
    }

    /// Ничего не печатать (check -q); вызовы остаются валидными.
    pub fn quiet(mut self, on: bool) -> Self {
        self.quiet = on;
        self
    }

    pub fn line(&mut self, msg: impl fmt::Display) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(self.out, "{:width$}{}", "", msg, width = self.indent * 2)?;
        Ok(())
    }

    /// Выполнить `f` на уровень глубже.
    pub fn with_nest<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.indent += 1;
        let r = f(self);
        self.indent -= 1;
        r
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_indents_lines() {
        let mut out = NestedOutput::new(Vec::new());
        out.line("examining writesets").unwrap();
        out.with_nest(|o| o.line("missing eras [3, 5)")).unwrap();
        out.line("done").unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(text, "examining writesets\n  missing eras [3, 5)\ndone\n");
    }

    #[test]
    fn severity_combines_by_max() {
        let mut s = Severity::NoError;
        s.raise(Severity::Fatal);
        s.raise(Severity::NonFatal);
        assert_eq!(s, Severity::Fatal);
        assert!(Severity::NoError < Severity::NonFatal);
    }
}
