//! writeset — дерево writeset'ов: era → WritesetValue { nr_bits, bitset root }.
//!
//! По одному writeset'у на закрытую эру; бит i установлен, если блок i писался
//! в этой эре. Подмодули:
//! - damage.rs — Damage, DamageHandler и две политики (reporting/fatal);
//! - walk.rs   — damage-tolerant обход с визитором.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::bitset;
use crate::btree::{self, BtreeValue};
use crate::store::TransactionManager;

pub mod damage;
pub mod walk;

pub use damage::{Damage, DamageHandler, FatalDamage, ReportingDamage};
pub use walk::{walk_writeset_tree, WritesetVisitor};

/// Значение листа дерева writeset'ов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritesetValue {
    pub nr_bits: u32,
    pub bitset_root: u64,
}

impl BtreeValue for WritesetValue {
    const SIZE: usize = 12;

    fn unpack(b: &[u8]) -> Self {
        Self {
            nr_bits: LittleEndian::read_u32(&b[0..4]),
            bitset_root: LittleEndian::read_u64(&b[4..12]),
        }
    }

    fn pack(&self, b: &mut [u8]) {
        LittleEndian::write_u32(&mut b[0..4], self.nr_bits);
        LittleEndian::write_u64(&mut b[4..12], self.bitset_root);
    }
}

/// Один writeset для записи: эра, число битов и слова битмапы.
#[derive(Debug, Clone)]
pub struct WritesetSpec {
    pub era: u32,
    pub nr_bits: u32,
    pub words: Vec<u64>,
}

/// Построить дерево из writeset'ов (эры строго по возрастанию). Возвращает корень.
pub fn build_writeset_tree(
    tm: &mut TransactionManager,
    writesets: &[WritesetSpec],
    max_entries: Option<u32>,
) -> Result<u64> {
    let mut entries = Vec::with_capacity(writesets.len());
    for ws in writesets {
        if ws.words.len() != bitset::words_for(ws.nr_bits) {
            return Err(anyhow!(
                "writeset era {}: {} words for {} bits",
                ws.era,
                ws.words.len(),
                ws.nr_bits
            ));
        }
        let root = bitset::build(tm, &ws.words)?;
        entries.push((
            ws.era,
            WritesetValue {
                nr_bits: ws.nr_bits,
                bitset_root: root,
            },
        ));
    }
    build_writeset_index(tm, &entries, max_entries)
}

/// Дерево поверх уже записанных битмап: (era, value) строго по возрастанию эры.
pub fn build_writeset_index(
    tm: &mut TransactionManager,
    entries: &[(u32, WritesetValue)],
    max_entries: Option<u32>,
) -> Result<u64> {
    btree::build(tm, entries, max_entries)
}

/// Writeset конкретной эры, если он есть.
pub fn lookup_writeset(
    tm: &TransactionManager,
    root: u64,
    era: u32,
) -> Result<Option<WritesetValue>> {
    btree::lookup(tm, root, era)
}
