//! writeset/walk — обход дерева writeset'ов с визитором и политикой повреждений.
//!
//! Для каждого читаемого writeset'а (эры строго по возрастанию):
//! writeset_begin(era, nr_bits) → bit(i, true) для каждого установленного бита → writeset_end().
//! Повреждения уходят в DamageHandler; если он вернул Err — обход прерывается.

use anyhow::Result;
use std::cell::RefCell;

use super::damage::{Damage, DamageHandler};
use super::WritesetValue;
use crate::bitset;
use crate::btree;
use crate::store::TransactionManager;

pub trait WritesetVisitor {
    fn writeset_begin(&mut self, era: u32, nr_bits: u32) -> Result<()>;
    fn bit(&mut self, index: u32, value: bool) -> Result<()>;
    fn writeset_end(&mut self) -> Result<()>;
}

/// Обойти дерево writeset'ов.
///
/// Диапазон эр без верхней границы (повреждён правый край дерева)
/// обрезается до max(current_era + 1, begin + 1).
pub fn walk_writeset_tree<V, H>(
    tm: &TransactionManager,
    root: u64,
    current_era: u32,
    visitor: &mut V,
    handler: &mut H,
) -> Result<()>
where
    V: WritesetVisitor + ?Sized,
    H: DamageHandler + ?Sized,
{
    // оба замыкания обхода репортят в один handler
    let handler = RefCell::new(handler);

    btree::walk::<WritesetValue, _, _>(
        tm,
        root,
        |era, ws| {
            visitor.writeset_begin(era, ws.nr_bits)?;
            bitset::walk(
                tm,
                ws.bitset_root,
                ws.nr_bits,
                |i| visitor.bit(i, true),
                |bits, why| {
                    (**handler.borrow_mut()).damage(&Damage::DamagedWriteset {
                        era,
                        begin: bits.start,
                        end: bits.end,
                        desc: why.to_string(),
                    })
                },
            )?;
            visitor.writeset_end()
        },
        |range, why| {
            let end = range
                .end
                .unwrap_or_else(|| current_era.saturating_add(1).max(range.begin.saturating_add(1)));
            (**handler.borrow_mut()).damage(&Damage::MissingEras {
                begin: range.begin,
                end,
                desc: why.to_string(),
            })
        },
    )
}
