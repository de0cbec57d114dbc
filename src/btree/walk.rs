//! btree/walk — lookup и in-order обход.
//!
//! Обход damage-tolerant: каждый узел посещается с диапазоном ключей
//! [begin, end), который он обязан покрывать. Если узел не читается, не
//! проходит проверку или его ключи вылезают за диапазон — весь диапазон
//! уходит в `damage`, поддерево пропускается, обход идёт дальше.

use anyhow::Result;
use std::fmt;

use super::{read_node, BtreeValue, NodeBody};
use crate::store::TransactionManager;

/// Диапазон ключей [begin, end); `end == None` — без верхней границы.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub begin: u32,
    pub end: Option<u32>,
}

impl KeyRange {
    #[inline]
    fn contains(&self, k: u32) -> bool {
        k >= self.begin && self.end.map_or(true, |e| k < e)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(e) => write!(f, "[{}, {})", self.begin, e),
            None => write!(f, "[{}, ..)", self.begin),
        }
    }
}

/// Найти значение по ключу.
pub fn lookup<V: BtreeValue>(tm: &TransactionManager, root: u64, key: u32) -> Result<Option<V>> {
    let mut block = root;
    let mut level = None;
    loop {
        let node = read_node::<V>(tm, block, level)?;
        match node.body {
            NodeBody::Leaf(values) => {
                return Ok(node.keys.binary_search(&key).ok().map(|i| values[i]));
            }
            NodeBody::Internal(children) => {
                // последний ребёнок с keys[i] <= key
                let i = match node.keys.partition_point(|k| *k <= key) {
                    0 => return Ok(None),
                    n => n - 1,
                };
                block = children[i];
                level = Some(node.level - 1);
            }
        }
    }
}

/// In-order обход всех пар (по возрастанию ключей).
pub fn walk<V, F, D>(tm: &TransactionManager, root: u64, mut visit: F, mut damage: D) -> Result<()>
where
    V: BtreeValue,
    F: FnMut(u32, V) -> Result<()>,
    D: FnMut(KeyRange, &str) -> Result<()>,
{
    let all = KeyRange {
        begin: 0,
        end: None,
    };
    walk_node::<V, F, D>(tm, root, None, all, &mut visit, &mut damage)
}

fn walk_node<V, F, D>(
    tm: &TransactionManager,
    block: u64,
    level: Option<u64>,
    range: KeyRange,
    visit: &mut F,
    damage: &mut D,
) -> Result<()>
where
    V: BtreeValue,
    F: FnMut(u32, V) -> Result<()>,
    D: FnMut(KeyRange, &str) -> Result<()>,
{
    let node = match read_node::<V>(tm, block, level) {
        Ok(n) => n,
        Err(e) => {
            log::debug!("btree node {} covering {} unreadable: {:#}", block, range, e);
            return damage(range, &format!("{:#}", e));
        }
    };
    if node.keys.iter().any(|k| !range.contains(*k)) {
        let reason = format!("btree node {}: keys escape {}", block, range);
        return damage(range, &reason);
    }

    match node.body {
        NodeBody::Leaf(values) => {
            for (k, v) in node.keys.iter().zip(values) {
                visit(*k, v)?;
            }
        }
        NodeBody::Internal(children) => {
            let n = children.len();
            for i in 0..n {
                let child_range = KeyRange {
                    begin: node.keys[i],
                    end: if i + 1 < n {
                        Some(node.keys[i + 1])
                    } else {
                        range.end
                    },
                };
                walk_node::<V, F, D>(
                    tm,
                    children[i],
                    Some(node.level - 1),
                    child_range,
                    visit,
                    damage,
                )?;
            }
        }
    }
    Ok(())
}
