//! btree — упорядоченное дерево u32 → V, строится снизу вверх из отсортированных пар.
//!
//! Узлы:
//! - лист (BTREE_LEAF): keys[max_entries] u32, затем values[max_entries] × V::SIZE;
//! - внутренний (BTREE_INTERNAL): keys[max_entries] u32, затем children[max_entries] u64;
//!   keys[i] — наименьший ключ поддерева children[i].
//!
//! Уровень узла лежит в `aux` (0 — лист). `max_entries` хранится в каждом узле,
//! поэтому ограничение из EraConfig влияет только на запись.
//!
//! Подмодули:
//! - walk.rs — lookup и damage-tolerant in-order обход с диапазонами ключей.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::error::EraError;
use crate::node::{
    entries_per_node, node_header_write, node_payload, node_payload_mut, payload_len, NodeHeader,
    NODE_TYPE_BTREE_INTERNAL, NODE_TYPE_BTREE_LEAF,
};
use crate::store::TransactionManager;

pub mod walk;

pub use walk::{lookup, walk, KeyRange};

/// Значение листа btree фиксированной ширины.
pub trait BtreeValue: Copy + std::fmt::Debug {
    const SIZE: usize;
    fn unpack(b: &[u8]) -> Self;
    fn pack(&self, b: &mut [u8]);
}

impl BtreeValue for u64 {
    const SIZE: usize = 8;
    fn unpack(b: &[u8]) -> Self {
        LittleEndian::read_u64(b)
    }
    fn pack(&self, b: &mut [u8]) {
        LittleEndian::write_u64(b, *self)
    }
}

/// Содержимое разобранного узла.
#[derive(Debug)]
pub enum NodeBody<V> {
    Leaf(Vec<V>),
    Internal(Vec<u64>),
}

#[derive(Debug)]
pub struct BtreeNode<V> {
    pub block: u64,
    pub level: u64,
    pub keys: Vec<u32>,
    pub body: NodeBody<V>,
}

/// Вместимость узла с записями размера `value_size`, с учётом ограничения.
pub fn node_capacity(block_size: usize, value_size: usize, cap: Option<u32>) -> u32 {
    let fit = entries_per_node(block_size, 4 + value_size) as u32;
    match cap {
        Some(c) if c >= 2 => c.min(fit),
        _ => fit,
    }
}

fn write_node<T, P>(
    tm: &mut TransactionManager,
    node_type: u16,
    level: u64,
    max_entries: u32,
    value_size: usize,
    entries: &[(u32, T)],
    pack: P,
) -> Result<u64>
where
    P: Fn(&T, &mut [u8]),
{
    let mut h = NodeHeader::new(node_type, 0, value_size as u32);
    h.max_entries = max_entries;
    h.nr_entries = entries.len() as u32;
    h.aux = level;
    let (id, mut buf) = tm.new_node(h)?;
    h.block_id = id;
    node_header_write(&mut buf, &h)?;
    {
        let p = node_payload_mut(&mut buf);
        let vbase = max_entries as usize * 4;
        for (i, (k, v)) in entries.iter().enumerate() {
            LittleEndian::write_u32(&mut p[i * 4..i * 4 + 4], *k);
            pack(v, &mut p[vbase + i * value_size..vbase + (i + 1) * value_size]);
        }
    }
    tm.write_node(&mut buf)
}

/// Построить дерево из пар со строго возрастающими ключами. Возвращает корень.
///
/// Листья заполняются слева направо до `max_entries`; пустое дерево — один пустой лист.
pub fn build<V: BtreeValue>(
    tm: &mut TransactionManager,
    entries: &[(u32, V)],
    max_entries: Option<u32>,
) -> Result<u64> {
    if entries.windows(2).any(|w| w[0].0 >= w[1].0) {
        return Err(anyhow!("btree build: keys must be strictly increasing"));
    }
    let bs = tm.block_size();
    let leaf_cap = node_capacity(bs, V::SIZE, max_entries);
    let int_cap = node_capacity(bs, 8, max_entries);

    let mut level: Vec<(u32, u64)> = Vec::new();
    if entries.is_empty() {
        let b = write_node(tm, NODE_TYPE_BTREE_LEAF, 0, leaf_cap, V::SIZE, entries, V::pack)?;
        return Ok(b);
    }
    for chunk in entries.chunks(leaf_cap as usize) {
        let b = write_node(tm, NODE_TYPE_BTREE_LEAF, 0, leaf_cap, V::SIZE, chunk, V::pack)?;
        level.push((chunk[0].0, b));
    }

    let mut height = 0u64;
    while level.len() > 1 {
        height += 1;
        let mut up = Vec::with_capacity(level.len() / int_cap as usize + 1);
        for chunk in level.chunks(int_cap as usize) {
            let b = write_node(
                tm,
                NODE_TYPE_BTREE_INTERNAL,
                height,
                int_cap,
                8,
                chunk,
                |c: &u64, out: &mut [u8]| LittleEndian::write_u64(out, *c),
            )?;
            up.push((chunk[0].0, b));
        }
        level = up;
    }
    log::debug!(
        "btree built: {} entries, height {}, root {}",
        entries.len(),
        height,
        level[0].1
    );
    Ok(level[0].1)
}

/// Прочитать и разобрать узел. `expected_level` — None для корня.
pub fn read_node<V: BtreeValue>(
    tm: &TransactionManager,
    block: u64,
    expected_level: Option<u64>,
) -> Result<BtreeNode<V>> {
    let types: &[u16] = match expected_level {
        None => &[NODE_TYPE_BTREE_INTERNAL, NODE_TYPE_BTREE_LEAF],
        Some(0) => &[NODE_TYPE_BTREE_LEAF],
        Some(_) => &[NODE_TYPE_BTREE_INTERNAL],
    };
    let (h, buf) = tm.read_node_of(block, types)?;
    let damaged = |reason: String| -> anyhow::Error { EraError::NodeDamaged { block, reason }.into() };

    let is_leaf = h.node_type == NODE_TYPE_BTREE_LEAF;
    let vsize = if is_leaf { V::SIZE } else { 8 };
    if h.value_size as usize != vsize {
        return Err(damaged(format!("value size {} (expected {})", h.value_size, vsize)));
    }
    if (is_leaf && h.aux != 0) || (!is_leaf && h.aux == 0) {
        return Err(damaged(format!("level {} does not match node type", h.aux)));
    }
    if let Some(l) = expected_level {
        if h.aux != l {
            return Err(damaged(format!("level {} (expected {})", h.aux, l)));
        }
    }
    let max = h.max_entries as usize;
    if max * (4 + vsize) > payload_len(buf.len()) {
        return Err(damaged(format!("max_entries {} does not fit a node", max)));
    }
    if !is_leaf && h.nr_entries == 0 {
        return Err(damaged("empty internal node".into()));
    }

    let p = node_payload(&buf);
    let n = h.nr_entries as usize;
    let keys: Vec<u32> = (0..n).map(|i| LittleEndian::read_u32(&p[i * 4..i * 4 + 4])).collect();
    if keys.windows(2).any(|w| w[0] >= w[1]) {
        return Err(damaged("keys out of order".into()));
    }
    let vbase = max * 4;
    let body = if is_leaf {
        NodeBody::Leaf(
            (0..n)
                .map(|i| V::unpack(&p[vbase + i * vsize..vbase + (i + 1) * vsize]))
                .collect(),
        )
    } else {
        NodeBody::Internal(
            (0..n)
                .map(|i| LittleEndian::read_u64(&p[vbase + i * 8..vbase + i * 8 + 8]))
                .collect(),
        )
    };
    Ok(BtreeNode {
        block,
        level: h.aux,
        keys,
        body,
    })
}

/// Листья дерева слева направо: (первый ключ, блок). Строгий обход.
pub fn leaf_blocks<V: BtreeValue>(tm: &TransactionManager, root: u64) -> Result<Vec<(u32, u64)>> {
    let mut out = Vec::new();
    let mut stack = vec![(root, None)];
    while let Some((block, level)) = stack.pop() {
        let node = read_node::<V>(tm, block, level)?;
        match node.body {
            NodeBody::Leaf(_) => out.push((node.keys.first().copied().unwrap_or(0), block)),
            NodeBody::Internal(children) => {
                for c in children.iter().rev() {
                    stack.push((*c, Some(node.level - 1)));
                }
            }
        }
    }
    Ok(out)
}
