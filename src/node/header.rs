//! node/header — init/read/write общего заголовка узла и проверка узла при чтении.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use super::checksum::node_verify_checksum;
use super::common::*;
use crate::consts::NO_BLOCK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub node_type: u16,
    pub block_id: u64,
    pub nr_entries: u32,
    pub max_entries: u32,
    pub value_size: u32,
    pub flags: u32,
    pub next: u64,
    pub aux: u64,
    pub fill: u64,
}

impl NodeHeader {
    pub fn new(node_type: u16, block_id: u64, value_size: u32) -> Self {
        Self {
            node_type,
            block_id,
            nr_entries: 0,
            max_entries: 0,
            value_size,
            flags: 0,
            next: NO_BLOCK,
            aux: 0,
            fill: 0,
        }
    }
}

/// Занулить буфер и записать заголовок.
pub fn node_init(buf: &mut [u8], h: &NodeHeader) -> Result<()> {
    if buf.len() < NODE_HDR_SIZE + TRAILER_LEN {
        return Err(anyhow!("node buffer too small: {}", buf.len()));
    }
    buf.fill(0);
    buf[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(NODE_MAGIC);
    LittleEndian::write_u16(&mut buf[OFF_VERSION..OFF_VERSION + 2], NODE_VERSION);
    node_header_write(buf, h)
}

pub fn node_header_write(buf: &mut [u8], h: &NodeHeader) -> Result<()> {
    if buf.len() < NODE_HDR_SIZE {
        return Err(anyhow!("node buffer too small for header"));
    }
    LittleEndian::write_u16(&mut buf[OFF_TYPE..OFF_TYPE + 2], h.node_type);
    LittleEndian::write_u64(&mut buf[OFF_BLOCK_ID..OFF_BLOCK_ID + 8], h.block_id);
    LittleEndian::write_u32(&mut buf[OFF_NR_ENTRIES..OFF_NR_ENTRIES + 4], h.nr_entries);
    LittleEndian::write_u32(&mut buf[OFF_MAX_ENTRIES..OFF_MAX_ENTRIES + 4], h.max_entries);
    LittleEndian::write_u32(&mut buf[OFF_VALUE_SIZE..OFF_VALUE_SIZE + 4], h.value_size);
    LittleEndian::write_u32(&mut buf[OFF_FLAGS..OFF_FLAGS + 4], h.flags);
    LittleEndian::write_u64(&mut buf[OFF_NEXT..OFF_NEXT + 8], h.next);
    LittleEndian::write_u64(&mut buf[OFF_AUX..OFF_AUX + 8], h.aux);
    LittleEndian::write_u64(&mut buf[OFF_FILL..OFF_FILL + 8], h.fill);
    Ok(())
}

pub fn node_header_read(buf: &[u8]) -> Result<NodeHeader> {
    if buf.len() < NODE_HDR_SIZE {
        return Err(anyhow!("node buffer too small for header"));
    }
    if &buf[OFF_MAGIC..OFF_MAGIC + 4] != NODE_MAGIC {
        return Err(anyhow!("bad node magic"));
    }
    let ver = LittleEndian::read_u16(&buf[OFF_VERSION..OFF_VERSION + 2]);
    if ver != NODE_VERSION {
        return Err(anyhow!("unsupported node version {}", ver));
    }
    Ok(NodeHeader {
        node_type: LittleEndian::read_u16(&buf[OFF_TYPE..OFF_TYPE + 2]),
        block_id: LittleEndian::read_u64(&buf[OFF_BLOCK_ID..OFF_BLOCK_ID + 8]),
        nr_entries: LittleEndian::read_u32(&buf[OFF_NR_ENTRIES..OFF_NR_ENTRIES + 4]),
        max_entries: LittleEndian::read_u32(&buf[OFF_MAX_ENTRIES..OFF_MAX_ENTRIES + 4]),
        value_size: LittleEndian::read_u32(&buf[OFF_VALUE_SIZE..OFF_VALUE_SIZE + 4]),
        flags: LittleEndian::read_u32(&buf[OFF_FLAGS..OFF_FLAGS + 4]),
        next: LittleEndian::read_u64(&buf[OFF_NEXT..OFF_NEXT + 8]),
        aux: LittleEndian::read_u64(&buf[OFF_AUX..OFF_AUX + 8]),
        fill: LittleEndian::read_u64(&buf[OFF_FILL..OFF_FILL + 8]),
    })
}

#[inline]
pub fn node_payload(buf: &[u8]) -> &[u8] {
    &buf[NODE_HDR_SIZE..buf.len() - TRAILER_LEN]
}

#[inline]
pub fn node_payload_mut(buf: &mut [u8]) -> &mut [u8] {
    let n = buf.len();
    &mut buf[NODE_HDR_SIZE..n - TRAILER_LEN]
}

/// Проверка прочитанного узла. Err(reason) — узел считается повреждённым.
///
/// Порядок: checksum → magic/version → self-location → type → вместимость.
/// `expected_types` — допустимые типы (корень btree может быть и листом).
pub fn node_validate(
    buf: &[u8],
    expected_block: u64,
    expected_types: &[u16],
) -> std::result::Result<NodeHeader, String> {
    match node_verify_checksum(buf) {
        Ok(true) => {}
        Ok(false) => return Err("checksum mismatch".to_string()),
        Err(e) => return Err(e.to_string()),
    }
    let h = node_header_read(buf).map_err(|e| e.to_string())?;
    if h.block_id != expected_block {
        return Err(format!(
            "block_id {} does not match location {}",
            h.block_id, expected_block
        ));
    }
    if !expected_types.contains(&h.node_type) {
        return Err(format!(
            "node type {} (expected one of {:?})",
            h.node_type, expected_types
        ));
    }
    if h.nr_entries > h.max_entries {
        return Err(format!(
            "nr_entries {} exceeds max_entries {}",
            h.nr_entries, h.max_entries
        ));
    }
    Ok(h)
}
