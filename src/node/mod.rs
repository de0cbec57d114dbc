//! node — on-disk формат узлов метаданных: общий 64-байтовый заголовок + трейлер CRC32C.
//!
//! Разделение по подмодулям:
//! - common.rs   — MAGIC/версия/типы, offset’ы заголовка, размеры.
//! - checksum.rs — трейлер CRC32C.
//! - header.rs   — NodeHeader: init/read/write и проверка узла при чтении.

pub mod checksum;
pub mod common;
pub mod header;

pub use checksum::{node_update_checksum, node_verify_checksum};
pub use common::{
    entries_per_node, payload_len, NODE_HDR_SIZE, NODE_MAGIC, NODE_TYPE_ARRAY_INDEX,
    NODE_TYPE_ARRAY_LEAF, NODE_TYPE_BTREE_INTERNAL, NODE_TYPE_BTREE_LEAF, NODE_TYPE_ROOT_RECORD,
    TRAILER_LEN,
};
pub use header::{
    node_header_read, node_header_write, node_init, node_payload, node_payload_mut,
    node_validate, NodeHeader,
};
