//! node/common — общие константы/offset’ы узлов метаданных и трейлера checksum.

// ---------- Общий префикс и типы ----------

/// 4-байтовая магия узла.
pub const NODE_MAGIC: &[u8; 4] = b"ERND";

/// Версия формата узлов.
pub const NODE_VERSION: u16 = 1;

/// Индексный узел persistent array: цепочка ссылок на листья.
pub const NODE_TYPE_ARRAY_INDEX: u16 = 1;
/// Лист persistent array: значения фиксированной ширины.
pub const NODE_TYPE_ARRAY_LEAF: u16 = 2;
/// Внутренний узел btree: (key u32, child u64).
pub const NODE_TYPE_BTREE_INTERNAL: u16 = 3;
/// Лист btree: (key u32, value).
pub const NODE_TYPE_BTREE_LEAF: u16 = 4;
/// Замороженный корень (metadata snapshot).
pub const NODE_TYPE_ROOT_RECORD: u16 = 5;

/// Фиксированный размер заголовка узла.
pub const NODE_HDR_SIZE: usize = 64;

/// Фиксированная длина трейлера checksum.
pub const TRAILER_LEN: usize = 16;

// ---------- Offsets заголовка ----------
pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 4;
pub const OFF_TYPE: usize = 6;
/// block_id (u64): где узел обязан лежать; ловит misdirected writes.
pub const OFF_BLOCK_ID: usize = 8;
pub const OFF_NR_ENTRIES: usize = 16;
pub const OFF_MAX_ENTRIES: usize = 20;
pub const OFF_VALUE_SIZE: usize = 24;
pub const OFF_FLAGS: usize = 28;
/// next (u64): следующий индексный узел цепочки или NO_BLOCK.
pub const OFF_NEXT: usize = 32;
/// aux (u64): длина массива для индексных узлов.
pub const OFF_AUX: usize = 40;
/// fill (u64): значение "по умолчанию" для отсутствующих листьев.
pub const OFF_FILL: usize = 48;

/// Полезная нагрузка узла при заданном размере блока.
#[inline]
pub const fn payload_len(block_size: usize) -> usize {
    block_size - NODE_HDR_SIZE - TRAILER_LEN
}

/// Сколько записей размера `entry_size` помещается в узел.
#[inline]
pub const fn entries_per_node(block_size: usize, entry_size: usize) -> usize {
    payload_len(block_size) / entry_size
}
