//! Общие константы форматов (superblock, nodes, arrays, btree).

// -------- Store --------
/// Размер блока метаданных (как у dm persistent-data).
pub const METADATA_BLOCK_SIZE: usize = 4096;
/// Суперблок всегда лежит в блоке 0.
pub const SUPERBLOCK_LOCATION: u64 = 0;
/// "Нет блока" — пустая ссылка на узел.
pub const NO_BLOCK: u64 = u64::MAX;

// -------- Superblock --------
pub const SUPERBLOCK_MAGIC: &[u8; 8] = b"ERASB001";
pub const SUPERBLOCK_VERSION: u32 = 1;

// -------- Era values --------
/// Значение в era array для блока, который ни разу не писался.
pub const NEVER_WRITTEN: u32 = u32::MAX;

// -------- Output --------
/// Sentinel path for "write to stdout".
pub const STDOUT_PATH: &str = "-";
