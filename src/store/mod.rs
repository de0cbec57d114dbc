//! store — block store метаданных: файл/устройство из блоков по 4 KiB.
//!
//! Подмодули:
//! - core.rs        — BlockStore, режимы открытия, блокировки, ёмкость.
//! - io.rs          — read_block/write_block/sync, суперблок.
//! - transaction.rs — TransactionManager: чтение узлов с проверкой, аллокация
//!                    свежих узлов, commit (смена корня) / abort.
//!
//! Copy-on-write по построению: транзакция пишет только в блоки, выделенные ею же
//! (за high-water отметкой закоммиченного суперблока), поэтому закоммиченные
//! структуры (включая metadata snapshot) никогда не перезаписываются.

pub mod core;
pub mod io;
pub mod transaction;

pub use core::{BlockStore, OpenMode};
pub use transaction::TransactionManager;
