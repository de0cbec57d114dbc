//! bitset — битмапа writeset'а: PArray<u64> слов, fill = 0.
//!
//! Нулевые листья не хранятся, поэтому "редко писавшаяся" эра стоит
//! несколько узлов независимо от nr_bits.

use anyhow::Result;
use std::ops::Range;

use crate::array::PArray;
use crate::store::TransactionManager;

#[inline]
pub fn words_for(nr_bits: u32) -> usize {
    (nr_bits as usize + 63) / 64
}

/// Построить битмапу по словам (`words.len() == words_for(nr_bits)`).
pub fn build(tm: &mut TransactionManager, words: &[u64]) -> Result<u64> {
    let arr = PArray::build(tm, 0u64, words)?;
    Ok(arr.root)
}

/// Построить битмапу из ненулевых слов: (номер слова, слово) по возрастанию.
pub fn build_sparse<I>(tm: &mut TransactionManager, nr_bits: u32, words: I) -> Result<u64>
where
    I: IntoIterator<Item = (u64, u64)>,
{
    let arr = PArray::build_sparse(tm, words_for(nr_bits) as u64, 0u64, words)?;
    Ok(arr.root)
}

/// Установленные биты (по возрастанию) из набора индексов.
pub fn words_from_bits(nr_bits: u32, bits: impl IntoIterator<Item = u32>) -> Vec<u64> {
    let mut words = vec![0u64; words_for(nr_bits)];
    for b in bits {
        if b < nr_bits {
            words[(b / 64) as usize] |= 1u64 << (b % 64);
        }
    }
    words
}

/// Damage-tolerant обход установленных битов.
///
/// `set_bit(index)` — по возрастанию. `damage(range, reason)` — диапазон битов,
/// которые прочитать не удалось (обрезан по nr_bits). Нечитаемый корень
/// битмапы репортится как весь диапазон [0, nr_bits).
pub fn walk<F, D>(
    tm: &TransactionManager,
    root: u64,
    nr_bits: u32,
    mut set_bit: F,
    mut damage: D,
) -> Result<()>
where
    F: FnMut(u32) -> Result<()>,
    D: FnMut(Range<u32>, &str) -> Result<()>,
{
    let nr = nr_bits as u64;
    let arr = match PArray::<u64>::open(tm, root) {
        Ok(a) if a.len == words_for(nr_bits) as u64 => a,
        Ok(a) => {
            let reason = format!("bitset {} holds {} words for {} bits", root, a.len, nr_bits);
            return damage(0..nr_bits, &reason);
        }
        Err(e) => return damage(0..nr_bits, &format!("{:#}", e)),
    };

    arr.walk(
        tm,
        |first, words| {
            for (i, &w) in words.iter().enumerate() {
                if w == 0 {
                    continue;
                }
                let base = (first + i as u64) * 64;
                let mut bits = w;
                while bits != 0 {
                    let b = base + bits.trailing_zeros() as u64;
                    bits &= bits - 1;
                    if b < nr {
                        set_bit(b as u32)?;
                    }
                }
            }
            Ok(())
        },
        |words, why| {
            let begin = (words.start * 64).min(nr) as u32;
            let end = (words.end * 64).min(nr) as u32;
            if begin < end {
                damage(begin..end, why)
            } else {
                Ok(())
            }
        },
    )
}
