//! invalidate/runs — сжатие множества блоков в максимальные непрерывные отрезки.

use std::collections::BTreeSet;

/// Полуоткрытый отрезок блоков [begin, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRun {
    pub begin: u32,
    pub end: u32,
}

impl BlockRun {
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// Итератор максимальных отрезков по возрастанию.
pub struct Runs<I: Iterator<Item = u32>> {
    it: std::iter::Peekable<I>,
}

impl<I: Iterator<Item = u32>> Iterator for Runs<I> {
    type Item = BlockRun;

    fn next(&mut self) -> Option<BlockRun> {
        let begin = self.it.next()?;
        let mut last = begin;
        while let Some(&b) = self.it.peek() {
            if last.checked_add(1) != Some(b) {
                break;
            }
            last = b;
            self.it.next();
        }
        Some(BlockRun {
            begin,
            // last < u32::MAX, иначе он не был бы индексом блока
            end: last.saturating_add(1),
        })
    }
}

/// Отрезки строго возрастающей последовательности блоков.
pub fn runs<I: IntoIterator<Item = u32>>(blocks: I) -> Runs<I::IntoIter> {
    Runs {
        it: blocks.into_iter().peekable(),
    }
}

pub fn encode_runs(blocks: &BTreeSet<u32>) -> Vec<BlockRun> {
    runs(blocks.iter().copied()).collect()
}

pub fn decode_runs(runs: &[BlockRun]) -> BTreeSet<u32> {
    runs.iter().flat_map(|r| r.begin..r.end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximal_runs() {
        let set: BTreeSet<u32> = [0, 1, 2, 5, 7, 8].into_iter().collect();
        let r = encode_runs(&set);
        assert_eq!(
            r,
            vec![
                BlockRun { begin: 0, end: 3 },
                BlockRun { begin: 5, end: 6 },
                BlockRun { begin: 7, end: 9 },
            ]
        );
        assert_eq!(decode_runs(&r), set);
        assert!(encode_runs(&BTreeSet::new()).is_empty());
    }
}
