use std::fmt;
use std::str::FromStr;

/// a contiguous span of bytes in the remote file, inclusive on both ends.
/// the zero pair is the sentinel meaning the server cannot serve partial
/// content and the whole file has to be fetched as one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub const SEQUENTIAL: Self = Self { from: 0, to: 0 };

    pub fn new(from: u64, to: u64) -> anyhow::Result<Self> {
        if from > to {
            anyhow::bail!("invalid block range {}-{}: start is past end", from, to);
        }
        // end offsets are inclusive, so the very last one would overflow len
        if to == u64::MAX {
            anyhow::bail!("invalid block range {}-{}: end offset too large", from, to);
        }
        Ok(Self { from, to })
    }

    pub fn is_sentinel(&self) -> bool {
        self.from == 0 && self.to == 0
    }

    /// number of bytes the range covers. meaningless for the sentinel, which
    /// stands for "whole file" rather than a one byte span.
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.from, self.to)
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for BlockRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((from, to)) = s.split_once('-') else {
            anyhow::bail!("block ranges are written FROM-TO, got {:?}", s);
        };
        let from: u64 = from.trim().parse()?;
        let to: u64 = to.trim().parse()?;
        Self::new(from, to)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0-499", 0, 499)]
    #[case("500-999", 500, 999)]
    #[case(" 12 - 24 ", 12, 24)]
    #[case("7-7", 7, 7)]
    fn parses_from_to_pairs(#[case] input: &str, #[case] from: u64, #[case] to: u64) {
        let range: BlockRange = input.parse().unwrap();
        assert_eq!(range, BlockRange { from, to });
    }

    #[rstest]
    #[case("499-0")]
    #[case("12")]
    #[case("a-b")]
    #[case("-")]
    #[case("0-18446744073709551615")]
    fn rejects_malformed_pairs(#[case] input: &str) {
        assert!(input.parse::<BlockRange>().is_err());
    }

    #[rstest]
    fn end_offset_at_the_numeric_limit_is_rejected() {
        assert!(BlockRange::new(5, u64::MAX).is_err());
        // the largest representable range still has a well defined length
        let range = BlockRange::new(0, u64::MAX - 1).unwrap();
        assert_eq!(range.len(), u64::MAX);
    }

    #[rstest]
    fn sentinel_is_the_zero_pair() {
        assert!(BlockRange::SEQUENTIAL.is_sentinel());
        assert!("0-0".parse::<BlockRange>().unwrap().is_sentinel());
        assert!(!BlockRange { from: 0, to: 1 }.is_sentinel());
    }

    #[rstest]
    fn header_value_and_len() {
        let range = BlockRange::new(500, 999).unwrap();
        assert_eq!(range.header_value(), "bytes=500-999");
        assert_eq!(range.len(), 500);
    }
}
