use crate::config::{ConfigError, TreeConfig};

use super::TreePath;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path or segment has the wrong length or a character outside
    ///  the alphabet. Stored paths are written by the engine alone, so
    ///  seeing this means a bug or a corrupted store.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    /// The rank does not fit in one segment at the configured step length
    #[error("rank {rank} exceeds segment capacity {capacity}")]
    CapacityExceeded { rank: u64, capacity: u64 },
    /// Ranks are 1-based
    #[error("rank 0 is not a valid sibling rank")]
    ZeroRank,
}

/// Fixed-width, order-preserving encoding of sibling ranks.
///
/// With the default base-36 alphabet and a step length of 4 a single
///  parent can hold `36^4 - 1` children over its lifetime. Ranks freed by
///  deletion are never reused, so exhausting a parent requires widening
///  the step length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCodec {
    alphabet: Vec<u8>,
    // alphabet byte -> digit value
    digits: [Option<u8>; 128],
    steplen: usize,
    capacity: u64,
}

impl PathCodec {
    pub fn new(alphabet: &str, steplen: usize) -> Result<Self, ConfigError> {
        let bytes = alphabet.as_bytes();
        if bytes.len() < 2 || !alphabet.is_ascii() {
            return Err(ConfigError::InvalidAlphabet(alphabet.to_string()));
        }
        // strictly ascending implies no duplicates, and keeps
        //  string order equal to numeric order
        if bytes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::InvalidAlphabet(alphabet.to_string()));
        }
        if steplen == 0 {
            return Err(ConfigError::InvalidSteplen(steplen));
        }

        let capacity = u32::try_from(steplen)
            .ok()
            .and_then(|exp| (bytes.len() as u64).checked_pow(exp))
            .ok_or(ConfigError::InvalidSteplen(steplen))?
            - 1;

        let mut digits = [None; 128];
        for (value, byte) in bytes.iter().enumerate() {
            digits[*byte as usize] = Some(value as u8);
        }

        Ok(Self {
            alphabet: bytes.to_vec(),
            digits,
            steplen,
            capacity,
        })
    }

    pub fn from_config(config: &TreeConfig) -> Result<Self, ConfigError> {
        Self::new(&config.alphabet, config.steplen)
    }

    pub fn steplen(&self) -> usize {
        self.steplen
    }

    /// Highest rank a single segment can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Encode a 1-based sibling rank as one segment.
    pub fn encode(&self, rank: u64) -> Result<String, PathError> {
        if rank == 0 {
            return Err(PathError::ZeroRank);
        }
        if rank > self.capacity {
            return Err(PathError::CapacityExceeded {
                rank,
                capacity: self.capacity,
            });
        }
        Ok(self.encode_unchecked(rank))
    }

    fn encode_unchecked(&self, mut rank: u64) -> String {
        let base = self.alphabet.len() as u64;
        let mut segment = vec![self.alphabet[0]; self.steplen];
        for slot in segment.iter_mut().rev() {
            *slot = self.alphabet[(rank % base) as usize];
            rank /= base;
        }
        // alphabet is validated ASCII
        segment.into_iter().map(char::from).collect()
    }

    /// Decode one segment back into its rank.
    pub fn decode(&self, segment: &str) -> Result<u64, PathError> {
        if segment.len() != self.steplen {
            return Err(PathError::InvalidPath(segment.to_string()));
        }
        let base = self.alphabet.len() as u64;
        let mut rank = 0u64;
        for byte in segment.bytes() {
            let digit = self
                .digits
                .get(byte as usize)
                .copied()
                .flatten()
                .ok_or_else(|| PathError::InvalidPath(segment.to_string()))?;
            rank = rank * base + digit as u64;
        }
        if rank == 0 {
            return Err(PathError::InvalidPath(segment.to_string()));
        }
        Ok(rank)
    }

    /// Validate a stored path string.
    pub fn parse(&self, path: &str) -> Result<TreePath, PathError> {
        if path.is_empty() || path.len() % self.steplen != 0 || !path.is_ascii() {
            return Err(PathError::InvalidPath(path.to_string()));
        }
        for start in (0..path.len()).step_by(self.steplen) {
            self.decode(&path[start..start + self.steplen])
                .map_err(|_| PathError::InvalidPath(path.to_string()))?;
        }
        Ok(TreePath::from_validated(path.to_string()))
    }

    pub fn depth(&self, path: &TreePath) -> u32 {
        (path.len() / self.steplen) as u32
    }

    /// The path one level up, `None` for top-level nodes.
    pub fn parent(&self, path: &TreePath) -> Option<TreePath> {
        if path.len() <= self.steplen {
            return None;
        }
        Some(path.truncated(path.len() - self.steplen))
    }

    /// Rank of the last segment.
    pub fn rank(&self, path: &TreePath) -> Result<u64, PathError> {
        let len = path.len();
        if len < self.steplen {
            return Err(PathError::InvalidPath(path.to_string()));
        }
        self.decode(&path.as_str()[len - self.steplen..])
    }

    /// The path of the child at `rank` below `parent`, or of the
    ///  top-level node at `rank` when there is no parent.
    pub fn child(&self, parent: Option<&TreePath>, rank: u64) -> Result<TreePath, PathError> {
        let segment = self.encode(rank)?;
        Ok(match parent {
            Some(parent) => parent.joined(&segment),
            None => TreePath::from_validated(segment),
        })
    }

    /// Same parent, different rank.
    pub fn with_rank(&self, path: &TreePath, rank: u64) -> Result<TreePath, PathError> {
        self.child(self.parent(path).as_ref(), rank)
    }

    /// Every ancestor path, root first.
    pub fn ancestors(&self, path: &TreePath, inclusive: bool) -> Vec<TreePath> {
        let end = if inclusive {
            path.len()
        } else {
            path.len().saturating_sub(self.steplen)
        };
        (self.steplen..=end)
            .step_by(self.steplen)
            .map(|len| path.truncated(len))
            .collect()
    }

    /// A slot below `parent` that never holds a node: rank zero. Used to
    ///  park a subtree while the siblings at its destination are shifted.
    pub(crate) fn scratch(&self, parent: Option<&TreePath>) -> TreePath {
        let segment = self.encode_unchecked(0);
        match parent {
            Some(parent) => parent.joined(&segment),
            None => TreePath::from_validated(segment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_codec() -> PathCodec {
        PathCodec::from_config(&TreeConfig::default()).unwrap()
    }

    #[test]
    fn test_encode_is_fixed_width() {
        let codec = default_codec();
        assert_eq!(codec.encode(1).unwrap(), "0001");
        assert_eq!(codec.encode(35).unwrap(), "000Z");
        assert_eq!(codec.encode(36).unwrap(), "0010");
        assert_eq!(codec.encode(codec.capacity()).unwrap(), "ZZZZ");
    }

    #[test]
    fn test_round_trip_samples() {
        let codec = default_codec();
        for rank in [1, 2, 35, 36, 37, 1295, 1296, 46655, 46656, codec.capacity()] {
            let segment = codec.encode(rank).unwrap();
            assert_eq!(codec.decode(&segment).unwrap(), rank);
        }
    }

    #[test]
    fn test_round_trip_exhaustive_small_codec() {
        let codec = PathCodec::new("012", 3).unwrap();
        assert_eq!(codec.capacity(), 26);
        for rank in 1..=codec.capacity() {
            assert_eq!(codec.decode(&codec.encode(rank).unwrap()).unwrap(), rank);
        }
    }

    #[test]
    fn test_order_preserved() {
        let codec = default_codec();
        let mut previous = codec.encode(1).unwrap();
        for rank in 2..5000 {
            let next = codec.encode(rank).unwrap();
            assert!(previous < next, "{previous} should sort before {next}");
            previous = next;
        }
    }

    #[test]
    fn test_capacity_exceeded() {
        let codec = default_codec();
        let result = codec.encode(codec.capacity() + 1);
        assert!(matches!(
            result,
            Err(PathError::CapacityExceeded { rank, capacity }) if rank == capacity + 1
        ));
        assert_eq!(codec.encode(0), Err(PathError::ZeroRank));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let codec = default_codec();
        assert!(matches!(codec.decode("001"), Err(PathError::InvalidPath(_))));
        assert!(matches!(codec.decode("00001"), Err(PathError::InvalidPath(_))));
        assert!(matches!(codec.decode("00a1"), Err(PathError::InvalidPath(_))));
        assert!(matches!(codec.decode("00é"), Err(PathError::InvalidPath(_))));
        assert!(matches!(codec.decode("0000"), Err(PathError::InvalidPath(_))));
    }

    #[test]
    fn test_parse_and_navigate() {
        let codec = default_codec();
        let path = codec.parse("000100020003").unwrap();
        assert_eq!(codec.depth(&path), 3);
        assert_eq!(codec.rank(&path).unwrap(), 3);
        assert_eq!(codec.parent(&path).unwrap().as_str(), "00010002");
        assert!(codec.parent(&codec.parse("0001").unwrap()).is_none());

        let ancestors: Vec<String> = codec
            .ancestors(&path, false)
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(ancestors, vec!["0001", "00010002"]);
        assert_eq!(codec.ancestors(&path, true).len(), 3);

        assert_eq!(codec.with_rank(&path, 7).unwrap().as_str(), "000100020007");

        assert!(codec.parse("").is_err());
        assert!(codec.parse("00010").is_err());
        assert!(codec.parse("00010000").is_err());
    }

    #[test]
    fn test_invalid_alphabets() {
        assert!(PathCodec::new("0", 4).is_err());
        assert!(PathCodec::new("BA", 4).is_err());
        assert!(PathCodec::new("0012", 4).is_err());
        assert!(PathCodec::new("01", 0).is_err());
        assert!(PathCodec::new("0123456789ABCDEF", 17).is_err());
    }

    #[test]
    fn test_scratch_sorts_before_every_rank() {
        let codec = default_codec();
        let parent = codec.parse("0001").unwrap();
        let scratch = codec.scratch(Some(&parent));
        assert_eq!(scratch.as_str(), "00010000");
        assert!(scratch < codec.child(Some(&parent), 1).unwrap());
    }
}
