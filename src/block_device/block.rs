/// One 512-byte block (or sector).
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    pub contents: [u8; Block::LEN],
}

impl Block {
    /// All our blocks are this many bytes long.
    pub const LEN: usize = 512;
    /// `LEN` as a `u32`, for comparing against sector sizes.
    pub const LEN_U32: u32 = 512;

    /// A block full of zeroes.
    pub const fn new() -> Block {
        Block {
            contents: [0u8; Self::LEN],
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::new()
    }
}

impl core::ops::Deref for Block {
    type Target = [u8; Block::LEN];
    fn deref(&self) -> &[u8; Block::LEN] {
        &self.contents
    }
}

impl core::ops::DerefMut for Block {
    fn deref_mut(&mut self) -> &mut [u8; Block::LEN] {
        &mut self.contents
    }
}

impl core::fmt::Debug for Block {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(fmt, "Block:")?;
        for line in self.contents.chunks(32) {
            for b in line {
                write!(fmt, "{:02x}", b)?;
            }
            writeln!(fmt)?;
        }
        Ok(())
    }
}

/// The linear number of a block on a device.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockIdx(pub u32);

/// A number of blocks.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockCount(pub u32);

impl core::ops::Add<BlockCount> for BlockIdx {
    type Output = BlockIdx;
    fn add(self, rhs: BlockCount) -> BlockIdx {
        BlockIdx(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign<BlockCount> for BlockIdx {
    fn add_assign(&mut self, rhs: BlockCount) {
        self.0 += rhs.0
    }
}

impl BlockCount {
    /// Bytes covered by this many blocks.
    pub fn into_bytes(self) -> u64 {
        u64::from(self.0) * Block::LEN as u64
    }
}
