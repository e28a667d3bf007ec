pub(crate) const KIB: u64 = 1024;

/// Bits in one byte, used when converting a byte budget into a bitrate
pub(crate) const BITS_PER_BYTE: u64 = 8;
