//! Fixed-width keys and values.
//!
//! Both are plain byte strings compared lexicographically. Because every
//! key in a tree has the same width, byte order is a total order and the
//! codec never needs a length prefix.

use std::fmt;

macro_rules! fixed_bytes {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wrap raw bytes. The width is checked against the tree on use.
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                $name(bytes.into())
            }

            /// Big-endian encoding, so numeric order equals byte order.
            pub fn from_u64(n: u64) -> Self {
                $name(n.to_be_bytes().to_vec())
            }

            /// Text zero-padded (or truncated) to `width` bytes.
            pub fn padded(text: &str, width: usize) -> Self {
                let mut bytes = text.as_bytes().to_vec();
                bytes.resize(width, 0);
                $name(bytes)
            }

            /// Interpret an 8-byte value written by [`Self::from_u64`].
            pub fn to_u64(&self) -> Option<u64> {
                let bytes: [u8; 8] = self.0.as_slice().try_into().ok()?;
                Some(u64::from_be_bytes(bytes))
            }

            #[inline]
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            #[inline]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&[u8]> for $name {
            fn from(bytes: &[u8]) -> Self {
                $name(bytes.to_vec())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        /// Printable ASCII (ignoring trailing zero padding) is shown as text,
        /// anything else as hex.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let trimmed_len = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                let trimmed = &self.0[..trimmed_len];
                if !trimmed.is_empty() && trimmed.iter().all(|b| b.is_ascii_graphic()) {
                    // Checked above: every byte is ASCII.
                    f.write_str(&String::from_utf8_lossy(trimmed))
                } else {
                    for b in &self.0 {
                        write!(f, "{:02x}", b)?;
                    }
                    Ok(())
                }
            }
        }
    };
}

fixed_bytes!(
    /// A fixed-width key.
    Key
);

fixed_bytes!(
    /// A fixed-width value.
    Value
);
