#[cfg(feature = "std")]
mod native;

#[cfg(feature = "std")]
pub use native::*;

#[cfg(feature = "sha2")]
pub mod sha {
    use sha2::{Digest, Sha256};

    use crate::hash::{Hasher, Sha256Digest};

    #[derive(Clone, Default)]
    pub struct Sha256Hasher {
        inner: Sha256,
    }

    impl Sha256Hasher {
        pub fn new() -> Self {
            Self {
                inner: Sha256::new(),
            }
        }
    }

    impl Hasher for Sha256Hasher {
        type Digest = Sha256Digest;

        fn reset(&mut self) {
            self.inner.reset();
        }

        fn update(&mut self, input: &[u8]) {
            self.inner.update(input);
        }

        fn finalize_reset(&mut self) -> Self::Digest {
            Sha256Digest(self.inner.finalize_reset().into())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_empty_input_digest() {
            let mut hasher = Sha256Hasher::new();
            hasher.update(b"ignored");
            hasher.reset();
            let digest = hasher.finalize_reset().into_inner();
            assert_eq!(
                digest[..4],
                [0xe3, 0xb0, 0xc4, 0x42],
                "SHA-256 of the empty string"
            );
        }
    }
}
