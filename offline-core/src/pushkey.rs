//! Chronologically sortable keys for new children.
//!
//! A key is 20 characters: 8 encode the millisecond timestamp, 12 are
//! random. Keys generated in the same millisecond increment the random part,
//! so keys from one generator always sort in creation order.

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of a generated key.
pub const PUSH_KEY_LEN: usize = 20;

/// Stateful key generator.
#[derive(Debug, Clone, Default)]
pub struct PushKeyGenerator {
    last_time: u64,
    last_random: [u8; 12],
}

impl PushKeyGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a key for `now_ms` using the OS random source.
    pub fn generate(&mut self, now_ms: u64) -> String {
        let mut bytes = [0u8; 12];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        self.generate_with(now_ms, bytes)
    }

    /// Generate a key for `now_ms` with caller-supplied randomness.
    ///
    /// `random` is only used when the timestamp advanced past the last key.
    pub fn generate_with(&mut self, now_ms: u64, random: [u8; 12]) -> String {
        if now_ms > self.last_time {
            self.last_time = now_ms;
            for (slot, byte) in self.last_random.iter_mut().zip(random) {
                *slot = byte % 64;
            }
        } else {
            // Same (or earlier) millisecond: keep the timestamp, bump the suffix.
            for slot in self.last_random.iter_mut().rev() {
                if *slot == 63 {
                    *slot = 0;
                } else {
                    *slot += 1;
                    break;
                }
            }
        }

        let mut key = String::with_capacity(PUSH_KEY_LEN);
        let mut time = self.last_time;
        let mut stamp = [0u8; 8];
        for slot in stamp.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        key.extend(stamp.iter().map(|&b| b as char));
        key.extend(self.last_random.iter().map(|&i| PUSH_CHARS[i as usize] as char));
        key
    }
}
