//! Engine-generated document identities.

use parking_lot::Mutex;
use uuid::Uuid;

/// Generates unique, time-ordered identities (UUID v7, hyphenated).
///
/// Values are strictly increasing for one generator, both numerically and as
/// strings, even when the clock does not advance between calls.
#[derive(Debug, Default)]
pub struct IdentityGenerator {
    last: Mutex<u128>,
}

impl IdentityGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_identity(&self) -> String {
        let mut last = self.last.lock();
        let mut value = Uuid::now_v7().as_u128();
        if value <= *last {
            value = *last + 1;
        }
        *last = value;
        Uuid::from_u128(value).hyphenated().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let generator = IdentityGenerator::new();
        let ids: Vec<String> = (0..1000).map(|_| generator.next_identity()).collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(Uuid::parse_str(&ids[0]).unwrap().get_version_num(), 7);
    }
}
