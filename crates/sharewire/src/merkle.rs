use super::*;

/// Folds a merkle branch into a running hash. Bit `i` of `index` selects the
/// concatenation order at step `i`: zero keeps the running hash first, so an
/// index of zero (the only value the share pipeline produces) always appends
/// the sibling after it.
pub fn link_root(tip: sha256d::Hash, link: &[sha256d::Hash], index: u64) -> sha256d::Hash {
    let mut running = tip;

    for (step, sibling) in link.iter().enumerate() {
        let mut concat = [0u8; 64];

        if index >> step & 1 == 0 {
            concat[..32].copy_from_slice(running.as_byte_array());
            concat[32..].copy_from_slice(sibling.as_byte_array());
        } else {
            concat[..32].copy_from_slice(sibling.as_byte_array());
            concat[32..].copy_from_slice(running.as_byte_array());
        }

        running = sha256d::Hash::hash(&concat);
    }

    running
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn hash(byte: u8) -> sha256d::Hash {
        sha256d::Hash::from_byte_array([byte; 32])
    }

    #[test]
    fn empty_link_returns_tip() {
        assert_eq!(link_root(hash(7), &[], 0), hash(7));
    }

    #[test]
    fn single_step_appends_sibling_after_running_hash() {
        let tip = hash(1);
        let sibling = hash(2);

        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(tip.as_byte_array());
        concat[32..].copy_from_slice(sibling.as_byte_array());

        assert_eq!(
            link_root(tip, &[sibling], 0),
            sha256d::Hash::hash(&concat)
        );
    }

    #[test]
    fn index_bit_swaps_concatenation_order() {
        let tip = hash(1);
        let sibling = hash(2);

        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(sibling.as_byte_array());
        concat[32..].copy_from_slice(tip.as_byte_array());

        assert_eq!(
            link_root(tip, &[sibling], 1),
            sha256d::Hash::hash(&concat)
        );
    }

    #[test]
    fn steps_chain_left_to_right() {
        let tip = hash(1);
        let link = [hash(2), hash(3)];

        let first = link_root(tip, &link[..1], 0);
        assert_eq!(link_root(tip, &link, 0), link_root(first, &link[1..], 0));
    }
}
