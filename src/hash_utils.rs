use crate::arith::Modulus;
use scuttlebutt::Block;
use sha2::{Digest, Sha256};

// H: u64 x u64 -> Z_q^n
//
// Two bytes per coordinate, big-endian, masked into [0, q). Output beyond one digest is produced by
// hashing the seeds again with an incremented block counter.
pub fn random_oracle(t: u64, x: u64, n: usize, q: Modulus) -> Vec<u32> {
    let needed = 2 * n;
    let mut bytes = Vec::with_capacity(needed + 32);
    let mut counter = 0u64;
    while bytes.len() < needed {
        let mut hasher = Sha256::new();
        hasher.update(t.to_le_bytes());
        hasher.update(x.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        bytes.extend_from_slice(hasher.finalize().as_slice());
        counter += 1;
    }

    bytes
        .chunks_exact(2)
        .take(n)
        .map(|hl| q.reduce((u32::from(hl[0]) << 8) | u32::from(hl[1])))
        .collect()
}

// H: u64 x Block^k -> Block
//
// Key derivation for one 1-out-of-2^k slot assembled from k random 1-out-of-2 OTs.
pub fn combine_keys(slot: u64, keys: &[Block]) -> Block {
    let mut hasher = Sha256::new();
    hasher.update(slot.to_le_bytes());
    for k in keys {
        hasher.update(k.as_ref());
    }
    let res = hasher.finalize();
    let mut b = [0u8; 16];
    b.copy_from_slice(&res.as_slice()[..16]);
    Block::from(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use scuttlebutt::AesRng;

    #[test]
    fn test_random_oracle() {
        let q = Modulus::from_lg(12);
        let mut rng = AesRng::new();
        let (t, x) = (rng.gen::<u64>(), rng.gen::<u64>());

        let a = random_oracle(t, x, 482, q);
        assert_eq!(a.len(), 482);
        assert!(a.iter().all(|&v| v < 4096));
        assert_eq!(a, random_oracle(t, x, 482, q));
        assert_ne!(a, random_oracle(t, x ^ 1, 482, q));

        // prefix-stable in n
        assert_eq!(&a[..10], random_oracle(t, x, 10, q).as_slice());
    }

    #[test]
    fn test_random_oracle_layout() {
        let q = Modulus::from_lg(16);
        let mut hasher = Sha256::new();
        hasher.update(1u64.to_le_bytes());
        hasher.update(2u64.to_le_bytes());
        hasher.update(0u64.to_le_bytes());
        let res = hasher.finalize();
        let slc = res.as_slice();

        let a = random_oracle(1, 2, 3, q);
        assert_eq!(a[0], (u32::from(slc[0]) << 8) | u32::from(slc[1]));
        assert_eq!(a[2], (u32::from(slc[4]) << 8) | u32::from(slc[5]));
    }

    #[test]
    fn test_combine_keys() {
        let mut rng = AesRng::new();
        let keys = (0..4).map(|_| rng.gen::<Block>()).collect::<Vec<_>>();

        let k = combine_keys(7, &keys);
        assert_eq!(k, combine_keys(7, &keys));
        assert_ne!(k, combine_keys(8, &keys));
        assert_ne!(k, combine_keys(7, &keys[..3]));
    }
}
