//! Client-affinity hashing strategy.
//!
//! The client key is hashed with 32-bit FNV-1a and reduced modulo the size of
//! the *healthy* set. When that size changes most clients move to a different
//! backend; there is no consistent-hash ring.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Index into a healthy sequence of length `len` for `client_key`.
pub fn index_for(client_key: &str, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(fnv1a_32(client_key.as_bytes()) as usize % len)
}
