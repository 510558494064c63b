use rand::RngCore;

/// Header a client echoes the `csrf_token` cookie into.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

const TOKEN_BYTES: usize = 32;

/// Fresh anti-forgery token: 32 random bytes, lowercase hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
