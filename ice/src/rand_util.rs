use rand::Rng;

const RUNES_ALPHA_NUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the generated username fragment and password; both stay
/// fixed for the lifetime of a socket.
pub const CREDENTIAL_LEN: usize = 20;

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..RUNES_ALPHA_NUMERIC.len());
            RUNES_ALPHA_NUMERIC[idx] as char
        })
        .collect()
}

/// Random 20-character username fragment.
pub fn generate_ufrag() -> String {
    random_string(CREDENTIAL_LEN)
}

/// Random 20-character password.
pub fn generate_pwd() -> String {
    random_string(CREDENTIAL_LEN)
}

/// Random 64-bit role tie-breaker.
pub fn generate_tie_breaker() -> u64 {
    rand::thread_rng().gen()
}
