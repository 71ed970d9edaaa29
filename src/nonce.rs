use rand::{distr::Alphanumeric, Rng};

/// Length of the CSRF `state` sent with authorization requests.
pub const STATE_LENGTH: usize = 16;

/// Generates a random alphanumeric string of `length` characters.
///
/// Draws from the thread-local generator, which is cryptographically secure
/// and therefore suitable for CSRF state tokens.
#[must_use]
pub fn generate(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a CSRF state token for an authorization request.
#[must_use]
pub fn generate_state() -> String {
    generate(STATE_LENGTH)
}
