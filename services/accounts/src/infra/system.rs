use chrono::{DateTime, Utc};
use rand::RngExt;

use crate::domain::repository::{Clock, CodeGenerator};

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Charset for reset codes: digits only, so codes are easy to type on a phone.
const CHARSET: &[u8] = b"0123456789";

/// Draws each character from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }
}
