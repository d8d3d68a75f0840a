//! Pickup verification codes.

use rand::Rng;

pub const OTP_LEN: usize = 4;

pub fn is_valid_otp(value: &str) -> bool {
    value.len() == OTP_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Derive the rider's pickup code: the last four characters of the customer
/// id when those are digits, otherwise a random code in `1000..=9999`.
pub fn generate_otp<R: Rng + ?Sized>(customer_id: Option<&str>, rng: &mut R) -> String {
    if let Some(id) = customer_id {
        let chars: Vec<char> = id.chars().collect();
        if chars.len() >= OTP_LEN {
            let tail: String = chars[chars.len() - OTP_LEN..].iter().collect();
            if is_valid_otp(&tail) {
                return tail;
            }
        }
    }
    rng.gen_range(1000..=9999).to_string()
}
