//! NPI and TIN validation
//!
//! An NPI is valid when it is exactly 10 ASCII digits and passes the Luhn
//! mod-10 check over the card-issuer-prefixed form `80840 || npi`.

/// CMS-assigned issuer prefix for NPI check-digit computation.
const NPI_PREFIX: &str = "80840";

/// Whether `npi` is 10 ASCII digits and Luhn-valid.
pub fn is_valid_npi(npi: &str) -> bool {
    npi.len() == 10 && npi.bytes().all(|b| b.is_ascii_digit()) && luhn_valid(npi)
}

fn luhn_valid(npi: &str) -> bool {
    let mut sum = 0u32;
    let digits = NPI_PREFIX.bytes().chain(npi.bytes()).map(|b| (b - b'0') as u32);
    // Rightmost digit is the check digit; every second digit left of it doubles.
    let collected: Vec<u32> = digits.collect();
    for (i, &d) in collected.iter().rev().enumerate() {
        if i % 2 == 1 {
            let doubled = d * 2;
            sum += if doubled > 9 { doubled - 9 } else { doubled };
        } else {
            sum += d;
        }
    }
    sum % 10 == 0
}

/// Whether `tin` looks like a taxpayer identification number: nine digits,
/// optionally hyphenated as `NN-NNNNNNN`.
pub fn is_valid_tin(tin: &str) -> bool {
    let bytes = tin.as_bytes();
    match bytes.len() {
        9 => bytes.iter().all(|b| b.is_ascii_digit()),
        10 => {
            bytes[2] == b'-'
                && bytes[..2].iter().all(|b| b.is_ascii_digit())
                && bytes[3..].iter().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}
