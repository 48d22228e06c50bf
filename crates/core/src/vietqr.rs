//! VietQR bank-transfer payload encoding.
//!
//! VietQR codes are EMVCo merchant-presented QR payloads routed over the NAPAS 247
//! interbank network. A payload is a flat sequence of TLV fields
//! (`tag: 2 digits`, `length: 2 digits`, `value`) terminated by a CRC field:
//!
//! ```text
//! 00 02 01                      payload format indicator
//! 01 02 12                      point of initiation (11 static, 12 dynamic)
//! 38 .. ┬ 00 10 A000000727      NAPAS GUID
//!       ├ 01 .. ┬ 00 06 <bin>   beneficiary bank BIN
//!       │       └ 01 .. <acct>  beneficiary account
//!       └ 02 08 QRIBFTTA        transfer-to-account service
//! 53 03 704                     currency (VND)
//! 54 .. <amount>                transaction amount (dynamic codes only)
//! 58 02 VN                      country
//! 62 .. └ 08 .. <purpose>       additional data: purpose of transaction
//! 63 04 <crc>                   CRC-16/CCITT-FALSE over everything before, including "6304"
//! ```

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use url::Url;

/// NAPAS application identifier.
const NAPAS_GUID: &str = "A000000727";
/// Service code for transfers to a bank account.
const SERVICE_TO_ACCOUNT: &str = "QRIBFTTA";
/// ISO 4217 numeric code for VND.
const CURRENCY_VND: &str = "704";
/// Longest purpose string banks reliably carry through.
pub const MAX_PURPOSE_LENGTH: usize = 25;
/// Longest account number accepted by NAPAS.
const MAX_ACCOUNT_LENGTH: usize = 19;
/// Base URL of the public VietQR image renderer.
const QUICK_LINK_BASE: &str = "https://img.vietqr.io/image/";

/// Errors produced while building a VietQR payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VietQrError {
    /// Bank BIN must be exactly six digits.
    #[error("bank BIN must be 6 digits: {0}")]
    InvalidBankBin(String),
    /// Account number must be 1-19 ASCII letters or digits.
    #[error("account number must be 1-{MAX_ACCOUNT_LENGTH} letters or digits")]
    InvalidAccountNumber,
    /// Amount must be positive.
    #[error("amount must be positive (got {0})")]
    InvalidAmount(i64),
    /// Purpose contains characters banks strip or is too long.
    #[error("purpose must be at most {MAX_PURPOSE_LENGTH} ASCII letters, digits or spaces")]
    InvalidPurpose,
    /// A field value exceeds the two-digit TLV length.
    #[error("field {tag} is too long ({len} characters)")]
    FieldTooLong {
        /// TLV tag.
        tag: &'static str,
        /// Value length.
        len: usize,
    },
}

/// A bank-transfer request to encode as a VietQR payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VietQr {
    /// Six-digit NAPAS bank identification number (e.g. `970436` for Vietcombank).
    pub bank_bin: String,
    /// Beneficiary account number.
    pub account_number: String,
    /// Amount in dong. `None` produces a static code where the payer enters the amount.
    pub amount: Option<i64>,
    /// Transfer purpose, copied into the bank statement.
    pub purpose: String,
}

impl VietQr {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), VietQrError> {
        if self.bank_bin.len() != 6 || !self.bank_bin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VietQrError::InvalidBankBin(self.bank_bin.clone()));
        }
        if self.account_number.is_empty()
            || self.account_number.len() > MAX_ACCOUNT_LENGTH
            || !self.account_number.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(VietQrError::InvalidAccountNumber);
        }
        if let Some(amount) = self.amount.filter(|amount| *amount <= 0) {
            return Err(VietQrError::InvalidAmount(amount));
        }
        if self.purpose.len() > MAX_PURPOSE_LENGTH
            || !self
                .purpose
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b' ')
        {
            return Err(VietQrError::InvalidPurpose);
        }
        Ok(())
    }

    /// Encode the request as an EMVCo payload string, CRC included.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any field is invalid.
    pub fn encode(&self) -> Result<String, VietQrError> {
        self.validate()?;

        let beneficiary = tlv("00", &self.bank_bin)? + &tlv("01", &self.account_number)?;
        let merchant = tlv("00", NAPAS_GUID)?
            + &tlv("01", &beneficiary)?
            + &tlv("02", SERVICE_TO_ACCOUNT)?;

        let mut payload = tlv("00", "01")?;
        payload += &tlv("01", if self.amount.is_some() { "12" } else { "11" })?;
        payload += &tlv("38", &merchant)?;
        payload += &tlv("53", CURRENCY_VND)?;
        if let Some(amount) = self.amount {
            payload += &tlv("54", &amount.to_string())?;
        }
        payload += &tlv("58", "VN")?;
        if !self.purpose.is_empty() {
            payload += &tlv("62", &tlv("08", &self.purpose)?)?;
        }

        payload.push_str("6304");
        let crc = crc16_ccitt(payload.as_bytes());
        let _ = write!(payload, "{crc:04X}");
        Ok(payload)
    }
}

/// Encode one TLV field.
fn tlv(tag: &'static str, value: &str) -> Result<String, VietQrError> {
    let len = value.len();
    if len > 99 {
        return Err(VietQrError::FieldTooLong { tag, len });
    }
    Ok(format!("{tag}{len:02}{value}"))
}

/// CRC-16/CCITT-FALSE (poly `0x1021`, init `0xFFFF`, no reflection, no final xor).
#[must_use]
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 == 0 {
                crc << 1
            } else {
                (crc << 1) ^ 0x1021
            };
        }
    }
    crc
}

/// Build the transfer purpose for a payment reference.
///
/// The result is uppercase ASCII alphanumerics separated by one space, at most
/// [`MAX_PURPOSE_LENGTH`] characters. The reference is never truncated; the prefix is
/// shortened instead.
#[must_use]
pub fn transfer_content(prefix: &str, reference: &str) -> String {
    let reference = normalize(reference);
    let prefix = normalize(prefix);

    let room = MAX_PURPOSE_LENGTH.saturating_sub(reference.len() + 1);
    let prefix: String = prefix.chars().take(room).collect();

    if prefix.is_empty() {
        reference.chars().take(MAX_PURPOSE_LENGTH).collect()
    } else {
        format!("{prefix} {reference}")
    }
}

/// Whether a bank statement line mentions `reference`.
///
/// Banks uppercase, insert separators and prepend their own transaction codes, so both
/// sides are reduced to uppercase alphanumerics before searching.
#[must_use]
pub fn content_matches(content: &str, reference: &str) -> bool {
    let reference = normalize(reference);
    !reference.is_empty() && normalize(content).contains(&reference)
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Parameters for a rendered QR image link.
#[derive(Debug, Clone, Copy)]
pub struct QuickLink<'a> {
    /// Bank short code or BIN (e.g. `vcb` or `970436`).
    pub bank: &'a str,
    /// Beneficiary account number.
    pub account_number: &'a str,
    /// Image template (`compact`, `compact2`, `qr_only`, `print`).
    pub template: &'a str,
    /// Amount in dong.
    pub amount: Option<i64>,
    /// Transfer purpose.
    pub purpose: &'a str,
    /// Beneficiary name shown under the code.
    pub account_name: Option<&'a str>,
}

impl QuickLink<'_> {
    /// Build the image URL.
    ///
    /// # Errors
    ///
    /// Returns [`VietQrError::InvalidAccountNumber`] if the bank, account or template
    /// contain characters that cannot appear in the path.
    pub fn url(&self) -> Result<Url, VietQrError> {
        let path_safe = |s: &str| {
            !s.is_empty()
                && s
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        };
        if !path_safe(self.bank) || !path_safe(self.account_number) || !path_safe(self.template)
        {
            return Err(VietQrError::InvalidAccountNumber);
        }

        let mut url = Url::parse(&format!(
            "{QUICK_LINK_BASE}{}-{}-{}.png",
            self.bank, self.account_number, self.template
        ))
        .map_err(|_| VietQrError::InvalidAccountNumber)?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(amount) = self.amount {
                query.append_pair("amount", &amount.to_string());
            }
            if !self.purpose.is_empty() {
                query.append_pair("addInfo", self.purpose);
            }
            if let Some(name) = self.account_name {
                query.append_pair("accountName", name);
            }
        }

        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> VietQr {
        VietQr {
            bank_bin: "970436".to_owned(),
            account_number: "0011001234567".to_owned(),
            amount: Some(150_000),
            purpose: "BARBERLY K7Q2M9XA".to_owned(),
        }
    }

    #[test]
    fn test_crc_check_value() {
        // Standard check value for CRC-16/CCITT-FALSE.
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
        assert_eq!(crc16_ccitt(b""), 0xFFFF);
    }

    #[test]
    fn test_encode_layout() {
        let payload = request().encode().unwrap();

        assert!(payload.starts_with("000201010212"));
        assert!(payload.contains(
            "38570010A00000072701270006970436011300110012345670208QRIBFTTA"
        ));
        assert!(payload.contains("5303704"));
        assert!(payload.contains("5406150000"));
        assert!(payload.contains("5802VN"));
        assert!(payload.contains("62210817BARBERLY K7Q2M9XA"));

        let (body, crc) = payload.split_at(payload.len() - 4);
        assert!(body.ends_with("6304"));
        assert_eq!(crc, format!("{:04X}", crc16_ccitt(body.as_bytes())));
    }

    #[test]
    fn test_encode_static_without_amount() {
        let mut req = request();
        req.amount = None;
        let payload = req.encode().unwrap();
        assert!(payload.starts_with("000201010211"));
        assert!(!payload.contains("5406"));
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut req = request();
        req.bank_bin = "97043".to_owned();
        assert!(matches!(req.encode(), Err(VietQrError::InvalidBankBin(_))));

        let mut req = request();
        req.account_number = "0011-00".to_owned();
        assert_eq!(req.encode(), Err(VietQrError::InvalidAccountNumber));

        let mut req = request();
        req.amount = Some(0);
        assert_eq!(req.encode(), Err(VietQrError::InvalidAmount(0)));

        let mut req = request();
        req.purpose = "Cắt tóc".to_owned();
        assert_eq!(req.encode(), Err(VietQrError::InvalidPurpose));

        let mut req = request();
        req.purpose = "X".repeat(MAX_PURPOSE_LENGTH + 1);
        assert_eq!(req.encode(), Err(VietQrError::InvalidPurpose));
    }

    #[test]
    fn test_transfer_content_keeps_reference() {
        assert_eq!(transfer_content("Barberly", "k7q2m9xa"), "BARBERLY K7Q2M9XA");
        assert_eq!(transfer_content("", "K7Q2M9XA"), "K7Q2M9XA");

        let long = transfer_content("A very long salon prefix name", "K7Q2M9XA");
        assert!(long.len() <= MAX_PURPOSE_LENGTH);
        assert!(long.ends_with(" K7Q2M9XA"));
    }

    #[test]
    fn test_content_matches_bank_mangling() {
        assert!(content_matches(
            "MBVCB.123456.BARBERLY-K7Q2 M9XA.CT tu 0011001234567",
            "K7Q2M9XA"
        ));
        assert!(content_matches("barberly k7q2m9xa", "K7Q2M9XA"));
        assert!(!content_matches("BARBERLY K7Q2M9XB", "K7Q2M9XA"));
        assert!(!content_matches("anything", ""));
    }

    #[test]
    fn test_quick_link() {
        let link = QuickLink {
            bank: "970436",
            account_number: "0011001234567",
            template: "compact2",
            amount: Some(150_000),
            purpose: "BARBERLY K7Q2M9XA",
            account_name: Some("NGUYEN VAN A"),
        };
        let url = link.url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://img.vietqr.io/image/970436-0011001234567-compact2.png?amount=150000&addInfo=BARBERLY+K7Q2M9XA&accountName=NGUYEN+VAN+A"
        );
    }

    #[test]
    fn test_quick_link_rejects_path_injection() {
        let link = QuickLink {
            bank: "970436/../x",
            account_number: "1",
            template: "compact",
            amount: None,
            purpose: "",
            account_name: None,
        };
        assert!(link.url().is_err());
    }
}
