//! MAC address and SSID validation.
//!
//! Everything read from ignore lists and capture databases passes through
//! these checks before it is trusted.

use regex::Regex;
use std::sync::LazyLock;

/// Longest textual MAC address (`AA:BB:CC:DD:EE:FF`).
pub const MAX_MAC_LEN: usize = 17;

/// Longest SSID allowed by 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Characters rejected in SSIDs.
pub const FORBIDDEN_SSID_CHARS: &[char] = &[
    '<', '>', '"', '\'', '&', ';', '|', '`', '$', '(', ')', '{', '}', '[', ']',
];

static MAC_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").ok());

/// Returns true if `mac` is a colon- or dash-separated 48-bit address.
#[must_use]
pub fn is_valid_mac(mac: &str) -> bool {
    if mac.len() > MAX_MAC_LEN {
        return false;
    }
    MAC_RE.as_ref().is_some_and(|re| re.is_match(mac))
}

/// Returns true if `ssid` is a plausible, printable network name.
#[must_use]
pub fn is_valid_ssid(ssid: &str) -> bool {
    let len = ssid.chars().count();
    if len == 0 || len > MAX_SSID_LEN {
        return false;
    }
    if ssid
        .chars()
        .any(|c| u32::from(c) < 0x20 && !matches!(c, '\t' | '\n' | '\r'))
    {
        return false;
    }
    if ssid.contains(FORBIDDEN_SSID_CHARS) {
        tracing::warn!(ssid, "SSID contains forbidden characters");
        return false;
    }
    true
}

/// Canonical form used for set membership.
#[must_use]
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("AA:BB:CC:DD:EE:FF", true ; "upper colon")]
    #[test_case("aa:bb:cc:dd:ee:ff", true ; "lower colon")]
    #[test_case("aa-bb-cc-dd-ee-ff", true ; "dashes")]
    #[test_case("AA:BB:CC:DD:EE", false ; "too short")]
    #[test_case("AA:BB:CC:DD:EE:FF:00", false ; "too long")]
    #[test_case("GG:BB:CC:DD:EE:FF", false ; "non hex")]
    #[test_case("AABBCCDDEEFF", false ; "no separators")]
    #[test_case("", false ; "empty")]
    fn test_mac_validation(mac: &str, expected: bool) {
        assert_eq!(is_valid_mac(mac), expected);
    }

    #[test_case("HomeNet", true ; "plain")]
    #[test_case("Cafe Wi-Fi 5G", true ; "spaces and dashes")]
    #[test_case("", false ; "empty")]
    #[test_case("this-ssid-is-way-too-long-for-802-11", false ; "too long")]
    #[test_case("bad<ssid>", false ; "angle brackets")]
    #[test_case("drop;table", false ; "semicolon")]
    #[test_case("nul\0byte", false ; "nul")]
    #[test_case("bell\u{7}", false ; "control char")]
    #[test_case("tab\there", true ; "tab allowed")]
    #[test_case("del\u{7f}", true ; "del allowed")]
    #[test_case("c1\u{85}", true ; "c1 control allowed")]
    fn test_ssid_validation(ssid: &str, expected: bool) {
        assert_eq!(is_valid_ssid(ssid), expected);
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac(" aa:bb:cc:dd:ee:ff "), "AA:BB:CC:DD:EE:FF");
    }

    proptest! {
        #[test]
        fn prop_generated_macs_are_valid(bytes in proptest::array::uniform6(any::<u8>())) {
            let mac = bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":");
            prop_assert!(is_valid_mac(&mac));
            prop_assert!(is_valid_mac(&normalize_mac(&mac)));
        }

        #[test]
        fn prop_alphanumeric_ssids_are_valid(ssid in "[A-Za-z0-9 _-]{1,32}") {
            prop_assert!(is_valid_ssid(&ssid));
        }
    }
}
