// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Structural validators for pattern matches.
// A failing validator discards the candidate outright.

/// Luhn checksum over the digits of `value` (13-19 digits)
pub fn is_valid_luhn(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, &digit)| {
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    checksum % 10 == 0
}

/// ISO 13616 mod-97 check
pub fn is_valid_iban(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.len() < 15 || compact.len() > 34 || !compact.is_ascii() {
        return false;
    }

    let (head, tail) = compact.split_at(4);

    // Fold digit by digit so the value never leaves u32 range
    let mut remainder: u32 = 0;
    for c in tail.chars().chain(head.chars()) {
        let n = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            _ => return false,
        };
        remainder = if n >= 10 {
            (remainder * 100 + n) % 97
        } else {
            (remainder * 10 + n) % 97
        };
    }

    remainder == 1
}

/// US SSN: nine digits, excluding reserved and well-known dummy values
pub fn is_valid_ssn(value: &str) -> bool {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != 9 {
        return false;
    }

    if digits == "000000000" || digits == "123456789" {
        return false;
    }

    !(digits.starts_with("000") || digits.starts_with("666") || digits.starts_with('9'))
}

/// ISO 3166-1 alpha-2 codes accepted in the country slot of a BIC
const COUNTRY_CODES: &str = "AD AE AF AG AI AL AM AO AQ AR AS AT AU AW AX AZ BA BB BD BE BF BG BH BI \
BJ BL BM BN BO BQ BR BS BT BV BW BY BZ CA CC CD CF CG CH CI CK CL CM CN CO CR CU CV CW CX CY CZ DE \
DJ DK DM DO DZ EC EE EG EH ER ES ET FI FJ FK FM FO FR GA GB GD GE GF GG GH GI GL GM GN GP GQ GR GS \
GT GU GW GY HK HM HN HR HT HU ID IE IL IM IN IO IQ IR IS IT JE JM JO JP KE KG KH KI KM KN KP KR KW \
KY KZ LA LB LC LI LK LR LS LT LU LV LY MA MC MD ME MF MG MH MK ML MM MN MO MP MQ MR MS MT MU MV MW \
MX MY MZ NA NC NE NF NG NI NL NO NP NR NU NZ OM PA PE PF PG PH PK PL PM PN PR PS PT PW PY QA RE RO \
RS RU RW SA SB SC SD SE SG SH SI SJ SK SL SM SN SO SR SS ST SV SX SY SZ TC TD TF TG TH TJ TK TL TM \
TN TO TR TT TV TW TZ UA UG UM US UY UZ VA VC VE VG VI VN VU WF WS XK YE YT ZA ZM ZW";

/// BIC: 8 or 11 characters with a real country code in positions 5-6
pub fn is_valid_bic(value: &str) -> bool {
    if (value.len() != 8 && value.len() != 11) || !value.is_ascii() {
        return false;
    }
    let country = &value[4..6];
    COUNTRY_CODES.split_whitespace().any(|code| code == country)
}
