///! Country name to ISO 3166-1 alpha-2 code table
///!
///! Keys are the ADIF `COUNTRY` strings as written by common logging
///! programs (DXCC entity names), plus a few everyday spellings.

use std::collections::HashMap;
use std::sync::LazyLock;

static FLAG_CODES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("Albania", "al"),
        ("Armenia", "am"),
        ("Asiatic Russia", "ru"),
        ("Asiatic Turkey", "tr"),
        ("Australia", "au"),
        ("Austria", "at"),
        ("Bahrain", "bh"),
        ("Belarus", "by"),
        ("Belgium", "be"),
        ("Bosnia-Herzegovina", "ba"),
        ("Brazil", "br"),
        ("Brunei Darussalam", "bn"),
        ("Bulgaria", "bg"),
        ("Canary Islands", "es"),
        ("Chile", "cl"),
        ("China", "cn"),
        ("Comoros", "km"),
        ("Crete", "gr"),
        ("Croatia", "hr"),
        ("Cyprus", "cy"),
        ("Czech Republic", "cz"),
        ("Denmark", "dk"),
        ("Dodecanese", "gr"),
        ("England", "gb"),
        ("Estonia", "ee"),
        ("European Russia", "ru"),
        ("Fed. Rep. of Germany", "de"),
        ("Finland", "fi"),
        ("France", "fr"),
        ("Georgia", "ge"),
        ("Greece", "gr"),
        ("Hungary", "hu"),
        ("India", "in"),
        ("Indonesia", "id"),
        ("Iraq", "iq"),
        ("Israel", "il"),
        ("Italy", "it"),
        ("Japan", "jp"),
        ("Jersey", "je"),
        ("Kazakhstan", "kz"),
        ("Kyrgyzstan", "kg"),
        ("Laos", "la"),
        ("Latvia", "lv"),
        ("Lebanon", "lb"),
        ("Lithuania", "lt"),
        ("Madeira Islands", "pt"),
        ("Malawi", "mw"),
        ("Montenegro", "me"),
        ("Namibia", "na"),
        ("Netherlands", "nl"),
        ("Northern Ireland", "gb"),
        ("Norway", "no"),
        ("Pakistan", "pk"),
        ("Poland", "pl"),
        ("Portugal", "pt"),
        ("Puerto Rico", "pr"),
        ("Qatar", "qa"),
        ("Republic of Korea", "kr"),
        ("Romania", "ro"),
        ("Sardinia", "it"),
        ("Saudi Arabia", "sa"),
        ("Scotland", "gb"),
        ("Serbia", "rs"),
        ("Singapore", "sg"),
        ("Slovak Republic", "sk"),
        ("Slovenia", "si"),
        ("South Africa", "za"),
        ("Spain", "es"),
        ("Sri Lanka", "lk"),
        ("Sweden", "se"),
        ("Switzerland", "ch"),
        ("Taiwan", "tw"),
        ("Thailand", "th"),
        ("Ukraine", "ua"),
        ("United Arab Emirates", "ae"),
        ("United States", "us"),
        ("Uzbekistan", "uz"),
        ("Wales", "gb"),
        ("West Malaysia", "my"),
        ("Germany", "de"),
        ("United Kingdom", "gb"),
        ("Russia", "ru"),
        ("Turkey", "tr"),
        ("South Korea", "kr"),
        ("Malaysia", "my"),
    ]
    .into_iter()
    .collect()
});

/// Look up the flag code for an ADIF country name (exact, case-sensitive).
pub fn flag_code(country: &str) -> Option<&'static str> {
    FLAG_CODES.get(country).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dxcc_entities_share_parent_flag() {
        assert_eq!(flag_code("Scotland"), Some("gb"));
        assert_eq!(flag_code("Crete"), Some("gr"));
        assert_eq!(flag_code("Asiatic Russia"), Some("ru"));
    }

    #[test]
    fn test_unknown_country() {
        assert_eq!(flag_code(""), None);
        assert_eq!(flag_code("england"), None);
    }
}
