//! Liquid subtype translation
//!
//! The server and the editor number liquid varieties differently; the
//! bridge is a fixed table. Codes outside the table pass through.

/// Translate a server liquid code to the editor's numbering.
pub fn translate_liquid(server_code: u8) -> u8 {
    match server_code {
        0 => 0,
        1 => 1,   // water
        2 => 15,  // wine
        3 => 3,   // beer
        4 => 19,  // mud
        5 => 2,   // blood
        6 => 4,   // slime
        7 => 11,  // oil
        8 => 13,  // urine
        9 => 6,   // milk
        10 => 7,  // manafluid
        11 => 10, // lifefluid
        12 => 5,  // lemonade
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn milk_is_six() {
        assert_eq!(translate_liquid(9), 6);
    }

    #[test]
    fn injective_on_defined_codes() {
        let mapped: HashSet<u8> = (0..13).map(translate_liquid).collect();
        assert_eq!(mapped.len(), 13);
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(translate_liquid(13), 13);
        assert_eq!(translate_liquid(200), 200);
    }
}
