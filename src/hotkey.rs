//! The global hotkey: Control+Alt plus one configured letter.

use std::fmt;
use std::str::FromStr;

/// Error returned when the `--hotkey` value is not a single letter between A and Z
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHotkeyError {
    #[error("Please specify the hotkey flag. It was empty.")]
    Empty,
    #[error("Please specify the hotkey flag between A and Z (got '{0}')")]
    OutOfRange(String),
}

/// Control+Alt+`letter`. The letter is always stored upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    letter: char,
}

impl Hotkey {
    pub fn letter(&self) -> char {
        self.letter
    }

    /// Win32 virtual-key code. `VK_A`..`VK_Z` equal the ASCII upper-case letters.
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn virtual_key(&self) -> u32 {
        self.letter() as u32
    }

    /// Key combination in Sway `bindsym` syntax.
    #[cfg_attr(not(unix), allow(dead_code))]
    pub fn sway_binding(&self) -> String {
        format!("Ctrl+Mod1+{}", self.letter().to_ascii_lowercase())
    }
}

impl FromStr for Hotkey {
    type Err = ParseHotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let first = chars.next().ok_or(ParseHotkeyError::Empty)?;

        if chars.next().is_some() || !first.is_ascii_alphabetic() {
            return Err(ParseHotkeyError::OutOfRange(trimmed.to_string()));
        }

        Ok(Hotkey {
            letter: first.to_ascii_uppercase(),
        })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ctrl+Alt+{}", self.letter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercase_letter() {
        let hotkey: Hotkey = "T".parse().unwrap();
        assert_eq!(hotkey.letter(), 'T');
    }

    #[test]
    fn test_parse_normalizes_to_uppercase() {
        let hotkey: Hotkey = "q".parse().unwrap();
        assert_eq!(hotkey.letter(), 'Q');
        assert_eq!(hotkey.to_string(), "Ctrl+Alt+Q");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!("  z ".parse::<Hotkey>().unwrap().letter(), 'Z');
    }

    #[test]
    fn test_parse_empty_is_rejected() {
        assert_eq!("".parse::<Hotkey>(), Err(ParseHotkeyError::Empty));
        assert_eq!("   ".parse::<Hotkey>(), Err(ParseHotkeyError::Empty));
    }

    #[test]
    fn test_parse_out_of_range() {
        for bad in ["1", "@", "[", "é", "ab", "F1"] {
            assert!(
                matches!(bad.parse::<Hotkey>(), Err(ParseHotkeyError::OutOfRange(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_virtual_key_matches_ascii() {
        assert_eq!("a".parse::<Hotkey>().unwrap().virtual_key(), 0x41);
        assert_eq!("Z".parse::<Hotkey>().unwrap().virtual_key(), 0x5A);
    }

    #[test]
    fn test_sway_binding() {
        let hotkey: Hotkey = "T".parse().unwrap();
        assert_eq!(hotkey.sway_binding(), "Ctrl+Mod1+t");
    }
}
