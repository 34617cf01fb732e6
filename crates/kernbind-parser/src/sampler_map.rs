//! Literal sampler map files.
//!
//! One entry per line, or several separated by commas. An entry is a
//! `|`-joined list of OpenCL sampler flags or integers:
//!
//! ```text
//! // address mode, coordinates, filter
//! CLK_ADDRESS_CLAMP_TO_EDGE|CLK_NORMALIZED_COORDS_FALSE|CLK_FILTER_NEAREST
//! CLK_ADDRESS_REPEAT|CLK_FILTER_LINEAR, 0x12
//! ```

use kernbind_opt::{SamplerMap, SamplerMapEntry};

use crate::ParseError;

/// Value of one OpenCL sampler flag name or integer literal.
pub fn sampler_flag_value(flag: &str) -> Option<u32> {
    Some(match flag {
        "CLK_NORMALIZED_COORDS_FALSE" => 0x00,
        "CLK_NORMALIZED_COORDS_TRUE" => 0x01,
        "CLK_ADDRESS_NONE" => 0x00,
        "CLK_ADDRESS_CLAMP_TO_EDGE" => 0x02,
        "CLK_ADDRESS_CLAMP" => 0x04,
        "CLK_ADDRESS_REPEAT" => 0x06,
        "CLK_ADDRESS_MIRRORED_REPEAT" => 0x08,
        "CLK_FILTER_NEAREST" => 0x10,
        "CLK_FILTER_LINEAR" => 0x20,
        _ => {
            return match flag.strip_prefix("0x").or_else(|| flag.strip_prefix("0X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => flag.parse().ok(),
            };
        }
    })
}

/// Parses a sampler map file. Entry order and duplicates are kept.
pub fn parse_sampler_map(source: &str) -> Result<SamplerMap, ParseError> {
    let mut map = SamplerMap::new();
    for (index, raw) in source.lines().enumerate() {
        let content = match raw.find("//") {
            Some(comment) => &raw[..comment],
            None => raw,
        };
        for entry in content.split(',') {
            let expression = entry.trim();
            if expression.is_empty() {
                continue;
            }
            let mut value = 0;
            for flag in expression.split('|').map(str::trim) {
                value |= sampler_flag_value(flag).ok_or_else(|| ParseError::UnknownSamplerFlag {
                    line: index + 1,
                    flag: flag.to_string(),
                })?;
            }
            map.push(SamplerMapEntry {
                value,
                expression: expression.to_string(),
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_or_ed() {
        let map = parse_sampler_map(
            "// samplers\n\
             CLK_ADDRESS_CLAMP_TO_EDGE | CLK_NORMALIZED_COORDS_TRUE | CLK_FILTER_LINEAR\n\
             \n\
             CLK_ADDRESS_REPEAT|CLK_FILTER_NEAREST, 0x14 // trailing\n",
        )
        .unwrap();
        let values: Vec<_> = map.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0x23, 0x16, 0x14]);
        assert_eq!(
            map.entries()[0].expression,
            "CLK_ADDRESS_CLAMP_TO_EDGE | CLK_NORMALIZED_COORDS_TRUE | CLK_FILTER_LINEAR"
        );
    }

    #[test]
    fn duplicates_kept_in_order() {
        let map = parse_sampler_map("5\n7\n5").unwrap();
        let values: Vec<_> = map.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![5, 7, 5]);
    }

    #[test]
    fn empty_input_is_empty_map() {
        assert!(parse_sampler_map("// nothing\n\n").unwrap().is_empty());
    }

    #[test]
    fn unknown_flag_reports_line() {
        let err = parse_sampler_map("CLK_FILTER_LINEAR\nCLK_FILTER_CUBIC").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownSamplerFlag { line: 2, ref flag } if flag == "CLK_FILTER_CUBIC"
        ));
        assert!(parse_sampler_map("CLK_FILTER_LINEAR||").is_err());
    }
}
