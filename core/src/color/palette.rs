//! Fixed catalog of color scales offered to the heatmap.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::prelude::StageError;

/// An ordered set of sRGB stops, low values first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: PaletteName,
    pub stops: &'static [[u8; 3]],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteName {
    Viridis,
    #[default]
    Plasma,
    Inferno,
    Magma,
    Bluered,
    Coolwarm,
}

const VIRIDIS: [[u8; 3]; 10] = [
    [0x44, 0x01, 0x54],
    [0x48, 0x28, 0x78],
    [0x3e, 0x49, 0x89],
    [0x31, 0x68, 0x8e],
    [0x26, 0x82, 0x8e],
    [0x1f, 0x9e, 0x89],
    [0x35, 0xb7, 0x79],
    [0x6e, 0xce, 0x58],
    [0xb5, 0xde, 0x2b],
    [0xfd, 0xe7, 0x25],
];

const PLASMA: [[u8; 3]; 10] = [
    [0x0d, 0x08, 0x87],
    [0x46, 0x03, 0x9f],
    [0x72, 0x01, 0xa8],
    [0x9c, 0x17, 0x9e],
    [0xbd, 0x37, 0x86],
    [0xd8, 0x57, 0x6b],
    [0xed, 0x79, 0x53],
    [0xfb, 0x9f, 0x3a],
    [0xfd, 0xca, 0x26],
    [0xf0, 0xf9, 0x21],
];

const INFERNO: [[u8; 3]; 10] = [
    [0x00, 0x00, 0x04],
    [0x1b, 0x0c, 0x41],
    [0x4a, 0x0c, 0x6b],
    [0x78, 0x1c, 0x6d],
    [0xa5, 0x2c, 0x60],
    [0xcf, 0x44, 0x46],
    [0xed, 0x69, 0x25],
    [0xfb, 0x9b, 0x06],
    [0xf7, 0xd1, 0x3d],
    [0xfc, 0xff, 0xa4],
];

const MAGMA: [[u8; 3]; 10] = [
    [0x00, 0x00, 0x04],
    [0x18, 0x0f, 0x3d],
    [0x44, 0x0f, 0x76],
    [0x72, 0x1f, 0x81],
    [0x9e, 0x2f, 0x7f],
    [0xcd, 0x40, 0x71],
    [0xf1, 0x60, 0x5d],
    [0xfd, 0x96, 0x68],
    [0xfe, 0xca, 0x8d],
    [0xfc, 0xfd, 0xbf],
];

const BLUERED: [[u8; 3]; 2] = [[0x00, 0x00, 0xff], [0xff, 0x00, 0x00]];

const COOLWARM: [[u8; 3]; 7] = [
    [0x3b, 0x4c, 0xc0],
    [0x70, 0x92, 0xf3],
    [0xaa, 0xc7, 0xfd],
    [0xdd, 0xdd, 0xdd],
    [0xf7, 0xb8, 0x9c],
    [0xe7, 0x74, 0x5b],
    [0xb4, 0x04, 0x26],
];

impl PaletteName {
    pub const ALL: [PaletteName; 6] = [
        PaletteName::Viridis,
        PaletteName::Plasma,
        PaletteName::Inferno,
        PaletteName::Magma,
        PaletteName::Bluered,
        PaletteName::Coolwarm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaletteName::Viridis => "viridis",
            PaletteName::Plasma => "plasma",
            PaletteName::Inferno => "inferno",
            PaletteName::Magma => "magma",
            PaletteName::Bluered => "bluered",
            PaletteName::Coolwarm => "coolwarm",
        }
    }

    pub fn palette(&self) -> Palette {
        let stops: &'static [[u8; 3]] = match self {
            PaletteName::Viridis => &VIRIDIS,
            PaletteName::Plasma => &PLASMA,
            PaletteName::Inferno => &INFERNO,
            PaletteName::Magma => &MAGMA,
            PaletteName::Bluered => &BLUERED,
            PaletteName::Coolwarm => &COOLWARM,
        };
        Palette { name: *self, stops }
    }
}

impl fmt::Display for PaletteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaletteName {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PaletteName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StageError::InvalidInput(format!("unknown palette '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_palette_has_at_least_two_stops() {
        for name in PaletteName::ALL {
            assert!(name.palette().stops.len() >= 2, "{} too short", name);
        }
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("Viridis".parse::<PaletteName>().unwrap(), PaletteName::Viridis);
        assert_eq!(" BLUERED ".parse::<PaletteName>().unwrap(), PaletteName::Bluered);
        assert!("rainbow".parse::<PaletteName>().is_err());
    }
}
