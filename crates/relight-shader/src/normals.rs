use std::fmt;

/// Normal-map preview mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NormalsMode {
    /// Regular relighting.
    #[default]
    Off,
    /// Normals encoded as `(n + 1) / 2` colors.
    Tangent,
    /// Normals lit by the current light, shown in grey.
    Lit,
}

impl NormalsMode {
    /// Every mode, in cycling order.
    pub const ALL: [Self; 3] = [Self::Off, Self::Tangent, Self::Lit];

    /// Mode from its numeric code (`0`, `1`, `2`); other values disable it.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Tangent,
            2 => Self::Lit,
            _ => Self::Off,
        }
    }

    /// Numeric code of the mode.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Tangent => 1,
            Self::Lit => 2,
        }
    }

    /// The next mode in `off → tangent → lit → off` order.
    #[must_use]
    pub fn cycle(self) -> Self {
        Self::from_code((self.code() + 1) % 3)
    }

    /// Whether calibration bases are needed.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

impl fmt::Display for NormalsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Tangent => "tangent",
            Self::Lit => "lit",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(NormalsMode::Off.cycle(), NormalsMode::Tangent);
        assert_eq!(NormalsMode::Tangent.cycle(), NormalsMode::Lit);
        assert_eq!(NormalsMode::Lit.cycle(), NormalsMode::Off);
    }

    #[test]
    fn test_codes() {
        for mode in NormalsMode::ALL {
            assert_eq!(NormalsMode::from_code(mode.code()), mode);
        }
        assert_eq!(NormalsMode::from_code(7), NormalsMode::Off);
    }
}
