use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Whether member paths are validated before extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// Validate every member path, then extract.
    #[default]
    Safe,
    /// Extract without validation; the caller accepts zip-slip risk.
    Insecure,
}

impl ExtractMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Insecure => "insecure",
        }
    }
}

impl FromStr for ExtractMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(Self::Safe),
            "insecure" => Ok(Self::Insecure),
            other => Err(Error::InvalidExtractionMode(other.to_string())),
        }
    }
}

impl fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub mode: ExtractMode,
    pub overwrite: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Safe,
            overwrite: true,
        }
    }
}

impl ExtractOptions {
    pub fn mode(mut self, mode: ExtractMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the mode from its textual name, rejecting anything but
    /// `"safe"` and `"insecure"`.
    pub fn method(self, name: &str) -> Result<Self, Error> {
        Ok(self.mode(name.parse()?))
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_options_default() {
        let options = ExtractOptions::default();
        assert_eq!(options.mode, ExtractMode::Safe);
        assert!(options.overwrite);
    }

    #[test]
    fn extraction_options_builder_pattern() {
        let options = ExtractOptions::default()
            .mode(ExtractMode::Insecure)
            .overwrite(false);
        assert_eq!(options.mode, ExtractMode::Insecure);
        assert!(!options.overwrite);
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [ExtractMode::Safe, ExtractMode::Insecure] {
            assert_eq!(mode.to_string().parse::<ExtractMode>().unwrap(), mode);
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(matches!(
            "foobar".parse::<ExtractMode>(),
            Err(Error::InvalidExtractionMode(m)) if m == "foobar"
        ));
        assert!(ExtractOptions::default().method("SAFE").is_err());
        assert_eq!(
            ExtractOptions::default().method("insecure").unwrap().mode,
            ExtractMode::Insecure
        );
    }
}
