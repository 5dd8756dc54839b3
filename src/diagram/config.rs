use super::{Diagram, DiagramError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub enum FilterMode {
    /// Keep only the listed flavour splits.
    #[default]
    Include,
    /// Drop the listed flavour splits.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct FlavourFilter {
    pub splits: Vec<Vec<usize>>,
    pub mode: FilterMode,
}

impl FlavourFilter {
    pub fn include(splits: Vec<Vec<usize>>) -> Self {
        FlavourFilter {
            splits,
            mode: FilterMode::Include,
        }
    }

    pub fn exclude(splits: Vec<Vec<usize>>) -> Self {
        FlavourFilter {
            splits,
            mode: FilterMode::Exclude,
        }
    }
}

/// Everything [`Diagram::generate_with`] needs.
///
/// The default asks for the O(p^2) 4-point diagrams with singlets and without
/// vanishing diagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct GenerationConfig {
    pub order: usize,
    pub n_legs: usize,
    pub singlets: bool,
    pub remove_zero: bool,
    pub flavour_filter: Option<FlavourFilter>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            order: 2,
            n_legs: 4,
            singlets: true,
            remove_zero: true,
            flavour_filter: None,
        }
    }
}

impl GenerationConfig {
    pub fn new(order: usize, n_legs: usize) -> Self {
        GenerationConfig {
            order,
            n_legs,
            ..Default::default()
        }
    }

    pub fn singlets(mut self, singlets: bool) -> Self {
        self.singlets = singlets;
        self
    }

    pub fn remove_zero(mut self, remove_zero: bool) -> Self {
        self.remove_zero = remove_zero;
        self
    }

    pub fn flavour_filter(mut self, filter: FlavourFilter) -> Self {
        self.flavour_filter = Some(filter);
        self
    }

    pub fn validate(&self) -> Result<(), DiagramError> {
        Diagram::check_input(self.order, self.n_legs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = GenerationConfig::new(4, 6)
            .singlets(false)
            .flavour_filter(FlavourFilter::exclude(vec![vec![3, 3]]));
        assert_eq!(config.order, 4);
        assert!(!config.singlets);
        assert!(config.remove_zero);
        assert_eq!(
            config.flavour_filter.as_ref().map(|f| f.mode),
            Some(FilterMode::Exclude)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert_eq!(GenerationConfig::default().validate(), Ok(()));
        assert_eq!(
            GenerationConfig::new(2, 5).validate(),
            Err(DiagramError::InvalidLegCount(5))
        );
        assert_eq!(
            GenerationConfig::new(3, 4).validate(),
            Err(DiagramError::InvalidOrder(3))
        );
        assert_eq!(
            GenerationConfig::new(2, 66).validate(),
            Err(DiagramError::TooManyLegs(66))
        );
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_round_trip() {
        let config = GenerationConfig::new(6, 8).flavour_filter(FlavourFilter::include(vec![vec![8]]));
        let bytes = bincode::encode_to_vec(&config, bincode::config::standard()).unwrap();
        let (decoded, _): (GenerationConfig, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(decoded, config);
    }
}
