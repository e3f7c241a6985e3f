//! Model formulas: the terms entering the linear predictor

use serde::{Deserialize, Serialize};

use crate::dataset::data::{Covariate, Dimension};
use crate::model::ModelError;

/// Terms of a frequency model.
///
/// Every model carries an intercept. Factors contribute dummy-coded levels
/// against their first level; covariates enter centered on their portfolio
/// mean. Exposure is an offset, never a term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub factors: Vec<Dimension>,
    pub covariates: Vec<Covariate>,
}

impl Formula {
    /// Parse a `+`-separated term list, e.g. `area+veh_gas+log_density`.
    /// `1`, an empty string, or lone whitespace gives an intercept-only
    /// model. Factor terms use dimension names (`bonus_malus` is the banded
    /// factor); `bonus_malus_level` selects the continuous covariate.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let mut formula = Formula::default();
        for term in text.split('+') {
            let term = term.trim();
            if term.is_empty() || term == "1" {
                continue;
            }
            if let Some(dimension) = Dimension::from_name(term) {
                if formula.factors.contains(&dimension) {
                    return Err(ModelError::InvalidConfig {
                        message: format!("duplicate formula term {term}"),
                    });
                }
                formula.factors.push(dimension);
            } else if let Some(covariate) = Covariate::from_name(term) {
                if formula.covariates.contains(&covariate) {
                    return Err(ModelError::InvalidConfig {
                        message: format!("duplicate formula term {term}"),
                    });
                }
                formula.covariates.push(covariate);
            } else {
                return Err(ModelError::InvalidConfig {
                    message: format!("unknown formula term {term}"),
                });
            }
        }
        Ok(formula)
    }

    pub fn is_intercept_only(&self) -> bool {
        self.factors.is_empty() && self.covariates.is_empty()
    }

    /// Human-readable term list for logs and fit reports
    pub fn label(&self) -> String {
        if self.is_intercept_only() {
            return "1".to_string();
        }
        let terms: Vec<&str> = self
            .factors
            .iter()
            .map(|f| f.name())
            .chain(self.covariates.iter().map(|c| c.name()))
            .collect();
        terms.join(" + ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_factors_and_covariates() {
        let formula = Formula::parse("area + veh_gas + log_density").unwrap();
        assert_eq!(formula.factors, vec![Dimension::Area, Dimension::VehGas]);
        assert_eq!(formula.covariates, vec![Covariate::LogDensity]);
    }

    #[test]
    fn test_parse_intercept_only() {
        assert!(Formula::parse("1").unwrap().is_intercept_only());
        assert!(Formula::parse("").unwrap().is_intercept_only());
        assert!(Formula::parse("  ").unwrap().is_intercept_only());
    }

    #[test]
    fn test_bonus_malus_band_and_level_are_distinct() {
        let banded = Formula::parse("bonus_malus").unwrap();
        assert_eq!(banded.factors, vec![Dimension::BonusMalus]);
        assert!(banded.covariates.is_empty());

        let continuous = Formula::parse("bonus_malus_level").unwrap();
        assert!(continuous.factors.is_empty());
        assert_eq!(continuous.covariates, vec![Covariate::BonusMalus]);
    }

    #[test]
    fn test_duplicate_term_rejected() {
        let err = Formula::parse("area+area").unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
    }

    #[test]
    fn test_unknown_term_rejected() {
        let err = Formula::parse("area+horsepower").unwrap_err();
        match err {
            ModelError::InvalidConfig { message } => assert!(message.contains("horsepower")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_label() {
        let formula = Formula::parse("driv_age+bonus_malus_level").unwrap();
        assert_eq!(formula.label(), "driv_age + bonus_malus_level");
        assert_eq!(Formula::default().label(), "1");
    }
}
