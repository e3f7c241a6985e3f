//! Design matrix construction from policies and a formula

use log::warn;

use crate::dataset::data::{Covariate, Dimension, Policy};
use crate::model::formula::Formula;
use crate::model::ModelError;

/// Dummy coding of one factor as fitted: the reference level absorbs the
/// intercept and each coded level owns a column
#[derive(Debug, Clone)]
pub struct FactorCoding {
    pub factor: Dimension,
    pub reference: &'static str,
    pub coded: Vec<&'static str>,
}

/// The coding a trained design applied, enough to encode new rows against
/// the fitted coefficients
#[derive(Debug, Clone)]
pub struct DesignInfo {
    pub names: Vec<String>,
    pub factors: Vec<FactorCoding>,
    pub covariate_means: Vec<(Covariate, f64)>,
}

/// Evaluation rows encoded against a trained design
#[derive(Debug, Clone)]
pub struct EvalRows {
    /// Policy ids aligned with the rows
    pub policy_ids: Vec<u64>,

    /// Coefficient vectors, row-major, aligned with the design names
    pub rows: Vec<Vec<f64>>,

    /// Log-exposure offset per row
    pub offsets: Vec<f64>,

    /// Policies excluded for missing covariates or nonpositive exposure
    pub dropped: usize,
}

impl DesignInfo {
    /// Encode policies for prediction. A factor level never seen in
    /// training gets all-zero dummies for that term, so it scores as the
    /// reference level; rows missing a covariate or without positive
    /// exposure are excluded, mirroring the training-side exclusions.
    pub fn encode(&self, policies: &[Policy]) -> Result<EvalRows, ModelError> {
        let mut policy_ids = Vec::with_capacity(policies.len());
        let mut rows = Vec::with_capacity(policies.len());
        let mut offsets = Vec::with_capacity(policies.len());
        let mut dropped = 0usize;
        let mut unseen = 0usize;

        'policies: for policy in policies {
            if policy.exposure <= 0.0 {
                dropped += 1;
                continue;
            }

            let mut row = Vec::with_capacity(self.names.len());
            row.push(1.0);
            for coding in &self.factors {
                let level = coding.factor.level_of(policy);
                if level != coding.reference && !coding.coded.contains(&level) {
                    unseen += 1;
                }
                for coded in &coding.coded {
                    row.push(if level == *coded { 1.0 } else { 0.0 });
                }
            }
            for (covariate, mean) in &self.covariate_means {
                match covariate.value(policy) {
                    Some(value) => row.push(value - mean),
                    None => {
                        dropped += 1;
                        continue 'policies;
                    }
                }
            }

            policy_ids.push(policy.policy_id);
            rows.push(row);
            offsets.push(policy.exposure.ln());
        }

        if unseen > 0 {
            warn!("{unseen} factor levels unseen in training scored as the reference level");
        }
        if dropped > 0 {
            warn!("excluded {dropped} evaluation policies (missing covariate or nonpositive exposure)");
        }
        if rows.is_empty() {
            return Err(ModelError::EmptyDesign);
        }
        Ok(EvalRows {
            policy_ids,
            rows,
            offsets,
            dropped,
        })
    }
}

impl EvalRows {
    /// Linear predictor including the exposure offset
    pub fn linear_predictor(&self, beta: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .zip(&self.offsets)
            .map(|(row, offset)| {
                offset + row.iter().zip(beta).map(|(x, b)| x * b).sum::<f64>()
            })
            .collect()
    }
}

/// Predictor matrix, offsets, and response for a frequency model.
///
/// Columns are stored coefficient-major so a single-coefficient proposal
/// can update a cached linear predictor by streaming one column. The
/// intercept is always the first column; factor dummies code each observed
/// level against the first observed level in canonical order; covariates
/// are centered on their portfolio mean, recorded in `covariate_means`.
#[derive(Debug, Clone)]
pub struct Design {
    /// Coefficient names aligned with the columns, intercept first
    pub names: Vec<String>,

    /// Predictor columns, each aligned with `counts`
    pub columns: Vec<Vec<f64>>,

    /// Log-exposure offset per row
    pub offsets: Vec<f64>,

    /// Observed claim count per row
    pub counts: Vec<u32>,

    /// Dummy coding applied per factor term
    pub factor_codings: Vec<FactorCoding>,

    /// Centering constants applied to covariate columns
    pub covariate_means: Vec<(Covariate, f64)>,

    /// Policies excluded for missing covariates or nonpositive exposure
    pub dropped: usize,
}

impl Design {
    pub fn build(policies: &[Policy], formula: &Formula) -> Result<Self, ModelError> {
        let mut missing_covariate = 0usize;
        let mut bad_exposure = 0usize;

        let mut usable: Vec<&Policy> = Vec::with_capacity(policies.len());
        for policy in policies {
            if policy.exposure <= 0.0 {
                bad_exposure += 1;
                continue;
            }
            if formula
                .covariates
                .iter()
                .any(|c| c.value(policy).is_none())
            {
                missing_covariate += 1;
                continue;
            }
            usable.push(policy);
        }

        if missing_covariate > 0 {
            warn!("dropped {missing_covariate} policies with missing covariate values");
        }
        if bad_exposure > 0 {
            warn!("dropped {bad_exposure} policies with nonpositive exposure");
        }
        if usable.is_empty() {
            return Err(ModelError::EmptyDesign);
        }

        let rows = usable.len();
        let mut names = vec!["intercept".to_string()];
        let mut columns = vec![vec![1.0; rows]];

        let mut factor_codings = Vec::with_capacity(formula.factors.len());
        for &factor in &formula.factors {
            let observed: Vec<&'static str> = factor
                .levels()
                .into_iter()
                .filter(|level| usable.iter().any(|p| factor.level_of(p) == *level))
                .collect();
            // First observed level is the reference and gets no column
            for level in observed.iter().skip(1) {
                names.push(format!("{}[{}]", factor.name(), level));
                columns.push(
                    usable
                        .iter()
                        .map(|p| {
                            if factor.level_of(p) == *level {
                                1.0
                            } else {
                                0.0
                            }
                        })
                        .collect(),
                );
            }
            factor_codings.push(FactorCoding {
                factor,
                reference: observed[0],
                coded: observed[1..].to_vec(),
            });
        }

        let mut covariate_means = Vec::with_capacity(formula.covariates.len());
        for &covariate in &formula.covariates {
            let values: Vec<f64> = usable
                .iter()
                .map(|p| covariate.value(p).unwrap_or_default())
                .collect();
            let mean = values.iter().sum::<f64>() / rows as f64;
            names.push(covariate.name().to_string());
            columns.push(values.into_iter().map(|v| v - mean).collect());
            covariate_means.push((covariate, mean));
        }

        Ok(Self {
            names,
            columns,
            offsets: usable.iter().map(|p| p.exposure.ln()).collect(),
            counts: usable.iter().map(|p| p.claim_count).collect(),
            factor_codings,
            covariate_means,
            dropped: missing_covariate + bad_exposure,
        })
    }

    /// Coding of this design, kept with the fit for later prediction
    pub fn info(&self) -> DesignInfo {
        DesignInfo {
            names: self.names.clone(),
            factors: self.factor_codings.clone(),
            covariate_means: self.covariate_means.clone(),
        }
    }

    pub fn rows(&self) -> usize {
        self.counts.len()
    }

    pub fn coefficients(&self) -> usize {
        self.names.len()
    }

    /// Linear predictor including the exposure offset
    pub fn linear_predictor(&self, beta: &[f64]) -> Vec<f64> {
        let mut eta = self.offsets.clone();
        for (coefficient, column) in beta.iter().zip(&self.columns) {
            for (value, x) in eta.iter_mut().zip(column) {
                *value += coefficient * x;
            }
        }
        eta
    }
}
