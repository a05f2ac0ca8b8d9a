//! Per-object distribution ensembles.
//!
//! An ensemble holds one estimated probability density per table row, all
//! evaluated on a shared grid, plus named per-row ancillary columns such as
//! point estimates. Ensembles produced chunk by chunk are concatenated back
//! into one the same length as the input table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PrismError, Result};

/// Which point estimate to derive from each row's density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointEstimate {
    /// Density-weighted mean of the grid.
    Mean,
    /// Grid point with the largest density value.
    Mode,
    /// Grid point where the cumulative density crosses one half.
    Median,
}

impl PointEstimate {
    /// Ancillary column name this estimate is stored under.
    pub fn column_name(&self) -> &'static str {
        match self {
            PointEstimate::Mean => "mean",
            PointEstimate::Mode => "mode",
            PointEstimate::Median => "median",
        }
    }
}

/// A set of per-row estimated distributions on a shared evaluation grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEnsemble {
    grid: Vec<f64>,
    pdfs: Vec<Vec<f64>>,
    ancil: BTreeMap<String, Vec<f64>>,
}

impl DistributionEnsemble {
    /// Builds an ensemble from a grid and one density row per object.
    ///
    /// # Errors
    ///
    /// Fails if any density row's length differs from the grid length.
    pub fn new(grid: Vec<f64>, pdfs: Vec<Vec<f64>>) -> Result<Self> {
        for (i, pdf) in pdfs.iter().enumerate() {
            if pdf.len() != grid.len() {
                return Err(PrismError::internal(format!(
                    "density row {i} has {} values for a grid of {} points",
                    pdf.len(),
                    grid.len()
                )));
            }
        }
        Ok(Self {
            grid,
            pdfs,
            ancil: BTreeMap::new(),
        })
    }

    /// Number of objects (density rows).
    pub fn len(&self) -> usize {
        self.pdfs.len()
    }

    /// Whether the ensemble holds no objects.
    pub fn is_empty(&self) -> bool {
        self.pdfs.is_empty()
    }

    /// The shared evaluation grid.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// The density row for one object.
    pub fn pdf(&self, row: usize) -> Option<&[f64]> {
        self.pdfs.get(row).map(Vec::as_slice)
    }

    /// A named ancillary column, one value per object.
    pub fn ancil(&self, name: &str) -> Option<&[f64]> {
        self.ancil.get(name).map(Vec::as_slice)
    }

    /// Names of the attached ancillary columns.
    pub fn ancil_names(&self) -> impl Iterator<Item = &str> {
        self.ancil.keys().map(String::as_str)
    }

    /// Attaches an ancillary column.
    ///
    /// # Errors
    ///
    /// Fails if the column length differs from the number of objects.
    pub fn set_ancil(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(PrismError::internal(format!(
                "ancillary column has {} values for {} objects",
                values.len(),
                self.len()
            )));
        }
        self.ancil.insert(name.into(), values);
        Ok(())
    }

    /// Derives the requested point estimates and stores them as ancillary
    /// columns named after [`PointEstimate::column_name`].
    pub fn add_point_estimates(&mut self, estimates: &[PointEstimate]) -> Result<()> {
        for estimate in estimates {
            let values: Vec<f64> = self
                .pdfs
                .iter()
                .map(|pdf| match estimate {
                    PointEstimate::Mean => mean_of(&self.grid, pdf),
                    PointEstimate::Mode => mode_of(&self.grid, pdf),
                    PointEstimate::Median => median_of(&self.grid, pdf),
                })
                .collect();
            self.ancil.insert(estimate.column_name().to_string(), values);
        }
        Ok(())
    }

    /// Concatenates ordered ensemble blocks into one ensemble.
    ///
    /// Every block must share the grid and carry the same ancillary columns.
    ///
    /// # Errors
    ///
    /// [`PrismError::Aggregation`] on an empty block list, a grid mismatch
    /// or inconsistent ancillary columns.
    pub fn concat(blocks: Vec<DistributionEnsemble>) -> Result<DistributionEnsemble> {
        let mut iter = blocks.into_iter();
        let mut merged = iter.next().ok_or_else(|| {
            PrismError::aggregation(
                "no ensemble blocks to concatenate; empty inputs must be handled by the caller",
            )
        })?;
        for block in iter {
            if block.grid != merged.grid {
                return Err(PrismError::aggregation(
                    "ensemble blocks use different evaluation grids",
                ));
            }
            let merged_names: Vec<&String> = merged.ancil.keys().collect();
            let block_names: Vec<&String> = block.ancil.keys().collect();
            if merged_names != block_names {
                return Err(PrismError::aggregation(
                    "ensemble blocks carry different ancillary columns",
                ));
            }
            merged.pdfs.extend(block.pdfs);
            for (name, mut values) in block.ancil {
                if let Some(column) = merged.ancil.get_mut(&name) {
                    column.append(&mut values);
                }
            }
        }
        Ok(merged)
    }
}

fn mean_of(grid: &[f64], pdf: &[f64]) -> f64 {
    let weight: f64 = pdf.iter().sum();
    if weight == 0.0 {
        return f64::NAN;
    }
    grid.iter().zip(pdf).map(|(z, p)| z * p).sum::<f64>() / weight
}

fn mode_of(grid: &[f64], pdf: &[f64]) -> f64 {
    let mut best = 0usize;
    for (i, p) in pdf.iter().enumerate() {
        if *p > pdf[best] {
            best = i;
        }
    }
    grid.get(best).copied().unwrap_or(f64::NAN)
}

fn median_of(grid: &[f64], pdf: &[f64]) -> f64 {
    let total: f64 = pdf.iter().sum();
    if total == 0.0 {
        return f64::NAN;
    }
    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (z, p) in grid.iter().zip(pdf) {
        cumulative += p;
        if cumulative >= half {
            return *z;
        }
    }
    grid.last().copied().unwrap_or(f64::NAN)
}
