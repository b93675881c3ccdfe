use faer::{Col, prelude::Solve};
use faer_ext::IntoFaer;
use log::{debug, warn};
use ndarray::{Array1, Array2};
use serde::Deserialize;

use super::boundary::Variable;
use super::coefficients::CoefficientSet;
use super::mesh::{Face, Neighbor, structured::StructuredGeometry};
use crate::error::{FlowError, FlowResult};

/// Residuals below this fraction of `Σ|a_o φ| + Σ|b|` are roundoff.
const ROUNDOFF: f64 = 1e-12;
/// Largest system assembled densely for [`LinearSolverKind::DirectLu`].
pub const DIRECT_LU_MAX_CELLS: usize = 2500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    GaussSeidel,
    /// Tridiagonal solves along x-lines, neighbours across lines lagged.
    LineTdma,
    DirectLu,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LinearSolverSettings {
    pub kind: LinearSolverKind,
    pub max_sweeps: usize,
    /// Sweeping stops once the residual drops by this factor.
    pub reduction: f64,
}

impl LinearSolverSettings {
    pub fn momentum_default() -> Self {
        Self {
            kind: LinearSolverKind::GaussSeidel,
            max_sweeps: 50,
            reduction: 1e-2,
        }
    }
    pub fn pressure_default() -> Self {
        Self {
            kind: LinearSolverKind::GaussSeidel,
            max_sweeps: 300,
            reduction: 1e-3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub sweeps: usize,
    pub initial_residual: f64,
    pub final_residual: f64,
    /// Roundoff floor of this system.
    pub floor: f64,
    /// Reached the requested reduction (or the floor) before running out
    /// of sweeps.
    pub converged: bool,
}

impl SolveStats {
    /// The sub-solve made things worse, or produced a non-finite residual.
    pub fn diverged(&self) -> bool {
        !self.final_residual.is_finite()
            || (self.final_residual > self.initial_residual && self.final_residual > self.floor)
    }
    pub fn check(self, variable: Variable, iteration: usize) -> FlowResult<Self> {
        if self.diverged() {
            return Err(FlowError::LinearSystemDivergence {
                variable,
                iteration,
                sweeps: self.sweeps,
                initial_residual: self.initial_residual,
                final_residual: self.final_residual,
            });
        }
        if !self.converged {
            warn!(
                "{variable} sub-solve stopped after {} sweeps at outer iteration {iteration}, residual {:.3e} -> {:.3e}",
                self.sweeps, self.initial_residual, self.final_residual
            );
        }
        Ok(self)
    }
}

/// `Σ |b + Σ a_nb φ_nb − a_o φ|` over the active cells.
pub fn residual_norm(
    geometry: &StructuredGeometry,
    coefficients: &CoefficientSet,
    phi: &Array1<f64>,
) -> f64 {
    (0..coefficients.len())
        .map(|k| (neighbor_rhs(geometry, coefficients, phi, k) - coefficients.a_o[k] * phi[k]).abs())
        .sum()
}

fn reference_norm(coefficients: &CoefficientSet, phi: &Array1<f64>) -> f64 {
    let diagonal: f64 = coefficients
        .a_o
        .iter()
        .zip(phi.iter())
        .map(|(a_o, phi)| (a_o * phi).abs())
        .sum();
    diagonal + coefficients.source.iter().map(|b| b.abs()).sum::<f64>()
}

fn neighbor_rhs(
    geometry: &StructuredGeometry,
    coefficients: &CoefficientSet,
    phi: &Array1<f64>,
    k: usize,
) -> f64 {
    let mut rhs = coefficients.source[k];
    for face in Face::ALL {
        if let Neighbor::Cell(m) = geometry.cells[k].neighbor(face) {
            rhs += coefficients.link(k, face) * phi[m];
        }
    }
    rhs
}

/// Solve in place, starting from the current contents of `phi`.
pub fn solve(
    geometry: &StructuredGeometry,
    coefficients: &CoefficientSet,
    phi: &mut Array1<f64>,
    settings: &LinearSolverSettings,
) -> SolveStats {
    let floor = ROUNDOFF * reference_norm(coefficients, phi);
    let initial_residual = residual_norm(geometry, coefficients, phi);
    let mut stats = SolveStats {
        sweeps: 0,
        initial_residual,
        final_residual: initial_residual,
        floor,
        converged: true,
    };
    if initial_residual <= floor {
        return stats;
    }
    match settings.kind {
        LinearSolverKind::DirectLu => {
            direct_lu(geometry, coefficients, phi);
            stats.sweeps = 1;
            stats.final_residual = residual_norm(geometry, coefficients, phi);
            stats.converged = stats.final_residual.is_finite();
        }
        LinearSolverKind::GaussSeidel | LinearSolverKind::LineTdma => {
            while stats.sweeps < settings.max_sweeps {
                if settings.kind == LinearSolverKind::GaussSeidel {
                    gauss_seidel_sweep(geometry, coefficients, phi);
                } else {
                    line_sweep(geometry, coefficients, phi);
                }
                stats.sweeps += 1;
                stats.final_residual = residual_norm(geometry, coefficients, phi);
                stats.converged = stats.final_residual <= settings.reduction * initial_residual
                    || stats.final_residual <= floor;
                if stats.converged || !stats.final_residual.is_finite() {
                    break;
                }
            }
        }
    }
    debug!(
        "{:?}: {} sweeps, residual {:.3e} -> {:.3e}, converged {}",
        settings.kind, stats.sweeps, stats.initial_residual, stats.final_residual, stats.converged
    );
    stats
}

fn gauss_seidel_sweep(
    geometry: &StructuredGeometry,
    coefficients: &CoefficientSet,
    phi: &mut Array1<f64>,
) {
    for k in 0..coefficients.len() {
        let value = neighbor_rhs(geometry, coefficients, phi, k) / coefficients.a_o[k];
        phi[k] = value;
    }
}

/// One pass of the Thomas algorithm over every x-line, bottom to top.
fn line_sweep(geometry: &StructuredGeometry, coefficients: &CoefficientSet, phi: &mut Array1<f64>) {
    for line in geometry.x_lines() {
        let n = line.len();
        let mut c_prime = vec![0.0; n];
        let mut d_prime = vec![0.0; n];
        for (local, k) in line.clone().enumerate() {
            let cell = &geometry.cells[k];
            let mut rhs = coefficients.source[k];
            let mut lower = 0.0;
            let mut upper = 0.0;
            for face in Face::ALL {
                if let Neighbor::Cell(m) = cell.neighbor(face) {
                    let link = coefficients.link(k, face);
                    match face {
                        Face::West if local > 0 && m + 1 == k => lower = link,
                        Face::East if local + 1 < n && m == k + 1 => upper = link,
                        _ => rhs += link * phi[m],
                    }
                }
            }
            let (c_prev, d_prev) = if local == 0 {
                (0.0, 0.0)
            } else {
                (c_prime[local - 1], d_prime[local - 1])
            };
            let denominator = coefficients.a_o[k] - lower * c_prev;
            c_prime[local] = upper / denominator;
            d_prime[local] = (rhs + lower * d_prev) / denominator;
        }
        let mut next = 0.0;
        for local in (0..n).rev() {
            let value = d_prime[local] + c_prime[local] * next;
            phi[line.start + local] = value;
            next = value;
        }
    }
}

fn direct_lu(geometry: &StructuredGeometry, coefficients: &CoefficientSet, phi: &mut Array1<f64>) {
    let n = coefficients.len();
    let mut a_ndarray = Array2::<f64>::zeros((n, n));
    for (k, cell) in geometry.cells.iter().enumerate() {
        a_ndarray[[k, k]] = coefficients.a_o[k];
        for face in Face::ALL {
            if let Neighbor::Cell(m) = cell.neighbor(face) {
                a_ndarray[[k, m]] -= coefficients.link(k, face);
            }
        }
    }
    let a = a_ndarray.view().into_faer();
    let b = Col::<f64>::from_iter(coefficients.source.iter().copied());
    let flu = a.partial_piv_lu();
    let x = flu.solve(&b);
    let solved = Array1::from_iter(x.subrows(0, n).iter().copied());
    phi.assign(&solved);
}
