use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::disc::{
    boundary::BoundaryConditions, field::InitialConditions, properties::FluidParameters,
};
use crate::error::FlowResult;
use crate::solver::SimulationConfig;

fn default_true() -> bool {
    true
}
fn default_log_interval() -> usize {
    10
}
fn default_inlet_velocity() -> f64 {
    1.0
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputParameters {
    /// Defaults to a timestamped directory under `outputs/`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub write_csv: bool,
    #[serde(default = "default_true")]
    pub write_vtu: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            directory: None,
            write_csv: true,
            write_vtu: true,
            log_interval: default_log_interval(),
        }
    }
}

/// Everything a case file may hold. Missing sections take their defaults;
/// without a `boundaries` table the backward-facing step with
/// `inlet_velocity` is used.
#[derive(Deserialize, Debug, Clone)]
pub struct CaseParamParser {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub fluid: FluidParameters,
    #[serde(default)]
    pub boundaries: Option<BoundaryConditions>,
    #[serde(default = "default_inlet_velocity")]
    pub inlet_velocity: f64,
    #[serde(default)]
    pub initial: InitialConditions,
    #[serde(default)]
    pub output: OutputParameters,
}

impl CaseParamParser {
    pub fn parse(file_path: impl AsRef<Path>) -> FlowResult<Self> {
        let file_content = fs::read_to_string(file_path)?;
        Self::from_json(&file_content)
    }
    pub fn from_json(content: &str) -> FlowResult<Self> {
        let params: CaseParamParser = serde_json::from_str(content)?;
        Ok(params)
    }
    pub fn boundary_conditions(&self) -> BoundaryConditions {
        self.boundaries
            .clone()
            .unwrap_or_else(|| BoundaryConditions::backward_step(self.inlet_velocity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::boundary::{BoundaryPosition, Condition, Variable};

    #[test]
    fn test_empty_case_uses_defaults() {
        let case = CaseParamParser::from_json("{}").unwrap();
        assert_eq!(case.simulation, SimulationConfig::default());
        assert_eq!(case.fluid.density, 1.0);
        assert!(case.output.write_vtu);
        assert_eq!(
            case.boundary_conditions().condition(BoundaryPosition::Left, Variable::U),
            Condition::Dirichlet(1.0)
        );
    }

    #[test]
    fn test_bundled_case_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("inputs/solverparam.json");
        let case = CaseParamParser::parse(path).unwrap();
        assert!(case.simulation.validate().is_ok());
        assert!(case.boundaries.is_some());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            CaseParamParser::from_json("{ \"simulation\": { \"nx\": -4 } }"),
            Err(crate::error::FlowError::Json(_))
        ));
    }
}
