use log::info;

use crate::{
    disc::{
        boundary::BoundaryConditions, field::InitialConditions,
        mesh::structured::StructuredGeometry, properties::FluidProperties,
    },
    error::FlowResult,
    io::param_parser::CaseParamParser,
    solver::{SimulationConfig, SimulationLoop},
};

/// Owned inputs of a run; the solver borrows from it.
pub struct Case {
    pub config: SimulationConfig,
    pub geometry: StructuredGeometry,
    pub properties: FluidProperties,
    pub boundaries: BoundaryConditions,
    pub initial: InitialConditions,
}

pub fn initialize_params(file_path: &str) -> FlowResult<CaseParamParser> {
    let params = CaseParamParser::parse(file_path)?;
    params.simulation.validate()?;
    Ok(params)
}

pub fn initialize_case(params: &CaseParamParser) -> FlowResult<Case> {
    let config = params.simulation.clone();
    config.validate()?;
    let geometry = StructuredGeometry::uniform(&config)?;
    let properties = FluidProperties::uniform(&geometry, &params.fluid);
    let boundaries = params.boundary_conditions();
    boundaries.validate(&geometry)?;
    info!(
        "grid {}x{} (inlet block {}x{}), {} active cells",
        geometry.nx,
        geometry.ny,
        geometry.nx_in,
        geometry.ny_in,
        geometry.active_count()
    );
    Ok(Case {
        config,
        geometry,
        properties,
        boundaries,
        initial: params.initial.clone(),
    })
}

pub fn initialize_solver(case: &Case) -> FlowResult<SimulationLoop<'_>> {
    SimulationLoop::new(
        &case.config,
        &case.geometry,
        &case.properties,
        &case.boundaries,
        &case.initial,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{HistoryReporter, SimulationState};

    #[test]
    fn test_small_case_end_to_end() {
        let params = CaseParamParser::from_json(
            r#"{
                "simulation": { "nx": 12, "ny": 6, "nx_in": 4, "ny_in": 3,
                                "length_x": 2.0, "max_iter": 5 },
                "inlet_velocity": 0.5
            }"#,
        )
        .unwrap();
        let case = initialize_case(&params).unwrap();
        assert_eq!(case.geometry.active_count(), 12 * 6 - 4 * 3);
        let mut solver = initialize_solver(&case).unwrap();
        let report = solver.run(&mut HistoryReporter::default()).unwrap();
        assert_eq!(report.state, SimulationState::IterationLimitReached);
        assert_eq!(report.iterations, 5);
    }
}
