use log::{info, warn};

use super::convergence::ResidualRecord;
use super::simulation::{SimulationReport, SimulationState};

/// Receives the per-iteration residual and the terminal outcome of a run.
pub trait ReportSink {
    fn on_iteration(&mut self, record: &ResidualRecord);
    fn on_finish(&mut self, report: &SimulationReport);
}

/// Writes progress through the `log` facade.
#[derive(Clone, Debug)]
pub struct LogReporter {
    /// Log every `interval`-th iteration; the first is always logged.
    pub interval: usize,
}

impl Default for LogReporter {
    fn default() -> Self {
        Self { interval: 10 }
    }
}

impl ReportSink for LogReporter {
    fn on_iteration(&mut self, record: &ResidualRecord) {
        if record.iteration == 1 || record.iteration % self.interval.max(1) == 0 {
            match record.energy {
                Some(energy) => info!(
                    "iter {:>6}  residual {:.4e}  mass {:.3e}  u {:.3e}  v {:.3e}  t {:.3e}",
                    record.iteration,
                    record.residual,
                    record.mass,
                    record.u_momentum,
                    record.v_momentum,
                    energy
                ),
                None => info!(
                    "iter {:>6}  residual {:.4e}  mass {:.3e}  u {:.3e}  v {:.3e}",
                    record.iteration,
                    record.residual,
                    record.mass,
                    record.u_momentum,
                    record.v_momentum
                ),
            }
        }
    }
    fn on_finish(&mut self, report: &SimulationReport) {
        match report.state {
            SimulationState::Converged => info!(
                "converged after {} iterations, residual {:.4e}",
                report.iterations, report.residual
            ),
            SimulationState::IterationLimitReached => warn!(
                "iteration limit reached after {} iterations, residual {:.4e}",
                report.iterations, report.residual
            ),
            SimulationState::Stopped => warn!(
                "stopped after {} iterations, residual {:.4e}",
                report.iterations, report.residual
            ),
            state => info!("finished in state {:?}", state),
        }
    }
}

/// Keeps everything it is told in memory.
#[derive(Clone, Debug, Default)]
pub struct HistoryReporter {
    pub records: Vec<ResidualRecord>,
    pub outcome: Option<(SimulationState, usize, f64)>,
}

impl ReportSink for HistoryReporter {
    fn on_iteration(&mut self, record: &ResidualRecord) {
        self.records.push(*record);
    }
    fn on_finish(&mut self, report: &SimulationReport) {
        self.outcome = Some((report.state, report.iterations, report.residual));
    }
}
