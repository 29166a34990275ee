//! Final tuning report, written in the key=value parameter format so it can
//! be read back as a parameter file.
use serde::{Deserialize, Serialize};

use crate::distribution::DistributionCache;
use crate::exact::exact_with_distribution;
use crate::optimizer::Estimate;
use crate::params::{FailBand, GameParams, ParamsError};
use crate::policy::GameModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    pub params: GameParams,
    pub final_mean_profit: f64,
    pub final_win_rate: f64,
    pub final_theoretical_ev: f64,
    pub no_score_window: FailBand,
}

impl TuningReport {
    /// Assemble the report for `params`. The win rate falls back to the
    /// exact distribution when the estimate carries none.
    ///
    /// # Errors
    ///
    /// Returns the first invariant `params` violates.
    pub fn build(params: &GameParams, estimate: &Estimate) -> Result<Self, ParamsError> {
        let model = GameModel::derive(params, &mut DistributionCache::new())?;
        let final_win_rate = match estimate.win_rate {
            Some(rate) => rate,
            None => exact_with_distribution(params, &model.distribution, &model.policy()).win_rate(),
        };
        Ok(Self {
            params: params.clone(),
            final_mean_profit: estimate.mean_profit,
            final_win_rate,
            final_theoretical_ev: model.theoretical_ev(),
            no_score_window: params.fail_band(),
        })
    }

    #[must_use]
    pub fn to_kv_string(&self) -> String {
        let mut out = format!(
            "final_mean_profit={:.6}\nfinal_win_rate={:.6}\nfinal_theoretical_ev={:.6}\n",
            self.final_mean_profit, self.final_win_rate, self.final_theoretical_ev
        );
        out.push_str(&self.params.to_kv_string());
        out.push_str(&format!("no_score_window={}\n", self.no_score_window));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_reads_back_as_parameters() {
        let params = GameParams::default();
        let report = TuningReport::build(
            &params,
            &Estimate {
                mean_profit: -0.5,
                win_rate: None,
            },
        )
        .unwrap();
        let text = report.to_kv_string();
        assert!(text.contains("no_score_window=[9,12]"));
        assert!(text.starts_with("final_mean_profit=-0.500000\n"));
        assert_eq!(GameParams::from_kv_str(&text), Ok(params));
    }

    #[test]
    fn missing_win_rate_is_filled_exactly() {
        let report = TuningReport::build(
            &GameParams::default(),
            &Estimate {
                mean_profit: 0.0,
                win_rate: None,
            },
        )
        .unwrap();
        assert!((report.final_win_rate - 0.509_433_962_264).abs() < 1e-9);
        assert!((report.final_theoretical_ev + 0.509_433_962_264).abs() < 1e-9);
    }
}
