//! Invocations of the Climate Data Operators (`cdo`).
//!
//! Operators are chained the way `cdo` expects them: the outermost
//! operator comes first, e.g. `cdo -L -yearmax -mergetime in1 in2 out`.

use std::path::{Path, PathBuf};

use super::{Invocation, Outcome};
use crate::{catalog::Aggregation, errors::ToolError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    YearMax,
    YearSum,
    TimMean,
    /// Linear trend; writes the intercept and the slope to two outputs.
    Trend,
    EnsMean,
    FldMean,
    MergeTime,
    SelYear(i32, i32),
    SelLonLatBox {
        lon1: f64,
        lon2: f64,
        lat1: f64,
        lat2: f64,
    },
}

impl Operator {
    pub fn token(&self) -> String {
        match self {
            Operator::YearMax => "-yearmax".to_string(),
            Operator::YearSum => "-yearsum".to_string(),
            Operator::TimMean => "-timmean".to_string(),
            Operator::Trend => "-trend".to_string(),
            Operator::EnsMean => "-ensmean".to_string(),
            Operator::FldMean => "-fldmean".to_string(),
            Operator::MergeTime => "-mergetime".to_string(),
            Operator::SelYear(start, end) => format!("-selyear,{start}/{end}"),
            Operator::SelLonLatBox {
                lon1,
                lon2,
                lat1,
                lat2,
            } => format!("-sellonlatbox,{lon1},{lon2},{lat1},{lat2}"),
        }
    }

    /// Box of `half_width` degrees around a point.
    pub fn around(lat: f64, lon: f64, half_width: f64) -> Self {
        Operator::SelLonLatBox {
            lon1: lon - half_width,
            lon2: lon + half_width,
            lat1: lat - half_width,
            lat2: lat + half_width,
        }
    }
}

impl From<Aggregation> for Operator {
    fn from(agg: Aggregation) -> Self {
        match agg {
            Aggregation::YearMax => Operator::YearMax,
            Aggregation::YearSum => Operator::YearSum,
        }
    }
}

/// Builds `cdo` invocations for a configured executable.
#[derive(Debug, Clone)]
pub struct Cdo {
    program: String,
}

impl Cdo {
    pub fn new(program: impl Into<String>) -> Self {
        Cdo {
            program: program.into(),
        }
    }

    /// `cdo -L <ops> <inputs> <outputs>`; `-L` serialises file access of
    /// chained operators.
    pub fn chain(&self, operators: &[Operator], inputs: &[PathBuf], outputs: &[PathBuf]) -> Invocation {
        let mut invocation = Invocation::new(&self.program).arg("-L");
        for op in operators {
            invocation = invocation.arg(op.token());
        }
        for path in inputs.iter().chain(outputs) {
            invocation = invocation.path(path);
        }

        invocation
    }

    /// Prints the field values of `input` to stdout.
    pub fn values(&self, input: &Path) -> Invocation {
        Invocation::new(&self.program)
            .arg("-s")
            .arg("output")
            .path(input)
    }
}

/// First number printed by a [`Cdo::values`] call.
pub fn first_value(invocation: &Invocation, outcome: &Outcome) -> Result<f64, ToolError> {
    outcome
        .stdout
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| ToolError::BadOutput {
            command: invocation.command_line(),
            output: outcome.stdout.chars().take(80).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_format_operator_tokens() {
        assert_eq!(Operator::SelYear(1981, 2010).token(), "-selyear,1981/2010");
        assert_eq!(Operator::from(Aggregation::YearSum).token(), "-yearsum");
        assert_eq!(
            Operator::around(51.5, -0.25, 1.0).token(),
            "-sellonlatbox,-1.25,0.75,50.5,52.5"
        );
    }

    #[test]
    fn should_chain_operators_before_files() {
        let cdo = Cdo::new("cdo");
        let inv = cdo.chain(
            &[Operator::YearMax, Operator::MergeTime],
            &[PathBuf::from("in/a.nc"), PathBuf::from("in/b.nc")],
            &[PathBuf::from("out/c.nc")],
        );

        assert_eq!(
            inv.command_line(),
            "cdo -L -yearmax -mergetime in/a.nc in/b.nc out/c.nc"
        );
    }

    #[test]
    fn should_read_first_value() {
        let cdo = Cdo::new("cdo");
        let inv = cdo.values(Path::new("slope.nc"));
        assert_eq!(inv.command_line(), "cdo -s output slope.nc");

        let outcome = Outcome {
            status: Some(0),
            stdout: "  3.2e-05 \n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(first_value(&inv, &outcome).unwrap(), 3.2e-05);

        let empty = Outcome {
            status: Some(0),
            ..Outcome::default()
        };
        assert!(matches!(
            first_value(&inv, &empty),
            Err(ToolError::BadOutput { .. })
        ));
    }
}
