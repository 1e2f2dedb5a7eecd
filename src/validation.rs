//! Shape checks applied to derived records before they leave a stage.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::timeutils::seconds_between;
use crate::types::{
    is_normalized_address, ActivitySegment, BilateralWindow, EffectiveMovementInterval, GaitInterval,
};

/// Allowed drift between a stored duration and its span.
const DURATION_TOLERANCE_SECS: f64 = 1e-3;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Split records into valid ones and the errors of the rejected ones.
pub fn partition_valid<T: Validate>(records: Vec<T>) -> (Vec<T>, Vec<ValidationError>) {
    let mut valid = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match record.validate() {
            Ok(()) => valid.push(record),
            Err(err) => rejected.push(err),
        }
    }
    (valid, rejected)
}

impl Validate for ActivitySegment {
    fn validate(&self) -> Result<(), ValidationError> {
        const RECORD: &str = "activity segment";
        wearer(RECORD, &self.wearer)?;
        if self.start_time > self.end_time {
            return Err(span_error(RECORD, self.start_time, self.end_time));
        }
        duration(RECORD, self.duration, self.start_time, self.end_time)?;
        address(RECORD, &self.address)?;
        if self.sample_count == 0 {
            return Err(ValidationError::EmptySegment { record: RECORD });
        }
        Ok(())
    }
}

impl Validate for BilateralWindow {
    fn validate(&self) -> Result<(), ValidationError> {
        const RECORD: &str = "bilateral window";
        wearer(RECORD, &self.wearers.left)?;
        wearer(RECORD, &self.wearers.right)?;
        strict_span(RECORD, self.start_time, self.end_time)?;
        duration(RECORD, self.duration, self.start_time, self.end_time)?;
        address(RECORD, &self.addresses.left)?;
        address(RECORD, &self.addresses.right)
    }
}

impl Validate for EffectiveMovementInterval {
    fn validate(&self) -> Result<(), ValidationError> {
        const RECORD: &str = "effective movement";
        wearer(RECORD, &self.wearer)?;
        strict_span(RECORD, self.start_time, self.end_time)?;
        duration(RECORD, self.duration, self.start_time, self.end_time)
    }
}

impl Validate for GaitInterval {
    fn validate(&self) -> Result<(), ValidationError> {
        const RECORD: &str = "effective gait";
        wearer(RECORD, &self.wearer)?;
        strict_span(RECORD, self.start_time, self.end_time)?;
        duration(RECORD, self.duration, self.start_time, self.end_time)
    }
}

fn wearer(record: &'static str, wearer: &str) -> Result<(), ValidationError> {
    if wearer.trim().is_empty() {
        Err(ValidationError::EmptyWearer { record })
    } else {
        Ok(())
    }
}

fn strict_span(
    record: &'static str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if start < end {
        Ok(())
    } else {
        Err(span_error(record, start, end))
    }
}

fn span_error(record: &'static str, start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationError {
    ValidationError::InvalidSpan {
        record,
        start: start.to_rfc3339(),
        end: end.to_rfc3339(),
    }
}

fn duration(
    record: &'static str,
    duration: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    let expected = seconds_between(start, end);
    if duration.is_finite() && duration >= 0.0 && (duration - expected).abs() <= DURATION_TOLERANCE_SECS {
        Ok(())
    } else {
        Err(ValidationError::DurationMismatch {
            record,
            duration,
            expected,
        })
    }
}

fn address(record: &'static str, address: &str) -> Result<(), ValidationError> {
    if is_normalized_address(address) {
        Ok(())
    } else {
        Err(ValidationError::Address {
            record,
            address: address.to_string(),
        })
    }
}
