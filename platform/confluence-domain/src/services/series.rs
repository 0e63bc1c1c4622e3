use crate::value_objects::bar::{calendar_fields, Bar};
use crate::value_objects::interval::Interval;
use chrono::FixedOffset;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeriesQualityReport {
    pub bars: usize,
    pub duplicates: usize,
    pub out_of_order: usize,
    pub non_finite: usize,
    pub gaps: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub first_duplicate: Option<i64>,
    pub first_out_of_order: Option<i64>,
    pub max_gap_seconds: Option<i64>,
}

impl SeriesQualityReport {
    /// Gaps are expected (sessions close overnight); ordering and value defects are not.
    pub fn is_usable(&self) -> bool {
        self.bars > 0 && self.duplicates == 0 && self.out_of_order == 0 && self.non_finite == 0
    }

    pub fn describe(&self) -> String {
        format!(
            "bars={} duplicates={} out_of_order={} non_finite={} gaps={}",
            self.bars, self.duplicates, self.out_of_order, self.non_finite, self.gaps
        )
    }
}

pub fn series_quality(bars: &[Bar], interval: Interval) -> SeriesQualityReport {
    let mut report = SeriesQualityReport {
        bars: bars.len(),
        ..SeriesQualityReport::default()
    };
    if bars.is_empty() {
        return report;
    }

    let step = interval.step_seconds();
    report.first_timestamp = bars.first().map(|b| b.unixtime);
    report.last_timestamp = bars.last().map(|b| b.unixtime);

    let mut last_ts: Option<i64> = None;
    let mut max_gap: Option<i64> = None;

    for bar in bars {
        if !bar.is_finite() {
            report.non_finite += 1;
        }

        let ts = bar.unixtime;
        if let Some(prev) = last_ts {
            if ts == prev {
                report.duplicates += 1;
                if report.first_duplicate.is_none() {
                    report.first_duplicate = Some(ts);
                }
            } else if ts < prev {
                report.out_of_order += 1;
                if report.first_out_of_order.is_none() {
                    report.first_out_of_order = Some(ts);
                }
            } else {
                let diff = ts - prev;
                if diff > step {
                    report.gaps += 1;
                    max_gap = Some(max_gap.map_or(diff, |current| current.max(diff)));
                }
            }
        }
        last_ts = Some(ts);
    }

    report.max_gap_seconds = max_gap;
    report
}

/// Rebuilds a coarser series from a finer one. Buckets start at
/// `origin_seconds` modulo the target step, so 4h buckets can be aligned to the
/// exchange session instead of midnight UTC.
pub fn resample_bars(
    bars: &[Bar],
    target: Interval,
    origin_seconds: i64,
    offset: FixedOffset,
) -> Result<Vec<Bar>, String> {
    let step = target.step_seconds();
    if bars.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(source) = bars.first().map(|b| b.interval) {
        if source.step_seconds() > step {
            return Err(format!(
                "cannot resample {} bars into {}: source interval is coarser",
                source, target
            ));
        }
    }

    let mut output: Vec<Bar> = Vec::new();
    let mut current_bucket_start: Option<i64> = None;

    for bar in bars {
        let shifted = bar.unixtime - origin_seconds;
        let bucket_start = bar.unixtime - shifted.rem_euclid(step);

        match (current_bucket_start, output.last_mut()) {
            (Some(active), Some(agg)) if active == bucket_start => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
            }
            _ => {
                current_bucket_start = Some(bucket_start);
                let cal = calendar_fields(bucket_start, offset);
                output.push(Bar {
                    symbol: bar.symbol.clone(),
                    interval: target,
                    unixtime: bucket_start,
                    month: cal.month,
                    day: cal.day,
                    hour: cal.hour,
                    minute: cal.minute,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                });
            }
        }
    }

    Ok(output)
}

/// Drops the trailing bars whose interval has not closed yet at `now`.
pub fn drop_incomplete(mut bars: Vec<Bar>, now_unixtime: i64) -> Vec<Bar> {
    while let Some(last) = bars.last() {
        if last.unixtime + last.interval.step_seconds() > now_unixtime {
            bars.pop();
        } else {
            break;
        }
    }
    bars
}
