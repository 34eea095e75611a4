use chrono::{Duration, NaiveDate, Utc};

use crate::models::{HistoryPoint, LevelCounts, TrendBucket, TrendDirection, TrendSummary};

pub fn cutoff_date(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(since_days.max(1))
}

// Buckets are anchored at the earliest assessment on record and step by
// window_days up to the latest one, with no holes: a period nobody was
// assessed in still appears, with zero counts and no mean.
pub fn summarize(history: &[HistoryPoint], window_days: i64, epsilon: f64) -> TrendSummary {
    let window = window_days.max(1);
    let Some(first) = history.iter().map(|p| p.assessed_on).min() else {
        return TrendSummary {
            buckets: Vec::new(),
            direction: TrendDirection::Stable,
        };
    };
    let last = history.iter().map(|p| p.assessed_on).max().unwrap_or(first);
    let bucket_count = ((last - first).num_days() / window + 1) as usize;

    let mut counts = vec![LevelCounts::default(); bucket_count];
    let mut score_sums = vec![0.0_f64; bucket_count];
    let mut point_totals = vec![0_usize; bucket_count];
    for point in history {
        let idx = ((point.assessed_on - first).num_days() / window) as usize;
        counts[idx].bump(point.level);
        score_sums[idx] += point.score;
        point_totals[idx] += 1;
    }

    let buckets: Vec<TrendBucket> = (0..bucket_count)
        .map(|idx| TrendBucket {
            period_start: first + Duration::days(idx as i64 * window),
            counts: counts[idx],
            mean_score: (point_totals[idx] > 0).then(|| score_sums[idx] / point_totals[idx] as f64),
        })
        .collect();

    let direction = direction_of(&buckets, epsilon);
    TrendSummary { buckets, direction }
}

// Compares the latest populated bucket against the nearest earlier populated
// one; empty buckets in between carry no information about the cohort.
fn direction_of(buckets: &[TrendBucket], epsilon: f64) -> TrendDirection {
    let mut populated = buckets.iter().filter_map(|b| b.mean_score).rev();
    let (Some(recent), Some(prior)) = (populated.next(), populated.next()) else {
        return TrendDirection::Stable;
    };
    if recent < prior - epsilon {
        TrendDirection::Improving
    } else if recent > prior + epsilon {
        TrendDirection::Worsening
    } else {
        TrendDirection::Stable
    }
}
