use std::fmt;

/// Loss curve rendered as a text chart through `Display`.
///
/// The series is averaged down to at most `width` columns and scaled
/// between its minimum and maximum over `height` rows. The first column
/// of each line is the y-axis label.
pub struct LossCurve<'a> {
    loss: &'a [f32],
    width: usize,
    height: usize,
}

impl<'a> LossCurve<'a> {
    #[must_use]
    pub fn new(loss: &'a [f32], width: usize, height: usize) -> Self {
        Self {
            loss,
            width,
            height,
        }
    }
}

impl fmt::Display for LossCurve<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points: Vec<f32> = self.loss.iter().copied().filter(|v| v.is_finite()).collect();
        if points.is_empty() || self.width == 0 || self.height == 0 {
            return writeln!(f, "(aucune donnée de perte)");
        }
        let height = self.height;

        let columns = downsample(&points, self.width);
        let (lo, hi) = columns
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = (hi - lo).max(f32::EPSILON);

        // Row 0 is the top of the chart.
        let level = |v: f32| -> usize {
            let t = (v - lo) / span;
            ((1.0 - t) * (height - 1) as f32).round() as usize
        };

        let mut grid = vec![vec![' '; columns.len()]; height];
        for (x, &v) in columns.iter().enumerate() {
            grid[level(v).min(height - 1)][x] = '*';
        }

        for (row, cells) in grid.iter().enumerate() {
            let line: String = cells.iter().collect();
            if row == 0 {
                write!(f, "{hi:>9.4}")?;
            } else if row == height - 1 {
                write!(f, "{lo:>9.4}")?;
            } else {
                write!(f, "{:9}", "")?;
            }
            writeln!(f, " |{}", line.trim_end())?;
        }
        writeln!(f, "{:9} +{}", "", "-".repeat(columns.len()))?;
        writeln!(
            f,
            "{:10} epoch 1{:>pad$}",
            "",
            points.len(),
            pad = columns.len().saturating_sub(7)
        )
    }
}

/// Bucket means, at most `width` buckets.
fn downsample(values: &[f32], width: usize) -> Vec<f32> {
    if values.len() <= width {
        return values.to_vec();
    }
    (0..width)
        .map(|i| {
            let start = i * values.len() / width;
            let end = ((i + 1) * values.len() / width).max(start + 1);
            let bucket = &values[start..end];
            bucket.iter().sum::<f32>() / bucket.len() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    #[test]
    fn decreasing_curve_starts_top_left() {
        let loss: Vec<f32> = (0..50).map(|e| 2.0 - e as f32 * 0.03).collect();
        let chart = LossCurve::new(&loss, 50, 8).to_string();
        let first = chart.lines().next().unwrap_or_default();
        let last_row = chart.lines().nth(7).unwrap_or_default();
        assert!(first.contains("|*"));
        assert!(last_row.trim_end().ends_with('*'));
    }

    #[test]
    fn long_series_is_downsampled() {
        let loss = vec![1.0f32; 1000];
        let chart = LossCurve::new(&loss, 40, 5).to_string();
        let axis = chart.lines().nth(5).unwrap_or_default();
        assert_eq!(axis.matches('-').count(), 40);
    }

    #[test]
    fn empty_series_does_not_panic() {
        assert!(LossCurve::new(&[], 40, 5).to_string().contains("aucune"));
        assert!(LossCurve::new(&[f32::NAN], 40, 5).to_string().contains("aucune"));
    }

    #[test]
    fn chart_writes_into_any_fmt_sink() -> fmt::Result {
        let loss = [0.9f32, 0.5, 0.3];
        let mut out = String::new();
        write!(out, "{}", LossCurve::new(&loss, 10, 4))?;
        // 4 chart rows, the axis, the epoch legend.
        assert_eq!(out.lines().count(), 6);
        assert!(out.lines().nth(5).is_some_and(|l| l.trim_end().ends_with('3')));
        Ok(())
    }

    #[test]
    fn downsample_averages_buckets() {
        assert_eq!(downsample(&[1.0, 3.0, 5.0, 7.0], 2), vec![2.0, 6.0]);
    }
}
