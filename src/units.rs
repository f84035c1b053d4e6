pub mod rain {
    use std::fmt;

    /// Precipitation intensity, ordered from least to most severe.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub enum RainIntensity {
        None,
        Drizzle,
        Light,
        Moderate,
        Heavy,
        Violent,
    }

    const BANDS: [(f64, RainIntensity); 5] = [
        (0.2, RainIntensity::None),
        (0.5, RainIntensity::Drizzle),
        (2.0, RainIntensity::Light),
        (5.0, RainIntensity::Moderate),
        (10.0, RainIntensity::Heavy),
    ];

    /// Classify a rate in mm/h. Negative and NaN rates count as zero.
    pub fn classify(rate: f64) -> RainIntensity {
        let rate = if rate.is_nan() { 0.0 } else { rate.max(0.0) };
        BANDS
            .iter()
            .find(|(upper, _)| rate < *upper)
            .map(|(_, intensity)| *intensity)
            .unwrap_or(RainIntensity::Violent)
    }

    impl RainIntensity {
        pub fn label(&self) -> &'static str {
            match self {
                RainIntensity::None => "none",
                RainIntensity::Drizzle => "drizzle",
                RainIntensity::Light => "light",
                RainIntensity::Moderate => "moderate",
                RainIntensity::Heavy => "heavy",
                RainIntensity::Violent => "violent",
            }
        }

        pub fn is_severe(&self) -> bool {
            *self >= RainIntensity::Heavy
        }
    }

    impl fmt::Display for RainIntensity {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.label())
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(0.0), RainIntensity::None);
        assert_eq!(classify(0.19), RainIntensity::None);
        assert_eq!(classify(0.2), RainIntensity::Drizzle);
        assert_eq!(classify(0.5), RainIntensity::Light);
        assert_eq!(classify(0.5).label(), "light");
        assert_eq!(classify(2.0), RainIntensity::Moderate);
        assert_eq!(classify(5.0), RainIntensity::Heavy);
        assert_eq!(classify(10.0), RainIntensity::Violent);
        assert_eq!(classify(120.0), RainIntensity::Violent);
    }

    #[test]
    fn test_classify_clamps_bad_input() {
        assert_eq!(classify(-3.0), RainIntensity::None);
        assert_eq!(classify(f64::NAN), RainIntensity::None);
    }

    #[test]
    fn test_classify_monotonic() {
        let mut previous = classify(0.0);
        for step in 1..=1500 {
            let current = classify(step as f64 * 0.01);
            assert!(current >= previous, "{current} < {previous} at step {step}");
            previous = current;
        }
    }
}

pub mod hours {
    use std::fmt;

    /// Closed interval of hours of the day.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HourRange {
        pub start: u32,
        pub end: u32,
    }

    impl fmt::Display for HourRange {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if self.start == self.end {
                write!(f, "{:02}:00", self.start)
            } else {
                write!(f, "{:02}:00–{:02}:00", self.start, self.end)
            }
        }
    }

    /// Collapse hours into maximal runs of consecutive values, ascending.
    pub fn compress<I>(hours: I) -> Vec<HourRange>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut sorted: Vec<u32> = hours.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<HourRange> = Vec::new();
        for hour in sorted {
            match ranges.last_mut() {
                Some(last) if hour == last.end + 1 => last.end = hour,
                _ => ranges.push(HourRange {
                    start: hour,
                    end: hour,
                }),
            }
        }
        ranges
    }

    pub fn format_ranges(ranges: &[HourRange]) -> String {
        ranges
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[cfg(test)]
    fn expand(ranges: &[HourRange]) -> Vec<u32> {
        ranges.iter().flat_map(|r| r.start..=r.end).collect()
    }

    #[test]
    fn test_compress() {
        let r = |start, end| HourRange { start, end };
        assert_eq!(compress([11, 12, 13, 16, 17]), vec![r(11, 13), r(16, 17)]);
        assert_eq!(compress([9, 10, 11, 15]), vec![r(9, 11), r(15, 15)]);
        assert_eq!(compress([15, 9, 11, 10, 10]), vec![r(9, 11), r(15, 15)]);
        assert!(compress(Vec::new()).is_empty());
    }

    #[test]
    fn test_compress_reproduces_input() {
        let input = [0, 1, 2, 5, 7, 8, 12, 13, 14, 15, 23];
        let ranges = compress(input);
        assert_eq!(expand(&ranges), input.to_vec());
        assert_eq!(ranges.len(), 5);
    }

    #[test]
    fn test_format_ranges() {
        assert_eq!(
            format_ranges(&compress([11, 12, 13, 16])),
            "11:00–13:00, 16:00"
        );
        assert_eq!(format_ranges(&[]), "");
    }
}
