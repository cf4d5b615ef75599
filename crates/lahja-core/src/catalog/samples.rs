//! Bundled training-sample catalog used by the comparison endpoints.

use serde::Serialize;

use super::Dialect;

/// Metadata for one bundled training clip.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleInfo {
    pub id: &'static str,
    pub filename: &'static str,
    pub text: &'static str,
}

/// Training samples recorded for a dialect, paired with their transcripts.
pub fn samples_for(dialect: Dialect) -> &'static [SampleInfo] {
    match dialect {
        Dialect::Egyptian => &[
            SampleInfo {
                id: "eg_sample_1",
                filename: "egyptian_sample1.wav",
                text: "مرحبا بكم في GenArabia",
            },
            SampleInfo {
                id: "eg_sample_2",
                filename: "egyptian_sample2.wav",
                text: "نظام توليد الصوت بالعربية",
            },
        ],
        Dialect::Emirates => &[
            SampleInfo {
                id: "em_sample_1",
                filename: "emirates_sample1.wav",
                text: "أهلا وسهلا في GenArabia",
            },
            SampleInfo {
                id: "em_sample_2",
                filename: "emirates_sample2.wav",
                text: "تقنية تحويل النص إلى صوت",
            },
        ],
        Dialect::Ksa => &[
            SampleInfo {
                id: "ksa_sample_1",
                filename: "ksa_sample1.wav",
                text: "مرحبا في GenArabia",
            },
            SampleInfo {
                id: "ksa_sample_2",
                filename: "ksa_sample2.wav",
                text: "نظام ذكي للصوت العربي",
            },
        ],
        Dialect::Kuwaiti => &[
            SampleInfo {
                id: "kw_sample_1",
                filename: "kuwaiti_sample1.wav",
                text: "هلا والله في GenArabia",
            },
            SampleInfo {
                id: "kw_sample_2",
                filename: "kuwaiti_sample2.wav",
                text: "برنامج تحويل النص لصوت",
            },
        ],
    }
}

/// Look up one sample by id within a dialect.
pub fn find_sample(dialect: Dialect, sample_id: &str) -> Option<&'static SampleInfo> {
    samples_for(dialect).iter().find(|s| s.id == sample_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dialect_has_samples() {
        for dialect in Dialect::all() {
            let samples = samples_for(*dialect);
            assert!(!samples.is_empty());
            for sample in samples {
                assert!(sample.filename.ends_with(".wav"));
                assert!(!sample.text.is_empty());
            }
        }
    }

    #[test]
    fn find_sample_by_id() {
        let sample = find_sample(Dialect::Kuwaiti, "kw_sample_2").unwrap();
        assert_eq!(sample.filename, "kuwaiti_sample2.wav");
        assert!(find_sample(Dialect::Kuwaiti, "eg_sample_1").is_none());
    }
}
