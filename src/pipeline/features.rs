//! Named-field feature contracts for the tabular tasks.
//!
//! The wire format is positional (`"features": [..]`). Each task parses it
//! into a named struct with `from_positional`, which rejects wrong lengths,
//! and serializes back to the exact order the model was trained on with
//! `to_vector`.

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

fn check_len(task: &'static str, expected: usize, values: &[f32]) -> Result<(), InferenceError> {
    if values.len() != expected {
        return Err(InferenceError::shape(
            task,
            format!("{expected} features"),
            format!("{} features", values.len()),
        ));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Risk stratification
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatures {
    pub age: f32,
    pub gender: f32,
    pub smoking_status: f32,
    pub alcohol_use: f32,
    pub hemoglobin: f32,
    pub leukocyte_count: f32,
    pub platelet_count: f32,
    pub glucose_level: f32,
    pub urea_level: f32,
    pub creatinine_level: f32,
}

impl RiskFeatures {
    pub const COUNT: usize = 10;

    pub fn from_positional(values: &[f32]) -> Result<Self, InferenceError> {
        check_len("risk", Self::COUNT, values)?;
        Ok(Self {
            age: values[0],
            gender: values[1],
            smoking_status: values[2],
            alcohol_use: values[3],
            hemoglobin: values[4],
            leukocyte_count: values[5],
            platelet_count: values[6],
            glucose_level: values[7],
            urea_level: values[8],
            creatinine_level: values[9],
        })
    }

    pub fn to_vector(&self) -> [f32; Self::COUNT] {
        [
            self.age,
            self.gender,
            self.smoking_status,
            self.alcohol_use,
            self.hemoglobin,
            self.leukocyte_count,
            self.platelet_count,
            self.glucose_level,
            self.urea_level,
            self.creatinine_level,
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Length of stay
// ═══════════════════════════════════════════════════════════

/// Diagnosed conditions encoded as 0/1 flags in the length-of-stay vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disease {
    StableAngina,
    CompleteHeartBlock,
    HeartFailure,
    CoronaryArteryDisease,
    Hypertension,
    VentricularTachycardia,
    AtypicalChestPain,
    AcuteCoronarySyndrome,
    DiabetesMellitus,
    UrinaryTractInfection,
    PriorCardiomyopathy,
    RaisedCardiacEnzymes,
}

impl Disease {
    pub const ALL: [Disease; 12] = [
        Disease::StableAngina,
        Disease::CompleteHeartBlock,
        Disease::HeartFailure,
        Disease::CoronaryArteryDisease,
        Disease::Hypertension,
        Disease::VentricularTachycardia,
        Disease::AtypicalChestPain,
        Disease::AcuteCoronarySyndrome,
        Disease::DiabetesMellitus,
        Disease::UrinaryTractInfection,
        Disease::PriorCardiomyopathy,
        Disease::RaisedCardiacEnzymes,
    ];

    /// Position of this condition's flag in the 22-value vector.
    pub const fn feature_index(self) -> usize {
        match self {
            Disease::StableAngina => 8,
            Disease::CompleteHeartBlock => 9,
            Disease::HeartFailure => 10,
            Disease::CoronaryArteryDisease => 11,
            Disease::Hypertension => 12,
            Disease::VentricularTachycardia => 13,
            Disease::UrinaryTractInfection => 14,
            Disease::DiabetesMellitus => 15,
            Disease::PriorCardiomyopathy => 16,
            Disease::RaisedCardiacEnzymes => 17,
            Disease::AcuteCoronarySyndrome => 18,
            Disease::AtypicalChestPain => 21,
        }
    }
}

/// Set of diagnosed conditions, one bit per `Disease`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiseaseSet(u16);

impl DiseaseSet {
    const fn bit(disease: Disease) -> u16 {
        1 << disease as u16
    }

    pub fn insert(&mut self, disease: Disease) {
        self.0 |= Self::bit(disease);
    }

    pub fn contains(&self, disease: Disease) -> bool {
        self.0 & Self::bit(disease) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Disease> + '_ {
        Disease::ALL.into_iter().filter(|d| self.contains(*d))
    }
}

impl FromIterator<Disease> for DiseaseSet {
    fn from_iter<I: IntoIterator<Item = Disease>>(iter: I) -> Self {
        let mut set = DiseaseSet::default();
        for disease in iter {
            set.insert(disease);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthOfStayFeatures {
    pub urea_level: f32,
    pub leukocyte_count: f32,
    pub platelet_count: f32,
    pub hemoglobin: f32,
    pub glucose_level: f32,
    pub age: f32,
    pub creatinine_level: f32,
    /// 0 = elective, 1 = emergency
    pub admission_type: f32,
    pub gender: f32,
    /// 0 = rural, 1 = urban
    pub residence_type: f32,
    pub diseases: DiseaseSet,
}

impl LengthOfStayFeatures {
    pub const COUNT: usize = 22;

    /// Parse the positional vector. Disease flag slots must hold exactly 0
    /// or 1, the only encoding the regressor was fit on.
    pub fn from_positional(values: &[f32]) -> Result<Self, InferenceError> {
        check_len("length_of_stay", Self::COUNT, values)?;
        let mut diseases = DiseaseSet::default();
        for disease in Disease::ALL {
            let flag = values[disease.feature_index()];
            if flag == 1.0 {
                diseases.insert(disease);
            } else if flag != 0.0 {
                return Err(InferenceError::shape(
                    "length_of_stay",
                    format!("0/1 flag at position {}", disease.feature_index()),
                    flag,
                ));
            }
        }
        Ok(Self {
            urea_level: values[0],
            leukocyte_count: values[1],
            platelet_count: values[2],
            hemoglobin: values[3],
            glucose_level: values[4],
            age: values[5],
            creatinine_level: values[6],
            admission_type: values[7],
            gender: values[19],
            residence_type: values[20],
            diseases,
        })
    }

    pub fn to_vector(&self) -> [f32; Self::COUNT] {
        let mut v = [0.0; Self::COUNT];
        v[0] = self.urea_level;
        v[1] = self.leukocyte_count;
        v[2] = self.platelet_count;
        v[3] = self.hemoglobin;
        v[4] = self.glucose_level;
        v[5] = self.age;
        v[6] = self.creatinine_level;
        v[7] = self.admission_type;
        v[19] = self.gender;
        v[20] = self.residence_type;
        for disease in self.diseases.iter() {
            v[disease.feature_index()] = 1.0;
        }
        v
    }
}

// ═══════════════════════════════════════════════════════════
// Patient segmentation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentFeatures {
    pub age: f32,
    pub hemoglobin: f32,
    pub leukocyte_count: f32,
    pub platelet_count: f32,
    pub glucose_level: f32,
    pub creatinine_level: f32,
    pub urea_level: f32,
}

impl SegmentFeatures {
    pub const COUNT: usize = 7;

    pub fn from_positional(values: &[f32]) -> Result<Self, InferenceError> {
        check_len("segmentation", Self::COUNT, values)?;
        Ok(Self {
            age: values[0],
            hemoglobin: values[1],
            leukocyte_count: values[2],
            platelet_count: values[3],
            glucose_level: values[4],
            creatinine_level: values[5],
            urea_level: values[6],
        })
    }

    pub fn to_vector(&self) -> [f32; Self::COUNT] {
        [
            self.age,
            self.hemoglobin,
            self.leukocyte_count,
            self.platelet_count,
            self.glucose_level,
            self.creatinine_level,
            self.urea_level,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn risk_round_trips_positional_order() {
        let raw = [45.0, 1.0, 0.0, 0.0, 13.5, 7000.0, 250000.0, 90.0, 20.0, 0.9];
        let features = RiskFeatures::from_positional(&raw).unwrap();
        assert_eq!(features.hemoglobin, 13.5);
        assert_eq!(features.creatinine_level, 0.9);
        assert_eq!(features.to_vector(), raw);
    }

    #[test]
    fn risk_rejects_wrong_length() {
        let err = RiskFeatures::from_positional(&[1.0; 9]).unwrap_err();
        assert_eq!(
            err,
            InferenceError::shape("risk", "10 features", "9 features")
        );
    }

    #[test]
    fn disease_indices_are_distinct_flag_slots() {
        let indices: HashSet<usize> = Disease::ALL.iter().map(|d| d.feature_index()).collect();
        assert_eq!(indices.len(), Disease::ALL.len());
        for idx in indices {
            assert!((8..=18).contains(&idx) || idx == 21, "index {idx} is not a flag slot");
        }
    }

    #[test]
    fn disease_serde_uses_snake_case() {
        let json = serde_json::to_string(&Disease::UrinaryTractInfection).unwrap();
        assert_eq!(json, "\"urinary_tract_infection\"");
    }

    #[test]
    fn los_vector_places_flags() {
        let features = LengthOfStayFeatures {
            urea_level: 30.0,
            leukocyte_count: 8000.0,
            platelet_count: 200000.0,
            hemoglobin: 12.0,
            glucose_level: 110.0,
            age: 67.0,
            creatinine_level: 1.2,
            admission_type: 1.0,
            gender: 0.0,
            residence_type: 1.0,
            diseases: [Disease::HeartFailure, Disease::AtypicalChestPain]
                .into_iter()
                .collect(),
        };
        let v = features.to_vector();
        assert_eq!(v.len(), 22);
        assert_eq!(v[0], 30.0);
        assert_eq!(v[5], 67.0);
        assert_eq!(v[10], 1.0);
        assert_eq!(v[21], 1.0);
        assert_eq!(v[8], 0.0);
        assert_eq!(v[20], 1.0);
        assert_eq!(v.iter().filter(|x| **x == 1.0).count(), 4);
    }

    #[test]
    fn los_positional_round_trip() {
        let mut raw = [0.0f32; 22];
        raw[0] = 25.0;
        raw[5] = 54.0;
        raw[7] = 1.0;
        raw[12] = 1.0; // hypertension
        raw[15] = 1.0; // diabetes
        raw[19] = 1.0;
        let features = LengthOfStayFeatures::from_positional(&raw).unwrap();
        assert!(features.diseases.contains(Disease::Hypertension));
        assert!(features.diseases.contains(Disease::DiabetesMellitus));
        assert_eq!(features.diseases.len(), 2);
        assert_eq!(features.to_vector(), raw);
    }

    #[test]
    fn los_rejects_non_binary_flags() {
        let mut raw = [0.0f32; 22];
        raw[Disease::HeartFailure.feature_index()] = 0.5;
        let err = LengthOfStayFeatures::from_positional(&raw).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn los_rejects_wrong_length() {
        assert!(LengthOfStayFeatures::from_positional(&[0.0; 21]).is_err());
        assert!(LengthOfStayFeatures::from_positional(&[0.0; 23]).is_err());
    }

    #[test]
    fn segment_keeps_order() {
        let raw = [45.0, 13.5, 7000.0, 250000.0, 90.0, 0.9, 20.0];
        let features = SegmentFeatures::from_positional(&raw).unwrap();
        assert_eq!(features.creatinine_level, 0.9);
        assert_eq!(features.urea_level, 20.0);
        assert_eq!(features.to_vector(), raw);
    }

    #[test]
    fn disease_set_basics() {
        let mut set = DiseaseSet::default();
        assert!(set.is_empty());
        set.insert(Disease::Hypertension);
        set.insert(Disease::Hypertension);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Disease::Hypertension]);
    }
}
