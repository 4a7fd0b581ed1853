//! Facet filters over exercise metadata.
//!
//! A facet with an empty accepted set places no constraint. Records that
//! lack a value for a constrained single-valued facet never match; for the
//! muscle facets a record without muscles still matches when the user has
//! accepted every value observed in the catalog.

use crate::ExerciseRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Filterable exercise attribute
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Force,
    Mechanic,
    Equipment,
    Category,
    PrimaryMuscles,
    SecondaryMuscles,
    NoiseLevel,
    PartnerRequired,
}

impl Facet {
    pub const ALL: [Facet; 8] = [
        Facet::Force,
        Facet::Mechanic,
        Facet::Equipment,
        Facet::Category,
        Facet::PrimaryMuscles,
        Facet::SecondaryMuscles,
        Facet::NoiseLevel,
        Facet::PartnerRequired,
    ];

    /// Muscle facets get the "selected everything" carve-out
    pub fn is_muscle_facet(&self) -> bool {
        matches!(self, Facet::PrimaryMuscles | Facet::SecondaryMuscles)
    }

    /// Normalized values of this facet for one exercise
    pub fn values_of(&self, exercise: &ExerciseRecord) -> BTreeSet<String> {
        let single = |value: &Option<String>| -> BTreeSet<String> {
            value
                .iter()
                .map(|v| normalize(v))
                .filter(|v| !v.is_empty())
                .collect()
        };
        let many = |values: &BTreeSet<String>| -> BTreeSet<String> {
            values.iter().map(|v| normalize(v)).collect()
        };

        match self {
            Facet::Force => single(&exercise.force),
            Facet::Mechanic => single(&exercise.mechanic),
            Facet::Equipment => single(&exercise.equipment),
            Facet::Category => single(&exercise.category),
            Facet::PrimaryMuscles => many(&exercise.primary_muscles),
            Facet::SecondaryMuscles => many(&exercise.secondary_muscles),
            Facet::NoiseLevel => {
                let level = if exercise.quiet { "quiet" } else { "loud" };
                BTreeSet::from([level.to_string()])
            }
            Facet::PartnerRequired => {
                let partner = if exercise.partner_required { "yes" } else { "no" };
                BTreeSet::from([partner.to_string()])
            }
        }
    }

    /// Parse a facet name as typed by a user ("primary-muscles", "noise")
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "force" => Some(Facet::Force),
            "mechanic" => Some(Facet::Mechanic),
            "equipment" => Some(Facet::Equipment),
            "category" => Some(Facet::Category),
            "primary_muscles" | "primary" | "muscles" => Some(Facet::PrimaryMuscles),
            "secondary_muscles" | "secondary" => Some(Facet::SecondaryMuscles),
            "noise_level" | "noise" => Some(Facet::NoiseLevel),
            "partner_required" | "partner" => Some(Facet::PartnerRequired),
            _ => None,
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Every value observed per facet across a set of exercises
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FacetUniverse {
    values: BTreeMap<Facet, BTreeSet<String>>,
}

impl FacetUniverse {
    pub fn observe<'a>(exercises: impl IntoIterator<Item = &'a ExerciseRecord>) -> Self {
        let mut values: BTreeMap<Facet, BTreeSet<String>> = BTreeMap::new();
        for exercise in exercises {
            for facet in Facet::ALL {
                values
                    .entry(facet)
                    .or_default()
                    .extend(facet.values_of(exercise));
            }
        }
        Self { values }
    }

    pub fn values(&self, facet: Facet) -> impl Iterator<Item = &str> {
        self.values
            .get(&facet)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Whether `accepted` selects every observed value of a facet that has
    /// at least one observed value
    fn covers(&self, facet: Facet, accepted: &BTreeSet<String>) -> bool {
        self.values
            .get(&facet)
            .map_or(false, |observed| !observed.is_empty() && observed.is_subset(accepted))
    }
}

/// Accepted values per facet
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Filters {
    facets: BTreeMap<Facet, BTreeSet<String>>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted set of one facet (an empty set removes it)
    pub fn set<I, V>(&mut self, facet: Facet, values: I)
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let accepted: BTreeSet<String> = values
            .into_iter()
            .map(|v| normalize(v.as_ref()))
            .filter(|v| !v.is_empty())
            .collect();
        if accepted.is_empty() {
            self.facets.remove(&facet);
        } else {
            self.facets.insert(facet, accepted);
        }
    }

    pub fn with<I, V>(mut self, facet: Facet, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        self.set(facet, values);
        self
    }

    pub fn clear(&mut self, facet: Facet) {
        self.facets.remove(&facet);
    }

    pub fn clear_all(&mut self) {
        self.facets.clear();
    }

    pub fn accepted(&self, facet: Facet) -> Option<&BTreeSet<String>> {
        self.facets.get(&facet)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.facets.values().all(BTreeSet::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Facet, &BTreeSet<String>)> {
        self.facets.iter().map(|(facet, values)| (*facet, values))
    }

    /// Whether one exercise passes every constrained facet
    pub fn matches(&self, exercise: &ExerciseRecord, universe: &FacetUniverse) -> bool {
        self.facets.iter().all(|(facet, accepted)| {
            if accepted.is_empty() {
                return true;
            }

            let values = facet.values_of(exercise);
            if values.is_empty() {
                return facet.is_muscle_facet() && universe.covers(*facet, accepted);
            }

            !values.is_disjoint(accepted)
        })
    }
}
