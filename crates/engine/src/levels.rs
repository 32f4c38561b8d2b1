//! Level bands.
//!
//! Levels partition the non-negative point totals into half-open ranges
//! `[min_points, max_points)`. The top band has no `max_points`.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub level: i32,
    pub name: String,
    pub min_points: i64,
    pub max_points: Option<i64>,
    pub multiplier: f64,
    pub perks: Vec<String>,
}

impl Level {
    pub fn contains(&self, points: i64) -> bool {
        points >= self.min_points && self.max_points.is_none_or(|max| points < max)
    }
}

/// Returns the band containing `points`, if any.
///
/// A total equal to a band's `min_points` belongs to that band.
pub fn band_for(levels: &[Level], points: i64) -> Option<&Level> {
    levels.iter().find(|level| level.contains(points))
}

/// Checks that `levels` (any order) form a contiguous partition of `[0, ∞)`.
pub(crate) fn validate_bands(levels: &[Level]) -> ResultEngine<()> {
    if levels.is_empty() {
        return Err(EngineError::InvalidCatalog(
            "at least one level is required".to_string(),
        ));
    }

    let mut sorted: Vec<&Level> = levels.iter().collect();
    sorted.sort_by_key(|level| level.min_points);

    let mut seen_numbers = std::collections::HashSet::new();
    let mut expected_min = 0;
    let mut previous_number = i32::MIN;
    for (index, level) in sorted.iter().enumerate() {
        if !seen_numbers.insert(level.level) {
            return Err(EngineError::InvalidCatalog(format!(
                "duplicate level number {}",
                level.level
            )));
        }
        if level.level <= previous_number {
            return Err(EngineError::InvalidCatalog(format!(
                "level {} must have a higher number than the band below it",
                level.level
            )));
        }
        previous_number = level.level;
        if level.name.trim().is_empty() {
            return Err(EngineError::InvalidCatalog(format!(
                "level {} name must not be empty",
                level.level
            )));
        }
        if level.min_points != expected_min {
            return Err(EngineError::InvalidCatalog(format!(
                "level {} starts at {} but the previous band ends at {expected_min}",
                level.level, level.min_points
            )));
        }
        if level.multiplier <= 0.0 {
            return Err(EngineError::InvalidCatalog(format!(
                "level {} multiplier must be > 0",
                level.level
            )));
        }
        let is_last = index + 1 == sorted.len();
        match level.max_points {
            Some(max) if max <= level.min_points => {
                return Err(EngineError::InvalidCatalog(format!(
                    "level {} is empty: max_points must exceed min_points",
                    level.level
                )));
            }
            Some(max) => expected_min = max,
            None if is_last => {}
            None => {
                return Err(EngineError::InvalidCatalog(format!(
                    "only the top level may be open-ended (level {})",
                    level.level
                )));
            }
        }
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "levels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub level: i32,
    pub name: String,
    pub min_points: i64,
    pub max_points: Option<i64>,
    pub multiplier: f64,
    /// JSON array of perk descriptions.
    pub perks: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Level> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &Level) -> ResultEngine<Self> {
        let perks = serde_json::to_string(&value.perks)
            .map_err(|err| EngineError::InvalidCatalog(format!("invalid perks: {err}")))?;
        Ok(Self {
            level: ActiveValue::Set(value.level),
            name: ActiveValue::Set(value.name.trim().to_string()),
            min_points: ActiveValue::Set(value.min_points),
            max_points: ActiveValue::Set(value.max_points),
            multiplier: ActiveValue::Set(value.multiplier),
            perks: ActiveValue::Set(perks),
        })
    }
}

impl TryFrom<Model> for Level {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let perks = serde_json::from_str(&model.perks).map_err(|err| {
            EngineError::InvalidCatalog(format!("invalid perks for level {}: {err}", model.level))
        })?;
        Ok(Self {
            level: model.level,
            name: model.name,
            min_points: model.min_points,
            max_points: model.max_points,
            multiplier: model.multiplier,
            perks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(level: i32, min_points: i64, max_points: Option<i64>) -> Level {
        Level {
            level,
            name: format!("Level {level}"),
            min_points,
            max_points,
            multiplier: 1.0,
            perks: Vec::new(),
        }
    }

    fn bands() -> Vec<Level> {
        vec![
            level(1, 0, Some(100)),
            level(2, 100, Some(500)),
            level(3, 500, None),
        ]
    }

    #[test]
    fn band_lower_bound_is_inclusive() {
        let levels = bands();
        assert_eq!(band_for(&levels, 0).map(|l| l.level), Some(1));
        assert_eq!(band_for(&levels, 99).map(|l| l.level), Some(1));
        assert_eq!(band_for(&levels, 100).map(|l| l.level), Some(2));
        assert_eq!(band_for(&levels, 500).map(|l| l.level), Some(3));
        assert_eq!(band_for(&levels, i64::MAX).map(|l| l.level), Some(3));
    }

    #[test]
    fn gap_yields_no_band() {
        let levels = vec![level(1, 0, Some(100)), level(2, 200, None)];
        assert!(band_for(&levels, 150).is_none());
    }

    #[test]
    fn contiguous_bands_validate_in_any_order() {
        let mut levels = bands();
        levels.reverse();
        assert!(validate_bands(&levels).is_ok());
    }

    #[test]
    fn rejects_gaps_overlaps_and_open_middle_bands() {
        let gap = vec![level(1, 0, Some(100)), level(2, 150, None)];
        assert!(validate_bands(&gap).is_err());

        let overlap = vec![level(1, 0, Some(100)), level(2, 50, None)];
        assert!(validate_bands(&overlap).is_err());

        let open_middle = vec![level(1, 0, None), level(2, 100, None)];
        assert!(validate_bands(&open_middle).is_err());

        let not_from_zero = vec![level(1, 10, None)];
        assert!(validate_bands(&not_from_zero).is_err());

        let duplicate = vec![level(1, 0, Some(100)), level(1, 100, None)];
        assert!(validate_bands(&duplicate).is_err());
    }
}
