//! # Learned map
//!
//! Per-location target distances. Entries start from direction dependent defaults and are
//! refined as the robot measures the corridors. A value of [`NO_TARGET`] leaves that distance
//! unconstrained.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::collections::HashMap;

use super::{Direction, Location, MatIntelParams, Wall};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Sentinel for an unconstrained distance.
pub const NO_TARGET: f64 = -1.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Target distances for one location.
///
/// Units: centimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Targets {
    pub front: f64,
    pub left: f64,
    pub right: f64,
}

/// Learned targets for every location visited so far.
#[derive(Debug, Clone, Default)]
pub struct LearnedMap {
    targets: HashMap<Location, Targets>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Classification of a side by its corridor width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideClass {
    Short,
    Long,
    Unclassified,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Targets {
    pub fn new(front: f64, left: f64, right: f64) -> Self {
        Self { front, left, right }
    }

    pub fn wall(&self, wall: Wall) -> f64 {
        match wall {
            Wall::Left => self.left,
            Wall::Right => self.right,
        }
    }

    /// Sum of the side targets, if both are set.
    pub fn total(&self) -> Option<f64> {
        if is_set(self.left) && is_set(self.right) {
            Some(self.left + self.right)
        } else {
            None
        }
    }
}

impl LearnedMap {
    pub fn get(&self, location: Location) -> Option<Targets> {
        self.targets.get(&location).copied()
    }

    pub fn set(&mut self, location: Location, targets: Targets) {
        self.targets.insert(location, targets);
    }

    /// The learned entry, or the default if nothing has been learned.
    pub fn get_or_default(
        &self,
        location: Location,
        direction: Direction,
        params: &MatIntelParams,
    ) -> Targets {
        self.get(location)
            .unwrap_or_else(|| default_targets(location, direction, params))
    }

    /// Learn a side's half width if it is smaller than the current one or unset.
    pub fn learn_side(
        &mut self,
        location: Location,
        mid: f64,
        direction: Direction,
        params: &MatIntelParams,
    ) {
        let mut t = self.get_or_default(location, direction, params);

        if !is_set(t.left) || mid < t.left {
            t.left = mid;
            t.right = mid;
        }

        self.set(location, t);
    }

    /// Set a side's half width unconditionally.
    pub fn assign_side(
        &mut self,
        location: Location,
        mid: f64,
        direction: Direction,
        params: &MatIntelParams,
    ) {
        let mut t = self.get_or_default(location, direction, params);
        t.left = mid;
        t.right = mid;
        self.set(location, t);
    }

    /// Recompute side end distances and corner distances from the learned corridor widths.
    ///
    /// A side ends earlier if the side after the next corner is short. A corner's distances
    /// depend on the side it leads into.
    pub fn reprocess(&mut self, direction: Direction, params: &MatIntelParams) {
        for loc in Location::ALL.iter().copied() {
            let following = if loc.is_side() {
                loc.next().next()
            } else {
                loc.next()
            };

            let class = match self.get(following).and_then(|t| t.total()) {
                Some(total) => classify_side(total, params),
                None => continue,
            };

            let mut t = self.get_or_default(loc, direction, params);

            if loc.is_side() {
                match class {
                    SideClass::Long => t.front = params.side_front_cm,
                    SideClass::Short => t.front = params.short_side_front_cm,
                    SideClass::Unclassified => continue,
                }
            } else {
                let (front, inside) = match class {
                    SideClass::Long => (params.long_corner_front_cm, params.long_corner_inside_cm),
                    SideClass::Short => {
                        (params.short_corner_front_cm, params.short_corner_inside_cm)
                    }
                    SideClass::Unclassified => continue,
                };

                t.front = front;
                match direction.inside_wall() {
                    Some(Wall::Right) => {
                        t.right = inside;
                        t.left = NO_TARGET;
                    }
                    Some(Wall::Left) => {
                        t.left = inside;
                        t.right = NO_TARGET;
                    }
                    None => (),
                }
            }

            self.set(loc, t);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// True if a target distance constrains the robot.
pub fn is_set(value: f64) -> bool {
    value >= 0.0
}

/// Classify a corridor by its total width. Short is checked first as the ranges overlap.
pub fn classify_side(total: f64, params: &MatIntelParams) -> SideClass {
    if params.short_side_min_cm < total && total < params.short_side_max_cm {
        SideClass::Short
    } else if params.long_side_min_cm < total && total < params.long_side_max_cm {
        SideClass::Long
    } else {
        SideClass::Unclassified
    }
}

/// Targets used before anything has been learned.
pub fn default_targets(
    location: Location,
    direction: Direction,
    params: &MatIntelParams,
) -> Targets {
    if location.is_side() {
        return Targets::new(params.side_front_cm, NO_TARGET, NO_TARGET);
    }

    let front = params.corner_front_cm;
    match direction.inside_wall() {
        Some(Wall::Right) => Targets::new(front, NO_TARGET, params.corner_inside_cm),
        Some(Wall::Left) => Targets::new(front, params.corner_inside_cm, NO_TARGET),
        None => Targets::new(front, NO_TARGET, NO_TARGET),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = MatIntelParams::default();

        assert_eq!(
            default_targets(Location::Side3, Direction::Clockwise, &p),
            Targets::new(100.0, -1.0, -1.0)
        );
        assert_eq!(
            default_targets(Location::Corner1, Direction::Clockwise, &p),
            Targets::new(20.0, -1.0, 30.0)
        );
        assert_eq!(
            default_targets(Location::Corner1, Direction::CounterClockwise, &p),
            Targets::new(20.0, 30.0, -1.0)
        );
        assert_eq!(
            default_targets(Location::Corner2, Direction::Unknown, &p),
            Targets::new(20.0, -1.0, -1.0)
        );
    }

    #[test]
    fn test_classify() {
        let p = MatIntelParams::default();

        assert_eq!(classify_side(100.0, &p), SideClass::Long);
        assert_eq!(classify_side(60.0, &p), SideClass::Short);
        assert_eq!(classify_side(30.0, &p), SideClass::Unclassified);
        assert_eq!(classify_side(150.0, &p), SideClass::Unclassified);
    }

    #[test]
    fn test_learn_side_keeps_smaller() {
        let p = MatIntelParams::default();
        let mut map = LearnedMap::default();

        map.learn_side(Location::Side2, 50.0, Direction::Clockwise, &p);
        map.learn_side(Location::Side2, 55.0, Direction::Clockwise, &p);
        assert_eq!(map.get(Location::Side2), Some(Targets::new(100.0, 50.0, 50.0)));

        map.learn_side(Location::Side2, 45.0, Direction::Clockwise, &p);
        assert_eq!(map.get(Location::Side2).unwrap().left, 45.0);
    }

    #[test]
    fn test_reprocess() {
        let p = MatIntelParams::default();
        let mut map = LearnedMap::default();

        // Side2 narrow, every other side wide
        map.assign_side(Location::Side1, 50.0, Direction::Clockwise, &p);
        map.assign_side(Location::Side2, 30.0, Direction::Clockwise, &p);
        map.assign_side(Location::Side3, 50.0, Direction::Clockwise, &p);
        map.assign_side(Location::Side4, 50.0, Direction::Clockwise, &p);

        map.reprocess(Direction::Clockwise, &p);

        // Side1 leads into Side2, which is short
        assert_eq!(map.get(Location::Side1).unwrap().front, 70.0);
        assert_eq!(map.get(Location::Side2).unwrap().front, 100.0);

        // Corner1 leads into the short side
        assert_eq!(
            map.get(Location::Corner1),
            Some(Targets::new(20.0, -1.0, 25.0))
        );
        assert_eq!(
            map.get(Location::Corner2),
            Some(Targets::new(30.0, -1.0, 35.0))
        );
    }
}
