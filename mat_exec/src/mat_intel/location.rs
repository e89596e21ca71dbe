//! # Mat locations and travel direction

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A segment of the mat. The robot visits them in the cyclic order given by [`Location::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Side1,
    Corner1,
    Side2,
    Corner2,
    Side3,
    Corner3,
    Side4,
    Corner4,
}

/// Whether a location is a straight side or a corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericLocation {
    Side,
    Corner,
}

/// Direction of travel round the mat, viewed from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    Unknown,
}

/// Which wall a distance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wall {
    Left,
    Right,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Location {
    /// All locations in travel order, starting at `Side1`.
    pub const ALL: [Location; 8] = [
        Location::Side1,
        Location::Corner1,
        Location::Side2,
        Location::Corner2,
        Location::Side3,
        Location::Corner3,
        Location::Side4,
        Location::Corner4,
    ];

    /// The location reached after completing this one.
    pub fn next(&self) -> Self {
        match self {
            Location::Side1 => Location::Corner1,
            Location::Corner1 => Location::Side2,
            Location::Side2 => Location::Corner2,
            Location::Corner2 => Location::Side3,
            Location::Side3 => Location::Corner3,
            Location::Corner3 => Location::Side4,
            Location::Side4 => Location::Corner4,
            Location::Corner4 => Location::Side1,
        }
    }

    pub fn generic(&self) -> GenericLocation {
        match self {
            Location::Side1 | Location::Side2 | Location::Side3 | Location::Side4 => {
                GenericLocation::Side
            }
            _ => GenericLocation::Corner,
        }
    }

    pub fn is_side(&self) -> bool {
        self.generic() == GenericLocation::Side
    }
}

impl Direction {
    /// Sign of a turn in this direction, positive is clockwise. Unknown counts as clockwise.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::CounterClockwise => -1.0,
            _ => 1.0,
        }
    }

    /// The wall on the inside of the mat, if the direction is known.
    pub fn inside_wall(&self) -> Option<Wall> {
        match self {
            Direction::Clockwise => Some(Wall::Right),
            Direction::CounterClockwise => Some(Wall::Left),
            Direction::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Direction::Unknown
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Unknown
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cycle() {
        let mut loc = Location::Side1;
        for expected in Location::ALL.iter().skip(1) {
            loc = loc.next();
            assert_eq!(loc, *expected);
        }
        assert_eq!(loc.next(), Location::Side1);
    }

    #[test]
    fn test_generic() {
        let sides = Location::ALL.iter().filter(|l| l.is_side()).count();
        assert_eq!(sides, 4);
        assert_eq!(Location::Corner3.generic(), GenericLocation::Corner);
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::Clockwise.inside_wall(), Some(Wall::Right));
        assert_eq!(Direction::CounterClockwise.inside_wall(), Some(Wall::Left));
        assert_eq!(Direction::Unknown.inside_wall(), None);
        assert_eq!(Direction::Unknown.sign(), 1.0);
        assert_eq!(Direction::CounterClockwise.sign(), -1.0);
    }
}
