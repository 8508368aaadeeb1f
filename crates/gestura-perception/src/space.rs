//! Movement space – the frame of reference for navigation coordinates.
//!
//! When a navigation gesture steadies, the orchestrator anchors a
//! [`MovementSpace`] from the current hand positions: the origin is the left
//! hand, the span is the XY distance between the hands.  Every later frame
//! maps the moving (right) hand into a discrete plane/quadrant
//! [`Coordinate`] relative to that anchor.
//!
//! A space is immutable after anchoring.  Re-entering navigation after a
//! different mode always anchors a brand-new space; classification never
//! mutates an existing one.
//!
//! # Boundary rules
//!
//! - The plane thresholds are inclusive toward the extreme planes: a point
//!   at exactly `origin.z − span` is already `Forward`, and at
//!   `origin.z + span` already `Backward`.
//! - The quadrant thresholds are inclusive toward the inner bucket: a point
//!   at exactly `x_min`, `x_max`, `y_min` or `y_max` stays in the center
//!   column / middle row.

use gestura_types::{Coordinate, GestureError, Plane, Point3, Quadrant};
use tracing::debug;

/// Result of reading the hands against an anchored space.
///
/// An explicit two-variant result so callers cannot mistake "the gesture is
/// over" for a valid center coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceReading {
    Coordinate(Coordinate),
    /// The anchor hand left its station; the navigation session is over.
    NavigationEnded,
}

/// Anchored frame of reference: an origin point plus a scalar span.
///
/// Exists exactly while a navigation gesture session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementSpace {
    origin: Point3,
    span: i32,
}

impl MovementSpace {
    /// Anchor a new space from the current hand positions.
    ///
    /// The origin is the (already integer-truncated) left hand; the span is
    /// the rounded XY distance between the hands.  Depth does not contribute
    /// to the span.
    ///
    /// # Errors
    ///
    /// [`GestureError::DegenerateAnchor`] when the hands coincide in the XY
    /// plane.  The caller stays in the no-frame state until they separate.
    pub fn anchor(left_hand: Point3, right_hand: Point3) -> Result<Self, GestureError> {
        let span = left_hand.xy_distance(&right_hand).round() as i32;
        if span == 0 {
            return Err(GestureError::DegenerateAnchor);
        }
        debug!(
            origin = ?left_hand,
            span,
            "anchored movement space"
        );
        Ok(Self {
            origin: left_hand,
            span,
        })
    }

    pub fn origin(&self) -> Point3 {
        self.origin
    }

    pub fn span(&self) -> i32 {
        self.span
    }

    /// Map a point into the discrete plane/quadrant coordinate.
    ///
    /// Never mutates the space; calling it repeatedly with the same point
    /// always yields the same coordinate.
    pub fn classify(&self, point: Point3) -> Coordinate {
        let plane = self.plane_of(point);
        let quadrant = match plane {
            // The quadrant grid is only meaningful on the POV plane.
            Plane::Pov => self.quadrant_of(point),
            _ => Quadrant::Center,
        };
        Coordinate::new(plane, quadrant)
    }

    /// Read both hands against the space.
    ///
    /// The anchor (left) hand is expected to hold its station near the
    /// origin; once it drifts further than half the span in the XY plane the
    /// navigation session is over.  Otherwise the moving (right) hand is
    /// classified.
    pub fn read(&self, left_hand: Point3, right_hand: Point3) -> SpaceReading {
        if self.origin.xy_distance(&left_hand) > f64::from(self.span) / 2.0 {
            return SpaceReading::NavigationEnded;
        }
        SpaceReading::Coordinate(self.classify(right_hand))
    }

    fn plane_of(&self, point: Point3) -> Plane {
        if point.z <= self.origin.z - self.span {
            Plane::Forward
        } else if point.z >= self.origin.z + self.span {
            Plane::Backward
        } else {
            Plane::Pov
        }
    }

    fn quadrant_of(&self, point: Point3) -> Quadrant {
        let y_min = self.origin.y - self.span / 4;
        let y_max = self.origin.y + self.span / 4;
        let x_min = self.origin.x + self.span / 2;
        let x_max = self.origin.x + self.span + self.span / 2;

        // -1 / 0 / 1 bucket per axis; boundaries fall into the inner bucket.
        let column = if point.x < x_min {
            -1
        } else if point.x > x_max {
            1
        } else {
            0
        };
        let row = if point.y < y_min {
            -1
        } else if point.y > y_max {
            1
        } else {
            0
        };

        match (row, column) {
            (1, -1) => Quadrant::UpLeft,
            (1, 0) => Quadrant::Up,
            (1, 1) => Quadrant::UpRight,
            (0, -1) => Quadrant::Left,
            (0, 0) => Quadrant::Center,
            (0, 1) => Quadrant::Right,
            (-1, -1) => Quadrant::DownLeft,
            (-1, 0) => Quadrant::Down,
            _ => Quadrant::DownRight,
        }
    }
}
