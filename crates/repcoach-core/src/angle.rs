//! Joint angle calculation.
//!
//! The angle at a vertex `p2` is the difference of the `atan2` headings of
//! `p2→p1` and `p2→p3`, taken as an absolute value and folded into
//! `[0, 180]` so that it is always the interior angle.

use crate::landmark::{JointTriple, Landmark, LandmarkFrame};

/// Segments shorter than this are treated as zero length.
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Why an angle (or any landmark-derived signal) could not be computed.
///
/// This is a no-signal outcome, never a form judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unavailable {
    /// The estimator did not report this body part.
    #[error("landmark {index} is missing")]
    MissingLandmark {
        /// Body-part index.
        index: usize,
    },

    /// The body part was reported below the visibility threshold.
    #[error("landmark {index} is below the visibility threshold")]
    LowVisibility {
        /// Body-part index.
        index: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("landmark has non-finite coordinates")]
    NonFinite,

    /// The vertex coincides with one of the endpoints.
    #[error("degenerate joint geometry")]
    Degenerate,
}

/// Folds an unsigned angle in `[0, 360]` onto the interior angle in `[0, 180]`.
#[must_use]
pub fn fold_degrees(degrees: f64) -> f64 {
    let degrees = degrees.abs() % 360.0;
    if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    }
}

/// Calculate the angle at `p2` in degrees.
///
/// Returns a value in `[0, 180]`:
/// - 180° = the three points are collinear (limb fully straight)
/// - 0° = both segments point the same way (limb fully folded)
///
/// # Errors
///
/// Returns [`Unavailable::NonFinite`] if a coordinate is not finite and
/// [`Unavailable::Degenerate`] if either segment has zero length.
pub fn angle(p1: &Landmark, p2: &Landmark, p3: &Landmark) -> Result<f64, Unavailable> {
    if !(p1.is_finite() && p2.is_finite() && p3.is_finite()) {
        return Err(Unavailable::NonFinite);
    }

    let v1 = (p1.x - p2.x, p1.y - p2.y);
    let v2 = (p3.x - p2.x, p3.y - p2.y);

    if v1.0.hypot(v1.1) < MIN_SEGMENT_LENGTH || v2.0.hypot(v2.1) < MIN_SEGMENT_LENGTH {
        return Err(Unavailable::Degenerate);
    }

    let radians = v2.1.atan2(v2.0) - v1.1.atan2(v1.0);
    Ok(fold_degrees(radians.to_degrees()))
}

/// Angle at the vertex of `triple` in `frame`.
///
/// Landmarks reported below `min_visibility` count as missing.
///
/// # Errors
///
/// Returns an [`Unavailable`] reason if any of the three landmarks cannot be
/// used or the geometry is degenerate.
pub fn joint_angle(
    frame: &LandmarkFrame,
    triple: JointTriple,
    min_visibility: f64,
) -> Result<f64, Unavailable> {
    let a = frame.point(triple.a, min_visibility)?;
    let b = frame.point(triple.b, min_visibility)?;
    let c = frame.point(triple.c, min_visibility)?;
    angle(&a, &b, &c)
}
