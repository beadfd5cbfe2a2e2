//! Collision Filtering (Category/Mask/Group System)
//!
//! Bitmask-based collision filtering for controlling which bodies can
//! interact, plus signed collision groups that override the bitmask check.
//!
//! # Usage
//!
//! ```
//! use vera_physics::filter::CollisionFilter;
//!
//! // Category 0 = terrain, category 1 = debris that ignores other debris
//! let terrain = CollisionFilter::new(1 << 0, u32::MAX);
//! let debris  = CollisionFilter::new(1 << 1, 1 << 0); // collides with terrain only
//! assert!(CollisionFilter::can_collide(&terrain, &debris));
//! assert!(!CollisionFilter::can_collide(&debris, &debris));
//! ```

/// Collision filter using category/mask bitmasks and a signed group id.
///
/// When both bodies share the same non-zero `group`, the group alone decides:
/// positive groups always collide with themselves, negative groups never do.
/// Otherwise two bodies can collide iff
/// `(a.category & b.mask) != 0 && (b.category & a.mask) != 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollisionFilter {
    /// Which category bit(s) this body belongs to (bitmask)
    pub category: u32,
    /// Which categories this body can collide with (bitmask)
    pub mask: u32,
    /// Signed collision group id (0 = no group)
    pub group: i32,
}

impl CollisionFilter {
    /// Default filter: category 1, collides with everything, no group.
    pub const DEFAULT: Self = Self {
        category: 0x0001,
        mask: u32::MAX,
        group: 0,
    };

    /// Filter that collides with nothing.
    pub const NONE: Self = Self {
        category: 0,
        mask: 0,
        group: 0,
    };

    /// Create a new collision filter.
    #[inline]
    #[must_use]
    pub const fn new(category: u32, mask: u32) -> Self {
        Self {
            category,
            mask,
            group: 0,
        }
    }

    /// Attach a collision group.
    #[inline]
    #[must_use]
    pub const fn with_group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    /// Check whether two filters allow collision.
    #[inline]
    #[must_use]
    pub fn can_collide(a: &Self, b: &Self) -> bool {
        if a.group == b.group && a.group != 0 {
            return a.group > 0;
        }
        (a.mask & b.category) != 0 && (b.mask & a.category) != 0
    }
}

impl Default for CollisionFilter {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_collide() {
        let a = CollisionFilter::DEFAULT;
        let b = CollisionFilter::DEFAULT;
        assert!(CollisionFilter::can_collide(&a, &b));
    }

    #[test]
    fn test_none_filter() {
        let a = CollisionFilter::NONE;
        let b = CollisionFilter::DEFAULT;
        assert!(!CollisionFilter::can_collide(&a, &b));
    }

    #[test]
    fn test_mask_is_bidirectional() {
        // a can see b, but b cannot see a
        let a = CollisionFilter::new(1 << 0, 1 << 1);
        let b = CollisionFilter::new(1 << 1, 0);
        assert!(!CollisionFilter::can_collide(&a, &b));
        assert!(!CollisionFilter::can_collide(&b, &a));
    }

    #[test]
    fn test_positive_group_always_collides() {
        // masks would forbid the collision, the shared positive group allows it
        let a = CollisionFilter::new(1 << 0, 0).with_group(3);
        let b = CollisionFilter::new(1 << 1, 0).with_group(3);
        assert!(CollisionFilter::can_collide(&a, &b));
    }

    #[test]
    fn test_negative_group_never_collides() {
        // masks would allow the collision, the shared negative group forbids it
        let a = CollisionFilter::DEFAULT.with_group(-2);
        let b = CollisionFilter::DEFAULT.with_group(-2);
        assert!(!CollisionFilter::can_collide(&a, &b));
    }

    #[test]
    fn test_different_groups_fall_back_to_masks() {
        let a = CollisionFilter::DEFAULT.with_group(1);
        let b = CollisionFilter::DEFAULT.with_group(2);
        assert!(CollisionFilter::can_collide(&a, &b));

        let c = CollisionFilter::NONE.with_group(1);
        let d = CollisionFilter::DEFAULT.with_group(2);
        assert!(!CollisionFilter::can_collide(&c, &d));
    }

    #[test]
    fn test_group_zero_always_checks_mask() {
        let a = CollisionFilter::DEFAULT.with_group(0);
        let b = CollisionFilter::DEFAULT.with_group(0);
        assert!(CollisionFilter::can_collide(&a, &b));
    }
}
