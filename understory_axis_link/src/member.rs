// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The read-only projection of a view that an axis group may consult.

use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use smallvec::SmallVec;

use crate::group::AxisGroupError;
use crate::interval::Interval;

/// Everything an axis group is allowed to see of one view.
///
/// Groups read these values while combining constraints. They never see the
/// view's cached bounds or scale, which keeps constraint combination from
/// recursing back into state the group itself produces.
pub trait AxisGroupMember {
    /// Visible extent of the view in logical (device-independent) pixels.
    fn span_lpx(&self) -> f64;

    /// Allowed range for the lower edge of the visible bounds.
    fn min_constraint(&self) -> Interval;

    /// Allowed range for the upper edge of the visible bounds.
    fn max_constraint(&self) -> Interval;

    /// Allowed range for the visible span, in data units.
    fn span_constraint(&self) -> Interval;

    /// Allowed range for the scale, in logical pixels per data unit.
    fn scale_constraint(&self) -> Interval;
}

/// Cell-backed [`AxisGroupMember`] owned by an axis.
///
/// The owning axis writes through the setters; groups only read. All fields
/// are plain `Cell`s, so reads never conflict with an in-progress update.
pub struct AxisMember {
    span_lpx: Cell<f64>,
    min: Cell<Interval>,
    max: Cell<Interval>,
    span: Cell<Interval>,
    scale: Cell<Interval>,
}

impl AxisMember {
    /// Creates an unconstrained member with the given logical pixel span.
    #[must_use]
    pub fn new(span_lpx: f64) -> Self {
        Self {
            span_lpx: Cell::new(span_lpx),
            min: Cell::new(Interval::ALL),
            max: Cell::new(Interval::ALL),
            span: Cell::new(Interval::ALL),
            scale: Cell::new(Interval::ALL),
        }
    }

    /// Sets the logical pixel span.
    pub fn set_span_lpx(&self, span_lpx: f64) {
        self.span_lpx.set(span_lpx);
    }

    /// Sets the lower-edge constraint.
    pub fn set_min_constraint(&self, constraint: Interval) {
        self.min.set(constraint);
    }

    /// Sets the upper-edge constraint.
    pub fn set_max_constraint(&self, constraint: Interval) {
        self.max.set(constraint);
    }

    /// Sets the span constraint.
    pub fn set_span_constraint(&self, constraint: Interval) {
        self.span.set(constraint);
    }

    /// Sets the scale constraint.
    pub fn set_scale_constraint(&self, constraint: Interval) {
        self.scale.set(constraint);
    }
}

impl AxisGroupMember for AxisMember {
    fn span_lpx(&self) -> f64 {
        self.span_lpx.get()
    }

    fn min_constraint(&self) -> Interval {
        self.min.get()
    }

    fn max_constraint(&self) -> Interval {
        self.max.get()
    }

    fn span_constraint(&self) -> Interval {
        self.span.get()
    }

    fn scale_constraint(&self) -> Interval {
        self.scale.get()
    }
}

impl fmt::Debug for AxisMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisMember")
            .field("span_lpx", &self.span_lpx.get())
            .field("min", &self.min.get())
            .field("max", &self.max.get())
            .field("span", &self.span.get())
            .field("scale", &self.scale.get())
            .finish()
    }
}

/// Inline capacity for member lists; most groups link a handful of views.
const INLINE_MEMBERS: usize = 4;

pub(crate) type MemberList = SmallVec<[Rc<dyn AxisGroupMember>; INLINE_MEMBERS]>;

/// Iterates a member list as trait objects, in registration order.
pub(crate) fn members_of(
    list: &MemberList,
) -> impl Iterator<Item = &dyn AxisGroupMember> + Clone {
    list.iter().map(|m| &**m)
}

fn member_key(member: &Rc<dyn AxisGroupMember>) -> usize {
    Rc::as_ptr(member).cast::<()>() as usize
}

/// Member set shared by the group implementations.
///
/// Members are only added through [`MemberSet::register`] and only removed
/// when the returned [`Membership`] is dropped.
#[derive(Default)]
pub(crate) struct MemberSet {
    members: Rc<RefCell<MemberList>>,
}

impl MemberSet {
    pub(crate) fn register(
        &self,
        member: Rc<dyn AxisGroupMember>,
    ) -> Result<Membership, AxisGroupError> {
        let key = member_key(&member);
        let mut members = self.members.borrow_mut();
        if members.iter().any(|m| member_key(m) == key) {
            return Err(AxisGroupError::AlreadyMember);
        }
        members.push(member);
        #[cfg(feature = "tracing")]
        tracing::trace!(members = members.len(), "axis group member registered");
        Ok(Membership {
            members: Rc::downgrade(&self.members),
            key,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Snapshot of the current members.
    ///
    /// Cloning the `Rc`s releases the borrow before any constraint is read.
    pub(crate) fn snapshot(&self) -> MemberList {
        self.members.borrow().clone()
    }
}

impl fmt::Debug for MemberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberSet")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// RAII registration of a member in an axis group.
///
/// Dropping the `Membership` removes the member from the group. If the group
/// has already been dropped this is a no-op.
pub struct Membership {
    members: Weak<RefCell<MemberList>>,
    key: usize,
}

impl Membership {
    /// Returns `true` while the owning group is alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.members.strong_count() > 0
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if let Some(members) = self.members.upgrade() {
            members.borrow_mut().retain(|m| member_key(m) != self.key);
        }
    }
}

impl fmt::Debug for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Membership")
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use super::{AxisGroupMember, AxisMember, MemberSet};
    use crate::group::AxisGroupError;
    use crate::interval::Interval;

    #[test]
    fn register_and_drop_membership() {
        let set = MemberSet::default();
        let member: Rc<dyn AxisGroupMember> = Rc::new(AxisMember::new(100.0));

        let membership = set.register(member.clone()).unwrap();
        assert_eq!(set.len(), 1);
        assert!(membership.is_attached());

        drop(membership);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let set = MemberSet::default();
        let member: Rc<dyn AxisGroupMember> = Rc::new(AxisMember::new(100.0));

        let _membership = set.register(member.clone()).unwrap();
        assert_eq!(
            set.register(member).err(),
            Some(AxisGroupError::AlreadyMember)
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn membership_outliving_group_is_detached() {
        let set = MemberSet::default();
        let membership = set.register(Rc::new(AxisMember::new(10.0))).unwrap();
        drop(set);
        assert!(!membership.is_attached());
    }

    #[test]
    fn setters_update_projection() {
        let member = AxisMember::new(50.0);
        member.set_span_lpx(75.0);
        member.set_min_constraint(Interval::new(0.0, 1.0));
        member.set_max_constraint(Interval::new(9.0, 10.0));
        member.set_span_constraint(Interval::new(1.0, 5.0));
        member.set_scale_constraint(Interval::new(2.0, 3.0));

        assert_eq!(member.span_lpx(), 75.0);
        assert_eq!(member.min_constraint(), Interval::new(0.0, 1.0));
        assert_eq!(member.max_constraint(), Interval::new(9.0, 10.0));
        assert_eq!(member.span_constraint(), Interval::new(1.0, 5.0));
        assert_eq!(member.scale_constraint(), Interval::new(2.0, 3.0));
    }
}
