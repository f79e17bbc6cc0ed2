//! Capability checks shared by every mutating operation.
//!
//! [`authorize`] is the one place that decides whether an actor may perform an action in
//! a mess. Operations re-read the actor with [`refresh_actor`] inside their transaction,
//! then call [`require`] (or [`require_for_member`] when the action targets a specific
//! member) before touching the store.

use crate::{
    entities::{Member, MemberRole, MemberStatus, member, tenant},
    errors::{Error, Result},
};
use sea_orm::prelude::*;

/// Things an actor may try to do inside a mess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create, edit or delete a meal entry
    EnterMeal,
    /// Freeze a day's meal entries
    LockMeals,
    /// Reopen a locked meal entry
    UnlockMeal,
    /// Record a bazar purchase
    RecordPurchase,
    /// Record an expense
    RecordExpense,
    /// Record a payment
    RecordPayment,
    /// Approve or reject bazar, expense, payment and attendance records
    Approve,
    /// Change a record that is already approved
    ModifyApproved,
    /// Approve, reject, remove members and change roles
    ManageMembers,
    /// Change rates, categories and mess settings
    ManageTenant,
    /// Issue an attendance token
    IssueToken,
    /// Scan an attendance token
    ScanToken,
    /// Act on another member's records
    ActForOthers,
}

/// Who is calling. Passed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorContext {
    /// Scheduled maintenance; allowed everything
    System,
    /// A person, with their approved membership in the target mess if any
    Person {
        /// External person id
        person_id: i64,
        /// Active membership in the mess being acted on
        membership: Option<member::Model>,
    },
}

impl ActorContext {
    /// The maintenance actor.
    #[must_use]
    pub const fn system() -> Self {
        Self::System
    }

    /// A person acting with the given membership.
    #[must_use]
    pub const fn person(person_id: i64, membership: Option<member::Model>) -> Self {
        Self::Person {
            person_id,
            membership,
        }
    }

    /// Person id, `None` for the system actor.
    #[must_use]
    pub const fn person_id(&self) -> Option<i64> {
        match self {
            Self::System => None,
            Self::Person { person_id, .. } => Some(*person_id),
        }
    }

    /// Membership id of the actor, if they have an approved membership.
    #[must_use]
    pub fn member_id(&self) -> Option<i64> {
        match self {
            Self::System => None,
            Self::Person { membership, .. } => membership.as_ref().map(|m| m.id),
        }
    }

    /// Whether the actor created (and therefore manages) the mess.
    #[must_use]
    pub fn is_manager_of(&self, tenant: &tenant::Model) -> bool {
        self.person_id() == Some(tenant.manager_person_id)
    }
}

/// Builds the actor for `person_id` in `tenant_id`, attaching their approved membership.
pub async fn resolve_actor<C>(db: &C, tenant_id: i64, person_id: i64) -> Result<ActorContext>
where
    C: ConnectionTrait,
{
    let membership = Member::find()
        .filter(member::Column::TenantId.eq(tenant_id))
        .filter(member::Column::PersonId.eq(person_id))
        .filter(member::Column::Status.eq(MemberStatus::Approved))
        .one(db)
        .await?;
    Ok(ActorContext::person(person_id, membership))
}

/// Rebuilds `actor` from the memberships currently stored in `db`.
///
/// Mutating operations call this inside their transaction, so a member who left or was
/// demoted after the caller built the actor is judged by their current standing.
pub async fn refresh_actor<C>(db: &C, actor: &ActorContext, tenant_id: i64) -> Result<ActorContext>
where
    C: ConnectionTrait,
{
    match actor {
        ActorContext::System => Ok(ActorContext::System),
        ActorContext::Person { person_id, .. } => resolve_actor(db, tenant_id, *person_id).await,
    }
}

const fn role_allows(role: MemberRole, action: Action) -> bool {
    match role {
        MemberRole::Admin => true,
        MemberRole::Staff => !matches!(
            action,
            Action::UnlockMeal
                | Action::Approve
                | Action::ModifyApproved
                | Action::ManageMembers
                | Action::ManageTenant
        ),
        MemberRole::Member => matches!(
            action,
            Action::EnterMeal
                | Action::RecordPurchase
                | Action::RecordExpense
                | Action::RecordPayment
                | Action::IssueToken
        ),
    }
}

/// Decides whether `actor` may perform `action` in `tenant`.
#[must_use]
pub fn authorize(actor: &ActorContext, action: Action, tenant: &tenant::Model) -> bool {
    if tenant.is_deleted {
        return false;
    }
    match actor {
        ActorContext::System => true,
        ActorContext::Person {
            person_id,
            membership,
        } => {
            if *person_id == tenant.manager_person_id {
                return true;
            }
            membership.as_ref().is_some_and(|m| {
                m.tenant_id == tenant.id
                    && m.person_id == *person_id
                    && m.status == MemberStatus::Approved
                    && role_allows(m.role, action)
            })
        }
    }
}

/// [`authorize`] as a `Result`.
pub fn require(actor: &ActorContext, action: Action, tenant: &tenant::Model) -> Result<()> {
    if authorize(actor, action, tenant) {
        Ok(())
    } else {
        Err(Error::unauthorized(format!(
            "{action:?} not permitted in mess {}",
            tenant.id
        )))
    }
}

/// Like [`require`], but acting on another member's records also needs
/// [`Action::ActForOthers`].
pub fn require_for_member(
    actor: &ActorContext,
    action: Action,
    tenant: &tenant::Model,
    member_id: i64,
) -> Result<()> {
    require(actor, action, tenant)?;
    if actor.member_id() == Some(member_id) {
        return Ok(());
    }
    require(actor, Action::ActForOthers, tenant)
}

/// Approved records can only be changed by actors allowed to [`Action::ModifyApproved`].
pub fn require_mutable(
    actor: &ActorContext,
    tenant: &tenant::Model,
    is_approved: bool,
    kind: &'static str,
    id: i64,
) -> Result<()> {
    if is_approved && !authorize(actor, Action::ModifyApproved, tenant) {
        return Err(Error::Immutable { kind, id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        meal::lock_meals,
        member::{leave_member, set_role},
    };
    use crate::test_utils::*;

    #[test]
    fn test_manager_is_allowed_everything() {
        let tenant = sample_tenant(1, 100);
        let actor = ActorContext::person(100, None);
        assert!(authorize(&actor, Action::ManageTenant, &tenant));
        assert!(authorize(&actor, Action::ModifyApproved, &tenant));
    }

    #[test]
    fn test_member_role_is_limited() {
        let tenant = sample_tenant(1, 100);
        let actor = ActorContext::person(7, Some(sample_member(3, 1, 7, MemberRole::Member)));
        assert!(authorize(&actor, Action::EnterMeal, &tenant));
        assert!(!authorize(&actor, Action::LockMeals, &tenant));
        assert!(!authorize(&actor, Action::Approve, &tenant));
        assert!(require_for_member(&actor, Action::EnterMeal, &tenant, 3).is_ok());
        assert!(matches!(
            require_for_member(&actor, Action::EnterMeal, &tenant, 4),
            Err(Error::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_staff_can_act_for_others_but_not_approve() {
        let tenant = sample_tenant(1, 100);
        let actor = ActorContext::person(8, Some(sample_member(4, 1, 8, MemberRole::Staff)));
        assert!(require_for_member(&actor, Action::EnterMeal, &tenant, 3).is_ok());
        assert!(authorize(&actor, Action::LockMeals, &tenant));
        assert!(!authorize(&actor, Action::Approve, &tenant));
    }

    #[test]
    fn test_membership_of_other_mess_is_ignored() {
        let tenant = sample_tenant(1, 100);
        let actor = ActorContext::person(7, Some(sample_member(3, 2, 7, MemberRole::Admin)));
        assert!(!authorize(&actor, Action::EnterMeal, &tenant));
    }

    #[test]
    fn test_deleted_mess_denies_everyone() {
        let mut tenant = sample_tenant(1, 100);
        tenant.is_deleted = true;
        assert!(!authorize(&ActorContext::system(), Action::LockMeals, &tenant));
        assert!(!authorize(&ActorContext::person(100, None), Action::EnterMeal, &tenant));
    }

    #[test]
    fn test_require_mutable() {
        let tenant = sample_tenant(1, 100);
        let member = ActorContext::person(7, Some(sample_member(3, 1, 7, MemberRole::Member)));
        let manager = ActorContext::person(100, None);
        assert!(require_mutable(&member, &tenant, false, "expense", 9).is_ok());
        assert!(matches!(
            require_mutable(&member, &tenant, true, "expense", 9),
            Err(Error::Immutable { id: 9, .. })
        ));
        assert!(require_mutable(&manager, &tenant, true, "expense", 9).is_ok());
    }

    #[tokio::test]
    async fn test_stale_actor_is_judged_by_current_membership() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let staff = set_role(&db, &manager, alice.id, MemberRole::Staff).await?;
        let stale = member_actor(&staff);
        let after_cutoff = clock_at(2024, 6, 1, 11, 0);
        let today = date(2024, 6, 1);

        assert_eq!(lock_meals(&db, &after_cutoff, &stale, tenant.id, today, false).await?, 0);

        set_role(&db, &manager, alice.id, MemberRole::Member).await?;
        let demoted = lock_meals(&db, &after_cutoff, &stale, tenant.id, today, false).await;
        assert!(matches!(demoted, Err(Error::Unauthorized { .. })));

        leave_member(&db, &test_clock(), &manager, alice.id).await?;
        let refreshed = refresh_actor(&db, &stale, tenant.id).await?;
        assert_eq!(refreshed.person_id(), Some(501));
        assert_eq!(refreshed.member_id(), None);
        assert_eq!(
            refresh_actor(&db, &ActorContext::system(), tenant.id).await?,
            ActorContext::System
        );
        Ok(())
    }
}
